pub mod context;
pub mod fabric;
pub mod installer;

pub use context::InstallContext;
pub use fabric::FabricServerInstaller;
pub use installer::{LoaderInstaller, PlatformArtifacts};
