pub mod model;
pub mod source;

pub use model::{
    PlatformVersion, RegistryDependency, RegistryFile, RegistryVersion, SearchHit, SearchQuery,
    VersionFilter,
};
pub use source::{RemoteVersionSource, VersionSource, FABRIC_META_BASE, MODRINTH_API_BASE};
