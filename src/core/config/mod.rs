pub mod loader;
pub mod model;

pub use loader::{expand_home, find_on_path};
pub use model::{EnvironmentSettings, OptionsSettings, StateRecord, UpdaterConfig};
