pub mod config;
pub mod credentials;

pub use config::{ConfigDiagnostic, ConfigError, HarnessConfig};
pub use credentials::{Credentials, DeployerSecret};

/// Default name of the harness configuration file.
pub const CONFIG_FILE_NAME: &str = "dat.toml";
