#[cfg(feature = "cli")]
pub mod cli;
pub mod lambda;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliAction, CliConfig};
pub use lambda::LambdaConfig;
pub use toml_config::TomlConfig;
