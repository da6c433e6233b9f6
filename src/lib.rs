pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliAction, CliConfig};
pub use config::{LambdaConfig, TomlConfig};

pub use adapters::http::HttpGeoResolver;
pub use adapters::local::{LocalProfileStore, LocalZoneStore};
pub use adapters::memory::{InMemoryProfileStore, InMemoryZoneStore};
#[cfg(feature = "lambda")]
pub use adapters::s3::{S3ProfileStore, S3ZoneStore};
pub use crate::core::directory::{DirectoryOptions, SubscriptionDirectory};
pub use domain::model::{
    Command, CommandRequest, CommandResponse, Outcome, PostalCode, Profile, Status, UserId, Zone,
    ZoneDescriptor,
};
pub use utils::error::{Result, ZoneError};
