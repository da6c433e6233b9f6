use crate::domain::model::Status;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("Invalid postal code '{input}': must be a 5 digit or 5-4 digit US zip")]
    InvalidPostalCode { input: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Geo lookup failed: {message}")]
    GeoLookupFailed { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Conditional write rejected for zone {zone_id}")]
    WriteConflict { zone_id: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}' ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Upstream,
    Storage,
    Configuration,
}

impl ZoneError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ZoneError::InvalidPostalCode { .. } | ZoneError::InvalidRequest { .. } => {
                ErrorCategory::Input
            }
            ZoneError::GeoLookupFailed { .. } | ZoneError::UpstreamUnavailable { .. } => {
                ErrorCategory::Upstream
            }
            ZoneError::StorageError { .. }
            | ZoneError::WriteConflict { .. }
            | ZoneError::IoError(_)
            | ZoneError::SerializationError(_) => ErrorCategory::Storage,
            ZoneError::ConfigError { .. }
            | ZoneError::InvalidConfigValueError { .. }
            | ZoneError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    /// Response status reported to the caller for this error.
    pub fn status(&self) -> Status {
        match self {
            ZoneError::InvalidPostalCode { .. } => Status::InvalidPostalCode,
            ZoneError::InvalidRequest { .. } => Status::InvalidRequest,
            ZoneError::GeoLookupFailed { .. } => Status::GeoLookupFailed,
            ZoneError::UpstreamUnavailable { .. } => Status::UpstreamUnavailable,
            _ => Status::StorageError,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ZoneError::InvalidPostalCode { input } => {
                format!("Bad zip {}: must be 5 digit or 5-4 digit US only zip.", input)
            }
            ZoneError::InvalidRequest { message } => message.clone(),
            ZoneError::GeoLookupFailed { .. } => {
                "Could not determine the alert zone for this postal code.".to_string()
            }
            ZoneError::UpstreamUnavailable { .. } => {
                "A dependent service is unavailable, please try again later.".to_string()
            }
            ZoneError::WriteConflict { .. } => {
                "The zone was updated concurrently too many times, please try again.".to_string()
            }
            ZoneError::ConfigError { .. }
            | ZoneError::InvalidConfigValueError { .. }
            | ZoneError::MissingConfigError { .. } => format!("Configuration problem: {}", self),
            _ => "The zone record could not be read or written.".to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Check the command, user and postal code parameters",
            ErrorCategory::Upstream => "Retry later or verify the geocode and zone endpoints",
            ErrorCategory::Storage => "Retry the command; check storage permissions if it persists",
            ErrorCategory::Configuration => "Fix the configuration file or environment variables",
        }
    }
}

pub type Result<T> = std::result::Result<T, ZoneError>;
