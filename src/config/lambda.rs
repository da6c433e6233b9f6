use crate::config::toml_config::{
    DEFAULT_GEOCODE_ENDPOINT, DEFAULT_USER_AGENT, DEFAULT_ZONES_ENDPOINT,
};
use crate::core::directory::DEFAULT_MAX_WRITE_ATTEMPTS;
use crate::core::ConfigProvider;
use crate::utils::error::{Result, ZoneError};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub geocode_endpoint: String,
    pub geocode_api_key: Option<String>,
    pub zones_endpoint: String,
    pub user_agent: String,
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub s3_region: String,
    pub request_timeout_seconds: u64,
    pub max_write_attempts: usize,
}

impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        let bucket = env::var("S3_BUCKET").ok();
        let s3_bucket =
            crate::utils::validation::validate_required_field("S3_BUCKET", &bucket)?.clone();

        Ok(Self {
            geocode_endpoint: env::var("GEOCODE_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_GEOCODE_ENDPOINT.to_string()),
            geocode_api_key: env::var("GEOCODE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            zones_endpoint: env::var("ZONES_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ZONES_ENDPOINT.to_string()),
            user_agent: env::var("USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            s3_bucket,
            s3_prefix: env::var("S3_PREFIX").unwrap_or_else(|_| "safe-zones".to_string()),
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            request_timeout_seconds: parse_env("REQUEST_TIMEOUT_SECONDS", 10)?,
            max_write_attempts: parse_env("MAX_WRITE_ATTEMPTS", DEFAULT_MAX_WRITE_ATTEMPTS)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ZoneError::InvalidConfigValueError {
                field: name.to_string(),
                value,
                reason: "not a valid number".to_string(),
            }),
        Err(_) => Ok(default),
    }
}

impl ConfigProvider for LambdaConfig {
    fn geocode_endpoint(&self) -> &str {
        &self.geocode_endpoint
    }

    fn geocode_api_key(&self) -> Option<&str> {
        self.geocode_api_key.as_deref()
    }

    fn zones_endpoint(&self) -> &str {
        &self.zones_endpoint
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn max_write_attempts(&self) -> usize {
        self.max_write_attempts
    }
}

impl crate::utils::validation::Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_url("GEOCODE_ENDPOINT", &self.geocode_endpoint)?;
        validate_url("ZONES_ENDPOINT", &self.zones_endpoint)?;
        validate_non_empty_string("USER_AGENT", &self.user_agent)?;
        validate_s3_bucket_name("S3_BUCKET", &self.s3_bucket)?;
        validate_aws_region("S3_REGION", &self.s3_region)?;
        validate_range("REQUEST_TIMEOUT_SECONDS", self.request_timeout_seconds, 1, 300)?;
        validate_range("MAX_WRITE_ATTEMPTS", self.max_write_attempts, 1, 20)?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(ZoneError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name must be between 3 and 63 characters".to_string(),
        });
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(ZoneError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots"
                .to_string(),
        });
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(ZoneError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name cannot start or end with a hyphen".to_string(),
        });
    }

    Ok(())
}

fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    crate::utils::validation::validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ZoneError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}
