use crate::core::ConfigProvider;
use crate::utils::error::{Result, ZoneError};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_ZONES_ENDPOINT: &str = "https://api.weather.gov/zones";
pub const DEFAULT_USER_AGENT: &str = concat!("safe-zones/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub geocode: GeocodeConfig,
    #[serde(default)]
    pub zones: ZonesConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    #[serde(default = "default_geocode_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesConfig {
    #[serde(default = "default_zones_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_geocode_endpoint() -> String {
    DEFAULT_GEOCODE_ENDPOINT.to_string()
}

fn default_zones_endpoint() -> String {
    DEFAULT_ZONES_ENDPOINT.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_write_attempts() -> usize {
    crate::core::directory::DEFAULT_MAX_WRITE_ATTEMPTS
}

fn default_data_dir() -> String {
    "./data".to_string()
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geocode_endpoint(),
            api_key: None,
        }
    }
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            endpoint: default_zones_endpoint(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_timeout_seconds(),
            max_write_attempts: default_max_write_attempts(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ZoneError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ZoneError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unset variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ZoneError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn data_dir(&self) -> &str {
        &self.storage.data_dir
    }
}

impl ConfigProvider for TomlConfig {
    fn geocode_endpoint(&self) -> &str {
        &self.geocode.endpoint
    }

    fn geocode_api_key(&self) -> Option<&str> {
        self.geocode
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty() && !key.starts_with("${"))
    }

    fn zones_endpoint(&self) -> &str {
        &self.zones.endpoint
    }

    fn user_agent(&self) -> &str {
        &self.zones.user_agent
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.request_timeout_seconds)
    }

    fn max_write_attempts(&self) -> usize {
        self.service.max_write_attempts
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_url("geocode.endpoint", &self.geocode.endpoint)?;
        validate_url("zones.endpoint", &self.zones.endpoint)?;
        validate_non_empty_string("zones.user_agent", &self.zones.user_agent)?;
        validate_range(
            "service.request_timeout_seconds",
            self.service.request_timeout_seconds,
            1,
            300,
        )?;
        validate_range("service.max_write_attempts", self.service.max_write_attempts, 1, 20)?;
        validate_path("storage.data_dir", &self.storage.data_dir)?;

        tracing::debug!("✅ TOML configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[geocode]
endpoint = "https://geo.example.com/json"
api_key = "secret"

[zones]
endpoint = "https://zones.example.com/zones"
user_agent = "safe-zones (ops@example.com)"

[service]
request_timeout_seconds = 4
max_write_attempts = 3

[storage]
data_dir = "/var/lib/safe-zones"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.geocode_endpoint(), "https://geo.example.com/json");
        assert_eq!(config.geocode_api_key(), Some("secret"));
        assert_eq!(config.request_timeout(), Duration::from_secs(4));
        assert_eq!(config.max_write_attempts(), 3);
        assert_eq!(config.data_dir(), "/var/lib/safe-zones");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.zones_endpoint(), DEFAULT_ZONES_ENDPOINT);
        assert_eq!(config.geocode_api_key(), None);
        assert_eq!(config.max_write_attempts(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SAFE_ZONES_TEST_GEOCODE_KEY", "from-env");

        let toml_content = r#"
[geocode]
api_key = "${SAFE_ZONES_TEST_GEOCODE_KEY}"
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.geocode_api_key(), Some("from-env"));

        std::env::remove_var("SAFE_ZONES_TEST_GEOCODE_KEY");
    }

    #[test]
    fn test_unresolved_placeholder_is_no_key() {
        let toml_content = r#"
[geocode]
api_key = "${SAFE_ZONES_TEST_UNSET_VARIABLE}"
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.geocode_api_key(), None);
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[zones]
endpoint = "invalid-url"
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let zero_attempts = r#"
[service]
max_write_attempts = 0
"#;
        let config = TomlConfig::from_toml_str(zero_attempts).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[storage]\ndata_dir = \"./zones-data\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.data_dir(), "./zones-data");
    }
}
