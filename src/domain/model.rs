use crate::utils::error::{Result, ZoneError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn postal_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{5})[- ]?(\d{4})?$").expect("postal code pattern is valid")
    })
}

/// A normalized 5 digit US postal code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Accepts `12345`, `12345-6789`, `12345 6789` and `123456789`; ZIP+4 input
    /// is truncated to its first five digits. Surrounding whitespace is
    /// trimmed before matching, so `" 43215 "` is accepted.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        postal_code_pattern()
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|five| PostalCode(five.as_str().to_string()))
            .ok_or_else(|| ZoneError::InvalidPostalCode {
                input: input.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PostalCode {
    type Error = ZoneError;

    fn try_from(value: String) -> Result<Self> {
        PostalCode::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ZoneError::InvalidRequest {
                message: "user id cannot be empty".to_string(),
            });
        }
        Ok(UserId(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Create,
    Remove,
}

impl FromStr for Command {
    type Err = ZoneError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Command::Create),
            "remove" => Ok(Command::Remove),
            other => Err(ZoneError::InvalidRequest {
                message: format!("Invalid command '{}': expected create or remove", other),
            }),
        }
    }
}

/// Zone descriptor produced by geo resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDescriptor {
    pub zone_id: String,
    pub public_zone_id: String,
    pub fire_zone_id: String,
    pub name: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub zone_id: String,
    #[serde(default)]
    pub public_zone_id: String,
    #[serde(default)]
    pub fire_zone_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    pub postal_codes: BTreeSet<PostalCode>,
    #[serde(default)]
    pub subscribers: BTreeSet<UserId>,
}

impl Zone {
    /// A freshly resolved zone holding a single postal code and subscriber.
    pub fn new(descriptor: ZoneDescriptor, postal_code: PostalCode, user: UserId) -> Self {
        Self {
            zone_id: descriptor.zone_id,
            public_zone_id: descriptor.public_zone_id,
            fire_zone_id: descriptor.fire_zone_id,
            name: descriptor.name,
            state: descriptor.state,
            postal_codes: BTreeSet::from([postal_code]),
            subscribers: BTreeSet::from([user]),
        }
    }

    pub fn covers(&self, postal_code: &PostalCode) -> bool {
        self.postal_codes.contains(postal_code)
    }

    pub fn has_subscriber(&self, user: &UserId) -> bool {
        self.subscribers.contains(user)
    }

    /// Zones are never persisted without postal codes.
    pub fn ensure_persistable(&self) -> Result<()> {
        if self.zone_id.trim().is_empty() {
            return Err(ZoneError::StorageError {
                message: "zone record has an empty zone id".to_string(),
            });
        }
        if self.postal_codes.is_empty() {
            return Err(ZoneError::StorageError {
                message: format!("zone {} has no postal codes", self.zone_id),
            });
        }
        Ok(())
    }
}

/// Opaque token identifying one stored revision of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    pub fn new(token: impl Into<String>) -> Self {
        Version(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub record: T,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub zip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl Profile {
    /// Postal codes of locations referenced by at least one alert.
    pub fn alerted_postal_codes(&self) -> BTreeSet<PostalCode> {
        self.alerts
            .iter()
            .filter_map(|alert| {
                self.locations
                    .iter()
                    .rev()
                    .find(|location| location.name == alert.location)
            })
            .filter_map(|location| PostalCode::parse(&location.zip).ok())
            .collect()
    }

    /// Whether an alerted location other than `excluded` falls inside `zone`.
    pub fn watches_other_code_in(&self, zone: &Zone, excluded: &PostalCode) -> bool {
        self.alerted_postal_codes()
            .iter()
            .any(|code| code != excluded && zone.covers(code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Subscribed,
    AlreadySubscribed,
    Unsubscribed,
    NotSubscribed,
    RetainedMultiLocation,
    NoZoneFound,
    InvalidPostalCode,
    InvalidRequest,
    GeoLookupFailed,
    StorageError,
    UpstreamUnavailable,
}

impl Status {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Status::InvalidPostalCode
                | Status::InvalidRequest
                | Status::GeoLookupFailed
                | Status::StorageError
                | Status::UpstreamUnavailable
        )
    }
}

/// Result of a successfully processed command, including informative no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: Status,
    pub zone_id: Option<String>,
    pub message: String,
}

impl Outcome {
    pub fn for_zone(status: Status, zone_id: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            zone_id: Some(zone_id.to_string()),
            message: message.into(),
        }
    }

    pub fn without_zone(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            zone_id: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub command: String,
    pub user: String,
    #[serde(alias = "zip", alias = "postal_code")]
    pub postal_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
}

impl From<Result<Outcome>> for CommandResponse {
    fn from(result: Result<Outcome>) -> Self {
        match result {
            Ok(outcome) => CommandResponse {
                status: outcome.status,
                message: outcome.message,
                zone_id: outcome.zone_id,
            },
            Err(e) => CommandResponse {
                status: e.status(),
                message: e.user_friendly_message(),
                zone_id: None,
            },
        }
    }
}
