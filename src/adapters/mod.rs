// Adapters layer: concrete implementations of the domain ports (storage backends, geo lookups).

pub mod http;
pub mod local;
pub mod memory;
#[cfg(feature = "lambda")]
pub mod s3;

use crate::domain::model::Zone;
use crate::utils::error::{Result, ZoneError};

/// Key-safe file/object stem: anything outside `[A-Za-z0-9@._-]` is percent-encoded.
pub(crate) fn record_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'@' | b'.' | b'_' | b'-' => {
                stem.push(byte as char)
            }
            other => stem.push_str(&format!("%{:02X}", other)),
        }
    }
    stem
}

pub(crate) fn verify_zone(zone: Zone, origin: &str) -> Result<Zone> {
    zone.ensure_persistable().map_err(|e| ZoneError::StorageError {
        message: format!("rejected zone record from {}: {}", origin, e),
    })?;
    Ok(zone)
}

#[cfg_attr(not(feature = "lambda"), allow(dead_code))]
pub(crate) fn decode_zone(data: &[u8], origin: &str) -> Result<Zone> {
    let zone: Zone = serde_json::from_slice(data).map_err(|e| ZoneError::StorageError {
        message: format!("corrupt zone record {}: {}", origin, e),
    })?;
    verify_zone(zone, origin)
}
