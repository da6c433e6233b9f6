use crate::adapters::{record_stem, verify_zone};
use crate::core::{ProfileStore, ZoneStore};
use crate::domain::model::{Profile, UserId, Version, Versioned, Zone};
use crate::utils::error::{Result, ZoneError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

const LOCK_ATTEMPTS: u32 = 500;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);
/// Locks older than this are left over from a crashed writer.
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize)]
struct StoredZone {
    version: u64,
    zone: Zone,
}

impl StoredZone {
    fn version(&self) -> Version {
        Version::new(self.version.to_string())
    }
}

/// Exclusive `zones/<zone id>.lock` marker shared by every process using the
/// same data directory. Removed on drop.
#[derive(Debug)]
struct ZoneLock {
    path: PathBuf,
}

impl ZoneLock {
    async fn acquire(path: PathBuf) -> Result<Self> {
        for _ in 0..LOCK_ATTEMPTS {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(ZoneLock { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path).await {
                        tracing::warn!("⚠️ Removing stale zone lock {}", path.display());
                        match fs::remove_file(&path).await {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    tokio::time::sleep(LOCK_RETRY_DELAY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ZoneError::StorageError {
            message: format!("zone lock {} is still held by another writer", path.display()),
        })
    }
}

impl Drop for ZoneLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to release zone lock {}: {}", self.path.display(), e);
        }
    }
}

async fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .ok()
        .and_then(|meta| meta.modified().ok())
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

/// Zone records kept as `zones/<zone id>.json` under a data directory.
///
/// Conditional writes take a lock file next to the record, so separate
/// processes sharing the directory observe each other's versions.
#[derive(Debug, Clone)]
pub struct LocalZoneStore {
    base_path: PathBuf,
}

impl LocalZoneStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn zones_dir(&self) -> PathBuf {
        self.base_path.join("zones")
    }

    fn zone_path(&self, zone_id: &str) -> PathBuf {
        self.zones_dir().join(format!("{}.json", record_stem(zone_id)))
    }

    async fn read_stored(&self, path: &Path) -> Result<Option<StoredZone>> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let origin = path.display().to_string();
        let stored: StoredZone =
            serde_json::from_slice(&data).map_err(|e| ZoneError::StorageError {
                message: format!("corrupt zone file {}: {}", origin, e),
            })?;
        Ok(Some(StoredZone {
            version: stored.version,
            zone: verify_zone(stored.zone, &origin)?,
        }))
    }

    async fn read_zone_file(&self, path: &Path) -> Result<Option<Versioned<Zone>>> {
        Ok(self.read_stored(path).await?.map(|stored| Versioned {
            version: stored.version(),
            record: stored.zone,
        }))
    }
}

impl ZoneStore for LocalZoneStore {
    async fn list_zones(&self) -> Result<Vec<Versioned<Zone>>> {
        let mut entries = match fs::read_dir(self.zones_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut zones = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(zone) = self.read_zone_file(&path).await? {
                zones.push(zone);
            }
        }
        zones.sort_by(|a, b| a.record.zone_id.cmp(&b.record.zone_id));
        Ok(zones)
    }

    async fn find_zone_by_id(&self, zone_id: &str) -> Result<Option<Versioned<Zone>>> {
        self.read_zone_file(&self.zone_path(zone_id)).await
    }

    async fn put_zone(&self, zone: &Zone, expected: Option<&Version>) -> Result<Version> {
        zone.ensure_persistable()?;

        let path = self.zone_path(&zone.zone_id);
        fs::create_dir_all(self.zones_dir()).await?;
        let _lock = ZoneLock::acquire(path.with_extension("lock")).await?;

        let current = self.read_stored(&path).await?;
        if current.as_ref().map(StoredZone::version).as_ref() != expected {
            return Err(ZoneError::WriteConflict {
                zone_id: zone.zone_id.clone(),
            });
        }

        let next = current.map_or(1, |stored| stored.version + 1);
        let stored = StoredZone {
            version: next,
            zone: zone.clone(),
        };

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(&stored)?).await?;
        fs::rename(&staging, &path).await?;

        tracing::debug!("Zone {} written to {} (version {})", zone.zone_id, path.display(), next);
        Ok(stored.version())
    }
}

/// Profiles read from `profiles/<user id>.json`.
#[derive(Debug, Clone)]
pub struct LocalProfileStore {
    base_path: PathBuf,
}

impl LocalProfileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl ProfileStore for LocalProfileStore {
    async fn get_profile(&self, user: &UserId) -> Result<Option<Profile>> {
        let path = self
            .base_path
            .join("profiles")
            .join(format!("{}.json", record_stem(user.as_str())));

        match fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| ZoneError::StorageError {
                    message: format!("corrupt profile {}: {}", path.display(), e),
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
