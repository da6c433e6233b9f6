use crate::core::{ProfileStore, ZoneStore};
use crate::domain::model::{Profile, UserId, Version, Versioned, Zone};
use crate::utils::error::{Result, ZoneError};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-local zone store with revision counters as versions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryZoneStore {
    zones: Arc<Mutex<BTreeMap<String, (Zone, u64)>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store; seeded records are not counted as writes.
    pub fn with_zones(zones: impl IntoIterator<Item = Zone>) -> Self {
        let seeded = zones
            .into_iter()
            .map(|zone| (zone.zone_id.clone(), (zone, 1)))
            .collect();
        Self {
            zones: Arc::new(Mutex::new(seeded)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn zone(&self, zone_id: &str) -> Option<Zone> {
        let zones = self.zones.lock().await;
        zones.get(zone_id).map(|(zone, _)| zone.clone())
    }
}

fn versioned(zone: &Zone, revision: u64) -> Versioned<Zone> {
    Versioned {
        record: zone.clone(),
        version: Version::new(revision.to_string()),
    }
}

impl ZoneStore for InMemoryZoneStore {
    async fn list_zones(&self) -> Result<Vec<Versioned<Zone>>> {
        let zones = self.zones.lock().await;
        Ok(zones
            .values()
            .map(|(zone, revision)| versioned(zone, *revision))
            .collect())
    }

    async fn find_zone_by_id(&self, zone_id: &str) -> Result<Option<Versioned<Zone>>> {
        let zones = self.zones.lock().await;
        Ok(zones
            .get(zone_id)
            .map(|(zone, revision)| versioned(zone, *revision)))
    }

    async fn put_zone(&self, zone: &Zone, expected: Option<&Version>) -> Result<Version> {
        zone.ensure_persistable()?;

        let mut zones = self.zones.lock().await;
        let current = zones.get(&zone.zone_id).map(|(_, revision)| *revision);
        let current_version = current.map(|revision| Version::new(revision.to_string()));
        if current_version.as_ref() != expected {
            return Err(ZoneError::WriteConflict {
                zone_id: zone.zone_id.clone(),
            });
        }

        let next = current.unwrap_or(0) + 1;
        zones.insert(zone.zone_id.clone(), (zone.clone(), next));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Version::new(next.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<Mutex<HashMap<UserId, Profile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = (UserId, Profile)>) -> Self {
        Self {
            profiles: Arc::new(Mutex::new(profiles.into_iter().collect())),
        }
    }

    pub async fn insert(&self, user: UserId, profile: Profile) {
        let mut profiles = self.profiles.lock().await;
        profiles.insert(user, profile);
    }
}

impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, user: &UserId) -> Result<Option<Profile>> {
        let profiles = self.profiles.lock().await;
        Ok(profiles.get(user).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{PostalCode, ZoneDescriptor};

    fn zone() -> Zone {
        Zone::new(
            ZoneDescriptor {
                zone_id: "OHC049".to_string(),
                public_zone_id: "OHZ055".to_string(),
                fire_zone_id: "OHZ055".to_string(),
                name: "Franklin".to_string(),
                state: "OH".to_string(),
            },
            PostalCode::parse("43215").unwrap(),
            UserId::new("u1").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_insert_then_guarded_replace() {
        let store = InMemoryZoneStore::new();
        let first = store.put_zone(&zone(), None).await.unwrap();

        let duplicate = store.put_zone(&zone(), None).await;
        assert!(matches!(duplicate, Err(ZoneError::WriteConflict { .. })));

        let mut updated = zone();
        updated.subscribers.insert(UserId::new("u2").unwrap());
        let second = store.put_zone(&updated, Some(&first)).await.unwrap();
        assert_ne!(first, second);

        let stale = store.put_zone(&zone(), Some(&first)).await;
        assert!(matches!(stale, Err(ZoneError::WriteConflict { .. })));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_find_by_postal_code_scans_zones() {
        let store = InMemoryZoneStore::with_zones([zone()]);
        let found = store
            .find_zone_by_postal_code(&PostalCode::parse("43215-0001").unwrap())
            .await
            .unwrap();
        assert_eq!(found.unwrap().record.zone_id, "OHC049");

        let missing = store
            .find_zone_by_postal_code(&PostalCode::parse("99999").unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_empty_postal_codes_rejected() {
        let store = InMemoryZoneStore::new();
        let mut empty = zone();
        empty.postal_codes.clear();
        assert!(store.put_zone(&empty, None).await.is_err());
        assert_eq!(store.write_count(), 0);
    }
}
