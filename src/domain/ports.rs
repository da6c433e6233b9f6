use crate::domain::model::{PostalCode, Profile, UserId, Version, Versioned, Zone, ZoneDescriptor};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub trait ZoneStore: Send + Sync {
    fn list_zones(&self) -> impl Future<Output = Result<Vec<Versioned<Zone>>>> + Send;

    fn find_zone_by_id(
        &self,
        zone_id: &str,
    ) -> impl Future<Output = Result<Option<Versioned<Zone>>>> + Send;

    /// Writes the whole record. `expected = None` only inserts; `Some(version)`
    /// only replaces that exact revision. Anything else is `WriteConflict`.
    fn put_zone(
        &self,
        zone: &Zone,
        expected: Option<&Version>,
    ) -> impl Future<Output = Result<Version>> + Send;

    fn find_zone_by_postal_code(
        &self,
        postal_code: &PostalCode,
    ) -> impl Future<Output = Result<Option<Versioned<Zone>>>> + Send {
        async move {
            let zones = self.list_zones().await?;
            Ok(zones
                .into_iter()
                .find(|zone| zone.record.covers(postal_code)))
        }
    }
}

pub trait ProfileStore: Send + Sync {
    fn get_profile(&self, user: &UserId)
        -> impl Future<Output = Result<Option<Profile>>> + Send;
}

#[async_trait]
pub trait GeoResolver: Send + Sync {
    async fn resolve(&self, postal_code: &PostalCode) -> Result<ZoneDescriptor>;
}

pub trait ConfigProvider: Send + Sync {
    fn geocode_endpoint(&self) -> &str;
    fn geocode_api_key(&self) -> Option<&str>;
    fn zones_endpoint(&self) -> &str;
    fn user_agent(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn max_write_attempts(&self) -> usize;
}
