use crate::core::{ConfigProvider, GeoResolver, ProfileStore, ZoneStore};
use crate::domain::model::{
    Command, CommandRequest, CommandResponse, Outcome, PostalCode, Profile, Status, UserId,
    Versioned, Zone, ZoneDescriptor,
};
use crate::utils::error::{Result, ZoneError};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

pub const DEFAULT_MAX_WRITE_ATTEMPTS: usize = 5;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryOptions {
    /// Attempts per command when a conditional zone write is rejected.
    pub max_write_attempts: usize,
    /// Upper bound for any single store or resolver call.
    pub call_timeout: Duration,
}

impl DirectoryOptions {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            max_write_attempts: config.max_write_attempts().max(1),
            call_timeout: config.request_timeout(),
        }
    }
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Maps postal codes to alert zones and maintains zone subscriber sets.
pub struct SubscriptionDirectory<Z: ZoneStore, P: ProfileStore, G: GeoResolver> {
    zones: Z,
    profiles: P,
    geo: G,
    options: DirectoryOptions,
}

impl<Z: ZoneStore, P: ProfileStore, G: GeoResolver> SubscriptionDirectory<Z, P, G> {
    pub fn new(zones: Z, profiles: P, geo: G) -> Self {
        Self::with_options(zones, profiles, geo, DirectoryOptions::default())
    }

    pub fn with_options(zones: Z, profiles: P, geo: G, options: DirectoryOptions) -> Self {
        Self {
            zones,
            profiles,
            geo,
            options,
        }
    }

    pub fn zone_store(&self) -> &Z {
        &self.zones
    }

    /// Decodes an inbound request and folds every failure into the response.
    pub async fn handle_request(&self, request: &CommandRequest) -> CommandResponse {
        let result = match (
            request.command.parse::<Command>(),
            UserId::new(request.user.as_str()),
        ) {
            (Ok(command), Ok(user)) => self.handle(command, &user, &request.postal_code).await,
            (Err(e), _) | (_, Err(e)) => Err(e),
        };

        if let Err(e) = &result {
            tracing::error!(
                "❌ {} for user {} / zip {} failed: {} (Category: {:?})",
                request.command,
                request.user,
                request.postal_code,
                e,
                e.category()
            );
        }
        CommandResponse::from(result)
    }

    pub async fn handle(
        &self,
        command: Command,
        user: &UserId,
        postal_code: &str,
    ) -> Result<Outcome> {
        let postal_code = PostalCode::parse(postal_code)?;
        tracing::info!(
            "Command {:?}: zone information for postal code {} related to user {}",
            command,
            postal_code,
            user
        );

        match command {
            Command::Create => self.create(user, &postal_code).await,
            Command::Remove => self.remove(user, &postal_code).await,
        }
    }

    pub async fn create(&self, user: &UserId, postal_code: &PostalCode) -> Result<Outcome> {
        let mut resolved: Option<ZoneDescriptor> = None;
        let mut attempt = 1;
        loop {
            match self.try_create(user, postal_code, &mut resolved).await {
                Err(ZoneError::WriteConflict { zone_id })
                    if attempt < self.options.max_write_attempts =>
                {
                    tracing::warn!(
                        "⚠️ Zone {} changed underneath create (attempt {}/{}), retrying",
                        zone_id,
                        attempt,
                        self.options.max_write_attempts
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    pub async fn remove(&self, user: &UserId, postal_code: &PostalCode) -> Result<Outcome> {
        let mut profile: Option<Option<Profile>> = None;
        let mut attempt = 1;
        loop {
            match self.try_remove(user, postal_code, &mut profile).await {
                Err(ZoneError::WriteConflict { zone_id })
                    if attempt < self.options.max_write_attempts =>
                {
                    tracing::warn!(
                        "⚠️ Zone {} changed underneath remove (attempt {}/{}), retrying",
                        zone_id,
                        attempt,
                        self.options.max_write_attempts
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Every known zone, in store order.
    pub async fn zones(&self) -> Result<Vec<Zone>> {
        let zones = self.bounded("zone listing", self.zones.list_zones()).await?;
        Ok(zones.into_iter().map(|zone| zone.record).collect())
    }

    async fn try_create(
        &self,
        user: &UserId,
        postal_code: &PostalCode,
        resolved: &mut Option<ZoneDescriptor>,
    ) -> Result<Outcome> {
        if let Some(found) = self
            .bounded("zone lookup", self.zones.find_zone_by_postal_code(postal_code))
            .await?
        {
            let Versioned { mut record, version } = found;
            if record.has_subscriber(user) {
                return Ok(Outcome::for_zone(
                    Status::AlreadySubscribed,
                    &record.zone_id,
                    format!("User {} is already subscribed to zone {}.", user, record.zone_id),
                ));
            }

            record.subscribers.insert(user.clone());
            self.bounded("zone write", self.zones.put_zone(&record, Some(&version)))
                .await?;
            tracing::info!("User {} added to zone {}", user, record.zone_id);
            return Ok(Outcome::for_zone(
                Status::Subscribed,
                &record.zone_id,
                format!("User {} subscribed to zone {}.", user, record.zone_id),
            ));
        }

        let descriptor = match resolved {
            Some(descriptor) => descriptor.clone(),
            None => {
                tracing::debug!("Postal code {} not mapped yet, resolving zone", postal_code);
                let descriptor = self
                    .bounded("geo resolution", self.geo.resolve(postal_code))
                    .await?;
                *resolved = Some(descriptor.clone());
                descriptor
            }
        };

        match self
            .bounded("zone lookup", self.zones.find_zone_by_id(&descriptor.zone_id))
            .await?
        {
            Some(Versioned { mut record, version }) => {
                record.postal_codes.insert(postal_code.clone());
                record.subscribers.insert(user.clone());
                self.bounded("zone write", self.zones.put_zone(&record, Some(&version)))
                    .await?;
                tracing::info!(
                    "Postal code {} joined existing zone {} for user {}",
                    postal_code,
                    record.zone_id,
                    user
                );
                Ok(Outcome::for_zone(
                    Status::Subscribed,
                    &record.zone_id,
                    format!(
                        "Postal code {} added to zone {}; user {} subscribed.",
                        postal_code, record.zone_id, user
                    ),
                ))
            }
            None => {
                let zone = Zone::new(descriptor, postal_code.clone(), user.clone());
                self.bounded("zone write", self.zones.put_zone(&zone, None))
                    .await?;
                tracing::info!(
                    "New zone {} ({}, {}) created for postal code {}",
                    zone.zone_id,
                    zone.name,
                    zone.state,
                    postal_code
                );
                Ok(Outcome::for_zone(
                    Status::Subscribed,
                    &zone.zone_id,
                    format!("Zone {} created; user {} subscribed.", zone.zone_id, user),
                ))
            }
        }
    }

    async fn try_remove(
        &self,
        user: &UserId,
        postal_code: &PostalCode,
        profile: &mut Option<Option<Profile>>,
    ) -> Result<Outcome> {
        let Some(Versioned { mut record, version }) = self
            .bounded("zone lookup", self.zones.find_zone_by_postal_code(postal_code))
            .await?
        else {
            return Ok(Outcome::without_zone(
                Status::NoZoneFound,
                format!("No zone found for postal code {} to remove user from.", postal_code),
            ));
        };

        if !record.has_subscriber(user) {
            return Ok(Outcome::for_zone(
                Status::NotSubscribed,
                &record.zone_id,
                format!("User {} is not subscribed to zone {}.", user, record.zone_id),
            ));
        }

        if record.postal_codes.len() > 1 {
            if profile.is_none() {
                let fetched = self
                    .bounded("profile lookup", self.profiles.get_profile(user))
                    .await?;
                *profile = Some(fetched);
            }

            if let Some(Some(loaded)) = profile.as_ref() {
                if loaded.watches_other_code_in(&record, postal_code) {
                    tracing::info!(
                        "User {} has other alerted postal codes in zone {}, keeping subscription",
                        user,
                        record.zone_id
                    );
                    return Ok(Outcome::for_zone(
                        Status::RetainedMultiLocation,
                        &record.zone_id,
                        "User has multiple postal codes active in this zone - keeping user associated with this zone.",
                    ));
                }
            }
        }

        record.subscribers.remove(user);
        self.bounded("zone write", self.zones.put_zone(&record, Some(&version)))
            .await?;
        tracing::info!("User {} removed from zone {}", user, record.zone_id);
        Ok(Outcome::for_zone(
            Status::Unsubscribed,
            &record.zone_id,
            format!("User {} unsubscribed from zone {}.", user, record.zone_id),
        ))
    }

    async fn bounded<T>(&self, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        match timeout(self.options.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ZoneError::UpstreamUnavailable {
                message: format!("{} timed out after {:?}", what, self.options.call_timeout),
            }),
        }
    }
}
