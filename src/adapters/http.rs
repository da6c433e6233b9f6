use crate::core::{ConfigProvider, GeoResolver};
use crate::domain::model::{PostalCode, ZoneDescriptor};
use crate::utils::error::{Result, ZoneError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct ZonesResponse {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    name: Option<String>,
    state: Option<String>,
}

/// Postal code -> coordinates (geocode API) -> forecast zones (zone API).
#[derive(Debug, Clone)]
pub struct HttpGeoResolver {
    client: Client,
    geocode_endpoint: String,
    geocode_api_key: Option<String>,
    zones_endpoint: String,
}

impl HttpGeoResolver {
    pub fn new(
        geocode_endpoint: impl Into<String>,
        geocode_api_key: Option<String>,
        zones_endpoint: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ZoneError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            geocode_endpoint: geocode_endpoint.into(),
            geocode_api_key,
            zones_endpoint: zones_endpoint.into(),
        })
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        Self::new(
            config.geocode_endpoint(),
            config.geocode_api_key().map(str::to_string),
            config.zones_endpoint(),
            config.user_agent(),
            config.request_timeout(),
        )
    }

    async fn coordinates(&self, postal_code: &PostalCode) -> Result<(f64, f64)> {
        let mut params = vec![("components", format!("postal_code:{}", postal_code))];
        if let Some(key) = &self.geocode_api_key {
            params.push(("key", key.clone()));
        }
        let url = endpoint_url(&self.geocode_endpoint, &params)?;

        let geocode: GeocodeResponse = self.get_json(url, "geocode").await?;
        let location = geocode
            .results
            .first()
            .map(|result| &result.geometry.location)
            .ok_or_else(|| ZoneError::GeoLookupFailed {
                message: format!(
                    "no geocode result for {} (status {})",
                    postal_code,
                    geocode.status.as_deref().unwrap_or("unknown")
                ),
            })?;

        tracing::debug!(
            "Postal code {} located at {}, {}",
            postal_code,
            location.lat,
            location.lng
        );
        Ok((location.lat, location.lng))
    }

    async fn zone_at(&self, lat: f64, lng: f64) -> Result<ZoneDescriptor> {
        let point = format!("{:.4},{:.4}", lat, lng);
        let url = endpoint_url(&self.zones_endpoint, &[("point", point.clone())])?;
        let zones: ZonesResponse = self.get_json(url, "zone").await?;

        let mut county = None;
        let mut public_zone_id = String::new();
        let mut fire_zone_id = String::new();
        for feature in zones.features {
            let properties = feature.properties;
            match properties.kind.as_str() {
                "county" => county = Some(properties),
                "public" => public_zone_id = properties.id,
                "fire" => fire_zone_id = properties.id,
                _ => {}
            }
        }

        let county = county.ok_or_else(|| ZoneError::GeoLookupFailed {
            message: format!("no county zone found at {}", point),
        })?;
        let missing = |field: &str| ZoneError::GeoLookupFailed {
            message: format!("county zone {} has no {}", county.id, field),
        };
        let name = county.name.clone().ok_or_else(|| missing("name"))?;
        let state = county.state.clone().ok_or_else(|| missing("state"))?;

        Ok(ZoneDescriptor {
            zone_id: county.id,
            public_zone_id,
            fire_zone_id,
            name,
            state,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(what, e))?;

        let status = response.status();
        tracing::debug!("{} API response status: {}", what, status);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ZoneError::UpstreamUnavailable {
                message: format!("{} API returned {}", what, status),
            });
        }
        if !status.is_success() {
            return Err(ZoneError::GeoLookupFailed {
                message: format!("{} API returned {}", what, status),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(what, e))?;
        serde_json::from_str(&body).map_err(|e| ZoneError::GeoLookupFailed {
            message: format!("unexpected {} API payload: {}", what, e),
        })
    }
}

fn endpoint_url(endpoint: &str, params: &[(&str, String)]) -> Result<Url> {
    Url::parse_with_params(endpoint, params).map_err(|e| ZoneError::InvalidConfigValueError {
        field: "endpoint".to_string(),
        value: endpoint.to_string(),
        reason: format!("Invalid URL format: {}", e),
    })
}

fn transport_error(what: &str, e: reqwest::Error) -> ZoneError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        ZoneError::UpstreamUnavailable {
            message: format!("{} API unreachable: {}", what, e),
        }
    } else {
        ZoneError::GeoLookupFailed {
            message: format!("{} API call failed: {}", what, e),
        }
    }
}

#[async_trait]
impl GeoResolver for HttpGeoResolver {
    async fn resolve(&self, postal_code: &PostalCode) -> Result<ZoneDescriptor> {
        let (lat, lng) = self.coordinates(postal_code).await?;
        let descriptor = self.zone_at(lat, lng).await?;
        tracing::info!(
            "Postal code {} resolved to zone {} (public {}, fire {})",
            postal_code,
            descriptor.zone_id,
            descriptor.public_zone_id,
            descriptor.fire_zone_id
        );
        Ok(descriptor)
    }
}
