use crate::adapters::{decode_zone, record_stem};
use crate::core::{ProfileStore, ZoneStore};
use crate::domain::model::{Profile, UserId, Version, Versioned, Zone};
use crate::utils::error::{Result, ZoneError};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

/// S3 error codes that signal a throttled or degraded service.
const UNAVAILABLE_CODES: &[&str] = &[
    "SlowDown",
    "ServiceUnavailable",
    "InternalError",
    "RequestTimeout",
];

fn is_unavailable<E: ProvideErrorMetadata>(err: &SdkError<E, HttpResponse>) -> bool {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            status >= 500
                || status == 429
                || service
                    .err()
                    .code()
                    .is_some_and(|code| UNAVAILABLE_CODES.contains(&code))
        }
        _ => false,
    }
}

/// Maps an SDK failure; rejected preconditions become `WriteConflict` for `zone_id`.
fn classify<E>(err: SdkError<E, HttpResponse>, what: &str, zone_id: Option<&str>) -> ZoneError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if is_unavailable(&err) {
        return ZoneError::UpstreamUnavailable {
            message: format!("S3 {} failed: {}", what, DisplayErrorContext(&err)),
        };
    }

    let code = err.as_service_error().and_then(|e| e.code());
    match (code, zone_id) {
        (Some("PreconditionFailed") | Some("ConditionalRequestConflict"), Some(zone_id)) => {
            ZoneError::WriteConflict {
                zone_id: zone_id.to_string(),
            }
        }
        _ => ZoneError::StorageError {
            message: format!("S3 {} failed: {}", what, DisplayErrorContext(&err)),
        },
    }
}

fn prefixed(prefix: &str, collection: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/", collection)
    } else {
        format!("{}/{}/", prefix, collection)
    }
}

/// Zone records stored as JSON objects; the object ETag is the record version.
#[derive(Debug, Clone)]
pub struct S3ZoneStore {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3ZoneStore {
    pub fn new(client: S3Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    fn zones_prefix(&self) -> String {
        prefixed(&self.prefix, "zones")
    }

    fn zone_key(&self, zone_id: &str) -> String {
        format!("{}{}.json", self.zones_prefix(), record_stem(zone_id))
    }

    async fn get_zone_object(&self, key: &str) -> Result<Option<Versioned<Zone>>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    return Ok(None);
                }
                return Err(classify(err, "zone read", None));
            }
        };

        let etag = output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| ZoneError::StorageError {
                message: format!("S3 object {} has no ETag", key),
            })?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| ZoneError::UpstreamUnavailable {
                message: format!("Failed to collect S3 object {}: {}", key, e),
            })?
            .into_bytes();

        Ok(Some(Versioned {
            record: decode_zone(&data, key)?,
            version: Version::new(etag),
        }))
    }
}

impl ZoneStore for S3ZoneStore {
    async fn list_zones(&self) -> Result<Vec<Versioned<Zone>>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(self.zones_prefix())
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| classify(e, "zone listing", None))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .filter(|key| key.ends_with(".json"))
                    .map(str::to_string),
            );
        }

        let mut zones = Vec::with_capacity(keys.len());
        for key in keys {
            // Deleted between listing and read.
            if let Some(zone) = self.get_zone_object(&key).await? {
                zones.push(zone);
            }
        }
        Ok(zones)
    }

    async fn find_zone_by_id(&self, zone_id: &str) -> Result<Option<Versioned<Zone>>> {
        self.get_zone_object(&self.zone_key(zone_id)).await
    }

    async fn put_zone(&self, zone: &Zone, expected: Option<&Version>) -> Result<Version> {
        zone.ensure_persistable()?;

        let body = serde_json::to_vec(zone)?;
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.zone_key(&zone.zone_id))
            .content_type("application/json")
            .body(ByteStream::from(body));
        let request = match expected {
            Some(version) => request.if_match(version.as_str()),
            None => request.if_none_match("*"),
        };

        let output = request
            .send()
            .await
            .map_err(|e| classify(e, "zone write", Some(&zone.zone_id)))?;

        let etag = output.e_tag().ok_or_else(|| ZoneError::StorageError {
            message: format!("S3 write of zone {} returned no ETag", zone.zone_id),
        })?;
        tracing::debug!("Zone {} written to s3://{} ({})", zone.zone_id, self.bucket, etag);
        Ok(Version::new(etag))
    }
}

#[derive(Debug, Clone)]
pub struct S3ProfileStore {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3ProfileStore {
    pub fn new(client: S3Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }
}

impl ProfileStore for S3ProfileStore {
    async fn get_profile(&self, user: &UserId) -> Result<Option<Profile>> {
        let key = format!(
            "{}{}.json",
            prefixed(&self.prefix, "profiles"),
            record_stem(user.as_str())
        );

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    return Ok(None);
                }
                return Err(classify(err, "profile read", None));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| ZoneError::UpstreamUnavailable {
                message: format!("Failed to collect S3 object {}: {}", key, e),
            })?
            .into_bytes();

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| ZoneError::StorageError {
                message: format!("corrupt profile {}: {}", key, e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::get_object::GetObjectError;
    use aws_sdk_s3::operation::put_object::PutObjectError;
    use aws_sdk_s3::primitives::SdkBody;

    fn response(status: u16) -> HttpResponse {
        HttpResponse::new(status.try_into().unwrap(), SdkBody::empty())
    }

    fn get_failure(status: u16, code: &str) -> SdkError<GetObjectError, HttpResponse> {
        SdkError::service_error(
            GetObjectError::generic(ErrorMetadata::builder().code(code).build()),
            response(status),
        )
    }

    fn put_failure(status: u16, code: &str) -> SdkError<PutObjectError, HttpResponse> {
        SdkError::service_error(
            PutObjectError::generic(ErrorMetadata::builder().code(code).build()),
            response(status),
        )
    }

    #[test]
    fn test_prefixed_keys() {
        assert_eq!(prefixed("safe", "zones"), "safe/zones/");
        assert_eq!(prefixed("/safe/", "profiles"), "safe/profiles/");
        assert_eq!(prefixed("", "zones"), "zones/");
    }

    #[test]
    fn test_degraded_service_is_upstream_unavailable() {
        for (status, code) in [
            (503, "SlowDown"),
            (503, "ServiceUnavailable"),
            (500, "InternalError"),
            (429, "TooManyRequests"),
            (400, "RequestTimeout"),
        ] {
            let err = classify(get_failure(status, code), "zone read", None);
            assert!(
                matches!(err, ZoneError::UpstreamUnavailable { .. }),
                "{} {} mapped to {:?}",
                status,
                code,
                err
            );
        }

        let timeout: SdkError<GetObjectError, HttpResponse> =
            SdkError::timeout_error("operation timed out");
        assert!(matches!(
            classify(timeout, "zone read", None),
            ZoneError::UpstreamUnavailable { .. }
        ));

        let truncated: SdkError<GetObjectError, HttpResponse> =
            SdkError::response_error("connection reset mid-body", response(200));
        assert!(matches!(
            classify(truncated, "zone read", None),
            ZoneError::UpstreamUnavailable { .. }
        ));
    }

    #[test]
    fn test_rejected_preconditions_are_write_conflicts() {
        let err = classify(put_failure(412, "PreconditionFailed"), "zone write", Some("OHC049"));
        assert!(matches!(err, ZoneError::WriteConflict { ref zone_id } if zone_id == "OHC049"));

        let err = classify(
            put_failure(409, "ConditionalRequestConflict"),
            "zone write",
            Some("OHC049"),
        );
        assert!(matches!(err, ZoneError::WriteConflict { .. }));
    }

    #[test]
    fn test_client_errors_are_storage_errors() {
        let err = classify(get_failure(403, "AccessDenied"), "zone read", None);
        assert!(matches!(err, ZoneError::StorageError { .. }));

        // Preconditions only matter for writes.
        let err = classify(get_failure(412, "PreconditionFailed"), "zone read", None);
        assert_eq!(err.status(), crate::domain::model::Status::StorageError);
    }
}
