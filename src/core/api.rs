use crate::core::directory::SubscriptionDirectory;
use crate::core::{CommandRequest, CommandResponse, GeoResolver, ProfileStore, Status, ZoneStore};
use crate::utils::error::{Result, ZoneError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Load balancer / API gateway event carrying the command in its query string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayRequest {
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

impl ApiGatewayRequest {
    pub fn from_query<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            query_string_parameters: Some(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn command_request(&self) -> Result<CommandRequest> {
        let params = self
            .query_string_parameters
            .as_ref()
            .ok_or_else(|| ZoneError::InvalidRequest {
                message: "missing query string parameters".to_string(),
            })?;

        let param = |name: &str| {
            params
                .get(name)
                .cloned()
                .ok_or_else(|| ZoneError::InvalidRequest {
                    message: format!("missing query parameter '{}'", name),
                })
        };

        Ok(CommandRequest {
            command: param("command")?,
            user: param("user")?,
            postal_code: param("zip")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiGatewayResponse {
    pub fn from_command(response: &CommandResponse) -> Self {
        let body = serde_json::to_string(response).unwrap_or_else(|e| {
            tracing::error!("Failed to encode response body: {}", e);
            response.message.clone()
        });

        Self {
            status_code: http_status(response.status),
            headers: BTreeMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
            ]),
            body,
        }
    }
}

pub fn http_status(status: Status) -> u16 {
    match status {
        Status::InvalidPostalCode | Status::InvalidRequest => 400,
        Status::GeoLookupFailed => 422,
        Status::StorageError => 500,
        Status::UpstreamUnavailable => 503,
        _ => 200,
    }
}

pub async fn handle_api_event<Z, P, G>(
    directory: &SubscriptionDirectory<Z, P, G>,
    event: &ApiGatewayRequest,
) -> ApiGatewayResponse
where
    Z: ZoneStore,
    P: ProfileStore,
    G: GeoResolver,
{
    let response = match event.command_request() {
        Ok(request) => directory.handle_request(&request).await,
        Err(e) => {
            tracing::warn!("Rejected gateway event: {}", e);
            CommandResponse::from(Err(e))
        }
    };
    ApiGatewayResponse::from_command(&response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parameters_decode() {
        let event: ApiGatewayRequest = serde_json::from_value(serde_json::json!({
            "queryStringParameters": {"command": "create", "user": "u1", "zip": "43215-1234"},
            "httpMethod": "GET"
        }))
        .unwrap();

        let request = event.command_request().unwrap();
        assert_eq!(request.command, "create");
        assert_eq!(request.user, "u1");
        assert_eq!(request.postal_code, "43215-1234");
    }

    #[test]
    fn test_missing_parameter_is_invalid_request() {
        let event = ApiGatewayRequest::from_query([("command", "create"), ("user", "u1")]);
        let err = event.command_request().unwrap_err();
        assert_eq!(err.status(), Status::InvalidRequest);

        let empty = ApiGatewayRequest::default();
        assert!(empty.command_request().is_err());
    }

    #[test]
    fn test_response_encoding() {
        let response = CommandResponse {
            status: Status::RetainedMultiLocation,
            message: "kept".to_string(),
            zone_id: Some("OHC049".to_string()),
        };
        let encoded = ApiGatewayResponse::from_command(&response);
        assert_eq!(encoded.status_code, 200);
        assert_eq!(encoded.headers["Access-Control-Allow-Origin"], "*");

        let body: serde_json::Value = serde_json::from_str(&encoded.body).unwrap();
        assert_eq!(body["status"], "RetainedMultiLocation");
        assert_eq!(body["zoneId"], "OHC049");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(http_status(Status::NoZoneFound), 200);
        assert_eq!(http_status(Status::InvalidPostalCode), 400);
        assert_eq!(http_status(Status::GeoLookupFailed), 422);
        assert_eq!(http_status(Status::UpstreamUnavailable), 503);
    }
}
