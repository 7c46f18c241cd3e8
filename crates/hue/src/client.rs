use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Map, Value};
use url::Url;

use crate::api::{ApiLight, ApiLightStateUpdate, ApiScene, HueApiResult};
use crate::error::{HueClientError, HueResult};

/// Async client for the Hue bridge's local v1 REST API.
///
/// The bridge reports most failures as error envelopes inside an HTTP 200
/// response, so every response body is scanned for v1 error entries in
/// addition to the usual status check.
pub struct BridgeClient {
    host: String,
    base_url: Url,
    http: reqwest::Client,
}

impl BridgeClient {
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(host: &str, api_key: &str) -> HueResult<Self> {
        if api_key.trim().is_empty() {
            return Err(HueClientError::EmptyApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            host: host.to_string(),
            base_url: Url::parse(&format!("http://{host}/api/{api_key}/"))?,
            http,
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn endpoint_url(&self, endpoint: &str) -> HueResult<Url> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }

    async fn check_status(
        response: reqwest::Response,
        action: &str,
    ) -> HueResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if body.is_empty() {
            log::debug!("Bridge returned {status} during {action}");
        } else {
            log::debug!("Bridge returned {status} during {action}: {body}");
        }

        Err(HueClientError::UnexpectedStatus {
            status,
            action: action.to_string(),
        })
    }

    /// Scan a response body for v1 error entries ([{"error": {..}}, ..]).
    fn check_api_errors(value: &Value) -> HueResult<()> {
        let Some(entries) = value.as_array() else {
            return Ok(());
        };

        for entry in entries {
            if entry.get("error").is_none() {
                continue;
            }
            let HueApiResult::Error(err) =
                serde_json::from_value::<HueApiResult<Value>>(entry.clone())?
            else {
                continue;
            };
            if err.is_unauthorized() {
                return Err(HueClientError::Unauthorized(err.description));
            }
            if err.is_bridge_busy() {
                return Err(HueClientError::BridgeBusy(err.description));
            }
            return Err(HueClientError::Api(err));
        }

        Ok(())
    }

    async fn get_json(&self, endpoint: &str, action: &str) -> HueResult<Value> {
        let url = self.endpoint_url(endpoint)?;
        let response = self.http.get(url).send().await?;
        let response = Self::check_status(response, action).await?;
        let value: Value = response.json().await?;
        Self::check_api_errors(&value)?;
        Ok(value)
    }

    /// Read the bridge config object. Used as a reachability probe: a
    /// reachable bridge always returns a non-empty object here, even for an
    /// unknown API key.
    pub async fn get_config(&self) -> HueResult<Map<String, Value>> {
        let value = self.get_json("config", "GET /config").await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_scenes(&self) -> HueResult<HashMap<String, ApiScene>> {
        let value = self.get_json("scenes", "GET /scenes").await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_scene(&self, scene_id: &str) -> HueResult<ApiScene> {
        let value = self
            .get_json(&format!("scenes/{scene_id}"), "GET /scenes/{id}")
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_light(&self, light_id: &str) -> HueResult<ApiLight> {
        let value = self
            .get_json(&format!("lights/{light_id}"), "GET /lights/{id}")
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn set_scene_lightstate(
        &self,
        scene_id: &str,
        light_id: &str,
        upd: &ApiLightStateUpdate,
    ) -> HueResult<()> {
        let url = self.endpoint_url(&format!("scenes/{scene_id}/lightstates/{light_id}"))?;
        let response = self.http.put(url).json(upd).send().await?;
        let response =
            Self::check_status(response, "PUT /scenes/{id}/lightstates/{light}").await?;
        let value: Value = response.json().await?;
        Self::check_api_errors(&value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::BridgeClient;
    use crate::error::HueClientError;

    #[test]
    fn empty_api_key_rejected() {
        assert!(matches!(
            BridgeClient::new("192.168.1.10", "  "),
            Err(HueClientError::EmptyApiKey)
        ));
    }

    #[test]
    fn endpoint_urls_are_key_scoped() {
        let client = BridgeClient::new("192.168.1.10", "s3cret").unwrap();
        let url = client.endpoint_url("scenes/abc/lightstates/4").unwrap();
        assert_eq!(
            url.as_str(),
            "http://192.168.1.10/api/s3cret/scenes/abc/lightstates/4"
        );
    }

    #[test]
    fn error_envelope_maps_to_variants() {
        let unauthorized = json!([
            {"error": {"type": 1, "address": "/", "description": "unauthorized user"}}
        ]);
        assert!(matches!(
            BridgeClient::check_api_errors(&unauthorized),
            Err(HueClientError::Unauthorized(_))
        ));

        let busy = json!([
            {"error": {"type": 901, "address": "/", "description": "bridge busy"}}
        ]);
        assert!(matches!(
            BridgeClient::check_api_errors(&busy),
            Err(HueClientError::BridgeBusy(_))
        ));

        let success = json!([
            {"success": {"/scenes/abc/lightstates/4/on": true}}
        ]);
        assert!(BridgeClient::check_api_errors(&success).is_ok());

        // non-array bodies (eg. the config object) carry no error envelope
        assert!(BridgeClient::check_api_errors(&json!({"name": "hue"})).is_ok());
    }
}
