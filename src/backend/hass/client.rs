use std::time::Duration;

use futures::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use url::Url;

use crate::config::HassConfig;
use crate::error::{ApiError, ApiResult};
use crate::model::hass::HassState;

#[derive(Clone, Debug)]
pub struct HassStateChangedEvent {
    pub entity_id: String,
    pub new_state: Option<HassState>,
}

#[derive(Debug, Deserialize)]
struct HassWsEventEnvelope {
    #[serde(default)]
    pub event_type: String,
    pub data: HassWsEventData,
}

#[derive(Debug, Deserialize)]
struct HassWsEventData {
    pub entity_id: String,
    pub new_state: Option<HassState>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum HassWsIncoming {
    #[serde(rename = "auth_required")]
    AuthRequired,
    #[serde(rename = "auth_ok")]
    AuthOk,
    #[serde(rename = "auth_invalid")]
    AuthInvalid,
    #[serde(rename = "result")]
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        error: Option<Value>,
    },
    #[serde(rename = "event")]
    Event { event: HassWsEventEnvelope },
    #[serde(other)]
    Other,
}

/// An authenticated websocket subscribed to `state_changed` events.
pub struct HassWs {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl HassWs {
    async fn recv_json(&mut self) -> ApiResult<Option<HassWsIncoming>> {
        let Some(msg) = self.socket.next().await else {
            return Ok(None);
        };
        let msg = msg.map_err(ApiError::from)?;
        let Message::Text(text) = msg else {
            return Ok(Some(HassWsIncoming::Other));
        };
        Ok(Some(serde_json::from_str::<HassWsIncoming>(&text)?))
    }

    /// Next `state_changed` event, or `None` when the socket closes.
    pub async fn next_state_changed(&mut self) -> ApiResult<Option<HassStateChangedEvent>> {
        while let Some(msg) = self.recv_json().await? {
            if let HassWsIncoming::Event { event } = msg {
                if event.event_type == "state_changed" {
                    return Ok(Some(HassStateChangedEvent {
                        entity_id: event.data.entity_id,
                        new_state: event.data.new_state,
                    }));
                }
            }
        }
        Ok(None)
    }
}

pub struct HassClient {
    base_url: Url,
    http: reqwest::Client,
    token: Option<String>,
}

impl HassClient {
    const DEFAULT_TOKEN_ENV: &'static str = "HASS_TOKEN";
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(config: &HassConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base_url: config.url.clone(),
            http,
            token: None,
        })
    }

    pub fn load_token_from_env(&mut self, config: &HassConfig) -> ApiResult<()> {
        let token_env = config.token_env.as_deref().unwrap_or(Self::DEFAULT_TOKEN_ENV);
        let token = std::env::var(token_env).map_err(|_| {
            ApiError::service_error(format!(
                "Missing Home Assistant token env var {token_env}"
            ))
        })?;
        if token.trim().is_empty() {
            return Err(ApiError::service_error(format!(
                "Empty Home Assistant token in env var {token_env}"
            )));
        }
        self.token = Some(token);
        Ok(())
    }

    fn endpoint_url(&self, endpoint: &str) -> ApiResult<Url> {
        let base = if self.base_url.path().is_empty() {
            format!("{}/", self.base_url)
        } else {
            self.base_url.to_string()
        };
        let base = Url::parse(&base)?;
        Ok(base.join(endpoint.trim_start_matches('/'))?)
    }

    fn token(&self) -> ApiResult<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| ApiError::service_error("Home Assistant token not initialized"))
    }

    async fn check_status(
        response: reqwest::Response,
        action: &str,
    ) -> ApiResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let details = if body.is_empty() {
            format!("{status}")
        } else {
            format!("{status}: {body}")
        };

        let err = if status == StatusCode::UNAUTHORIZED {
            format!("Home Assistant unauthorized during {action}. Verify HASS_TOKEN")
        } else {
            format!("Home Assistant error during {action}: {details}")
        };

        Err(ApiError::service_error(err))
    }

    /// Read one entity's current state. A 404 maps to `EntityNotFound`.
    pub async fn get_state(&self, entity_id: &str) -> ApiResult<HassState> {
        let url = self.endpoint_url(&format!("/api/states/{entity_id}"))?;
        let response = self.http.get(url).bearer_auth(self.token()?).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::EntityNotFound(entity_id.to_string()));
        }

        let response =
            Self::check_status(response, &format!("GET /api/states/{entity_id}")).await?;
        Ok(response.json().await?)
    }

    fn ws_endpoint_url(&self) -> ApiResult<Url> {
        let mut url = self.endpoint_url("/api/websocket")?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|()| {
            ApiError::service_error("Failed to convert HA url scheme for websocket")
        })?;
        Ok(url)
    }

    pub async fn subscribe_state_changed(&self) -> ApiResult<HassWs> {
        let ws_url = self.ws_endpoint_url()?;
        let (mut socket, _response) = connect_async(ws_url.as_str()).await?;

        // Consume initial auth challenge.
        let _ = socket.next().await;

        let auth = serde_json::json!({
            "type": "auth",
            "access_token": self.token()?,
        });
        socket.send(Message::Text(auth.to_string().into())).await?;

        // Wait for auth_ok.
        loop {
            let Some(msg) = socket.next().await else {
                return Err(ApiError::service_error(
                    "Home Assistant websocket closed during auth",
                ));
            };
            let msg = msg.map_err(ApiError::from)?;
            if let Message::Text(text) = msg {
                let value: HassWsIncoming = serde_json::from_str(&text)?;
                match value {
                    HassWsIncoming::AuthOk => break,
                    HassWsIncoming::AuthInvalid => {
                        return Err(ApiError::service_error(
                            "Home Assistant websocket auth failed (check token)",
                        ));
                    }
                    _ => {}
                }
            }
        }

        // Subscribe to state_changed events.
        let sub = serde_json::json!({
            "id": 1,
            "type": "subscribe_events",
            "event_type": "state_changed",
        });
        socket.send(Message::Text(sub.to_string().into())).await?;

        // Wait for subscribe result.
        loop {
            let Some(msg) = socket.next().await else {
                return Err(ApiError::service_error(
                    "Home Assistant websocket closed during subscribe",
                ));
            };
            let msg = msg.map_err(ApiError::from)?;
            if let Message::Text(text) = msg {
                let value: HassWsIncoming = serde_json::from_str(&text)?;
                if let HassWsIncoming::Result { id, success, error } = value {
                    if id == 1 && success {
                        break;
                    }
                    if id == 1 && !success {
                        return Err(ApiError::service_error(format!(
                            "Home Assistant subscribe_events failed: {}",
                            error.unwrap_or(Value::Null)
                        )));
                    }
                }
            }
        }

        Ok(HassWs { socket })
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::config::HassConfig;
    use crate::error::ApiError;

    use super::HassClient;

    /// Answer a single HTTP request with a canned response.
    async fn serve_once(listener: TcpListener, response: String) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await.unwrap();
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    fn client_for(port: u16) -> HassClient {
        let config = HassConfig {
            url: format!("http://127.0.0.1:{port}").parse().unwrap(),
            token_env: None,
            sensor_entity: "sensor.circadian_values".to_string(),
        };
        let mut client = HassClient::new(&config).unwrap();
        client.token = Some("test-token".to_string());
        client
    }

    #[tokio::test]
    async fn missing_entity_maps_to_not_found() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(
            listener,
            "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                .to_string(),
        ));

        let client = client_for(port);
        let err = client.get_state("sensor.does_not_exist").await.unwrap_err();
        assert!(matches!(err, ApiError::EntityNotFound(id) if id == "sensor.does_not_exist"));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn entity_state_is_decoded() {
        let body = r#"{"entity_id": "sensor.circadian_values", "state": "100", "attributes": {"colortemp": 4000, "xy_color": [0.4573, 0.41]}}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(listener, response));

        let client = client_for(port);
        let state = client.get_state("sensor.circadian_values").await.unwrap();
        assert_eq!(state.entity_id, "sensor.circadian_values");
        assert_eq!(
            state.attributes.get("colortemp").and_then(|v| v.as_f64()),
            Some(4000.0)
        );

        server.await.unwrap();
    }
}
