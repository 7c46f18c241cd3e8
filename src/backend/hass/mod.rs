mod client;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{Duration, MissedTickBehavior, interval, sleep};

use hue::BridgeClient;
use hue::HueClientError;

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::model::hass::{HassState, SensorReading};
use crate::registry;
use crate::service::Service;
use crate::sync::SceneSynchronizer;

use self::client::{HassClient, HassWs};

/// Fixed-interval reachability probe. Returns `Ok(true)` on the first
/// successful check, `Ok(false)` once all attempts are exhausted. Errors
/// that can never succeed on retry (bad API key, bridge busy) abort the
/// probe early.
async fn probe<F, Fut>(attempts: u32, delay: Duration, mut check: F) -> ApiResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<bool>>,
{
    for attempt in 1..=attempts {
        match check().await {
            Ok(true) => return Ok(true),
            Ok(false) => {
                log::debug!("Probe attempt {attempt}/{attempts}: empty response");
            }
            Err(
                err @ ApiError::Hue(
                    HueClientError::Unauthorized(_) | HueClientError::BridgeBusy(_),
                ),
            ) => return Err(err),
            Err(err) => {
                log::debug!("Probe attempt {attempt}/{attempts} failed: {err}");
            }
        }
        if attempt < attempts {
            sleep(delay).await;
        }
    }
    Ok(false)
}

/// Listens for state changes on the circadian sensor and pushes readings
/// into the Hue scenes.
pub struct CircadianBackend {
    config: Arc<AppConfig>,
    client: HassClient,
    synchronizer: SceneSynchronizer,
    bridges: Vec<BridgeClient>,
    ws: Option<HassWs>,
}

impl CircadianBackend {
    pub fn new(config: Arc<AppConfig>) -> ApiResult<Self> {
        Ok(Self {
            client: HassClient::new(&config.hass)?,
            synchronizer: SceneSynchronizer::new(
                config.hue.keyword.clone(),
                config.sync.max_in_flight,
            ),
            config,
            bridges: vec![],
            ws: None,
        })
    }

    /// Locate all configured bridges and keep the ones that answer the
    /// reachability probe.
    async fn setup_bridges(&mut self) -> ApiResult<()> {
        let entries = registry::load_bridges(&self.config.hue.config_entries)?;
        let attempts = self.config.probe.attempts;
        let delay = Duration::from_secs(self.config.probe.delay_secs);

        let mut bridges = vec![];
        for entry in entries {
            let bridge = match BridgeClient::new(&entry.host, &entry.api_key) {
                Ok(bridge) => bridge,
                Err(err) => {
                    log::error!("[{}] Invalid bridge entry: {err}", entry.host);
                    continue;
                }
            };

            let bridge_ref = &bridge;
            let reachable = probe(attempts, delay, move || async move {
                Ok(!bridge_ref.get_config().await?.is_empty())
            })
            .await;

            match reachable {
                Ok(true) => {
                    log::info!("[{}] Bridge is reachable", entry.host);
                    bridges.push(bridge);
                }
                Ok(false) => {
                    log::error!(
                        "[{}] Bridge unreachable after {attempts} attempts",
                        entry.host
                    );
                }
                Err(err) => {
                    log::error!("[{}] Bridge setup failed: {err}", entry.host);
                }
            }
        }

        if bridges.is_empty() {
            return Err(ApiError::service_error(
                "No reachable Hue bridges, cannot continue",
            ));
        }

        self.bridges = bridges;
        Ok(())
    }

    /// Derive a reading from the new sensor state and run a full pass.
    /// Failures are logged; the event loop keeps running.
    async fn handle_state(&self, state: &HassState) {
        let reading = match SensorReading::from_state(state) {
            Ok(reading) => reading,
            Err(err) => {
                log::error!("Sensor state rejected: {err}");
                return;
            }
        };

        if let Err(err) = self.synchronizer.sync_all(&self.bridges, &reading).await {
            log::error!("Scene synchronization failed: {err}");
        }
    }

    async fn initial_sync(&self) {
        let entity_id = &self.config.hass.sensor_entity;
        match self.client.get_state(entity_id).await {
            Ok(state) => self.handle_state(&state).await,
            Err(ApiError::EntityNotFound(id)) => {
                log::warn!("Sensor entity {id} not found, waiting for first state change");
            }
            Err(err) => {
                log::error!("Could not read sensor state {entity_id}: {err}");
            }
        }
    }

    async fn ensure_ws_connected(&mut self) {
        if self.ws.is_some() {
            return;
        }

        match self.client.subscribe_state_changed().await {
            Ok(ws) => {
                log::info!(
                    "Listening for state changes on {}",
                    self.config.hass.sensor_entity
                );
                self.ws = Some(ws);
            }
            Err(err) => {
                log::debug!("WS connect failed: {err}");
            }
        }
    }

    async fn event_loop(&mut self) -> ApiResult<()> {
        let mut ws_tick = interval(Duration::from_secs(10));
        ws_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if let Some(ws) = &mut self.ws {
                tokio::select! {
                    _ = ws_tick.tick() => {}
                    ev = ws.next_state_changed() => {
                        match ev {
                            Ok(Some(ev)) => {
                                if ev.entity_id == self.config.hass.sensor_entity {
                                    if let Some(new_state) = ev.new_state {
                                        self.handle_state(&new_state).await;
                                    }
                                }
                            }
                            Ok(None) => {
                                // websocket closed, reconnect later
                                log::warn!("Home Assistant websocket closed");
                                self.ws = None;
                            }
                            Err(err) => {
                                log::debug!("WS error: {err}");
                                self.ws = None;
                            }
                        }
                    }
                }
            } else {
                ws_tick.tick().await;
                self.ensure_ws_connected().await;
            }
        }
    }
}

#[async_trait]
impl Service for CircadianBackend {
    async fn start(&mut self) -> ApiResult<()> {
        self.client.load_token_from_env(&self.config.hass)?;
        self.setup_bridges().await?;
        log::info!(
            "Circadian backend ready ({} bridges, keyword {:?})",
            self.bridges.len(),
            self.config.hue.keyword
        );
        Ok(())
    }

    async fn run(&mut self) -> ApiResult<()> {
        self.ensure_ws_connected().await;
        self.initial_sync().await;
        self.event_loop().await
    }

    async fn stop(&mut self) -> ApiResult<()> {
        self.ws = None;
        self.bridges.clear();
        Ok(())
    }
}
