//! Scene synchronizer: pushes a sensor reading into every matching scene's
//! per-light lightstates.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio::sync::Semaphore;

use hue::BridgeClient;
use hue::api::{ApiLightStateUpdate, ApiScene};

use crate::error::{ApiError, ApiResult};
use crate::model::hass::SensorReading;

pub struct SceneSynchronizer {
    keyword: String,
    max_in_flight: usize,
}

/// Select the ids of all scenes whose name contains the keyword.
/// Sorted, so update order is stable between passes.
fn matching_scenes(scenes: &HashMap<String, ApiScene>, keyword: &str) -> Vec<String> {
    let mut ids = scenes
        .iter()
        .filter(|(_, scene)| scene.name.contains(keyword))
        .map(|(id, _)| id.clone())
        .collect::<Vec<_>>();
    ids.sort();
    ids
}

impl SceneSynchronizer {
    #[must_use]
    pub fn new(keyword: impl Into<String>, max_in_flight: usize) -> Self {
        Self {
            keyword: keyword.into(),
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Update one (scene, light) pair. A non-success HTTP status is logged
    /// and skipped; transport and decoding errors abort the whole pass.
    async fn apply_lightstate(
        bridge: &BridgeClient,
        scene_id: &str,
        light_id: &str,
        upd: &ApiLightStateUpdate,
    ) -> ApiResult<()> {
        let mut upd = upd.clone();

        match bridge.get_light(light_id).await {
            Ok(light) => {
                if !light.supports_color_temperature() {
                    upd.ct = None;
                }
                if !light.supports_color() {
                    upd.xy = None;
                }
                if !light.state.reachable {
                    log::debug!(
                        "[{}] Light {light_id} ({}) is unreachable, updating scene anyway",
                        bridge.host(),
                        light.name
                    );
                }
            }
            Err(err) if err.is_status_error() => {
                log::warn!(
                    "[{}] Skipping light {light_id} in scene {scene_id}: {err}",
                    bridge.host()
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        match bridge.set_scene_lightstate(scene_id, light_id, &upd).await {
            Ok(()) => {
                log::debug!(
                    "[{}] Updated scene {scene_id} lightstate for light {light_id}",
                    bridge.host()
                );
                Ok(())
            }
            Err(err) if err.is_status_error() => {
                log::warn!(
                    "[{}] Lightstate update failed for scene {scene_id} light {light_id}: {err}",
                    bridge.host()
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Push the reading into all matching scenes on one bridge.
    ///
    /// Lightstate updates are dispatched concurrently, bounded by
    /// `max_in_flight`, and awaited jointly; the first hard error aborts
    /// the batch.
    pub async fn sync_bridge(
        &self,
        bridge: &BridgeClient,
        reading: &SensorReading,
    ) -> ApiResult<()> {
        let scenes = bridge.get_scenes().await?;
        let matched = matching_scenes(&scenes, &self.keyword);

        if matched.is_empty() {
            log::debug!(
                "[{}] No scenes matching keyword {:?}",
                bridge.host(),
                self.keyword
            );
            return Ok(());
        }

        let mut updates = vec![];
        for scene_id in &matched {
            let scene = bridge.get_scene(scene_id).await?;
            log::debug!(
                "[{}] Scene {scene_id} ({}) has {} member lights",
                bridge.host(),
                scene.name,
                scene.lights.len()
            );
            for light_id in scene.lights {
                updates.push((scene_id.clone(), light_id));
            }
        }

        let upd = reading.lightstate();
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));

        let tasks = updates.iter().map(|(scene_id, light_id)| {
            let semaphore = Arc::clone(&semaphore);
            let upd = &upd;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| ApiError::service_error("update semaphore closed"))?;
                Self::apply_lightstate(bridge, scene_id, light_id, upd).await
            }
        });

        try_join_all(tasks).await?;

        log::info!(
            "[{}] Synchronized {} scenes (bri {}, ct {} mired)",
            bridge.host(),
            matched.len(),
            reading.brightness,
            reading.mirek
        );

        Ok(())
    }

    /// One full pass: bridges are walked sequentially, scene updates within
    /// a bridge run concurrently.
    pub async fn sync_all(
        &self,
        bridges: &[BridgeClient],
        reading: &SensorReading,
    ) -> ApiResult<()> {
        for bridge in bridges {
            self.sync_bridge(bridge, reading).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use hue::api::ApiScene;

    use super::matching_scenes;

    fn scenes(names: &[(&str, &str)]) -> HashMap<String, ApiScene> {
        names
            .iter()
            .map(|(id, name)| {
                let scene = serde_json::from_value(json!({
                    "name": name,
                    "type": "LightScene",
                    "lights": ["1"],
                }))
                .unwrap();
                ((*id).to_string(), scene)
            })
            .collect()
    }

    #[test]
    fn keyword_filter_selects_circadian_scenes() {
        let scenes = scenes(&[
            ("abc", "Circadian Evening"),
            ("def", "Reading"),
            ("ghi", "Circadian Morning"),
        ]);

        assert_eq!(matching_scenes(&scenes, "Circadian"), vec!["abc", "ghi"]);
    }

    #[test]
    fn keyword_match_is_case_sensitive() {
        let scenes = scenes(&[("abc", "circadian evening")]);
        assert!(matching_scenes(&scenes, "Circadian").is_empty());
    }

    #[test]
    fn empty_keyword_matches_everything() {
        let scenes = scenes(&[("abc", "Relax"), ("def", "Energize")]);
        assert_eq!(matching_scenes(&scenes, "").len(), 2);
    }
}
