use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hue v1 error codes we need to tell apart. The bridge reports these inside
/// an otherwise successful (HTTP 200) response body.
pub const ERROR_UNAUTHORIZED: u32 = 1;
pub const ERROR_BRIDGE_BUSY: u32 = 901;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HueError {
    #[serde(rename = "type")]
    pub typ: u32,
    pub address: String,
    pub description: String,
}

impl HueError {
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.typ == ERROR_UNAUTHORIZED
    }

    #[must_use]
    pub const fn is_bridge_busy(&self) -> bool {
        self.typ == ERROR_BRIDGE_BUSY
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HueApiResult<T> {
    Success(T),
    Error(HueError),
}

#[derive(Debug, Serialize, Deserialize)]
pub enum ApiSceneType {
    LightScene,
    GroupScene,
}

/// A scene as returned by `GET /api/{key}/scenes` and
/// `GET /api/{key}/scenes/{id}`. The listing omits `lightstates`; the
/// per-scene endpoint includes them.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiScene {
    pub name: String,
    #[serde(rename = "type")]
    pub scene_type: ApiSceneType,
    #[serde(default)]
    pub lights: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub lightstates: HashMap<String, ApiLightStateUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub recycle: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Body for `PUT /api/{key}/scenes/{id}/lightstates/{light}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiLightStateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<u16>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiLightState {
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colormode: Option<String>,
    #[serde(default)]
    pub reachable: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiLight {
    pub state: ApiLightState,
    #[serde(rename = "type")]
    pub light_type: String,
    pub name: String,
    pub modelid: String,
    #[serde(default)]
    pub manufacturername: String,
    #[serde(default)]
    pub uniqueid: String,
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub capabilities: Value,
}

impl ApiLight {
    /// Whether this light accepts mired color temperature updates.
    #[must_use]
    pub fn supports_color_temperature(&self) -> bool {
        self.state.ct.is_some()
    }

    /// Whether this light accepts xy chromaticity updates.
    #[must_use]
    pub fn supports_color(&self) -> bool {
        self.state.xy.is_some()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ApiLightStateUpdate, ApiScene, HueApiResult};

    #[test]
    fn lightstate_update_serializes_compact() {
        let upd = ApiLightStateUpdate {
            on: Some(true),
            bri: Some(127),
            xy: Some([0.4573, 0.41]),
            ct: Some(250),
            transitiontime: None,
        };

        let value = serde_json::to_value(&upd).unwrap();
        assert_eq!(
            value,
            json!({"on": true, "bri": 127, "xy": [0.4573, 0.41], "ct": 250})
        );
    }

    #[test]
    fn scene_listing_without_lightstates() {
        let scene: ApiScene = serde_json::from_value(json!({
            "name": "Circadian Evening",
            "type": "LightScene",
            "lights": ["1", "4"],
            "owner": "ffffffffe0341b1b376a2389376a2389",
            "recycle": false,
            "locked": false,
        }))
        .unwrap();

        assert_eq!(scene.name, "Circadian Evening");
        assert_eq!(scene.lights, vec!["1", "4"]);
        assert!(scene.lightstates.is_empty());
    }

    #[test]
    fn unauthorized_error_envelope() {
        let res: Vec<HueApiResult<serde_json::Value>> = serde_json::from_value(json!([
            {"error": {"type": 1, "address": "/scenes", "description": "unauthorized user"}}
        ]))
        .unwrap();

        let HueApiResult::Error(err) = &res[0] else {
            panic!("expected error entry");
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_bridge_busy());
    }
}
