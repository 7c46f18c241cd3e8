use serde::Deserialize;
use serde_json::{Map, Value};

use hue::api::ApiLightStateUpdate;
use hue::color::{brightness_from_mirek, kelvin_to_mirek};

use crate::error::{ApiError, ApiResult};

#[derive(Clone, Debug, Deserialize)]
pub struct HassState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Target lighting values derived from one circadian sensor state.
///
/// Recomputed on every state change, never persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    pub brightness: u8,
    pub xy: [f64; 2],
    pub mirek: u16,
}

fn parse_xy_color(entity_id: &str, value: &Value) -> ApiResult<[f64; 2]> {
    let arr = value.as_array().ok_or_else(|| {
        ApiError::invalid_attribute(entity_id, "xy_color", "expected an array")
    })?;

    let [x, y] = arr.as_slice() else {
        return Err(ApiError::invalid_attribute(
            entity_id,
            "xy_color",
            format!("expected exactly 2 components, got {}", arr.len()),
        ));
    };

    let (Some(x), Some(y)) = (x.as_f64(), y.as_f64()) else {
        return Err(ApiError::invalid_attribute(
            entity_id,
            "xy_color",
            "components must be numbers",
        ));
    };

    Ok([x, y])
}

impl SensorReading {
    /// Derive a reading from the sensor's reported attributes. Validation
    /// happens here, before any bridge request is issued.
    pub fn from_state(state: &HassState) -> ApiResult<Self> {
        let kelvin = state
            .attributes
            .get("colortemp")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                ApiError::invalid_attribute(
                    &state.entity_id,
                    "colortemp",
                    "missing or not a number",
                )
            })?;
        if kelvin <= 0.0 {
            return Err(ApiError::invalid_attribute(
                &state.entity_id,
                "colortemp",
                format!("must be positive, got {kelvin}"),
            ));
        }

        let xy_value = state.attributes.get("xy_color").ok_or_else(|| {
            ApiError::invalid_attribute(&state.entity_id, "xy_color", "missing")
        })?;
        let xy = parse_xy_color(&state.entity_id, xy_value)?;

        let mirek = kelvin_to_mirek(kelvin);

        Ok(Self {
            brightness: brightness_from_mirek(mirek),
            xy,
            mirek,
        })
    }

    /// The lightstate body applied to every light in a matched scene.
    #[must_use]
    pub const fn lightstate(&self) -> ApiLightStateUpdate {
        ApiLightStateUpdate {
            on: Some(true),
            bri: Some(self.brightness),
            xy: Some(self.xy),
            ct: Some(self.mirek),
            transitiontime: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::ApiError;

    use super::{HassState, SensorReading};

    fn sensor_state(attributes: serde_json::Value) -> HassState {
        serde_json::from_value(json!({
            "entity_id": "sensor.circadian_values",
            "state": "100",
            "attributes": attributes,
        }))
        .unwrap()
    }

    #[test]
    fn reading_from_sensor_attributes() {
        let state = sensor_state(json!({
            "colortemp": 4000,
            "xy_color": [0.4573, 0.41],
        }));

        let reading = SensorReading::from_state(&state).unwrap();
        assert_eq!(reading.mirek, 250);
        assert_eq!(reading.brightness, 127);
        assert_eq!(reading.xy, [0.4573, 0.41]);

        let body = serde_json::to_value(reading.lightstate()).unwrap();
        assert_eq!(
            body,
            json!({"on": true, "bri": 127, "xy": [0.4573, 0.41], "ct": 250})
        );
    }

    #[test]
    fn missing_colortemp_is_rejected() {
        let state = sensor_state(json!({"xy_color": [0.4573, 0.41]}));

        assert!(matches!(
            SensorReading::from_state(&state),
            Err(ApiError::InvalidAttribute { attribute: "colortemp", .. })
        ));
    }

    #[test]
    fn xy_color_must_have_two_components() {
        for xy in [json!([0.4573]), json!([0.4573, 0.41, 0.1]), json!([])] {
            let state = sensor_state(json!({"colortemp": 4000, "xy_color": xy}));
            assert!(matches!(
                SensorReading::from_state(&state),
                Err(ApiError::InvalidAttribute { attribute: "xy_color", .. })
            ));
        }
    }

    #[test]
    fn non_numeric_values_are_rejected() {
        let state = sensor_state(json!({
            "colortemp": "warm",
            "xy_color": [0.4573, 0.41],
        }));
        assert!(SensorReading::from_state(&state).is_err());

        let state = sensor_state(json!({
            "colortemp": 4000,
            "xy_color": [0.4573, "y"],
        }));
        assert!(SensorReading::from_state(&state).is_err());
    }
}
