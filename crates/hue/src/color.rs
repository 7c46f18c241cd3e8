//! Color temperature conversions used when deriving scene lightstates.

/// Convert a color temperature in Kelvin to mired, the reciprocal unit the
/// bridge API expects.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn kelvin_to_mirek(kelvin: f64) -> u16 {
    (1_000_000.0 / kelvin).round() as u16
}

/// Derive a v1 brightness (1..=254) from a mired color temperature.
///
/// The scale maps the warmest bridge-representable temperature (500 mired)
/// to full brightness. Sensors can report mired values beyond 500 for very
/// warm Kelvin inputs, so the result is clamped into the valid range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn brightness_from_mirek(mirek: u16) -> u8 {
    let bri = (f64::from(mirek) / 500.0 * 254.0).round();
    bri.clamp(1.0, 254.0) as u8
}

#[cfg(test)]
mod tests {
    use super::{brightness_from_mirek, kelvin_to_mirek};

    #[test]
    fn kelvin_conversion() {
        assert_eq!(kelvin_to_mirek(4000.0), 250);
        assert_eq!(kelvin_to_mirek(2000.0), 500);
        assert_eq!(kelvin_to_mirek(6535.0), 153);
        // rounds, not truncates
        assert_eq!(kelvin_to_mirek(3000.0), 333);
    }

    #[test]
    fn brightness_derivation() {
        assert_eq!(brightness_from_mirek(250), 127);
        assert_eq!(brightness_from_mirek(500), 254);
        assert_eq!(brightness_from_mirek(153), 78);
    }

    #[test]
    fn brightness_is_clamped() {
        // 1500 K -> 667 mired, which the raw formula maps past 254
        assert_eq!(brightness_from_mirek(kelvin_to_mirek(1500.0)), 254);
        assert_eq!(brightness_from_mirek(0), 1);
    }
}
