use serde::{Deserialize, Serialize};

use super::round_decimal;

/// Hemisphere letters for negative and positive values of one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HemisphereRefs {
    pub negative: &'static str,
    pub positive: &'static str,
}

pub const LATITUDE_REFS: HemisphereRefs = HemisphereRefs {
    negative: "S",
    positive: "N",
};

pub const LONGITUDE_REFS: HemisphereRefs = HemisphereRefs {
    negative: "W",
    positive: "E",
};

/// Degrees, minutes, seconds plus hemisphere letter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dms {
    pub degrees: u32,
    pub minutes: u32,
    /// Rounded to 5 decimal places
    pub seconds: f64,
    /// Empty for an exact 0.0 coordinate
    pub reference: String,
}

impl Dms {
    /// Signed decimal degrees; a reference equal to `refs.negative` flips the sign.
    pub fn to_decimal_degrees(&self, refs: HemisphereRefs) -> f64 {
        let magnitude =
            f64::from(self.degrees) + f64::from(self.minutes) / 60.0 + self.seconds / 3600.0;
        if self.reference == refs.negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

/// Split a signed decimal-degree value into DMS.
///
/// Seconds are rounded, never carried: a value a hair under a whole minute
/// can come out as 60.0 seconds.
pub fn degrees_to_dms(value: f64, refs: HemisphereRefs) -> Dms {
    let reference = if value < 0.0 {
        refs.negative
    } else if value > 0.0 {
        refs.positive
    } else {
        ""
    };

    let abs_value = value.abs();
    let degrees = abs_value.floor();
    let total_minutes = (abs_value - degrees) * 60.0;
    let minutes = total_minutes.floor();
    let seconds = round_decimal((total_minutes - minutes) * 60.0, 5);

    Dms {
        degrees: degrees as u32,
        minutes: minutes as u32,
        seconds,
        reference: reference.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_southern_half_degree() {
        let dms = degrees_to_dms(-12.5, LATITUDE_REFS);
        assert_eq!(dms.degrees, 12);
        assert_eq!(dms.minutes, 30);
        assert_eq!(dms.seconds, 0.0);
        assert_eq!(dms.reference, "S");
    }

    #[test]
    fn test_zero_has_empty_reference() {
        let dms = degrees_to_dms(0.0, LATITUDE_REFS);
        assert_eq!(
            dms,
            Dms {
                degrees: 0,
                minutes: 0,
                seconds: 0.0,
                reference: String::new(),
            }
        );
        assert_eq!(degrees_to_dms(0.0, LONGITUDE_REFS).reference, "");
    }

    #[test]
    fn test_references() {
        assert_eq!(degrees_to_dms(45.0, LATITUDE_REFS).reference, "N");
        assert_eq!(degrees_to_dms(9.0, LONGITUDE_REFS).reference, "E");
        assert_eq!(degrees_to_dms(-0.0001, LONGITUDE_REFS).reference, "W");
    }

    #[test]
    fn test_known_value() {
        // 25°13'48.343"
        let value = 25.0 + 13.0 / 60.0 + 48.343 / 3600.0;
        let dms = degrees_to_dms(value, LATITUDE_REFS);
        assert_eq!(dms.degrees, 25);
        assert_eq!(dms.minutes, 13);
        assert_abs_diff_eq!(dms.seconds, 48.343, epsilon = 1e-9);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let values = [
            45.0005,
            -45.0005,
            9.000_123_456,
            -179.999_999,
            0.000_001,
            89.123_456_789,
            -0.5,
            12.345_678,
        ];
        for value in values {
            for refs in [LATITUDE_REFS, LONGITUDE_REFS] {
                let decoded = degrees_to_dms(value, refs).to_decimal_degrees(refs);
                assert_abs_diff_eq!(decoded, value, epsilon = 1e-5);
            }
        }
    }
}
