use serde::{Deserialize, Serialize};

use super::dms::{degrees_to_dms, LATITUDE_REFS, LONGITUDE_REFS};
use super::rational::{to_rational, Rational};
use super::round_decimal;
use crate::error::Result;
use crate::types::InterpolatedFix;

/// EXIF GPSAltitudeRef values
pub const ALTITUDE_ABOVE_SEA_LEVEL: u8 = 0;
pub const ALTITUDE_BELOW_SEA_LEVEL: u8 = 1;

/// How GPSAltitudeRef is chosen.
///
/// Altitude is clamped to >= 0 before encoding, so the only value consistent
/// with the written altitude is "above sea level". `LegacyBelowSeaLevel`
/// reproduces the older tool output, which always wrote 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AltitudeRefPolicy {
    #[default]
    AboveSeaLevel,
    LegacyBelowSeaLevel,
}

impl AltitudeRefPolicy {
    fn reference(self) -> u8 {
        match self {
            AltitudeRefPolicy::AboveSeaLevel => ALTITUDE_ABOVE_SEA_LEVEL,
            AltitudeRefPolicy::LegacyBelowSeaLevel => ALTITUDE_BELOW_SEA_LEVEL,
        }
    }
}

/// GPS IFD fields ready to hand to a metadata writer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsTagSet {
    pub latitude_ref: String,
    pub latitude: [Rational; 3],
    pub longitude_ref: String,
    pub longitude: [Rational; 3],
    pub altitude_ref: u8,
    pub altitude: Rational,
    pub img_direction: Rational,
    /// Whole degrees, omitted when absent or exactly zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<i32>,
}

impl GpsTagSet {
    /// Signed decimal latitude recovered from the DMS rationals
    pub fn latitude_degrees(&self) -> f64 {
        decode_dms(&self.latitude, self.latitude_ref == LATITUDE_REFS.negative)
    }

    /// Signed decimal longitude recovered from the DMS rationals
    pub fn longitude_degrees(&self) -> f64 {
        decode_dms(&self.longitude, self.longitude_ref == LONGITUDE_REFS.negative)
    }
}

fn decode_dms(parts: &[Rational; 3], negative: bool) -> f64 {
    let magnitude = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Turns an interpolated fix into a `GpsTagSet`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GpsTagEncoder {
    altitude_ref_policy: AltitudeRefPolicy,
}

impl GpsTagEncoder {
    pub fn new(altitude_ref_policy: AltitudeRefPolicy) -> Self {
        Self {
            altitude_ref_policy,
        }
    }

    pub fn encode(&self, fix: &InterpolatedFix) -> Result<GpsTagSet> {
        let lat = degrees_to_dms(fix.latitude, LATITUDE_REFS);
        let lon = degrees_to_dms(fix.longitude, LONGITUDE_REFS);

        // Negative elevations are raised to sea level, not preserved
        let elevation = round_decimal(fix.elevation, 2).max(0.0);

        let mut heading = round_decimal(fix.heading, 1);
        if heading >= 360.0 {
            heading = 0.0;
        }

        Ok(GpsTagSet {
            latitude_ref: lat.reference,
            latitude: [
                to_rational(f64::from(lat.degrees))?,
                to_rational(f64::from(lat.minutes))?,
                to_rational(lat.seconds)?,
            ],
            longitude_ref: lon.reference,
            longitude: [
                to_rational(f64::from(lon.degrees))?,
                to_rational(f64::from(lon.minutes))?,
                to_rational(lon.seconds)?,
            ],
            altitude_ref: self.altitude_ref_policy.reference(),
            altitude: to_rational(elevation)?,
            img_direction: to_rational(heading)?,
            roll: whole_degrees(fix.roll),
            pitch: whole_degrees(fix.pitch),
        })
    }
}

/// Zero check runs on the raw value: 0.4 is kept and written as 0, while an
/// exact 0.0 is dropped along with missing data.
fn whole_degrees(value: Option<f64>) -> Option<i32> {
    value.filter(|v| *v != 0.0).map(|v| v.trunc() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn fix(latitude: f64, longitude: f64, elevation: f64) -> InterpolatedFix {
        InterpolatedFix {
            latitude,
            longitude,
            elevation,
            heading: 42.26,
            roll: None,
            pitch: None,
        }
    }

    fn r(numerator: u32, denominator: u32) -> Rational {
        Rational {
            numerator,
            denominator,
        }
    }

    #[test]
    fn test_encode_coordinates() {
        let tags = GpsTagEncoder::default()
            .encode(&fix(-12.5, 9.25, 100.0))
            .unwrap();

        assert_eq!(tags.latitude_ref, "S");
        assert_eq!(tags.latitude, [r(12, 1), r(30, 1), Rational::ZERO]);
        assert_eq!(tags.longitude_ref, "E");
        assert_eq!(tags.longitude, [r(9, 1), r(15, 1), Rational::ZERO]);
        assert_eq!(tags.altitude, r(100, 1));
        assert_eq!(tags.img_direction, r(423, 10));
    }

    #[test]
    fn test_round_trip_coordinates() {
        let encoder = GpsTagEncoder::default();
        for (lat, lon) in [(45.0005, 9.0005), (-33.868_82, 151.209_29), (0.000_01, -0.000_01)] {
            let tags = encoder.encode(&fix(lat, lon, 0.0)).unwrap();
            assert_abs_diff_eq!(tags.latitude_degrees(), lat, epsilon = 1e-5);
            assert_abs_diff_eq!(tags.longitude_degrees(), lon, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_negative_elevation_clamped() {
        let tags = GpsTagEncoder::default().encode(&fix(45.0, 9.0, -3.2)).unwrap();
        assert_eq!(tags.altitude, Rational::ZERO);
        assert_eq!(tags.altitude_ref, ALTITUDE_ABOVE_SEA_LEVEL);

        let legacy = GpsTagEncoder::new(AltitudeRefPolicy::LegacyBelowSeaLevel)
            .encode(&fix(45.0, 9.0, -3.2))
            .unwrap();
        assert_eq!(legacy.altitude, Rational::ZERO);
        assert_eq!(legacy.altitude_ref, ALTITUDE_BELOW_SEA_LEVEL);
    }

    #[test]
    fn test_elevation_rounded_to_centimeters() {
        let tags = GpsTagEncoder::default()
            .encode(&fix(45.0, 9.0, 105.004_9))
            .unwrap();
        assert_eq!(tags.altitude, r(105, 1));

        let tags = GpsTagEncoder::default()
            .encode(&fix(45.0, 9.0, 12.345_6))
            .unwrap();
        assert_eq!(tags.altitude, r(247, 20));
    }

    #[test]
    fn test_heading_wraps_at_360() {
        let mut f = fix(45.0, 9.0, 0.0);
        f.heading = 359.97;
        let tags = GpsTagEncoder::default().encode(&f).unwrap();
        assert_eq!(tags.img_direction, Rational::ZERO);
    }

    #[test]
    fn test_roll_pitch_zero_rule() {
        let encoder = GpsTagEncoder::default();

        let mut f = fix(45.0, 9.0, 0.0);
        f.roll = Some(0.0);
        f.pitch = Some(-0.0);
        let tags = encoder.encode(&f).unwrap();
        assert_eq!(tags.roll, None);
        assert_eq!(tags.pitch, None);

        f.roll = Some(0.4);
        f.pitch = Some(-7.9);
        let tags = encoder.encode(&f).unwrap();
        assert_eq!(tags.roll, Some(0));
        assert_eq!(tags.pitch, Some(-7));

        f.roll = None;
        f.pitch = Some(3.99);
        let tags = encoder.encode(&f).unwrap();
        assert_eq!(tags.roll, None);
        assert_eq!(tags.pitch, Some(3));
    }

    #[test]
    fn test_absent_attitude_omitted_from_json() {
        let tags = GpsTagEncoder::default().encode(&fix(45.0, 9.0, 10.0)).unwrap();
        let json = serde_json::to_value(&tags).unwrap();
        assert!(json.get("roll").is_none());
        assert!(json.get("pitch").is_none());
        assert_eq!(json["latitude_ref"], "N");
    }
}
