pub mod dms;
pub mod rational;
pub mod tags;

pub use dms::{degrees_to_dms, Dms, HemisphereRefs, LATITUDE_REFS, LONGITUDE_REFS};
pub use rational::{to_rational, Rational};
pub use tags::{AltitudeRefPolicy, GpsTagEncoder, GpsTagSet};

/// Round half away from zero to `places` decimals.
pub(crate) fn round_decimal(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
