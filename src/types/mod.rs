use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One GPS track point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters
    pub elevation: f64,
}

/// One roll/pitch measurement from the attitude logger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttitudeSample {
    /// Unix epoch seconds
    pub timestamp: f64,
    pub roll: f64,
    pub pitch: f64,
}

/// Interpolated roll/pitch. Both absent when the attitude stream has no bracket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
}

impl Attitude {
    pub const NO_DATA: Attitude = Attitude {
        roll: None,
        pitch: None,
    };
}

/// Position and orientation attributed to a single instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterpolatedFix {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    /// Compass bearing of the bracketing segment, [0, 360)
    pub heading: f64,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
}
