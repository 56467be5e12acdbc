use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::encoding::AltitudeRefPolicy;
use crate::error::{GeotagError, Result};
use crate::telemetry::epoch_seconds;

/// Maps the camera's naive wall-clock time onto the telemetry clocks.
///
/// position query = camera time - `offset_hours` + `delay_ms` (read as UTC)
/// attitude query = position query in epoch seconds + `attitude_offset_ms`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockAlignment {
    /// Camera clock zone offset from UTC (1 for a camera set to CET)
    pub offset_hours: i64,
    /// Shutter/clock drift calibration
    pub delay_ms: i64,
    /// Extra shift of the attitude log relative to the GPS clock
    pub attitude_offset_ms: i64,
}

impl ClockAlignment {
    /// Fails with `ClockOverflow` when the shift leaves chrono's date range.
    pub fn position_instant(&self, camera_time: NaiveDateTime) -> Result<DateTime<Utc>> {
        let aligned = Duration::try_hours(self.offset_hours)
            .and_then(|offset| camera_time.checked_sub_signed(offset))
            .zip(Duration::try_milliseconds(self.delay_ms))
            .and_then(|(t, delay)| t.checked_add_signed(delay))
            .ok_or(GeotagError::ClockOverflow {
                camera_time,
                offset_hours: self.offset_hours,
                delay_ms: self.delay_ms,
            })?;
        Ok(Utc.from_utc_datetime(&aligned))
    }

    pub fn attitude_epoch_seconds(&self, position_instant: DateTime<Utc>) -> f64 {
        epoch_seconds(position_instant) + self.attitude_offset_ms as f64 / 1000.0
    }
}

/// Where `process` puts the encoded tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TagOutput {
    /// GPS IFD written into each JPEG in place
    #[default]
    Exif,
    /// `<image>.gps.json` next to each JPEG, image untouched
    Sidecar,
    /// Log only
    DryRun,
}

/// Everything the `process` run needs, injected from the command line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub images_dir: PathBuf,
    pub gpx_path: PathBuf,
    pub attitude_path: Option<PathBuf>,
    pub clock: ClockAlignment,
    pub altitude_ref_policy: AltitudeRefPolicy,
    pub output: TagOutput,
    pub report_path: Option<PathBuf>,
}

/// Where uploaded panoramas go.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SequenceTarget {
    Existing(String),
    New { title: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    pub images_dir: PathBuf,
    /// Base URL without trailing slash, e.g. http://localhost:8989
    pub backend: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub sequence: SequenceTarget,
    /// Camera height above ground in meters, sent when creating a sequence
    pub height_from_ground: f64,
}
