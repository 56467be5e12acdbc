use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Geotagging error types
#[derive(Error, Debug)]
pub enum GeotagError {
    /// Two adjacent samples bracket a query with zero or negative duration.
    /// The ascending-time invariant was broken when the stream was loaded.
    #[error("Degenerate {stream} bracket between samples {lower} and {upper} (duration {duration_secs}s)")]
    DegenerateBracket {
        stream: &'static str,
        lower: usize,
        upper: usize,
        duration_secs: f64,
    },

    #[error("Malformed record {record} in {source_name}: {reason}")]
    MalformedRecord {
        source_name: String,
        record: usize,
        reason: String,
    },

    #[error("Cannot encode {value} as an EXIF rational: {reason}")]
    RationalEncoding { value: String, reason: String },

    #[error("No capture time in {path}: {reason}")]
    CaptureTime { path: PathBuf, reason: String },

    /// The image's own EXIF layout cannot take a GPS IFD
    #[error("Cannot embed GPS tags in {path}: {reason}")]
    ExifLayout { path: PathBuf, reason: String },

    #[error("Clock alignment of {camera_time} by {offset_hours} h and {delay_ms} ms is out of range")]
    ClockOverflow {
        camera_time: NaiveDateTime,
        offset_hours: i64,
        delay_ms: i64,
    },

    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeotagError {
    /// Whether the batch may continue after this error on a single image.
    ///
    /// Everything else aborts the batch, output-side I/O included.
    pub fn is_per_image(&self) -> bool {
        matches!(
            self,
            GeotagError::CaptureTime { .. } | GeotagError::ExifLayout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GeotagError>;
