pub mod bearing;
pub mod capture;
pub mod config;
pub mod encoding;
pub mod error;
pub mod exif;
pub mod pipeline;
pub mod sources;
pub mod telemetry;
pub mod types;
pub mod upload;
pub mod writer;

pub use bearing::bearing;
pub use config::{ClockAlignment, ProcessConfig, SequenceTarget, TagOutput, UploadConfig};
pub use encoding::{degrees_to_dms, to_rational, AltitudeRefPolicy, Dms, GpsTagEncoder, GpsTagSet, Rational};
pub use error::{GeotagError, Result};
pub use pipeline::{BatchReport, Geotagger, ImageOutcome, ImageReport};
pub use telemetry::TelemetrySequence;
pub use types::{Attitude, AttitudeSample, InterpolatedFix, PositionSample};
pub use writer::{DryRunWriter, ExifGpsWriter, JsonSidecarWriter, TagWriter};
