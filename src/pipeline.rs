use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::capture::read_capture_time;
use crate::config::{ClockAlignment, ProcessConfig, TagOutput};
use crate::encoding::{AltitudeRefPolicy, GpsTagEncoder, GpsTagSet};
use crate::error::Result;
use crate::sources::{load_attitude_csv, load_gpx_track};
use crate::telemetry::TelemetrySequence;
use crate::writer::{DryRunWriter, ExifGpsWriter, JsonSidecarWriter, TagWriter};

/// Load phase: GPX track, then the optional attitude log.
pub fn load_telemetry(gpx_path: &Path, attitude_path: Option<&Path>) -> Result<TelemetrySequence> {
    let mut telemetry = TelemetrySequence::new();

    for sample in load_gpx_track(gpx_path)? {
        telemetry.append_position(sample);
    }
    if let Some(path) = attitude_path {
        for sample in load_attitude_csv(path)? {
            telemetry.append_attitude(sample);
        }
    }

    match telemetry.position_span() {
        Some((first, last)) => log::info!(
            "Loaded {} track points ({} .. {}) and {} attitude samples",
            telemetry.position_count(),
            first,
            last,
            telemetry.attitude_count()
        ),
        None => log::warn!("{} has no track points, every image will be skipped", gpx_path.display()),
    }

    Ok(telemetry)
}

/// `*.jpg` / `*.jpeg` (any case) directly inside `dir`, sorted by name
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_jpeg = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false);
        if is_jpeg && path.is_file() {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    Tagged { tags: GpsTagSet },
    /// Aligned capture time falls outside the GPS track
    OutOfRange { query: DateTime<Utc> },
    Skipped { reason: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct ImageReport {
    pub image: PathBuf,
    pub capture_time: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub outcome: ImageOutcome,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub tagged: usize,
    pub out_of_range: usize,
    pub skipped: usize,
    pub images: Vec<ImageReport>,
}

impl BatchReport {
    fn push(&mut self, report: ImageReport) {
        match report.outcome {
            ImageOutcome::Tagged { .. } => self.tagged += 1,
            ImageOutcome::OutOfRange { .. } => self.out_of_range += 1,
            ImageOutcome::Skipped { .. } => self.skipped += 1,
        }
        self.images.push(report);
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// Query phase: aligns each capture time, interpolates, encodes, writes.
pub struct Geotagger<'a, W: TagWriter> {
    telemetry: &'a TelemetrySequence,
    clock: ClockAlignment,
    encoder: GpsTagEncoder,
    writer: W,
}

impl<'a, W: TagWriter> Geotagger<'a, W> {
    pub fn new(
        telemetry: &'a TelemetrySequence,
        clock: ClockAlignment,
        altitude_ref_policy: AltitudeRefPolicy,
        writer: W,
    ) -> Self {
        Self {
            telemetry,
            clock,
            encoder: GpsTagEncoder::new(altitude_ref_policy),
            writer,
        }
    }

    /// Tag one image whose camera time is already known.
    ///
    /// `Err` only for problems that invalidate the whole batch or the write.
    pub fn tag_capture(&mut self, image: &Path, camera_time: NaiveDateTime) -> Result<ImageOutcome> {
        let position_query = self.clock.position_instant(camera_time)?;
        let attitude_query = self.clock.attitude_epoch_seconds(position_query);

        let Some(fix) = self.telemetry.get_fix(position_query, attitude_query)? else {
            return Ok(ImageOutcome::OutOfRange {
                query: position_query,
            });
        };

        let tags = self.encoder.encode(&fix)?;
        self.writer.write_tags(image, &tags)?;
        Ok(ImageOutcome::Tagged { tags })
    }

    /// Per-image problems become `Skipped`. Contract violations and writer
    /// I/O failures propagate and stop the batch.
    pub fn process_image(&mut self, image: &Path) -> Result<ImageReport> {
        let camera_time = match read_capture_time(image) {
            Ok(time) => time,
            Err(e) if e.is_per_image() => {
                return Ok(ImageReport {
                    image: image.to_path_buf(),
                    capture_time: None,
                    outcome: ImageOutcome::Skipped {
                        reason: e.to_string(),
                    },
                })
            }
            Err(e) => return Err(e),
        };

        let outcome = match self.tag_capture(image, camera_time) {
            Ok(outcome) => outcome,
            Err(e) if e.is_per_image() => ImageOutcome::Skipped {
                reason: e.to_string(),
            },
            Err(e) => return Err(e),
        };

        Ok(ImageReport {
            image: image.to_path_buf(),
            capture_time: Some(camera_time),
            outcome,
        })
    }

    pub fn run(&mut self, images: &[PathBuf]) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        for (i, image) in images.iter().enumerate() {
            let image_report = self.process_image(image)?;
            let name = image.file_name().unwrap_or_default().to_string_lossy();
            match &image_report.outcome {
                ImageOutcome::Tagged { tags } => log::info!(
                    "[{}/{}] {} tagged {:.6},{:.6} heading {}",
                    i + 1,
                    images.len(),
                    name,
                    tags.latitude_degrees(),
                    tags.longitude_degrees(),
                    tags.img_direction
                ),
                ImageOutcome::OutOfRange { query } => log::warn!(
                    "[{}/{}] {} outside track span (query {}), skipped",
                    i + 1,
                    images.len(),
                    name,
                    query
                ),
                ImageOutcome::Skipped { reason } => {
                    log::warn!("[{}/{}] {} skipped: {}", i + 1, images.len(), name, reason)
                }
            }
            report.push(image_report);
        }

        Ok(report)
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

/// The `process` command: load telemetry, tag every image in the folder.
pub fn run_process(config: &ProcessConfig) -> Result<BatchReport> {
    let telemetry = load_telemetry(&config.gpx_path, config.attitude_path.as_deref())?;
    let images = list_images(&config.images_dir)?;
    log::info!("Found {} images in {}", images.len(), config.images_dir.display());

    let run = |writer: &mut dyn TagWriter| {
        Geotagger::new(&telemetry, config.clock, config.altitude_ref_policy, writer).run(&images)
    };
    let report = match config.output {
        TagOutput::Exif => run(&mut ExifGpsWriter::new())?,
        TagOutput::Sidecar => run(&mut JsonSidecarWriter::new())?,
        TagOutput::DryRun => run(&mut DryRunWriter)?,
    };

    if let Some(path) = &config.report_path {
        report.save_json(path)?;
        log::info!("Report written to {}", path.display());
    }
    Ok(report)
}
