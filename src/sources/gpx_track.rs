use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};

use super::open_source;
use crate::error::{GeotagError, Result};
use crate::types::PositionSample;

/// Read every track point of every segment, in file order.
///
/// Records are numbered from 1 across the whole file. A point without a
/// timestamp or elevation, or one that steps back in time, fails the load.
pub fn read_gpx_track<R: Read>(reader: R, source_name: &str) -> Result<Vec<PositionSample>> {
    let gpx = gpx::read(reader)?;
    let mut samples: Vec<PositionSample> = Vec::new();
    let mut record = 0usize;

    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                record += 1;
                let geo = point.point();
                let malformed = |reason: String| GeotagError::MalformedRecord {
                    source_name: source_name.to_string(),
                    record,
                    reason,
                };

                let time = point
                    .time
                    .as_ref()
                    .ok_or_else(|| malformed("track point has no <time>".to_string()))?;
                let iso = time
                    .format()
                    .map_err(|e| malformed(format!("unreadable <time>: {e}")))?;
                let timestamp = DateTime::parse_from_rfc3339(&iso)
                    .map_err(|e| malformed(format!("unreadable <time> {iso:?}: {e}")))?
                    .with_timezone(&Utc);

                let elevation = point
                    .elevation
                    .ok_or_else(|| malformed("track point has no <ele>".to_string()))?;

                if let Some(prev) = samples.last() {
                    if timestamp < prev.timestamp {
                        return Err(malformed(format!(
                            "time {} is earlier than the previous point ({})",
                            timestamp, prev.timestamp
                        )));
                    }
                }

                samples.push(PositionSample {
                    timestamp,
                    latitude: geo.y(),
                    longitude: geo.x(),
                    elevation,
                });
            }
        }
    }

    Ok(samples)
}

pub fn load_gpx_track(path: &Path) -> Result<Vec<PositionSample>> {
    read_gpx_track(open_source(path)?, &path.display().to_string())
}
