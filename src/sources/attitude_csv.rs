use std::io::BufRead;
use std::path::Path;

use super::open_source;
use crate::error::{GeotagError, Result};
use crate::types::AttitudeSample;

/// Parse an attitude log: one header row, then `epoch_seconds,roll,pitch`.
///
/// Blank lines are ignored. Anything else that does not parse aborts the load
/// with the 1-based line number.
pub fn read_attitude_csv<R: BufRead>(reader: R, source_name: &str) -> Result<Vec<AttitudeSample>> {
    let mut samples: Vec<AttitudeSample> = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        if index == 0 || line.trim().is_empty() {
            continue;
        }

        let malformed = |reason: String| GeotagError::MalformedRecord {
            source_name: source_name.to_string(),
            record: line_no,
            reason,
        };

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 3 {
            return Err(malformed(format!(
                "expected epoch,roll,pitch but found {} field(s)",
                fields.len()
            )));
        }

        let mut values = [0.0f64; 3];
        for (slot, (name, raw)) in values
            .iter_mut()
            .zip(["epoch", "roll", "pitch"].iter().zip(&fields))
        {
            *slot = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| malformed(format!("{name} is not a number: {raw:?}")))?;
        }
        let [timestamp, roll, pitch] = values;

        if let Some(prev) = samples.last() {
            if timestamp < prev.timestamp {
                return Err(malformed(format!(
                    "timestamp {timestamp} is earlier than the previous row ({})",
                    prev.timestamp
                )));
            }
        }

        samples.push(AttitudeSample {
            timestamp,
            roll,
            pitch,
        });
    }

    Ok(samples)
}

pub fn load_attitude_csv(path: &Path) -> Result<Vec<AttitudeSample>> {
    read_attitude_csv(open_source(path)?, &path.display().to_string())
}
