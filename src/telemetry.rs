use chrono::{DateTime, Utc};

use crate::bearing::bearing;
use crate::error::{GeotagError, Result};
use crate::types::{Attitude, AttitudeSample, InterpolatedFix, PositionSample};

/// Position track plus attitude log, each ordered by its own clock.
///
/// # Lifecycle
/// - Load: `append_position` / `append_attitude` in ascending time order
/// - Query: shared `&self` access only, nothing is reordered or removed
///
/// # Bracket rule
/// Both streams use the same search: the bracket upper bound is the first
/// sample whose timestamp is strictly greater than the query. A query before
/// the first sample or at/after the last one has no bracket.
#[derive(Clone, Debug, Default)]
pub struct TelemetrySequence {
    positions: Vec<PositionSample>,
    attitudes: Vec<AttitudeSample>,
}

impl TelemetrySequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_position(&mut self, sample: PositionSample) {
        debug_assert!(
            self.positions
                .last()
                .map_or(true, |last| last.timestamp <= sample.timestamp),
            "position samples must be appended in time order"
        );
        self.positions.push(sample);
    }

    pub fn append_attitude(&mut self, sample: AttitudeSample) {
        debug_assert!(
            self.attitudes
                .last()
                .map_or(true, |last| last.timestamp <= sample.timestamp),
            "attitude samples must be appended in time order"
        );
        self.attitudes.push(sample);
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn attitude_count(&self) -> usize {
        self.attitudes.len()
    }

    /// First and last position instants, if any
    pub fn position_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.positions.first()?.timestamp, self.positions.last()?.timestamp))
    }

    /// Linear position fix at `query`.
    ///
    /// # Returns
    /// - Ok(None) when `query` is outside the track (no fix, not an error)
    /// - Ok(Some(fix)) with roll/pitch absent
    /// - Err(DegenerateBracket) when the bracket has no positive duration
    ///
    /// Heading is the bearing of the whole bracketing segment, so it does not
    /// vary with the query's position inside the segment.
    pub fn interpolate_position(&self, query: DateTime<Utc>) -> Result<Option<InterpolatedFix>> {
        let upper = self.positions.partition_point(|p| p.timestamp <= query);
        if upper == 0 || upper == self.positions.len() {
            return Ok(None);
        }
        let lower = upper - 1;
        let a = &self.positions[lower];
        let b = &self.positions[upper];

        let factor = bracket_factor(
            "position",
            lower,
            seconds_between(a.timestamp, b.timestamp),
            seconds_between(a.timestamp, query),
        )?;

        Ok(Some(InterpolatedFix {
            latitude: lerp(a.latitude, b.latitude, factor),
            longitude: lerp(a.longitude, b.longitude, factor),
            elevation: lerp(a.elevation, b.elevation, factor),
            heading: bearing((a.latitude, a.longitude), (b.latitude, b.longitude)),
            roll: None,
            pitch: None,
        }))
    }

    /// Roll/pitch at `query_epoch_secs`, or `Attitude::NO_DATA` without a bracket.
    ///
    /// Empty log, query before the first sample and query at/after the last
    /// sample all collapse into the same `NO_DATA` value.
    pub fn interpolate_attitude(&self, query_epoch_secs: f64) -> Result<Attitude> {
        let upper = self
            .attitudes
            .partition_point(|m| m.timestamp <= query_epoch_secs);
        if upper == 0 || upper == self.attitudes.len() {
            return Ok(Attitude::NO_DATA);
        }
        let lower = upper - 1;
        let a = &self.attitudes[lower];
        let b = &self.attitudes[upper];

        let factor = bracket_factor(
            "attitude",
            lower,
            b.timestamp - a.timestamp,
            query_epoch_secs - a.timestamp,
        )?;

        Ok(Attitude {
            roll: Some(lerp(a.roll, b.roll, factor)),
            pitch: Some(lerp(a.pitch, b.pitch, factor)),
        })
    }

    /// Full fix for one physical instant, given in each stream's own time base.
    ///
    /// No position fix means no fix at all. Missing attitude only leaves
    /// roll/pitch empty.
    pub fn get_fix(
        &self,
        position_query: DateTime<Utc>,
        attitude_query_epoch_secs: f64,
    ) -> Result<Option<InterpolatedFix>> {
        let Some(mut fix) = self.interpolate_position(position_query)? else {
            return Ok(None);
        };
        let attitude = self.interpolate_attitude(attitude_query_epoch_secs)?;
        fix.roll = attitude.roll;
        fix.pitch = attitude.pitch;
        Ok(Some(fix))
    }
}

/// Position of the query inside a bracket starting at sample `lower`.
///
/// A sorted stream always yields a positive duration here; anything else
/// (equal or reversed timestamps, NaN) means the stream was loaded out of order.
fn bracket_factor(
    stream: &'static str,
    lower: usize,
    segment_secs: f64,
    elapsed_secs: f64,
) -> Result<f64> {
    if !(segment_secs > 0.0) {
        return Err(GeotagError::DegenerateBracket {
            stream,
            lower,
            upper: lower + 1,
            duration_secs: segment_secs,
        });
    }
    Ok(elapsed_secs / segment_secs)
}

fn lerp(start: f64, end: f64, factor: f64) -> f64 {
    start + (end - start) * factor
}

/// Signed seconds from `from` to `to`, keeping sub-second precision
fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to.signed_duration_since(from);
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Unix epoch seconds of an instant, with sub-second precision
pub fn epoch_seconds(instant: DateTime<Utc>) -> f64 {
    instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_micros()) / 1e6
}
