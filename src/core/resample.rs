//! Resampling of irregular samples onto fixed-cadence grids.
//!
//! Movement scores are averaged into non-overlapping bins aligned to whole
//! multiples of the bin width (whole minutes for the default 60 s); empty
//! bins read 0.0. Heart rate is laid on a grid of whole seconds and
//! forward-filled until the next sample arrives; a grid point never reads
//! a sample captured after it.

use chrono::{DateTime, Duration, Utc};

/// A gap-free series with a fixed step between consecutive values.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSeries {
    /// Timestamp of the first value
    pub start: DateTime<Utc>,
    /// Step between consecutive values
    pub step: Duration,
    /// Values in chronological order
    pub values: Vec<f64>,
}

/// Per-bin movement scores.
pub type MovementSeries = UniformSeries;

/// Forward-filled beats per minute.
pub type HeartRateSeries = UniformSeries;

impl UniformSeries {
    /// Series with no values.
    pub fn empty(step: Duration) -> Self {
        Self {
            start: DateTime::<Utc>::default(),
            step,
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Timestamp of the value at `index`.
    pub fn timestamp_at(&self, index: usize) -> DateTime<Utc> {
        self.start + self.step * index as i32
    }

    /// Timestamp of the last value, if any.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.values.len().checked_sub(1).map(|i| self.timestamp_at(i))
    }

    /// Iterate `(timestamp, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, &v)| (self.timestamp_at(i), v))
    }

    /// Index of the grid point nearest to `at`, if within `tolerance`.
    ///
    /// On an exact tie the later grid point wins.
    pub fn nearest_index(&self, at: DateTime<Utc>, tolerance: Duration) -> Option<usize> {
        if self.is_empty() {
            return None;
        }

        let step_ms = self.step.num_milliseconds().max(1);
        let offset_ms = (at - self.start).num_milliseconds();
        let last = self.values.len() as i64 - 1;

        let lower = offset_ms.div_euclid(step_ms).clamp(0, last);
        let upper = (lower + 1).min(last);
        let distance = |i: i64| (offset_ms - i * step_ms).abs();

        let best = if distance(upper) <= distance(lower) {
            upper
        } else {
            lower
        };

        (distance(best) <= tolerance.num_milliseconds()).then_some(best as usize)
    }
}

/// Floor a timestamp onto a grid of `step` aligned to the Unix epoch.
fn floor_to(ts: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let step_ms = step.num_milliseconds().max(1);
    let floored = ts.timestamp_millis().div_euclid(step_ms) * step_ms;
    DateTime::<Utc>::from_timestamp_millis(floored).unwrap_or(ts)
}

/// Ceil a timestamp onto a grid of `step` aligned to the Unix epoch.
fn ceil_to(ts: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let floored = floor_to(ts, step);
    if floored < ts {
        floored + step
    } else {
        floored
    }
}

/// Average samples into consecutive bins of width `bin`, filling gaps with 0.0.
///
/// Input need not be sorted. Returns an empty series when there are no samples.
pub fn bin_mean(samples: &[(DateTime<Utc>, f64)], bin: Duration) -> MovementSeries {
    let (Some(first), Some(last)) = (
        samples.iter().map(|(ts, _)| *ts).min(),
        samples.iter().map(|(ts, _)| *ts).max(),
    ) else {
        return UniformSeries::empty(bin);
    };

    let start = floor_to(first, bin);
    let bin_ms = bin.num_milliseconds().max(1);
    let count = ((floor_to(last, bin) - start).num_milliseconds() / bin_ms) as usize + 1;

    let mut sums = vec![0.0; count];
    let mut counts = vec![0usize; count];
    for (ts, value) in samples {
        let index = ((*ts - start).num_milliseconds() / bin_ms) as usize;
        sums[index] += value;
        counts[index] += 1;
    }

    let values = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, n)| if n == 0 { 0.0 } else { sum / n as f64 })
        .collect();

    UniformSeries {
        start,
        step: bin,
        values,
    }
}

/// Lay samples on a grid of `step` and carry the last known value forward.
///
/// Each grid point takes the latest sample at or before it. The grid starts at
/// the first grid point not earlier than the first sample; an empty series is
/// returned when no grid point is covered.
pub fn forward_fill(samples: &[(DateTime<Utc>, f64)], step: Duration) -> HeartRateSeries {
    if samples.is_empty() {
        return UniformSeries::empty(step);
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by_key(|(ts, _)| *ts);

    let start = ceil_to(sorted[0].0, step);
    let end = floor_to(sorted[sorted.len() - 1].0, step);
    if end < start {
        return UniformSeries::empty(step);
    }
    let step_ms = step.num_milliseconds().max(1);
    let count = ((end - start).num_milliseconds() / step_ms) as usize + 1;

    let mut values = Vec::with_capacity(count);
    let mut cursor = 0;
    let mut current = sorted[0].1;
    for i in 0..count {
        let slot = start + step * i as i32;
        while cursor < sorted.len() && sorted[cursor].0 <= slot {
            current = sorted[cursor].1;
            cursor += 1;
        }
        values.push(current);
    }

    UniformSeries {
        start,
        step,
        values,
    }
}
