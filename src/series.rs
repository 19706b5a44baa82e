//! Timestamped series, resampling, and alignment.
//!
//! [`TimeSeries`] is the one data structure every component exchanges: an
//! ordered sequence of `(timestamp, value)` pairs. Ascending timestamp order
//! is the engine's primary correctness invariant (a rolling statistic over
//! an unsorted series is meaningless), so ordering is enforced at the type
//! boundary: [`TimeSeries::from_unordered`] sorts, [`TimeSeries::from_sorted`]
//! validates, and no other constructor exists. Estimators can therefore
//! assume sortedness instead of rechecking it.
//!
//! Heterogeneous-frequency series are made comparable by [`resample`]
//! (fixed-width interval averaging) followed by [`align`] (inner join on
//! exact timestamps). Empty buckets produce no row and unmatched rows are
//! dropped silently; the grid evaluator only scores timestamps present in
//! both series.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolBackError};

/// Price-ratio series (positive floats expected; non-positive entries are the
/// caller's problem and surface as NaN returns downstream).
pub type PriceSeries = TimeSeries<f64>;

/// Log-return series derived from a [`PriceSeries`].
pub type ReturnSeries = TimeSeries<f64>;

/// Annualized volatility series, in percent (see [`crate::types`] for the
/// unit convention).
pub type VolatilityEstimate = TimeSeries<f64>;

/// An ordered sequence of `(timestamp, value)` pairs.
///
/// Always ascending by timestamp. [`from_sorted`](TimeSeries::from_sorted)
/// additionally guarantees strictly increasing timestamps;
/// [`from_unordered`](TimeSeries::from_unordered) tolerates duplicates, which
/// [`resample`] later averages away within their bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries<T> {
    points: Vec<(DateTime<Utc>, T)>,
}

impl<T> TimeSeries<T> {
    /// Create an empty series.
    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }

    /// Build a series from points already sorted strictly ascending.
    ///
    /// # Errors
    /// Returns [`VolBackError::InvalidParameter`] on out-of-order or
    /// duplicate timestamps.
    pub fn from_sorted(points: Vec<(DateTime<Utc>, T)>) -> Result<Self> {
        for pair in points.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(VolBackError::InvalidParameter {
                    message: format!(
                        "timestamps must be strictly increasing, got {} then {}",
                        pair[0].0, pair[1].0
                    ),
                });
            }
        }
        Ok(Self { points })
    }

    /// Build a series from points in arbitrary order, sorting ascending.
    ///
    /// Ties keep their input order (stable sort); duplicate timestamps are
    /// allowed here and collapse to their mean under [`resample`].
    pub fn from_unordered(mut points: Vec<(DateTime<Utc>, T)>) -> Self {
        points.sort_by_key(|(ts, _)| *ts);
        Self { points }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over `(timestamp, &value)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, &T)> + '_ {
        self.points.iter().map(|(ts, v)| (*ts, v))
    }

    /// The point at position `i`, if any.
    pub fn get(&self, i: usize) -> Option<(DateTime<Utc>, &T)> {
        self.points.get(i).map(|(ts, v)| (*ts, v))
    }

    /// First point in time order.
    pub fn first(&self) -> Option<(DateTime<Utc>, &T)> {
        self.get(0)
    }

    /// Last point in time order.
    pub fn last(&self) -> Option<(DateTime<Utc>, &T)> {
        self.points.last().map(|(ts, v)| (*ts, v))
    }

    /// Iterate over timestamps.
    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.points.iter().map(|(ts, _)| *ts)
    }

    /// Iterate over values.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.points.iter().map(|(_, v)| v)
    }

    /// Drop every point earlier than `start`, keeping points at or after it.
    pub fn filter_from(self, start: DateTime<Utc>) -> Self {
        Self {
            points: self
                .points
                .into_iter()
                .filter(|(ts, _)| *ts >= start)
                .collect(),
        }
    }

    /// Map values, keeping timestamps.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> TimeSeries<U> {
        TimeSeries {
            points: self.points.into_iter().map(|(ts, v)| (ts, f(v))).collect(),
        }
    }
}

impl TimeSeries<f64> {
    /// Build a numeric series from optionally-coerced records, dropping rows
    /// whose value failed coercion, then sorting ascending.
    ///
    /// This is the typed-column-load seam for external loaders: parse each
    /// row's value to `Option<f64>` however you like (benchmark feeds carry
    /// the odd non-numeric entry) and hand the records here.
    pub fn from_records(records: Vec<(DateTime<Utc>, Option<f64>)>) -> Self {
        Self::from_unordered(
            records
                .into_iter()
                .filter_map(|(ts, v)| v.map(|v| (ts, v)))
                .collect(),
        )
    }

    /// Multiply every value by `k`, keeping timestamps.
    pub fn scaled(&self, k: f64) -> Self {
        Self {
            points: self.points.iter().map(|(ts, v)| (*ts, v * k)).collect(),
        }
    }
}

fn bucket_width_ms(bucket: Duration) -> Result<i64> {
    let bucket_ms = bucket.num_milliseconds();
    if bucket_ms <= 0 {
        return Err(VolBackError::InvalidParameter {
            message: format!("bucket width must be positive, got {bucket}"),
        });
    }
    Ok(bucket_ms)
}

/// Average a numeric series into fixed-width, left-closed buckets anchored at
/// the series' own first timestamp (not the wall-clock epoch).
///
/// Each output row sits at its bucket's left edge and holds the mean of the
/// input values that fell inside `[edge, edge + bucket)`. Empty buckets
/// produce no row; downstream joins are inner joins and tolerate the gaps.
/// Resampling an already-resampled series at the same width is a no-op
/// (every bucket is then a singleton).
///
/// # Errors
/// Returns [`VolBackError::InvalidParameter`] if `bucket` is not at least one
/// millisecond.
pub fn resample(series: &TimeSeries<f64>, bucket: Duration) -> Result<TimeSeries<f64>> {
    match series.first() {
        Some((anchor, _)) => resample_anchored(series, bucket, anchor),
        None => {
            bucket_width_ms(bucket)?;
            Ok(TimeSeries::empty())
        }
    }
}

/// Like [`resample`], with the bucket edges anchored at an explicit instant
/// instead of the series' own start.
///
/// Two series resampled at the same width only inner-join if their bucket
/// edges coincide; when their starts differ by a fraction of a bucket, give
/// one of them the other's anchor. Points before the anchor fall into
/// negative bucket indices and keep their own left-closed edges.
///
/// # Errors
/// Returns [`VolBackError::InvalidParameter`] if `bucket` is not at least one
/// millisecond.
pub fn resample_anchored(
    series: &TimeSeries<f64>,
    bucket: Duration,
    anchor: DateTime<Utc>,
) -> Result<TimeSeries<f64>> {
    let bucket_ms = bucket_width_ms(bucket)?;

    let mut out: Vec<(DateTime<Utc>, f64)> = Vec::new();
    let mut current_idx: i64 = 0;
    let mut sum = 0.0;
    let mut count = 0u64;

    for (ts, &value) in series.iter() {
        let idx = (ts - anchor).num_milliseconds().div_euclid(bucket_ms);
        if idx != current_idx && count > 0 {
            out.push((
                anchor + Duration::milliseconds(current_idx * bucket_ms),
                sum / count as f64,
            ));
            sum = 0.0;
            count = 0;
        }
        current_idx = idx;
        sum += value;
        count += 1;
    }
    if count > 0 {
        out.push((
            anchor + Duration::milliseconds(current_idx * bucket_ms),
            sum / count as f64,
        ));
    }

    // Input was sorted, bucket edges are monotone in input order.
    TimeSeries::from_sorted(out)
}

/// Inner join of two series on exact timestamp equality.
///
/// Rows present in only one series are dropped silently. Both inputs are
/// sorted by construction, so this is a single merge pass.
pub fn align<T: Clone, U: Clone>(
    a: &TimeSeries<T>,
    b: &TimeSeries<U>,
) -> TimeSeries<(T, U)> {
    let mut out = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < a.points.len() && j < b.points.len() {
        let (ta, va) = &a.points[i];
        let (tb, vb) = &b.points[j];
        match ta.cmp(tb) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push((*ta, (va.clone(), vb.clone())));
                i += 1;
                j += 1;
            }
        }
    }
    TimeSeries { points: out }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_721_260_800 + secs, 0).unwrap()
    }

    fn series(points: &[(i64, f64)]) -> TimeSeries<f64> {
        TimeSeries::from_sorted(points.iter().map(|&(s, v)| (ts(s), v)).collect()).unwrap()
    }

    // --- Construction ---

    #[test]
    fn from_sorted_rejects_out_of_order() {
        let r = TimeSeries::from_sorted(vec![(ts(10), 1.0), (ts(0), 2.0)]);
        assert!(matches!(r, Err(VolBackError::InvalidParameter { .. })));
    }

    #[test]
    fn from_sorted_rejects_duplicates() {
        let r = TimeSeries::from_sorted(vec![(ts(0), 1.0), (ts(0), 2.0)]);
        assert!(matches!(r, Err(VolBackError::InvalidParameter { .. })));
    }

    #[test]
    fn from_unordered_sorts() {
        let s = TimeSeries::from_unordered(vec![(ts(20), 3.0), (ts(0), 1.0), (ts(10), 2.0)]);
        let vals: Vec<f64> = s.values().copied().collect();
        assert_eq!(vals, vec![1.0, 2.0, 3.0]);
        assert_eq!(s.first().unwrap().0, ts(0));
        assert_eq!(s.last().unwrap().0, ts(20));
    }

    #[test]
    fn from_records_drops_uncoerced_rows_and_sorts() {
        let s = TimeSeries::from_records(vec![
            (ts(10), Some(2.0)),
            (ts(0), Some(1.0)),
            (ts(5), None),
        ]);
        assert_eq!(s.len(), 2);
        let vals: Vec<f64> = s.values().copied().collect();
        assert_eq!(vals, vec![1.0, 2.0]);
    }

    #[test]
    fn filter_from_is_inclusive() {
        let s = series(&[(0, 1.0), (10, 2.0), (20, 3.0)]).filter_from(ts(10));
        assert_eq!(s.len(), 2);
        assert_eq!(s.first().unwrap().0, ts(10));
    }

    // --- Resampling ---

    #[test]
    fn resample_averages_within_buckets() {
        // 60s buckets anchored at t=0: [0,60) holds 1.0 and 3.0, [60,120) holds 5.0.
        let s = series(&[(0, 1.0), (30, 3.0), (60, 5.0)]);
        let r = resample(&s, Duration::seconds(60)).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(0).unwrap().0, ts(0));
        assert_abs_diff_eq!(*r.get(0).unwrap().1, 2.0);
        assert_eq!(r.get(1).unwrap().0, ts(60));
        assert_abs_diff_eq!(*r.get(1).unwrap().1, 5.0);
    }

    #[test]
    fn resample_anchors_at_series_start_not_epoch() {
        // Start at t=45: bucket edges are 45, 105, ... regardless of clock minutes.
        let s = series(&[(45, 1.0), (100, 3.0), (105, 5.0)]);
        let r = resample(&s, Duration::seconds(60)).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(0).unwrap().0, ts(45));
        assert_abs_diff_eq!(*r.get(0).unwrap().1, 2.0);
        assert_eq!(r.get(1).unwrap().0, ts(105));
    }

    #[test]
    fn resample_skips_empty_buckets() {
        let s = series(&[(0, 1.0), (200, 2.0)]);
        let r = resample(&s, Duration::seconds(60)).unwrap();
        // Buckets 1 and 2 are empty and produce no rows.
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(1).unwrap().0, ts(180));
    }

    #[test]
    fn resample_idempotent_at_same_width() {
        let s = series(&[(0, 1.0), (10, 2.0), (70, 4.0), (130, 8.0), (140, 10.0)]);
        let once = resample(&s, Duration::seconds(60)).unwrap();
        let twice = resample(&once, Duration::seconds(60)).unwrap();
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.0, b.0);
            assert_abs_diff_eq!(*a.1, *b.1, epsilon = 1e-12);
        }
    }

    #[test]
    fn resample_empty_series() {
        let r = resample(&TimeSeries::empty(), Duration::seconds(60)).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn resample_rejects_non_positive_bucket() {
        let s = series(&[(0, 1.0)]);
        assert!(resample(&s, Duration::seconds(0)).is_err());
        assert!(resample(&s, Duration::seconds(-5)).is_err());
    }

    #[test]
    fn resample_anchored_uses_the_foreign_grid() {
        // Series starts mid-bucket relative to the anchor; edges still sit on
        // the anchor's grid, so a join against an anchor-aligned series works.
        let s = series(&[(70, 1.0), (80, 3.0), (130, 5.0)]);
        let r = resample_anchored(&s, Duration::seconds(60), ts(0)).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(0).unwrap().0, ts(60));
        assert_abs_diff_eq!(*r.get(0).unwrap().1, 2.0);
        assert_eq!(r.get(1).unwrap().0, ts(120));
        assert_abs_diff_eq!(*r.get(1).unwrap().1, 5.0);
    }

    #[test]
    fn resample_anchored_handles_points_before_the_anchor() {
        let s = series(&[(-70, 2.0), (10, 4.0)]);
        let r = resample_anchored(&s, Duration::seconds(60), ts(0)).unwrap();
        assert_eq!(r.len(), 2);
        // [-120, -60) holds -70; [0, 60) holds 10.
        assert_eq!(r.get(0).unwrap().0, ts(-120));
        assert_eq!(r.get(1).unwrap().0, ts(0));
    }

    #[test]
    fn resample_averages_duplicate_timestamps() {
        let s = TimeSeries::from_unordered(vec![(ts(0), 1.0), (ts(0), 3.0)]);
        let r = resample(&s, Duration::seconds(60)).unwrap();
        assert_eq!(r.len(), 1);
        assert_abs_diff_eq!(*r.get(0).unwrap().1, 2.0);
    }

    // --- Alignment ---

    #[test]
    fn align_inner_joins_on_exact_timestamps() {
        let a = series(&[(0, 1.0), (60, 2.0), (120, 3.0)]);
        let b = series(&[(60, 20.0), (120, 30.0), (180, 40.0)]);
        let joined = align(&a, &b);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.get(0).unwrap().0, ts(60));
        assert_eq!(*joined.get(0).unwrap().1, (2.0, 20.0));
        assert_eq!(*joined.get(1).unwrap().1, (3.0, 30.0));
    }

    #[test]
    fn align_disjoint_is_empty() {
        let a = series(&[(0, 1.0), (60, 2.0)]);
        let b = series(&[(30, 9.0), (90, 9.0)]);
        assert!(align(&a, &b).is_empty());
    }

    // --- Serde ---

    #[test]
    fn serde_round_trip() {
        let s = series(&[(0, 1.5), (60, 2.5)]);
        let json = serde_json::to_string(&s).unwrap();
        let back: TimeSeries<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(s, back);
    }
}
