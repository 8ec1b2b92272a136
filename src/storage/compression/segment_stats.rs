//! Per-column running min/max, built up while a segment is compressed and
//! persisted alongside the segment so that a query's `WHERE` clause can
//! prune whole segments without decompressing them.

use crate::storage::compression::registry::{datum_partial_cmp, Datum};
use std::cmp::Ordering;

/// Anything a segment's min/max can be tracked over. `PartialOrd` rather than
/// `Ord` because `f32`/`f64` don't implement it, and NaN is simply skipped
/// (it never participates in the comparison, matching SQL `MIN`/`MAX`).
pub trait SegmentStatValue: Copy {
    fn partial_compare(&self, other: &Self) -> Option<Ordering>;
}

/// Lets the row compressor track one builder per `ORDER BY` column without
/// knowing each column's concrete Rust type up front.
impl SegmentStatValue for Datum {
    fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        datum_partial_cmp(self, other)
    }
}

macro_rules! impl_stat_value_ord {
    ($($t:ty),*) => {
        $(impl SegmentStatValue for $t {
            fn partial_compare(&self, other: &Self) -> Option<Ordering> {
                Some(Ord::cmp(self, other))
            }
        })*
    };
}

macro_rules! impl_stat_value_partial_ord {
    ($($t:ty),*) => {
        $(impl SegmentStatValue for $t {
            fn partial_compare(&self, other: &Self) -> Option<Ordering> {
                PartialOrd::partial_cmp(self, other)
            }
        })*
    };
}

impl_stat_value_ord!(i16, i32, i64);
impl_stat_value_partial_ord!(f32, f64);

/// Tracks the min and max seen across a column's values within one segment.
/// Nulls don't update it; an all-null column (or an empty segment) leaves it
/// empty, which the caller encodes by omitting the min/max entry entirely.
#[derive(Debug, Clone, Copy)]
pub struct SegmentStatsBuilder<T> {
    bounds: Option<(T, T)>,
}

impl<T: SegmentStatValue> SegmentStatsBuilder<T> {
    pub fn new() -> Self {
        Self { bounds: None }
    }

    pub fn observe(&mut self, value: T) {
        self.bounds = Some(match self.bounds {
            None => (value, value),
            Some((min, max)) => {
                let min = match value.partial_compare(&min) {
                    Some(Ordering::Less) => value,
                    _ => min,
                };
                let max = match value.partial_compare(&max) {
                    Some(Ordering::Greater) => value,
                    _ => max,
                };
                (min, max)
            }
        });
    }

    pub fn observe_null(&mut self) {}

    pub fn has_any(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn min(&self) -> Option<T> {
        self.bounds.map(|(min, _)| min)
    }

    pub fn max(&self) -> Option<T> {
        self.bounds.map(|(_, max)| max)
    }

    pub fn finish(self) -> Option<(T, T)> {
        self.bounds
    }
}

impl<T: SegmentStatValue> Default for SegmentStatsBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_min_max() {
        let mut s = SegmentStatsBuilder::<i64>::new();
        for v in [5, -3, 100, 2] {
            s.observe(v);
        }
        assert_eq!(s.finish(), Some((-3, 100)));
    }

    #[test]
    fn test_empty_has_no_bounds() {
        let s = SegmentStatsBuilder::<i32>::new();
        assert!(!s.has_any());
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn test_nulls_do_not_affect_bounds() {
        let mut s = SegmentStatsBuilder::<f64>::new();
        s.observe(1.5);
        s.observe_null();
        s.observe(-2.5);
        assert_eq!(s.finish(), Some((-2.5, 1.5)));
    }

    #[test]
    fn test_nan_does_not_update_bounds() {
        let mut s = SegmentStatsBuilder::<f64>::new();
        s.observe(1.0);
        s.observe(f64::NAN);
        s.observe(2.0);
        assert_eq!(s.finish(), Some((1.0, 2.0)));
    }

    #[test]
    fn test_datum_tracks_min_max_across_type_erased_values() {
        let mut s = SegmentStatsBuilder::<Datum>::new();
        for v in [Datum::I64(5), Datum::I64(-3), Datum::I64(100), Datum::I64(2)] {
            s.observe(v);
        }
        assert_eq!(s.finish(), Some((Datum::I64(-3), Datum::I64(100))));
    }
}
