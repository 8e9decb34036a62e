use chrono::NaiveTime;

use crate::models::{AvailabilityError, Interval};

/// Ordered, pairwise-disjoint intervals for one weekday.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrates a stored sequence, rejecting anything out of order or overlapping.
    pub fn from_sorted(intervals: Vec<Interval>) -> Result<Self, AvailabilityError> {
        for interval in &intervals {
            if interval.from >= interval.to {
                return Err(AvailabilityError::Corrupt(format!(
                    "empty interval {}-{}", interval.from, interval.to
                )));
            }
        }
        for pair in intervals.windows(2) {
            if pair[0].to > pair[1].from {
                return Err(AvailabilityError::Corrupt(format!(
                    "intervals {}-{} and {}-{} are unordered or overlapping",
                    pair[0].from, pair[0].to, pair[1].from, pair[1].to
                )));
            }
        }
        Ok(Self { intervals })
    }

    pub fn insert(&mut self, interval: Interval) -> Result<(), AvailabilityError> {
        let idx = self.intervals.partition_point(|existing| existing.from < interval.from);

        // Only the neighbours can intersect an ordered, disjoint sequence
        let clashes_before = idx > 0 && self.intervals[idx - 1].to > interval.from;
        let clashes_after = idx < self.intervals.len() && self.intervals[idx].from < interval.to;

        if clashes_before || clashes_after {
            return Err(AvailabilityError::Overlap { from: interval.from, to: interval.to });
        }

        self.intervals.insert(idx, interval);
        Ok(())
    }

    pub fn remove(&mut self, from: NaiveTime) -> bool {
        match self.intervals.binary_search_by(|existing| existing.from.cmp(&from)) {
            Ok(idx) => {
                self.intervals.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains_range(&self, from: NaiveTime, to: NaiveTime) -> bool {
        if from >= to {
            return false;
        }
        // Last interval starting at or before `from`
        let idx = self.intervals.partition_point(|existing| existing.from <= from);
        idx > 0 && self.intervals[idx - 1].covers(from, to)
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn into_vec(self) -> Vec<Interval> {
        self.intervals
    }
}
