//! Closed intervals over block numbers or timestamps, and the set operations
//! the planner is built on.
//!
//! Every operation validates its inputs: a range with `from > to` is reported
//! as a [`RangeError`], never reordered or dropped.

use std::fmt::{Debug, Display, Formatter};

use alloy::primitives::BlockNumber;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A totally ordered, discrete value a [`Range`] can be built over.
pub trait RangeValue: Copy + Ord + Debug + Display + Send + Sync + 'static {
    /// Number of steps from `from` to `to`. Zero when `to <= from`.
    fn units_between(from: Self, to: Self) -> u64;

    /// `units` steps later, saturating at the maximum value.
    fn plus(self, units: u64) -> Self;

    /// `units` steps earlier, saturating at the minimum value.
    fn minus(self, units: u64) -> Self;

    fn next(self) -> Self {
        self.plus(1)
    }

    fn prev(self) -> Self {
        self.minus(1)
    }
}

impl RangeValue for BlockNumber {
    fn units_between(from: Self, to: Self) -> u64 {
        to.saturating_sub(from)
    }

    fn plus(self, units: u64) -> Self {
        self.saturating_add(units)
    }

    fn minus(self, units: u64) -> Self {
        self.saturating_sub(units)
    }
}

// millisecond resolution
impl RangeValue for DateTime<Utc> {
    fn units_between(from: Self, to: Self) -> u64 {
        (to - from).num_milliseconds().max(0) as u64
    }

    fn plus(self, units: u64) -> Self {
        i64::try_from(units)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|delta| self.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn minus(self, units: u64) -> Self {
        i64::try_from(units)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .and_then(|delta| self.checked_sub_signed(delta))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid range: from {from} is after to {to}")]
pub struct RangeError {
    pub from: String,
    pub to: String,
}

/// Closed interval `[from, to]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range<T> {
    pub from: T,
    pub to: T,
}

impl<T: Debug> Debug for Range<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}, {:?}]", self.from, self.to)
    }
}

impl<T: Display> Display for Range<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

impl<T: RangeValue> Range<T> {
    pub fn new(from: T, to: T) -> Result<Self, RangeError> {
        let range = Self { from, to };
        range.validate()?;
        Ok(range)
    }

    pub fn is_valid(&self) -> bool {
        self.from <= self.to
    }

    pub fn validate(&self) -> Result<(), RangeError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(RangeError { from: self.from.to_string(), to: self.to.to_string() })
        }
    }

    /// `to - from + 1`
    pub fn len(&self) -> u64 {
        T::units_between(self.from, self.to).saturating_add(1)
    }

    pub fn contains(&self, value: T) -> bool {
        self.from <= value && value <= self.to
    }

    pub fn covers(&self, other: &Range<T>) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    pub fn intersect(&self, other: &Range<T>) -> Option<Range<T>> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        (from <= to).then_some(Range { from, to })
    }

    /// Chops the range into consecutive chunks of at most `max_len` values,
    /// starting from `to`: the most recent chunk comes first and is always
    /// full, the oldest one may be shorter.
    pub fn split_from_end(&self, max_len: u64) -> Vec<Range<T>> {
        let max_len = max_len.max(1);
        let mut chunks = Vec::new();
        let mut to = self.to;
        loop {
            let remaining = T::units_between(self.from, to);
            if remaining < max_len {
                chunks.push(Range { from: self.from, to });
                break;
            }
            let from = to.minus(max_len - 1);
            chunks.push(Range { from, to });
            to = from.prev();
        }
        chunks
    }
}

pub fn validate_all<T: RangeValue>(ranges: &[Range<T>]) -> Result<(), RangeError> {
    ranges.iter().try_for_each(Range::validate)
}

/// Sorts by `from` and coalesces overlapping or adjacent ranges.
pub fn ranges_merge<T: RangeValue>(ranges: &[Range<T>]) -> Result<Vec<Range<T>>, RangeError> {
    validate_all(ranges)?;

    let mut sorted = ranges.to_vec();
    sorted.sort_by(|a, b| a.from.cmp(&b.from).then(a.to.cmp(&b.to)));

    let mut merged: Vec<Range<T>> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(current) if range.from <= current.to.next() => {
                current.to = current.to.max(range.to);
            }
            _ => merged.push(range),
        }
    }
    Ok(merged)
}

/// `base` minus the union of `subtract`, sorted and disjoint.
pub fn range_exclude<T: RangeValue>(
    base: &Range<T>,
    subtract: &[Range<T>],
) -> Result<Vec<Range<T>>, RangeError> {
    base.validate()?;
    let subtract = ranges_merge(subtract)?;

    let mut remaining = Vec::new();
    let mut cursor = base.from;
    let mut exhausted = false;
    for hole in subtract {
        if hole.to < cursor {
            continue;
        }
        if hole.from > base.to {
            break;
        }
        if hole.from > cursor {
            remaining.push(Range { from: cursor, to: hole.from.prev() });
        }
        if hole.to >= base.to {
            exhausted = true;
            break;
        }
        cursor = hole.to.next();
    }
    if !exhausted && cursor <= base.to {
        remaining.push(Range { from: cursor, to: base.to });
    }
    Ok(remaining)
}

/// Every range of `base` minus the union of `subtract`, merged.
pub fn ranges_exclude<T: RangeValue>(
    base: &[Range<T>],
    subtract: &[Range<T>],
) -> Result<Vec<Range<T>>, RangeError> {
    let mut remaining = Vec::new();
    for range in ranges_merge(base)? {
        remaining.extend(range_exclude(&range, subtract)?);
    }
    Ok(remaining)
}

/// Pairwise intersections of `a` and `b`, merged. Disjoint pairs are dropped.
pub fn ranges_intersect<T: RangeValue>(
    a: &[Range<T>],
    b: &[Range<T>],
) -> Result<Vec<Range<T>>, RangeError> {
    validate_all(a)?;
    validate_all(b)?;

    let intersections: Vec<Range<T>> =
        a.iter().flat_map(|left| b.iter().filter_map(|right| left.intersect(right))).collect();
    ranges_merge(&intersections)
}

/// Chops every range into consecutive chunks of at most `max_len` values,
/// oldest first. The last chunk of each range may be shorter.
pub fn ranges_split_to_max_length<T: RangeValue>(
    ranges: &[Range<T>],
    max_len: u64,
) -> Result<Vec<Range<T>>, RangeError> {
    validate_all(ranges)?;
    let max_len = max_len.max(1);

    let mut chunks = Vec::new();
    for range in ranges {
        let mut from = range.from;
        loop {
            if T::units_between(from, range.to) < max_len {
                chunks.push(Range { from, to: range.to });
                break;
            }
            let to = from.plus(max_len - 1);
            chunks.push(Range { from, to });
            from = to.next();
        }
    }
    Ok(chunks)
}

/// The `[min(from), max(to)]` envelope, `None` for an empty input.
pub fn ranges_covering<T: RangeValue>(
    ranges: &[Range<T>],
) -> Result<Option<Range<T>>, RangeError> {
    validate_all(ranges)?;

    let from = ranges.iter().map(|r| r.from).min();
    let to = ranges.iter().map(|r| r.to).max();
    Ok(from.zip(to).map(|(from, to)| Range { from, to }))
}

/// Sum of lengths, overlaps counted twice.
pub fn ranges_len<T: RangeValue>(ranges: &[Range<T>]) -> u64 {
    ranges.iter().map(Range::len).fold(0, u64::saturating_add)
}
