use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::range::{Range, RangeError, RangeValue, range_exclude, ranges_merge, validate_all};

/// Import progress of one tracked object.
///
/// `covered_ranges` is always sorted and pairwise disjoint. `to_retry` may
/// overlap it: a span covered by one attempt and flagged by another failed
/// attempt is fetched again. `to_retry` and `archive_retry` are each merged
/// and never share a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportState<T> {
    pub full_range: Range<T>,
    pub covered_ranges: Vec<Range<T>>,
    pub to_retry: Vec<Range<T>>,
    /// Failed because the provider prunes history. Only retried once the
    /// chain is served by an archive node.
    #[serde(default = "Vec::new")]
    pub archive_retry: Vec<Range<T>>,
    /// Objects imported least recently are planned first.
    pub last_import_date: Option<DateTime<Utc>>,
}

/// What happened to one range of an object during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    Imported,
    Failed,
    NeedsArchiveNode,
}

impl<T: RangeValue> ImportState<T> {
    pub fn new(full_range: Range<T>) -> Self {
        Self {
            full_range,
            covered_ranges: vec![],
            to_retry: vec![],
            archive_retry: vec![],
            last_import_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), RangeError> {
        self.full_range.validate()?;
        validate_all(&self.covered_ranges)?;
        validate_all(&self.to_retry)?;
        validate_all(&self.archive_retry)
    }

    /// Parts of the full range neither covered nor waiting for a retry,
    /// oldest first.
    pub fn needed(&self) -> Result<Vec<Range<T>>, RangeError> {
        let mut known = self.covered_ranges.clone();
        known.extend_from_slice(&self.to_retry);
        known.extend_from_slice(&self.archive_retry);
        range_exclude(&self.full_range, &known)
    }

    pub fn record_success(&mut self, range: Range<T>) -> Result<(), RangeError> {
        range.validate()?;

        let mut covered = self.covered_ranges.clone();
        covered.push(range);
        self.covered_ranges = ranges_merge(&covered)?;

        self.to_retry = without(&self.to_retry, &range)?;
        self.archive_retry = without(&self.archive_retry, &range)?;
        Ok(())
    }

    /// Leaves `covered_ranges` alone. The failed span replaces whatever
    /// retry entries it overlaps, so a retry range re-cut into different
    /// slices by a later plan is still stored once.
    pub fn record_failure(&mut self, range: Range<T>) -> Result<(), RangeError> {
        range.validate()?;
        self.archive_retry = without(&self.archive_retry, &range)?;
        self.to_retry = with(&self.to_retry, range)?;
        Ok(())
    }

    /// Parks `range` until an archive node is available.
    pub fn record_archive_failure(&mut self, range: Range<T>) -> Result<(), RangeError> {
        range.validate()?;
        self.to_retry = without(&self.to_retry, &range)?;
        self.archive_retry = with(&self.archive_retry, range)?;
        Ok(())
    }

    pub fn record(&mut self, range: Range<T>, outcome: RangeOutcome) -> Result<(), RangeError> {
        match outcome {
            RangeOutcome::Imported => self.record_success(range),
            RangeOutcome::Failed => self.record_failure(range),
            RangeOutcome::NeedsArchiveNode => self.record_archive_failure(range),
        }
    }

    pub fn record_outcome(&mut self, range: Range<T>, success: bool) -> Result<(), RangeError> {
        if success { self.record_success(range) } else { self.record_failure(range) }
    }

    /// The state as the optimizer should see it. With an archive node the
    /// parked ranges are retried along with the others.
    pub fn for_planning(&self, archive_node: bool) -> Result<Self, RangeError> {
        let mut state = self.clone();
        if archive_node && !state.archive_retry.is_empty() {
            let mut to_retry = std::mem::take(&mut state.archive_retry);
            to_retry.extend_from_slice(&state.to_retry);
            state.to_retry = ranges_merge(&to_retry)?;
        }
        Ok(state)
    }

    /// Grows the full range up to `head`; never shrinks it.
    pub fn extend_to(&mut self, head: T) {
        self.full_range.to = self.full_range.to.max(head);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_import_date = Some(now);
    }

    pub fn is_complete(&self) -> Result<bool, RangeError> {
        Ok(self.to_retry.is_empty() && self.archive_retry.is_empty() && self.needed()?.is_empty())
    }
}

fn with<T: RangeValue>(ranges: &[Range<T>], range: Range<T>) -> Result<Vec<Range<T>>, RangeError> {
    let mut all = ranges.to_vec();
    all.push(range);
    ranges_merge(&all)
}

fn without<T: RangeValue>(ranges: &[Range<T>], range: &Range<T>) -> Result<Vec<Range<T>>, RangeError> {
    let mut remaining = Vec::with_capacity(ranges.len());
    for entry in ranges {
        remaining.extend(range_exclude(entry, std::slice::from_ref(range))?);
    }
    Ok(remaining)
}
