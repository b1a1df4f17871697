use crate::range::{Range, RangeError, RangeValue, ranges_merge};

/// Merges every object's needed ranges into as few disjoint blobs as
/// possible, then slices each blob into windows of `vertical_slices_size`.
///
/// Blobs separated by a gap of at most `merge_if_closer_than` values are
/// joined so nearly contiguous history is fetched in one go, while distant
/// gaps (a recent week vs. an ancient backfill) stay apart. Windows are cut
/// from the end of each blob; the result is sorted oldest first.
pub fn build_range_index<T: RangeValue>(
    ranges_per_object: &[Vec<Range<T>>],
    merge_if_closer_than: u64,
    vertical_slices_size: u64,
) -> Result<Vec<Range<T>>, RangeError> {
    let all: Vec<Range<T>> = ranges_per_object.iter().flatten().copied().collect();

    let mut blobs: Vec<Range<T>> = Vec::new();
    for range in ranges_merge(&all)? {
        match blobs.last_mut() {
            // merged ranges are disjoint and non adjacent, so the gap is >= 1
            Some(blob) if T::units_between(blob.to, range.from) - 1 <= merge_if_closer_than => {
                blob.to = range.to;
            }
            _ => blobs.push(range),
        }
    }

    let mut slices: Vec<Range<T>> =
        blobs.iter().flat_map(|blob| blob.split_from_end(vertical_slices_size)).collect();
    slices.sort_by_key(|slice| slice.from);
    Ok(slices)
}
