//! Contiguity tracking for watermark advancement.

use std::{collections::BTreeSet, sync::Mutex};

/// Tracks which heights have been committed and where the contiguous prefix
/// ends.
///
/// Workers commit heights in arbitrary order; the watermark only moves when
/// every height from the origin up to it is present. The tracker holds the
/// out-of-order committed set until the prefix catches up.
#[derive(Debug)]
pub struct WatermarkTracker {
    state: Mutex<TrackerState>,
}

#[derive(Debug)]
struct TrackerState {
    origin: u64,
    next: u64,
    pending: BTreeSet<u64>,
}

impl WatermarkTracker {
    /// Creates a tracker expecting `origin` as the first height.
    pub fn new(origin: u64) -> Self {
        Self { state: Mutex::new(TrackerState { origin, next: origin, pending: BTreeSet::new() }) }
    }

    /// Resets the tracker to a new origin, discarding pending heights.
    pub fn reset(&self, origin: u64) {
        let mut state = self.state.lock().unwrap();
        state.origin = origin;
        state.next = origin;
        state.pending.clear();
    }

    /// Marks already-present heights discovered at startup.
    pub fn seed(&self, heights: impl IntoIterator<Item = u64>) {
        let mut state = self.state.lock().unwrap();
        for height in heights {
            if height >= state.next {
                state.pending.insert(height);
            }
        }
        Self::advance(&mut state);
    }

    /// Records a committed height. Returns the new watermark when the
    /// contiguous prefix advanced.
    pub fn record(&self, height: u64) -> Option<u64> {
        let mut state = self.state.lock().unwrap();
        if height < state.next {
            return None;
        }
        state.pending.insert(height);
        if Self::advance(&mut state) {
            Some(state.next - 1)
        } else {
            None
        }
    }

    /// The current contiguous watermark, if anything was committed.
    pub fn watermark(&self) -> Option<u64> {
        let state = self.state.lock().unwrap();
        (state.next > state.origin).then(|| state.next - 1)
    }

    /// How many committed heights are waiting on an earlier gap.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    fn advance(state: &mut TrackerState) -> bool {
        let mut moved = false;
        while state.pending.remove(&state.next) {
            state.next += 1;
            moved = true;
        }
        moved
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn watermark_waits_for_the_prefix() {
        let tracker = WatermarkTracker::new(0);
        assert_eq!(tracker.record(2), None);
        assert_eq!(tracker.record(1), None);
        assert_eq!(tracker.watermark(), None);
        // Height 0 closes the gap and releases everything at once.
        assert_eq!(tracker.record(0), Some(2));
        assert_eq!(tracker.watermark(), Some(2));
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    fn seeding_existing_heights_counts_toward_contiguity() {
        let tracker = WatermarkTracker::new(3);
        tracker.seed([5, 6]);
        assert_eq!(tracker.watermark(), None);
        assert_eq!(tracker.record(3), None);
        assert_eq!(tracker.record(4), Some(6));
    }

    #[test]
    fn duplicate_and_stale_records_are_ignored() {
        let tracker = WatermarkTracker::new(0);
        assert_eq!(tracker.record(0), Some(0));
        assert_eq!(tracker.record(0), None);
        assert_eq!(tracker.watermark(), Some(0));
    }

    #[test]
    fn nonzero_origin_reports_no_watermark_until_first_commit() {
        let tracker = WatermarkTracker::new(10);
        assert_eq!(tracker.watermark(), None);
        assert_eq!(tracker.record(10), Some(10));
    }
}
