//! Free-slot search over a set of busy intervals.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub type BusyInterval = Interval;
pub type FreeSlot = Interval;

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Open-interval overlap: touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Parameters of one free-slot search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSlotQuery {
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    pub slot: Duration,
    pub step: Duration,
}

impl FreeSlotQuery {
    pub fn new(
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        slot: Duration,
        step: Duration,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(slot > Duration::zero(), "slot duration must be positive");
        anyhow::ensure!(step > Duration::zero(), "step must be positive");
        Ok(Self {
            range_start,
            range_end,
            slot,
            step,
        })
    }
}

/// Walk a cursor from `range_start` in `step` increments and emit every
/// candidate `[cursor, cursor + slot)` that overlaps no busy interval and
/// ends within the range.
///
/// Candidates may overlap each other when `step < slot`.
pub fn compute_free_slots(busy: &[BusyInterval], query: &FreeSlotQuery) -> Vec<FreeSlot> {
    let mut slots = Vec::new();
    let mut cursor = query.range_start;

    while cursor < query.range_end {
        let candidate = Interval::new(cursor, cursor + query.slot);
        let is_busy = busy.iter().any(|b| candidate.overlaps(b));
        if !is_busy && candidate.end <= query.range_end {
            slots.push(candidate);
        }
        cursor += query.step;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap()
    }

    fn query(start: DateTime<Utc>, end: DateTime<Utc>, slot: i64, step: i64) -> FreeSlotQuery {
        FreeSlotQuery::new(start, end, Duration::minutes(slot), Duration::minutes(step)).unwrap()
    }

    fn starts(slots: &[FreeSlot]) -> Vec<DateTime<Utc>> {
        slots.iter().map(|s| s.start).collect()
    }

    #[test]
    fn busy_half_hour_blocks_overlapping_candidates() {
        let busy = [Interval::new(at(10, 0), at(10, 30))];
        let slots = compute_free_slots(&busy, &query(at(9, 0), at(11, 30), 60, 30));
        // 09:00-10:00 only touches the busy start, so it stays free.
        assert_eq!(starts(&slots), vec![at(9, 0), at(10, 30)]);
        assert!(!starts(&slots).contains(&at(9, 30)));
        assert!(!starts(&slots).contains(&at(10, 0)));
        assert!(!starts(&slots).contains(&at(8, 30)));
    }

    #[test]
    fn candidate_past_range_end_is_dropped() {
        let busy = [Interval::new(at(10, 0), at(10, 30))];
        let slots = compute_free_slots(&busy, &query(at(9, 0), at(11, 0), 60, 30));
        assert_eq!(starts(&slots), vec![at(9, 0)]);
    }

    #[test]
    fn empty_calendar_yields_overlapping_candidates() {
        let slots = compute_free_slots(&[], &query(at(9, 0), at(11, 0), 60, 30));
        assert_eq!(starts(&slots), vec![at(9, 0), at(9, 30), at(10, 0)]);
        assert!(slots[0].overlaps(&slots[1]));
    }

    #[test]
    fn fully_busy_range_has_no_slots() {
        let busy = [Interval::new(at(8, 0), at(18, 0))];
        assert!(compute_free_slots(&busy, &query(at(9, 0), at(17, 0), 30, 30)).is_empty());
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(compute_free_slots(&[], &query(at(12, 0), at(9, 0), 30, 30)).is_empty());
    }

    #[test]
    fn slots_avoid_busy_and_stay_in_range() {
        let busy = [
            Interval::new(at(9, 10), at(9, 40)),
            Interval::new(at(11, 0), at(12, 15)),
            Interval::new(at(13, 45), at(14, 0)),
        ];
        let q = query(at(8, 0), at(16, 0), 45, 15);
        let slots = compute_free_slots(&busy, &q);
        assert!(!slots.is_empty());
        for slot in &slots {
            assert!(slot.start >= q.range_start && slot.end <= q.range_end);
            assert_eq!(slot.end - slot.start, q.slot);
            assert!(busy.iter().all(|b| !slot.overlaps(b)), "{slot:?} overlaps busy time");
        }
        assert!(slots.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn non_positive_durations_are_rejected() {
        assert!(FreeSlotQuery::new(at(9, 0), at(10, 0), Duration::zero(), Duration::minutes(30)).is_err());
        assert!(FreeSlotQuery::new(at(9, 0), at(10, 0), Duration::minutes(30), Duration::minutes(-5)).is_err());
    }

    #[test]
    fn slots_serialize_as_rfc3339() {
        let v = serde_json::to_value(Interval::new(at(9, 0), at(10, 0))).unwrap();
        assert_eq!(v["start"], "2024-05-01T09:00:00Z");
        assert_eq!(v["end"], "2024-05-01T10:00:00Z");
    }
}
