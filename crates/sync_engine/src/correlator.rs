//! Generic N-ary time correlator.
//!
//! One correlator serves every synchronization shape: it is parameterized by
//! an ordered list of line descriptors instead of one type per combination.
//! Each arrival is the pivot of a match attempt against all other lines.

use contracts::{LineId, TimestampedItem};
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

use crate::buffer::{LineBuffer, Slot};

/// Matching policy across lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Timestamps must be bit-identical
    Exact,
    /// Closest buffered item on every other line; buffer depth bounds the window
    Closest,
}

impl MatchPolicy {
    pub fn from_tolerant(tolerant: bool) -> Self {
        if tolerant {
            Self::Closest
        } else {
            Self::Exact
        }
    }
}

/// One input line of a correlator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpec {
    pub line: LineId,
    /// Required lines gate emission; optional lines are attached when a match exists
    pub required: bool,
}

impl LineSpec {
    pub fn required(line: LineId) -> Self {
        Self {
            line,
            required: true,
        }
    }

    pub fn optional(line: LineId) -> Self {
        Self {
            line,
            required: false,
        }
    }
}

/// One emitted group, one slot per declared line (in declaration order)
#[derive(Debug)]
pub struct AlignedTuple<T> {
    slots: Vec<(LineId, Option<TimestampedItem<T>>)>,
}

impl<T> AlignedTuple<T> {
    /// Degenerate one-slot tuple (direct shapes)
    pub fn single(item: TimestampedItem<T>) -> Self {
        Self {
            slots: vec![(item.line(), Some(item))],
        }
    }

    /// Move the item of `line` out of the tuple
    pub fn take(&mut self, line: LineId) -> Option<TimestampedItem<T>> {
        self.slots
            .iter_mut()
            .find(|(l, _)| *l == line)
            .and_then(|(_, item)| item.take())
    }

    pub fn get(&self, line: LineId) -> Option<&TimestampedItem<T>> {
        self.slots
            .iter()
            .find(|(l, _)| *l == line)
            .and_then(|(_, item)| item.as_ref())
    }

    /// Stamps of the filled slots
    pub fn stamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.slots
            .iter()
            .filter_map(|(_, item)| item.as_ref().map(|i| i.stamp()))
    }

    /// Number of filled slots
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|(_, item)| item.is_some()).count()
    }
}

/// N-way time aligner over bounded per-line buffers
#[derive(Debug)]
pub struct Correlator<T> {
    policy: MatchPolicy,
    lines: Vec<LineSpec>,
    buffers: Vec<LineBuffer<T>>,
    emitted: u64,
}

impl<T> Correlator<T> {
    /// Create a correlator; every line buffers at most `capacity` items
    pub fn new(lines: Vec<LineSpec>, policy: MatchPolicy, capacity: usize) -> Self {
        let buffers = lines.iter().map(|_| LineBuffer::new(capacity)).collect();
        Self {
            policy,
            lines,
            buffers,
            emitted: 0,
        }
    }

    /// Buffer an arrival and try to emit one aligned tuple around it.
    ///
    /// Never fails: no match simply means "no emission yet". Items on lines
    /// the correlator does not know are ignored.
    #[instrument(
        level = "trace",
        name = "correlator_ingest",
        skip(self, item),
        fields(line = %item.line(), stamp = item.stamp())
    )]
    pub fn ingest(&mut self, item: TimestampedItem<T>) -> Option<AlignedTuple<T>> {
        let Some(pivot_idx) = self.lines.iter().position(|spec| spec.line == item.line()) else {
            trace!(line = %item.line(), "item on undeclared line ignored");
            return None;
        };
        let stamp = item.stamp();
        let line = item.line();

        if let Some(evicted) = self.buffers[pivot_idx].push(item) {
            trace!(line = %line, evicted_stamp = evicted.stamp(), "buffer full, oldest item evicted");
            observability::record_item_evicted(line);
        }

        // Optional lines never trigger an emission on their own
        if !self.lines[pivot_idx].required {
            return None;
        }

        let pivot = self.buffers[pivot_idx].newest()?;
        let mut picks: Vec<Option<Slot>> = vec![None; self.lines.len()];
        picks[pivot_idx] = Some(pivot);

        for (idx, spec) in self.lines.iter().enumerate() {
            if idx == pivot_idx {
                continue;
            }
            let found = match self.policy {
                MatchPolicy::Exact => self.buffers[idx].find_exact(stamp),
                MatchPolicy::Closest => self.buffers[idx].find_closest(stamp),
            };
            if found.is_none() && spec.required {
                return None;
            }
            picks[idx] = found;
        }

        let slots = picks
            .into_iter()
            .enumerate()
            .map(|(idx, pick)| {
                let item = pick.and_then(|slot| self.buffers[idx].take(slot));
                (self.lines[idx].line, item)
            })
            .collect();

        self.emitted += 1;
        Some(AlignedTuple { slots })
    }

    /// Drop every buffered item on every line
    pub fn flush(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn lines(&self) -> &[LineSpec] {
        &self.lines
    }

    /// Items currently buffered on `line`
    pub fn buffered(&self, line: LineId) -> usize {
        self.lines
            .iter()
            .position(|spec| spec.line == line)
            .map(|idx| self.buffers[idx].len())
            .unwrap_or(0)
    }

    /// Items evicted across all lines
    pub fn evicted_count(&self) -> u64 {
        self.buffers.iter().map(|b| b.evicted_count()).sum()
    }

    /// Tuples emitted so far
    pub fn emitted_count(&self) -> u64 {
        self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn item(line: LineId, stamp: f64) -> TimestampedItem<u32> {
        TimestampedItem::new(line, stamp, 0)
    }

    fn three_lines() -> Vec<LineSpec> {
        vec![
            LineSpec::required(LineId::Rgb),
            LineSpec::required(LineId::Depth),
            LineSpec::required(LineId::CameraInfo),
        ]
    }

    #[test]
    fn test_exact_emits_when_all_coincide() {
        let mut correlator = Correlator::new(three_lines(), MatchPolicy::Exact, 10);

        assert!(correlator.ingest(item(LineId::Rgb, 1.0)).is_none());
        assert!(correlator.ingest(item(LineId::Depth, 1.0)).is_none());
        let tuple = correlator.ingest(item(LineId::CameraInfo, 1.0)).unwrap();

        assert_eq!(tuple.filled(), 3);
        assert!(tuple.stamps().all(|s| s == 1.0));
        assert_eq!(correlator.buffered(LineId::Rgb), 0);
        assert_eq!(correlator.emitted_count(), 1);
    }

    #[test]
    fn test_exact_keeps_non_matching_items() {
        let mut correlator = Correlator::new(three_lines(), MatchPolicy::Exact, 10);

        correlator.ingest(item(LineId::Rgb, 1.0));
        correlator.ingest(item(LineId::Depth, 1.0));
        correlator.ingest(item(LineId::Rgb, 2.0));
        correlator.ingest(item(LineId::Depth, 2.0));

        // Info for 2.0 only: the 1.0 pair stays buffered
        let tuple = correlator.ingest(item(LineId::CameraInfo, 2.0)).unwrap();
        assert!(tuple.stamps().all(|s| s == 2.0));
        assert_eq!(correlator.buffered(LineId::Rgb), 1);
        assert_eq!(correlator.buffered(LineId::Depth), 1);

        // A near-miss stamp never matches in exact mode
        assert!(correlator
            .ingest(item(LineId::CameraInfo, 1.0 + 1e-9))
            .is_none());
    }

    #[test]
    fn test_closest_picks_nearest_per_line() {
        let lines = vec![
            LineSpec::required(LineId::Rgbd(0)),
            LineSpec::required(LineId::Scan2d),
        ];
        let mut correlator = Correlator::new(lines, MatchPolicy::Closest, 10);

        correlator.ingest(item(LineId::Scan2d, 0.90));
        correlator.ingest(item(LineId::Scan2d, 0.98));
        correlator.ingest(item(LineId::Scan2d, 1.10));
        let mut tuple = correlator.ingest(item(LineId::Rgbd(0), 1.0)).unwrap();

        assert_eq!(tuple.take(LineId::Scan2d).unwrap().stamp(), 0.98);
        assert_eq!(tuple.take(LineId::Rgbd(0)).unwrap().stamp(), 1.0);
        // Unmatched older items stay until evicted
        assert_eq!(correlator.buffered(LineId::Scan2d), 2);
    }

    #[test]
    fn test_closest_tie_breaks_on_arrival() {
        let lines = vec![
            LineSpec::required(LineId::Odom),
            LineSpec::required(LineId::Scan3d),
        ];
        let mut correlator = Correlator::new(lines, MatchPolicy::Closest, 10);

        correlator.ingest(TimestampedItem::new(LineId::Odom, 1.1, 1));
        correlator.ingest(TimestampedItem::new(LineId::Odom, 0.9, 2));
        let tuple = correlator
            .ingest(TimestampedItem::new(LineId::Scan3d, 1.0, 3))
            .unwrap();

        assert_eq!(*tuple.get(LineId::Odom).unwrap().payload(), 1);
    }

    #[test]
    fn test_optional_line_attached_when_present() {
        let lines = vec![
            LineSpec::required(LineId::Scan2d),
            LineSpec::optional(LineId::OdomInfo),
        ];
        let mut correlator = Correlator::new(lines, MatchPolicy::Exact, 10);

        // Optional arrivals never trigger
        assert!(correlator.ingest(item(LineId::OdomInfo, 2.0)).is_none());

        let tuple = correlator.ingest(item(LineId::Scan2d, 1.0)).unwrap();
        assert!(tuple.get(LineId::OdomInfo).is_none());
        assert_eq!(tuple.filled(), 1);

        let tuple = correlator.ingest(item(LineId::Scan2d, 2.0)).unwrap();
        assert_eq!(tuple.get(LineId::OdomInfo).unwrap().stamp(), 2.0);
    }

    #[test]
    fn test_undeclared_line_ignored() {
        let mut correlator = Correlator::new(three_lines(), MatchPolicy::Exact, 10);
        assert!(correlator.ingest(item(LineId::Imu, 1.0)).is_none());
        assert_eq!(correlator.buffered(LineId::Imu), 0);
    }

    #[test]
    fn test_capacity_eviction_loses_items() {
        let lines = vec![
            LineSpec::required(LineId::Rgb),
            LineSpec::required(LineId::CameraInfo),
        ];
        let mut correlator = Correlator::new(lines, MatchPolicy::Exact, 2);

        correlator.ingest(item(LineId::Rgb, 1.0));
        correlator.ingest(item(LineId::Rgb, 2.0));
        correlator.ingest(item(LineId::Rgb, 3.0));
        assert_eq!(correlator.evicted_count(), 1);

        // 1.0 was evicted and is gone for good
        assert!(correlator.ingest(item(LineId::CameraInfo, 1.0)).is_none());
        assert!(correlator.ingest(item(LineId::CameraInfo, 3.0)).is_some());
    }

    #[test]
    fn test_flush_clears_all_lines() {
        let mut correlator = Correlator::new(three_lines(), MatchPolicy::Exact, 10);
        correlator.ingest(item(LineId::Rgb, 1.0));
        correlator.ingest(item(LineId::Depth, 1.0));
        correlator.flush();
        assert!(correlator.ingest(item(LineId::CameraInfo, 1.0)).is_none());
    }

    #[test]
    fn test_randomized_soundness() {
        let mut rng = StdRng::seed_from_u64(42);
        let lines = three_lines();

        for policy in [MatchPolicy::Exact, MatchPolicy::Closest] {
            let mut correlator = Correlator::new(lines.clone(), policy, 5);
            for _ in 0..2000 {
                let line = lines[rng.random_range(0..lines.len())].line;
                let stamp = rng.random_range(0..20) as f64 * 0.1;
                if let Some(tuple) = correlator.ingest(item(line, stamp)) {
                    // Every required line contributes exactly one item
                    assert_eq!(tuple.filled(), lines.len());
                    if policy == MatchPolicy::Exact {
                        let stamps: Vec<f64> = tuple.stamps().collect();
                        assert!(stamps.iter().all(|s| s.to_bits() == stamps[0].to_bits()));
                    }
                }
            }
        }
    }
}
