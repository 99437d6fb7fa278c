//! Lane reconstruction for a single minion.
//!
//! Minions only report `(rule, start, finish)` windows. To draw them we guess a
//! thread assignment: sort by start time and place every rule in the first lane
//! whose last rule has already finished. The result is one valid explanation of
//! the windows, not the minion's real thread layout.

use serde::Serialize;
use tracing::debug;

use super::rule_trace::RuleTrace;

/// Non-overlapping time track inferred for a minion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lane {
    rule_traces: Vec<RuleTrace>,
}

impl Lane {
    fn starting_with(trace: RuleTrace) -> Self {
        Self {
            rule_traces: vec![trace],
        }
    }

    fn accepts(&self, trace: &RuleTrace) -> bool {
        self.rule_traces
            .last()
            .map_or(true, |last| last.precedes(trace))
    }

    pub fn rule_traces(&self) -> &[RuleTrace] {
        &self.rule_traces
    }

    pub fn last(&self) -> Option<&RuleTrace> {
        self.rule_traces.last()
    }

    pub fn len(&self) -> usize {
        self.rule_traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_traces.is_empty()
    }
}

/// Lanes reconstructed for one minion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinionTrace {
    minion_id: String,
    lanes: Vec<Lane>,
}

impl MinionTrace {
    /// Greedy first-fit interval partitioning.
    ///
    /// Equal start times keep their input order, which decides which of two
    /// simultaneous rules lands in the lower lane.
    pub fn reconstruct(minion_id: impl Into<String>, rule_traces: Vec<RuleTrace>) -> Self {
        let minion_id = minion_id.into();
        let mut sorted = rule_traces;
        sorted.sort_by_key(RuleTrace::start_epoch_millis);

        let rule_count = sorted.len();
        let mut lanes: Vec<Lane> = Vec::new();
        for trace in sorted {
            match lanes.iter_mut().find(|lane| lane.accepts(&trace)) {
                Some(lane) => lane.rule_traces.push(trace),
                None => lanes.push(Lane::starting_with(trace)),
            }
        }

        debug!(
            "Reconstructed {} rules into {} lanes for minion {}",
            rule_count,
            lanes.len(),
            minion_id
        );

        Self { minion_id, lanes }
    }

    pub fn minion_id(&self) -> &str {
        &self.minion_id
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn rule_count(&self) -> usize {
        self.lanes.iter().map(Lane::len).sum()
    }

    /// Flatten all lanes, lane by lane.
    pub fn rule_traces(&self) -> impl Iterator<Item = &RuleTrace> {
        self.lanes.iter().flat_map(|lane| lane.rule_traces.iter())
    }

    /// Largest number of windows open at one instant.
    ///
    /// Any valid lane assignment needs at least this many lanes.
    pub fn max_concurrency(&self) -> usize {
        // At equal timestamps: finishes, then zero-length windows, then starts.
        const FINISH: u8 = 0;
        const INSTANT: u8 = 1;
        const START: u8 = 2;

        let mut edges: Vec<(i64, u8)> = Vec::with_capacity(self.rule_count() * 2);
        for trace in self.rule_traces() {
            if trace.duration_millis() == 0 {
                edges.push((trace.start_epoch_millis(), INSTANT));
            } else {
                edges.push((trace.start_epoch_millis(), START));
                edges.push((trace.finish_epoch_millis(), FINISH));
            }
        }
        edges.sort_unstable();

        let mut open = 0usize;
        let mut peak = 0usize;
        for (_, kind) in edges {
            match kind {
                FINISH => open -= 1,
                INSTANT => peak = peak.max(open + 1),
                _ => {
                    open += 1;
                    peak = peak.max(open);
                }
            }
        }
        peak
    }

    /// Earliest start and latest finish across all lanes
    pub fn time_bounds(&self) -> Option<(i64, i64)> {
        let start = self.rule_traces().map(RuleTrace::start_epoch_millis).min()?;
        let finish = self.rule_traces().map(RuleTrace::finish_epoch_millis).max()?;
        Some((start, finish))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rt(name: &str, start: i64, finish: i64) -> RuleTrace {
        RuleTrace::new(name, start, finish).unwrap()
    }

    fn names(lane: &Lane) -> Vec<&str> {
        lane.rule_traces().iter().map(RuleTrace::rule_name).collect()
    }

    #[test]
    fn test_two_lane_example() {
        let trace = MinionTrace::reconstruct(
            "m1",
            vec![rt("A", 0, 10), rt("B", 5, 15), rt("C", 12, 20)],
        );
        assert_eq!(trace.lane_count(), 2);
        assert_eq!(names(&trace.lanes()[0]), vec!["A", "C"]);
        assert_eq!(names(&trace.lanes()[1]), vec!["B"]);
    }

    #[test]
    fn test_unsorted_input() {
        let trace = MinionTrace::reconstruct(
            "m1",
            vec![rt("C", 12, 20), rt("A", 0, 10), rt("B", 5, 15)],
        );
        assert_eq!(names(&trace.lanes()[0]), vec!["A", "C"]);
        assert_eq!(names(&trace.lanes()[1]), vec!["B"]);
    }

    #[test]
    fn test_empty_minion() {
        let trace = MinionTrace::reconstruct("idle", Vec::new());
        assert_eq!(trace.lane_count(), 0);
        assert_eq!(trace.rule_count(), 0);
        assert_eq!(trace.time_bounds(), None);
        assert_eq!(trace.max_concurrency(), 0);
    }

    #[test]
    fn test_tie_break_follows_input_order() {
        let first = MinionTrace::reconstruct("m", vec![rt("X", 0, 5), rt("Y", 0, 9)]);
        assert_eq!(names(&first.lanes()[0]), vec!["X"]);
        assert_eq!(names(&first.lanes()[1]), vec!["Y"]);

        let swapped = MinionTrace::reconstruct("m", vec![rt("Y", 0, 9), rt("X", 0, 5)]);
        assert_eq!(names(&swapped.lanes()[0]), vec!["Y"]);
        assert_eq!(names(&swapped.lanes()[1]), vec!["X"]);
    }

    #[test]
    fn test_zero_duration_does_not_block() {
        let trace = MinionTrace::reconstruct("m", vec![rt("Z", 10, 10), rt("N", 10, 30)]);
        assert_eq!(trace.lane_count(), 1);
        assert_eq!(names(&trace.lanes()[0]), vec!["Z", "N"]);
    }

    #[test]
    fn test_back_to_back_share_lane() {
        let trace = MinionTrace::reconstruct(
            "m",
            vec![rt("a", 0, 10), rt("b", 10, 20), rt("c", 20, 30)],
        );
        assert_eq!(trace.lane_count(), 1);
        assert_eq!(trace.max_concurrency(), 1);
        assert_eq!(trace.time_bounds(), Some((0, 30)));
    }

    #[test]
    fn test_first_fit_reuses_lowest_lane() {
        // Lane 1 frees up before lane 0; the late rule still goes to the first free lane.
        let trace = MinionTrace::reconstruct(
            "m",
            vec![rt("long", 0, 100), rt("short", 1, 5), rt("late", 50, 60), rt("after", 101, 102)],
        );
        assert_eq!(names(&trace.lanes()[0]), vec!["long", "after"]);
        assert_eq!(names(&trace.lanes()[1]), vec!["short", "late"]);
    }

    #[test]
    fn test_lanes_never_overlap_and_preserve_input() {
        let mut input = Vec::new();
        // Deterministic pseudo-random windows.
        let mut seed: i64 = 7;
        for i in 0..200 {
            seed = (seed * 1_103_515_245 + 12_345) % 2_147_483_648;
            let start = seed % 1_000;
            let len = (seed / 1_000) % 50;
            input.push(rt(&format!("r{}", i), start, start + len));
        }

        let trace = MinionTrace::reconstruct("m", input.clone());
        for lane in trace.lanes() {
            for pair in lane.rule_traces().windows(2) {
                assert!(pair[0].finish_epoch_millis() <= pair[1].start_epoch_millis());
            }
        }

        let mut expected = input;
        expected.sort_by(|a, b| a.rule_name().cmp(b.rule_name()));
        let mut actual: Vec<RuleTrace> = trace.rule_traces().cloned().collect();
        actual.sort_by(|a, b| a.rule_name().cmp(b.rule_name()));
        assert_eq!(actual, expected);

        assert!(trace.lane_count() >= trace.max_concurrency());
    }
}
