use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use super::dist_build_trace::{BuildId, DistBuildTrace};
use super::rule_trace::RuleTrace;
use crate::core::errors::Result;

/// Collects rule start/finish reports from minions while a build runs.
///
/// Reports arrive concurrently from many connections. Each minion's list is
/// append-only and guarded by the map's shard lock; [`snapshot`] copies the
/// state out so reconstruction never sees a half-updated list.
///
/// [`snapshot`]: DistBuildTraceTracker::snapshot
pub struct DistBuildTraceTracker {
    build_id: BuildId,
    finished: DashMap<String, Vec<RuleTrace>>,
    started: DashMap<(String, String), i64>,
}

impl DistBuildTraceTracker {
    pub fn new(build_id: BuildId) -> Self {
        Self {
            build_id,
            finished: DashMap::new(),
            started: DashMap::new(),
        }
    }

    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    /// Register a minion so it shows up in the trace even if it never builds anything.
    pub fn minion_joined(&self, minion_id: &str) {
        self.finished.entry(minion_id.to_string()).or_default();
    }

    pub fn rule_started(&self, minion_id: &str, rule_name: &str, at: DateTime<Utc>) {
        self.minion_joined(minion_id);
        let previous = self.started.insert(
            (minion_id.to_string(), rule_name.to_string()),
            at.timestamp_millis(),
        );
        if previous.is_some() {
            warn!(
                "Rule {} restarted on minion {} before finishing",
                rule_name, minion_id
            );
        }
    }

    /// Pair a finish report with its start. Finishes without a recorded start
    /// are dropped, since their window is unknown.
    pub fn rule_finished(
        &self,
        minion_id: &str,
        rule_name: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<RuleTrace>> {
        let key = (minion_id.to_string(), rule_name.to_string());
        let Some((_, start)) = self.started.remove(&key) else {
            warn!(
                "Ignoring finish of {} on minion {} without a start report",
                rule_name, minion_id
            );
            return Ok(None);
        };
        let trace = RuleTrace::new(rule_name, start, at.timestamp_millis())?;
        self.record(minion_id, trace.clone());
        Ok(Some(trace))
    }

    /// Append an already complete trace.
    pub fn record(&self, minion_id: &str, trace: RuleTrace) {
        debug!(
            "Minion {} finished {} in {}ms",
            minion_id,
            trace.rule_name(),
            trace.duration_millis()
        );
        self.finished
            .entry(minion_id.to_string())
            .or_default()
            .push(trace);
    }

    /// Rules started but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.started.len()
    }

    /// Immutable copy of the finished reports, ordered by minion id.
    pub fn snapshot(&self) -> Vec<(String, Vec<RuleTrace>)> {
        let mut rules_by_minion: Vec<(String, Vec<RuleTrace>)> = self
            .finished
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        rules_by_minion.sort_by(|a, b| a.0.cmp(&b.0));
        rules_by_minion
    }

    /// Reconstruct the trace from what has been reported so far.
    pub fn generate_trace(&self) -> DistBuildTrace {
        DistBuildTrace::construct(self.build_id.clone(), self.snapshot())
    }
}
