use std::fmt;
use std::path::Path;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::chrome;
use super::minion_trace::MinionTrace;
use super::rule_trace::RuleTrace;
use crate::core::errors::{DistBuildError, Result};

/// Opaque identifier of one distributed build
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(String);

impl BuildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier for builds that were not assigned one upstream
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Trace of rule execution history per minion, from the coordinator's point of view.
///
/// Minions are reconstructed independently of each other and kept in the order
/// the input supplied them, so renders are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistBuildTrace {
    build_id: BuildId,
    minions: Vec<MinionTrace>,
}

impl DistBuildTrace {
    pub fn construct<I>(build_id: BuildId, rules_by_minion: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<RuleTrace>)>,
    {
        let minions: Vec<MinionTrace> = rules_by_minion
            .into_iter()
            .map(|(minion_id, rules)| MinionTrace::reconstruct(minion_id, rules))
            .collect();

        info!(
            "Built trace for build {} with {} minions",
            build_id,
            minions.len()
        );

        Self { build_id, minions }
    }

    /// Same as [`DistBuildTrace::construct`], with each minion reconstructed as
    /// its own blocking task on the current tokio runtime.
    pub async fn construct_concurrently<I>(build_id: BuildId, rules_by_minion: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<RuleTrace>)>,
    {
        let work: Vec<_> = rules_by_minion
            .into_iter()
            .map(|(minion_id, rules)| {
                tokio::task::spawn_blocking(move || MinionTrace::reconstruct(minion_id, rules))
            })
            .collect();

        let mut minions = Vec::with_capacity(work.len());
        for joined in join_all(work).await {
            let minion = joined.map_err(|e| DistBuildError::Internal {
                message: format!("minion reconstruction task failed for build {}", build_id),
                source: Some(Box::new(e)),
            })?;
            minions.push(minion);
        }

        info!(
            "Built trace for build {} with {} minions",
            build_id,
            minions.len()
        );

        Ok(Self { build_id, minions })
    }

    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    pub fn minions(&self) -> &[MinionTrace] {
        &self.minions
    }

    pub fn minion(&self, minion_id: &str) -> Option<&MinionTrace> {
        self.minions.iter().find(|m| m.minion_id() == minion_id)
    }

    /// Earliest start and latest finish across every minion
    pub fn time_bounds(&self) -> Option<(i64, i64)> {
        self.minions
            .iter()
            .filter_map(MinionTrace::time_bounds)
            .reduce(|(s1, f1), (s2, f2)| (s1.min(s2), f1.max(f2)))
    }

    /// Write trace in chrome trace format.
    pub fn dump_to_chrome_trace(&self, path: impl AsRef<Path>) -> Result<()> {
        chrome::render_to_path(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rt(name: &str, start: i64, finish: i64) -> RuleTrace {
        RuleTrace::new(name, start, finish).unwrap()
    }

    fn sample_input() -> Vec<(String, Vec<RuleTrace>)> {
        vec![
            (
                "m2".to_string(),
                vec![rt("A", 0, 10), rt("B", 5, 15), rt("C", 12, 20)],
            ),
            ("idle".to_string(), Vec::new()),
            ("m1".to_string(), vec![rt("D", 3, 4)]),
        ]
    }

    #[test]
    fn test_construct_keeps_every_minion_in_order() {
        let trace = DistBuildTrace::construct(BuildId::new("stampede-1"), sample_input());
        let ids: Vec<&str> = trace.minions().iter().map(MinionTrace::minion_id).collect();
        assert_eq!(ids, vec!["m2", "idle", "m1"]);
        assert_eq!(trace.minion("idle").unwrap().lane_count(), 0);
        assert_eq!(trace.minion("m2").unwrap().lane_count(), 2);
        assert_eq!(trace.time_bounds(), Some((0, 20)));
        assert_eq!(trace.build_id().as_str(), "stampede-1");
    }

    #[test]
    fn test_empty_build() {
        let trace = DistBuildTrace::construct(BuildId::new("empty"), Vec::new());
        assert!(trace.minions().is_empty());
        assert_eq!(trace.time_bounds(), None);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(BuildId::generate(), BuildId::generate());
    }

    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let sequential = DistBuildTrace::construct(BuildId::new("b"), sample_input());
        let concurrent = DistBuildTrace::construct_concurrently(BuildId::new("b"), sample_input())
            .await
            .unwrap();
        assert_eq!(sequential, concurrent);
    }
}
