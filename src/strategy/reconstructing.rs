use std::sync::Arc;

use tracing::{debug, warn};

use super::executor::{BuildExecutor, BuildExecutorRunner, ExecutionService, StepRunner};
use super::serializer::RuleSerializer;
use super::BuildRuleStrategy;
use crate::core::errors::{DistBuildError, Result};
use crate::rules::BuildRule;

/// Serializes and deserializes each rule in memory and builds the deserialized copy.
///
/// This is the data path a remote backend takes, minus the wire. A rule that
/// does not survive the round trip fails its own build and nothing else.
pub struct ReconstructingStrategy {
    serializer: Arc<dyn RuleSerializer>,
}

impl ReconstructingStrategy {
    pub fn new(serializer: Arc<dyn RuleSerializer>) -> Self {
        Self { serializer }
    }
}

impl BuildRuleStrategy for ReconstructingStrategy {
    fn name(&self) -> &'static str {
        "reconstructing"
    }

    fn can_build(&self, rule: &dyn BuildRule) -> bool {
        rule.as_serializable().is_some()
    }

    fn build(
        &self,
        service: &dyn ExecutionService,
        rule: Arc<dyn BuildRule>,
        runner: Arc<dyn BuildExecutorRunner>,
    ) {
        let serializer = self.serializer.clone();
        service.execute(Box::new(move || {
            runner.run_with_executor(Box::new(ReconstructingExecutor { rule, serializer }));
        }));
    }
}

struct ReconstructingExecutor {
    rule: Arc<dyn BuildRule>,
    serializer: Arc<dyn RuleSerializer>,
}

impl ReconstructingExecutor {
    fn round_trip_failure(&self, phase: &str, source: DistBuildError) -> DistBuildError {
        warn!(
            "Round trip of {} failed during {}: {}",
            self.rule.build_target(),
            phase,
            source
        );
        DistBuildError::execution_with_source(
            self.rule.build_target().to_string(),
            format!("rule did not survive {}", phase),
            source,
        )
        .with_context("strategy", "DEBUG_RECONSTRUCT")
        .with_context("phase", phase)
    }
}

impl BuildExecutor for ReconstructingExecutor {
    fn execute(self: Box<Self>, step_runner: &dyn StepRunner) -> Result<()> {
        let bytes = self
            .serializer
            .serialize(self.rule.as_ref())
            .map_err(|e| self.round_trip_failure("serialize", e))?;
        let reconstructed = self
            .serializer
            .deserialize(&bytes)
            .map_err(|e| self.round_trip_failure("deserialize", e))?;

        if reconstructed.build_target() != self.rule.build_target() {
            return Err(self.round_trip_failure(
                "deserialize",
                DistBuildError::validation(format!(
                    "reconstructed rule has target {}",
                    reconstructed.build_target()
                )),
            ));
        }

        debug!(
            "Building reconstructed {} ({} bytes)",
            reconstructed.build_target(),
            bytes.len()
        );
        step_runner.run_steps_for_rule(reconstructed.as_ref())
    }
}
