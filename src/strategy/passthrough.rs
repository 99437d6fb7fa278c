use std::sync::Arc;

use tracing::debug;

use super::executor::{BuildExecutorRunner, ExecutionService};
use super::BuildRuleStrategy;
use crate::rules::BuildRule;

/// Forwards every rule to the runner's default executor.
///
/// Builds through this strategy must behave exactly like builds without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughStrategy;

impl PassthroughStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl BuildRuleStrategy for PassthroughStrategy {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn can_build(&self, _rule: &dyn BuildRule) -> bool {
        true
    }

    fn build(
        &self,
        service: &dyn ExecutionService,
        rule: Arc<dyn BuildRule>,
        runner: Arc<dyn BuildExecutorRunner>,
    ) {
        debug!("Passing {} through to the default executor", rule.build_target());
        service.execute(Box::new(move || runner.run_with_default_executor()));
    }
}
