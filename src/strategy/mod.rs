//! Execution strategy dispatch
//!
//! A [`BuildRuleStrategy`] intercepts rules as they become ready and decides
//! how they get built. Remote backends plug in here.

use std::sync::Arc;

use crate::rules::BuildRule;

pub mod config;
pub mod executor;
pub mod serializer;
pub mod passthrough;
pub mod reconstructing;
pub mod factory;

pub use config::{ModernBuildRuleConfig, Strategy};
pub use executor::{
    BuildExecutor, BuildExecutorRunner, ExecutionService, LocalStepRunner, RuleExecutorRunner,
    RunCallback, StepRunner, TokioExecutionService, Work,
};
pub use serializer::{BincodeRuleSerializer, RuleSerializer};
pub use passthrough::PassthroughStrategy;
pub use reconstructing::ReconstructingStrategy;
pub use factory::{
    create_passthrough, create_reconstructing, select_for, select_strategy, StrategyContext,
};

/// Builds a rule on behalf of the build engine.
///
/// Invocations for different rules may run concurrently; implementations keep
/// no per-build mutable state.
pub trait BuildRuleStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_build(&self, rule: &dyn BuildRule) -> bool;

    /// Schedule `rule` on `service`; the outcome is reported through `runner`.
    fn build(
        &self,
        service: &dyn ExecutionService,
        rule: Arc<dyn BuildRule>,
        runner: Arc<dyn BuildExecutorRunner>,
    );
}
