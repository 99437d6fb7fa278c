//! Execution strategy registry
//!
//! Selection happens once per build, before any rule runs. The result is
//! immutable for the rest of the build.

use std::sync::Arc;

use tracing::info;

use super::config::{ModernBuildRuleConfig, Strategy};
use super::passthrough::PassthroughStrategy;
use super::reconstructing::ReconstructingStrategy;
use super::serializer::{BincodeRuleSerializer, RuleSerializer};
use super::BuildRuleStrategy;
use crate::core::config::BuildConfig;
use crate::core::errors::Result;
use crate::rules::{CellPathResolver, RuleFinder, RuleKindRegistry};

/// Shared read-only collaborators strategies may need
#[derive(Clone)]
pub struct StrategyContext {
    pub rule_finder: Arc<RuleFinder>,
    pub cell_resolver: Arc<CellPathResolver>,
    pub kinds: Arc<RuleKindRegistry>,
    serializer: Option<Arc<dyn RuleSerializer>>,
}

impl StrategyContext {
    pub fn new(
        rule_finder: Arc<RuleFinder>,
        cell_resolver: Arc<CellPathResolver>,
        kinds: Arc<RuleKindRegistry>,
    ) -> Self {
        Self {
            rule_finder,
            cell_resolver,
            kinds,
            serializer: None,
        }
    }

    /// Replace the default bincode serializer
    pub fn with_serializer(mut self, serializer: Arc<dyn RuleSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    fn serializer(&self) -> Arc<dyn RuleSerializer> {
        match &self.serializer {
            Some(serializer) => serializer.clone(),
            None => Arc::new(BincodeRuleSerializer::new(
                self.rule_finder.clone(),
                self.cell_resolver.clone(),
                self.kinds.clone(),
            )),
        }
    }
}

/// Read `[modern_build_rule] strategy` and build the matching strategy.
///
/// `None` means the build engine keeps its default in-process path. An
/// unrecognized value is a configuration error; there is no fallback.
pub fn select_strategy(
    config: &BuildConfig,
    ctx: &StrategyContext,
) -> Result<Option<Arc<dyn BuildRuleStrategy>>> {
    let strategy = ModernBuildRuleConfig::new(config).build_strategy()?;
    Ok(select_for(strategy, ctx))
}

pub fn select_for(strategy: Strategy, ctx: &StrategyContext) -> Option<Arc<dyn BuildRuleStrategy>> {
    info!("Using build strategy {}", strategy);
    match strategy {
        Strategy::None => None,
        Strategy::DebugReconstruct => Some(create_reconstructing(ctx.serializer())),
        Strategy::DebugPassthrough => Some(create_passthrough()),
    }
}

pub fn create_passthrough() -> Arc<dyn BuildRuleStrategy> {
    Arc::new(PassthroughStrategy::new())
}

pub fn create_reconstructing(serializer: Arc<dyn RuleSerializer>) -> Arc<dyn BuildRuleStrategy> {
    Arc::new(ReconstructingStrategy::new(serializer))
}
