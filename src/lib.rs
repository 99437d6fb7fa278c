// Core infrastructure modules
pub mod core {
    pub mod errors;
    pub mod config;
    pub mod logging;
}

// Build-graph collaborators consumed by the strategies
pub mod rules;
// Execution strategy dispatch (coordinator decides how a rule is built)
pub mod strategy;
// Minion trace reconstruction (minions report what happened)
pub mod trace;

// Re-exports for convenience
pub use self::core::config::{BuildConfig, ExecutionConfig};
pub use self::core::errors::{DistBuildError, Result};
pub use self::core::logging::init_logging;

pub use strategy::{select_strategy, BuildRuleStrategy, Strategy, StrategyContext};
pub use trace::{BuildId, DistBuildTrace, DistBuildTraceTracker, MinionTrace, RuleTrace};
