use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::config::BuildConfig;
use crate::core::errors::{DistBuildError, Result};

/// Supported build strategies.
///
/// Strategies starting with `DEBUG_` are development aids for exercising the
/// interception seam, not production backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    #[default]
    None,
    /// Serialize and deserialize each rule in memory, then build the copy
    DebugReconstruct,
    /// Forward to the runner's default behavior
    DebugPassthrough,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::None,
        Strategy::DebugReconstruct,
        Strategy::DebugPassthrough,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::None => "NONE",
            Strategy::DebugReconstruct => "DEBUG_RECONSTRUCT",
            Strategy::DebugPassthrough => "DEBUG_PASSTHROUGH",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = DistBuildError;

    fn from_str(s: &str) -> Result<Self> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let expected: Vec<&str> = Strategy::ALL.iter().map(Strategy::as_str).collect();
                let field = format!(
                    "{}.{}",
                    ModernBuildRuleConfig::SECTION,
                    ModernBuildRuleConfig::STRATEGY_KEY
                );
                DistBuildError::configuration_value(field, expected.join("|"), s)
            })
    }
}

/// Typed view of the `[modern_build_rule]` config section
#[derive(Debug, Clone, Copy)]
pub struct ModernBuildRuleConfig<'a> {
    delegate: &'a BuildConfig,
}

impl<'a> ModernBuildRuleConfig<'a> {
    pub const SECTION: &'static str = "modern_build_rule";
    pub const STRATEGY_KEY: &'static str = "strategy";

    pub fn new(delegate: &'a BuildConfig) -> Self {
        Self { delegate }
    }

    /// Configured strategy, [`Strategy::None`] when unset
    pub fn build_strategy(&self) -> Result<Strategy> {
        Ok(self
            .delegate
            .get_enum::<Strategy>(Self::SECTION, Self::STRATEGY_KEY)?
            .unwrap_or_default())
    }
}
