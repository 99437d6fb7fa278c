//! Capability interfaces of a build rule.
//!
//! The strategy layer only sees rules through these traits. A rule is always
//! [`Buildable`] and [`HasDeps`]; rules that can be shipped to another process
//! additionally expose [`SerializableRule`] through
//! [`BuildRule::as_serializable`].

use std::path::PathBuf;

use serde_json::Value;

use super::target::BuildTarget;

/// Where a rule's steps run and write
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub target: BuildTarget,
    /// Root of the cell the target belongs to
    pub cell_root: PathBuf,
    /// Absolute location of the rule output, if it has one
    pub output: Option<PathBuf>,
}

/// One unit of work a rule performs when built
pub trait Step: Send + Sync {
    fn short_name(&self) -> &str;

    fn execute(&self, ctx: &BuildContext) -> anyhow::Result<()>;
}

pub trait Buildable: Send + Sync {
    /// Steps that build this rule, in execution order
    fn build_steps(&self, ctx: &BuildContext) -> anyhow::Result<Vec<Box<dyn Step>>>;
}

pub trait HasDeps {
    /// Direct dependencies that must be built first
    fn build_deps(&self) -> Vec<BuildTarget>;
}

pub trait SerializableRule: Send + Sync {
    /// Name under which a [`crate::rules::RuleFactory`] can rebuild this rule
    fn rule_kind(&self) -> &str;

    /// Every field needed to reconstruct the rule
    fn to_fields(&self) -> anyhow::Result<Value>;
}

pub trait BuildRule: Buildable + HasDeps + Send + Sync {
    fn build_target(&self) -> &BuildTarget;

    /// Output path relative to the rule's cell root
    fn source_path_to_output(&self) -> Option<PathBuf>;

    fn as_serializable(&self) -> Option<&dyn SerializableRule> {
        None
    }
}
