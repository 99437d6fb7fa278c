//! Build-rule collaborators
//!
//! The build graph itself lives outside this crate. These are the interfaces
//! the execution strategies consume plus the read-only lookups they share.

pub mod target;
pub mod rule;
pub mod cell;
pub mod resolver;
pub mod kinds;

pub use target::BuildTarget;
pub use rule::{BuildContext, BuildRule, Buildable, HasDeps, SerializableRule, Step};
pub use cell::CellPathResolver;
pub use resolver::{RuleFinder, RuleResolver};
pub use kinds::{RuleFactory, RuleKindRegistry, SerdeRuleFactory};
