//! Minion trace reconstruction
//!
//! The coordinator only learns when each rule started and finished on a
//! minion. This module collects those reports, infers non-overlapping lanes per
//! minion and renders the result as a Chrome trace.

pub mod rule_trace;
pub mod minion_trace;
pub mod dist_build_trace;
pub mod tracker;
pub mod chrome;

pub use rule_trace::{RuleTrace, MAX_DURATION_MILLIS};
pub use minion_trace::{Lane, MinionTrace};
pub use dist_build_trace::{BuildId, DistBuildTrace};
pub use tracker::DistBuildTraceTracker;
pub use chrome::{render, render_to_path, ChromeTrace, ChromeTraceEvent};
