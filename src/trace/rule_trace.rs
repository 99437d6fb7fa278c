use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{DistBuildError, Result};
use crate::distbuild_error;

/// Longest window whose duration still fits in `i64` microseconds
pub const MAX_DURATION_MILLIS: i64 = i64::MAX / 1_000;

/// Observed execution window of one rule on some minion.
///
/// The only way to obtain a `RuleTrace` is through a validating constructor, so
/// every value in the data model satisfies `finish >= start` and has a duration
/// of at most [`MAX_DURATION_MILLIS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRuleTrace")]
pub struct RuleTrace {
    rule_name: String,
    start_epoch_millis: i64,
    finish_epoch_millis: i64,
}

#[derive(Deserialize)]
struct RawRuleTrace {
    rule_name: String,
    start_epoch_millis: i64,
    finish_epoch_millis: i64,
}

impl TryFrom<RawRuleTrace> for RuleTrace {
    type Error = DistBuildError;

    fn try_from(raw: RawRuleTrace) -> Result<Self> {
        RuleTrace::new(raw.rule_name, raw.start_epoch_millis, raw.finish_epoch_millis)
    }
}

impl RuleTrace {
    pub fn new(
        rule_name: impl Into<String>,
        start_epoch_millis: i64,
        finish_epoch_millis: i64,
    ) -> Result<Self> {
        let rule_name = rule_name.into();
        if finish_epoch_millis < start_epoch_millis {
            return Err(distbuild_error!(
                validation,
                format!(
                    "rule {} finished at {} before it started at {}",
                    rule_name, finish_epoch_millis, start_epoch_millis
                ),
                "finish_epoch_millis",
            ));
        }
        let fits = finish_epoch_millis
            .checked_sub(start_epoch_millis)
            .is_some_and(|duration| duration <= MAX_DURATION_MILLIS);
        if !fits {
            return Err(distbuild_error!(
                validation,
                format!(
                    "rule {} window {}..{} is too long to record",
                    rule_name, start_epoch_millis, finish_epoch_millis
                ),
                "finish_epoch_millis",
            ));
        }
        Ok(Self {
            rule_name,
            start_epoch_millis,
            finish_epoch_millis,
        })
    }

    pub fn from_times(
        rule_name: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Result<Self> {
        Self::new(
            rule_name,
            started_at.timestamp_millis(),
            finished_at.timestamp_millis(),
        )
    }

    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    pub fn start_epoch_millis(&self) -> i64 {
        self.start_epoch_millis
    }

    pub fn finish_epoch_millis(&self) -> i64 {
        self.finish_epoch_millis
    }

    /// Never overflows; the window was bounded on construction.
    pub fn duration_millis(&self) -> i64 {
        self.finish_epoch_millis - self.start_epoch_millis
    }

    /// Whether `next` can follow this trace on the same lane.
    pub fn precedes(&self, next: &RuleTrace) -> bool {
        self.finish_epoch_millis <= next.start_epoch_millis
    }

    /// Two windows overlap when neither can follow the other on a lane.
    pub fn overlaps(&self, other: &RuleTrace) -> bool {
        !self.precedes(other) && !other.precedes(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rejects_negative_duration() {
        let err = RuleTrace::new("//app:lib", 20, 10).unwrap_err();
        assert!(matches!(err, DistBuildError::Validation { .. }));
    }

    #[test]
    fn test_rejects_window_too_long_to_record() {
        let err = RuleTrace::new("wide", i64::MIN, i64::MAX).unwrap_err();
        assert!(matches!(err, DistBuildError::Validation { .. }));
        assert!(RuleTrace::new("wide", 0, MAX_DURATION_MILLIS + 1).is_err());

        let longest = RuleTrace::new("long", -5, MAX_DURATION_MILLIS - 5).unwrap();
        assert_eq!(longest.duration_millis(), MAX_DURATION_MILLIS);
    }

    #[test]
    fn test_zero_duration_is_valid() {
        let trace = RuleTrace::new("//app:lib", 10, 10).unwrap();
        assert_eq!(trace.duration_millis(), 0);
    }

    #[test]
    fn test_overlap() {
        let a = RuleTrace::new("a", 0, 10).unwrap();
        let b = RuleTrace::new("b", 5, 15).unwrap();
        let c = RuleTrace::new("c", 10, 12).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.precedes(&c));

        let instant = RuleTrace::new("i", 10, 10).unwrap();
        assert!(instant.precedes(&c));
        assert!(!instant.overlaps(&c));
    }

    #[test]
    fn test_from_times() {
        let start = Utc.timestamp_millis_opt(1_000).unwrap();
        let finish = Utc.timestamp_millis_opt(1_250).unwrap();
        let trace = RuleTrace::from_times("//a:b", start, finish).unwrap();
        assert_eq!(trace.start_epoch_millis(), 1_000);
        assert_eq!(trace.duration_millis(), 250);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: RuleTrace = serde_json::from_str(
            r#"{"rule_name":"//a:b","start_epoch_millis":1,"finish_epoch_millis":2}"#,
        )
        .unwrap();
        assert_eq!(ok.rule_name(), "//a:b");

        let bad = serde_json::from_str::<RuleTrace>(
            r#"{"rule_name":"//a:b","start_epoch_millis":5,"finish_epoch_millis":2}"#,
        );
        assert!(bad.is_err());
    }
}
