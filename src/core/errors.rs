use std::collections::HashMap;
use thiserror::Error;

/// Unified error type for the execution-coordination core
#[derive(Debug, Error)]
pub enum DistBuildError {
    /// Configuration errors (unrecognized strategy, bad worker counts, ...)
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// Validation errors for records entering the data model
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Serialization errors, including rule round-trip failures
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// IO errors (trace rendering, config loading)
    #[error("IO operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Build execution failures for a single rule
    #[error("Execution failed for {target}: {message}")]
    Execution {
        target: String,
        message: String,
        context: HashMap<String, String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A build target could not be resolved to a rule
    #[error("Rule not found: {target}")]
    RuleNotFound { target: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DistBuildError {
    /// Create a configuration error describing a rejected value
    pub fn configuration_value<F: Into<String>, E: Into<String>, A: Into<String>>(
        field: F,
        expected: E,
        actual: A,
    ) -> Self {
        let field = field.into();
        let actual = actual.into();
        Self::Configuration {
            message: format!("unrecognized value '{}' for {}", actual, field),
            field: Some(field),
            expected: Some(expected.into()),
            actual: Some(actual),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error with field
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    /// Create an IO error
    pub fn io<S: Into<String>>(operation: S, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create an execution error for a build target
    pub fn execution<T: Into<String>, M: Into<String>>(target: T, message: M) -> Self {
        Self::Execution {
            target: target.into(),
            message: message.into(),
            context: HashMap::new(),
            source: None,
        }
    }

    /// Create an execution error wrapping the underlying failure
    pub fn execution_with_source<T, M, E>(target: T, message: M, source: E) -> Self
    where
        T: Into<String>,
        M: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Execution {
            target: target.into(),
            message: message.into(),
            context: HashMap::new(),
            source: Some(source.into()),
        }
    }

    /// Add context to an execution error
    pub fn with_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        if let Self::Execution { ref mut context, .. } = self {
            context.insert(key.into(), value.into());
        }
        self
    }

    /// Create a rule-not-found error
    pub fn rule_not_found<S: Into<String>>(target: S) -> Self {
        Self::RuleNotFound {
            target: target.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Configuration and validation problems never go away on their own.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Execution { .. } => true,
            Self::Configuration { .. } | Self::Validation { .. } => false,
            Self::Serialization { .. } | Self::RuleNotFound { .. } | Self::Internal { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Validation { .. } => "validation",
            Self::Serialization { .. } => "serialization",
            Self::Io { .. } => "io",
            Self::Execution { .. } => "execution",
            Self::RuleNotFound { .. } => "rule_not_found",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DistBuildError>;

impl From<std::io::Error> for DistBuildError {
    fn from(err: std::io::Error) -> Self {
        Self::io("io_operation", err)
    }
}

impl From<serde_json::Error> for DistBuildError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err)
    }
}

impl From<serde_yaml::Error> for DistBuildError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization("yaml", err)
    }
}

impl From<bincode::Error> for DistBuildError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization("bincode", err)
    }
}

impl From<anyhow::Error> for DistBuildError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            source: Some(err.into()),
        }
    }
}

/// Macro for creating errors with context
#[macro_export]
macro_rules! distbuild_error {
    (configuration, $field:expr, $expected:expr, $actual:expr $(,)?) => {
        $crate::DistBuildError::configuration_value($field, $expected, $actual)
    };
    (validation, $message:expr $(,)?) => {
        $crate::DistBuildError::validation($message)
    };
    (validation, $message:expr, $field:expr $(,)?) => {
        $crate::DistBuildError::validation_field($message, $field)
    };
    (execution, $target:expr, $message:expr $(,)?) => {
        $crate::DistBuildError::execution($target, $message)
    };
    (execution, $target:expr, $message:expr, $source:expr $(,)?) => {
        $crate::DistBuildError::execution_with_source($target, $message, $source)
    };
    (internal, $message:expr $(,)?) => {
        $crate::DistBuildError::internal($message)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DistBuildError::execution("//app:lib", "step failed");
        assert!(matches!(err, DistBuildError::Execution { .. }));
        assert_eq!(err.category(), "execution");
        assert_eq!(err.to_string(), "Execution failed for //app:lib: step failed");
    }

    #[test]
    fn test_error_context() {
        let err = DistBuildError::execution("//app:lib", "message")
            .with_context("strategy", "DEBUG_RECONSTRUCT")
            .with_context("phase", "deserialize");

        if let DistBuildError::Execution { context, .. } = err {
            assert_eq!(context.get("strategy"), Some(&"DEBUG_RECONSTRUCT".to_string()));
            assert_eq!(context.get("phase"), Some(&"deserialize".to_string()));
        } else {
            panic!("Expected execution error");
        }
    }

    #[test]
    fn test_configuration_value() {
        let err = DistBuildError::configuration_value(
            "modern_build_rule.strategy",
            "NONE|DEBUG_PASSTHROUGH|DEBUG_RECONSTRUCT",
            "REMOTE",
        );
        assert_eq!(
            err.to_string(),
            "Configuration error: unrecognized value 'REMOTE' for modern_build_rule.strategy"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_recoverability() {
        assert!(DistBuildError::execution("//a:b", "x").is_recoverable());
        assert!(!DistBuildError::validation("test").is_recoverable());
        assert!(!distbuild_error!(configuration, "build.threads", ">= 1", "0").is_recoverable());
    }

    #[test]
    fn test_macro() {
        let err = distbuild_error!(execution, "//a:b", "message");
        assert!(matches!(err, DistBuildError::Execution { .. }));

        let err = distbuild_error!(validation, "finish before start", "finish_epoch_millis");
        assert!(matches!(err, DistBuildError::Validation { field: Some(_), .. }));

        let err = distbuild_error!(internal, "offset out of range");
        assert_eq!(err.category(), "internal");

        let err = distbuild_error!(configuration, "build.threads", ">= 1", "0");
        assert!(matches!(err, DistBuildError::Configuration { field: Some(_), .. }));
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: DistBuildError = anyhow::anyhow!("boom").into();
        assert_eq!(err.category(), "internal");
        assert_eq!(err.to_string(), "Internal error: boom");
    }
}
