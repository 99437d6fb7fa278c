use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{DistBuildError, Result};

/// Sectioned key/value configuration source read by the build engine.
///
/// Values are kept as raw strings; typed views (see
/// [`crate::strategy::ModernBuildRuleConfig`]) decide how to interpret them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildConfig {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document of the form `section: { key: value }`
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, BTreeMap<String, serde_yaml::Value>> =
            serde_yaml::from_str(yaml)?;
        let mut config = Self::default();
        for (section, entries) in raw {
            for (key, value) in entries {
                let value = match value {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    other => {
                        return Err(DistBuildError::Configuration {
                            message: format!("{}.{} must be a scalar", section, key),
                            field: Some(format!("{}.{}", section, key)),
                            expected: Some("scalar".to_string()),
                            actual: Some(format!("{:?}", other)),
                        })
                    }
                };
                config.set(section.clone(), key, value);
            }
        }
        Ok(config)
    }

    /// Load a YAML config file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DistBuildError::io(format!("read config {}", path.display()), e))?;
        Self::from_yaml_str(&contents)
    }

    /// Builder-style setter
    pub fn with(mut self, section: &str, key: &str, value: &str) -> Self {
        self.set(section, key, value);
        self
    }

    pub fn set(
        &mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    /// Read an enumerated value. Absent keys yield `Ok(None)`; present but
    /// unparseable values are configuration errors.
    pub fn get_enum<T>(&self, section: &str, key: &str) -> Result<Option<T>>
    where
        T: FromStr<Err = DistBuildError>,
    {
        match self.get(section, key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some),
        }
    }

    /// Read an unsigned integer value
    pub fn get_usize(&self, section: &str, key: &str) -> Result<Option<usize>> {
        match self.get(section, key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<usize>().map(Some).map_err(|_| {
                DistBuildError::configuration_value(
                    format!("{}.{}", section, key),
                    "unsigned integer",
                    raw,
                )
            }),
        }
    }
}

/// Worker pool configuration for the execution service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum number of units of work running at once
    pub max_workers: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            max_workers: cpu_count,
        }
    }
}

impl ExecutionConfig {
    pub const SECTION: &'static str = "build";

    /// Create a new builder for ExecutionConfig
    pub fn builder() -> ExecutionConfigBuilder {
        ExecutionConfigBuilder::new()
    }

    /// Read `[build] threads`, falling back to the CPU count
    pub fn from_build_config(config: &BuildConfig) -> Result<Self> {
        let mut execution = Self::default();
        if let Some(threads) = config.get_usize(Self::SECTION, "threads")? {
            execution.max_workers = threads;
        }
        execution.validate()?;
        Ok(execution)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(DistBuildError::Configuration {
                message: "max_workers must be greater than 0".to_string(),
                field: Some("build.threads".to_string()),
                expected: Some(">= 1".to_string()),
                actual: Some("0".to_string()),
            });
        }
        Ok(())
    }
}

/// Builder for ExecutionConfig
pub struct ExecutionConfigBuilder {
    config: ExecutionConfig,
}

impl ExecutionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ExecutionConfig::default(),
        }
    }

    /// Set maximum workers
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ExecutionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ExecutionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
