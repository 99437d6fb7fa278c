use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{DistBuildError, Result};
use crate::distbuild_error;

/// Fully qualified name of a build rule: `cell//base/path:name`.
///
/// The root cell is written without a prefix (`//base/path:name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildTarget {
    cell: String,
    base_path: String,
    short_name: String,
}

impl BuildTarget {
    pub fn new(
        cell: impl Into<String>,
        base_path: impl Into<String>,
        short_name: impl Into<String>,
    ) -> Result<Self> {
        let target = Self {
            cell: cell.into(),
            base_path: base_path.into(),
            short_name: short_name.into(),
        };
        if target.short_name.is_empty() {
            return Err(distbuild_error!(
                validation,
                format!("build target {} has an empty name", target),
                "short_name",
            ));
        }
        if target.short_name.contains(':') || target.base_path.contains(':') {
            return Err(distbuild_error!(
                validation,
                format!("build target {} contains ':' in a path component", target),
                "base_path",
            ));
        }
        Ok(target)
    }

    /// Cell name, empty for the root cell
    pub fn cell(&self) -> &str {
        &self.cell
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }
}

impl FromStr for BuildTarget {
    type Err = DistBuildError;

    fn from_str(s: &str) -> Result<Self> {
        let (cell, rest) = s.split_once("//").ok_or_else(|| {
            distbuild_error!(validation, format!("build target '{}' is missing '//'", s))
        })?;
        let (base_path, short_name) = rest.rsplit_once(':').ok_or_else(|| {
            distbuild_error!(validation, format!("build target '{}' is missing ':name'", s))
        })?;
        Self::new(cell, base_path, short_name)
    }
}

impl TryFrom<String> for BuildTarget {
    type Error = DistBuildError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BuildTarget> for String {
    fn from(target: BuildTarget) -> Self {
        target.to_string()
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}//{}:{}", self.cell, self.base_path, self.short_name)
    }
}
