use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::target::BuildTarget;
use crate::core::errors::{DistBuildError, Result};

/// Maps cell names to their root directories. Read-only once the build starts.
#[derive(Debug, Clone)]
pub struct CellPathResolver {
    root: PathBuf,
    cells: BTreeMap<String, PathBuf>,
}

impl CellPathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Register a named cell. Relative paths are taken relative to the root cell.
    pub fn with_cell(mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        self.cells.insert(name.into(), path);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cell_path(&self, cell: &str) -> Result<&Path> {
        if cell.is_empty() {
            return Ok(&self.root);
        }
        self.cells
            .get(cell)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                DistBuildError::validation_field(format!("unknown cell '{}'", cell), "cell")
            })
    }

    /// Absolute path of `relative` inside the target's cell
    pub fn resolve(&self, target: &BuildTarget, relative: &Path) -> Result<PathBuf> {
        Ok(self.cell_path(target.cell())?.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_root_and_named_cells() {
        let resolver = CellPathResolver::new("/repo").with_cell("tp", "third_party");
        let root_target: BuildTarget = "//app:bin".parse().unwrap();
        let tp_target: BuildTarget = "tp//guava:guava".parse().unwrap();

        assert_eq!(
            resolver.resolve(&root_target, Path::new("out/app")).unwrap(),
            PathBuf::from("/repo/out/app")
        );
        assert_eq!(
            resolver.resolve(&tp_target, Path::new("guava.jar")).unwrap(),
            PathBuf::from("/repo/third_party/guava.jar")
        );
    }

    #[test]
    fn test_unknown_cell() {
        let resolver = CellPathResolver::new("/repo");
        let target: BuildTarget = "nope//x:y".parse().unwrap();
        assert!(resolver.resolve(&target, Path::new("a")).is_err());
    }
}
