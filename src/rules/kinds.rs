//! Registry of rule kinds that can be rebuilt from serialized fields

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::rule::BuildRule;
use super::target::BuildTarget;

/// Rebuilds a rule object of one kind from its serialized fields
pub trait RuleFactory: Send + Sync {
    fn kind(&self) -> &str;

    /// `deps` is the resolved dependency closure of `target`.
    fn reconstruct(
        &self,
        target: &BuildTarget,
        fields: Value,
        deps: &[Arc<dyn BuildRule>],
    ) -> anyhow::Result<Arc<dyn BuildRule>>;
}

/// Factory for rules whose serialized fields are exactly their serde form
pub struct SerdeRuleFactory<R> {
    kind: String,
    _rule: PhantomData<fn() -> R>,
}

impl<R> SerdeRuleFactory<R> {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            _rule: PhantomData,
        }
    }
}

impl<R> RuleFactory for SerdeRuleFactory<R>
where
    R: BuildRule + DeserializeOwned + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn reconstruct(
        &self,
        target: &BuildTarget,
        fields: Value,
        _deps: &[Arc<dyn BuildRule>],
    ) -> anyhow::Result<Arc<dyn BuildRule>> {
        let rule: R = serde_json::from_value(fields)
            .map_err(|e| anyhow::anyhow!("Failed to rebuild {} as {}: {}", target, self.kind, e))?;
        if rule.build_target() != target {
            anyhow::bail!(
                "Rebuilt rule reports target {} instead of {}",
                rule.build_target(),
                target
            );
        }
        Ok(Arc::new(rule))
    }
}

/// Known rule kinds, filled before the build starts
#[derive(Clone, Default)]
pub struct RuleKindRegistry {
    factories: HashMap<String, Arc<dyn RuleFactory>>,
}

impl RuleKindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its kind, replacing any previous one
    pub fn register(&mut self, factory: Arc<dyn RuleFactory>) {
        self.factories.insert(factory.kind().to_string(), factory);
    }

    pub fn with(mut self, factory: Arc<dyn RuleFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn RuleFactory>> {
        self.factories.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// List all registered kinds
    pub fn list(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::rule::{BuildContext, Buildable, HasDeps, Step};
    use serde::Deserialize;
    use std::path::PathBuf;

    #[derive(Deserialize)]
    struct Filegroup {
        target: BuildTarget,
    }

    impl Buildable for Filegroup {
        fn build_steps(&self, _ctx: &BuildContext) -> anyhow::Result<Vec<Box<dyn Step>>> {
            Ok(Vec::new())
        }
    }

    impl HasDeps for Filegroup {
        fn build_deps(&self) -> Vec<BuildTarget> {
            Vec::new()
        }
    }

    impl BuildRule for Filegroup {
        fn build_target(&self) -> &BuildTarget {
            &self.target
        }

        fn source_path_to_output(&self) -> Option<PathBuf> {
            None
        }
    }

    fn registry() -> RuleKindRegistry {
        RuleKindRegistry::new()
            .with(Arc::new(SerdeRuleFactory::<Filegroup>::new("filegroup")))
            .with(Arc::new(SerdeRuleFactory::<Filegroup>::new("export_file")))
    }

    #[test]
    fn test_register_and_list() {
        let kinds = registry();
        assert!(kinds.contains("filegroup"));
        assert!(!kinds.contains("genrule"));
        assert_eq!(kinds.list(), vec!["export_file", "filegroup"]);
    }

    #[test]
    fn test_reconstruct_checks_target() {
        let kinds = registry();
        let factory = kinds.get("filegroup").unwrap();
        let target: BuildTarget = "//assets:icons".parse().unwrap();

        let rule = factory
            .reconstruct(&target, serde_json::json!({ "target": "//assets:icons" }), &[])
            .unwrap();
        assert_eq!(rule.build_target(), &target);

        let err = factory
            .reconstruct(&target, serde_json::json!({ "target": "//assets:other" }), &[])
            .err().unwrap();
        assert!(err.to_string().contains("//assets:other"));

        assert!(factory
            .reconstruct(&target, serde_json::json!({ "name": "icons" }), &[])
            .is_err());
    }
}
