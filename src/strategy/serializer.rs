//! Rule serialization used by the reconstructing strategy.
//!
//! A serialized rule carries its target, its kind, its own fields and the
//! resolved outputs of its whole dependency closure. Deserializing checks that
//! every dependency still resolves to the same output before rebuilding a fresh
//! rule object through the registered [`RuleFactory`](crate::rules::RuleFactory).

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::errors::Result;
use crate::distbuild_error;
use crate::rules::{BuildRule, BuildTarget, CellPathResolver, RuleFinder, RuleKindRegistry};

pub trait RuleSerializer: Send + Sync {
    fn serialize(&self, rule: &dyn BuildRule) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Arc<dyn BuildRule>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedDep {
    target: BuildTarget,
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedRule {
    target: BuildTarget,
    kind: String,
    /// JSON text; bincode cannot carry self-describing values
    fields: String,
    deps: Vec<SerializedDep>,
}

/// `bincode` envelope serializer backed by the shared read-only collaborators
pub struct BincodeRuleSerializer {
    rule_finder: Arc<RuleFinder>,
    cell_resolver: Arc<CellPathResolver>,
    kinds: Arc<RuleKindRegistry>,
}

impl BincodeRuleSerializer {
    pub fn new(
        rule_finder: Arc<RuleFinder>,
        cell_resolver: Arc<CellPathResolver>,
        kinds: Arc<RuleKindRegistry>,
    ) -> Self {
        Self {
            rule_finder,
            cell_resolver,
            kinds,
        }
    }

    fn resolved_output(&self, rule: &dyn BuildRule) -> Result<Option<PathBuf>> {
        rule.source_path_to_output()
            .map(|relative| self.cell_resolver.resolve(rule.build_target(), &relative))
            .transpose()
    }
}

impl RuleSerializer for BincodeRuleSerializer {
    fn serialize(&self, rule: &dyn BuildRule) -> Result<Vec<u8>> {
        let target = rule.build_target();
        let serializable = rule.as_serializable().ok_or_else(|| {
            distbuild_error!(execution, target.to_string(), "rule does not support serialization")
        })?;
        let fields = serializable.to_fields().map_err(|e| {
            distbuild_error!(execution, target.to_string(), "failed to collect rule fields", e)
        })?;

        let mut deps = Vec::new();
        for dep in self.rule_finder.dependency_closure(target)? {
            deps.push(SerializedDep {
                target: dep.build_target().clone(),
                output: self.resolved_output(dep.as_ref())?,
            });
        }

        let envelope = SerializedRule {
            target: target.clone(),
            kind: serializable.rule_kind().to_string(),
            fields: serde_json::to_string(&fields)?,
            deps,
        };
        let bytes = bincode::serialize(&envelope)?;
        debug!(
            "Serialized {} ({} deps) into {} bytes",
            target,
            envelope.deps.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Arc<dyn BuildRule>> {
        let envelope: SerializedRule = bincode::deserialize(bytes)?;
        let target = envelope.target;

        let mut deps = Vec::with_capacity(envelope.deps.len());
        for dep in envelope.deps {
            let rule = self.rule_finder.get_rule(&dep.target)?;
            let output = self.resolved_output(rule.as_ref())?;
            if output != dep.output {
                return Err(distbuild_error!(
                    execution,
                    target.to_string(),
                    format!(
                        "dependency {} resolves to {:?}, serialized as {:?}",
                        dep.target, output, dep.output
                    ),
                ));
            }
            deps.push(rule);
        }

        let factory = self.kinds.get(&envelope.kind).ok_or_else(|| {
            distbuild_error!(
                execution,
                target.to_string(),
                format!("no factory registered for rule kind '{}'", envelope.kind),
            )
        })?;
        let fields: serde_json::Value = serde_json::from_str(&envelope.fields)?;
        factory
            .reconstruct(&target, fields, &deps)
            .map_err(|e| {
                distbuild_error!(execution, target.to_string(), "failed to reconstruct rule", e)
            })
    }
}
