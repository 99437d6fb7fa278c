use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use tracing::debug;

use super::rule::BuildRule;
use super::target::BuildTarget;
use crate::core::errors::{DistBuildError, Result};

/// Collects the rules of a build before it starts.
///
/// Call [`RuleResolver::finish`] once every rule is added to get the read-only
/// [`RuleFinder`] shared by concurrent builds.
#[derive(Default)]
pub struct RuleResolver {
    rules: Vec<Arc<dyn BuildRule>>,
    index: HashMap<BuildTarget, usize>,
}

impl RuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Arc<dyn BuildRule>) -> Result<()> {
        let target = rule.build_target().clone();
        if self.index.contains_key(&target) {
            return Err(DistBuildError::validation_field(
                format!("rule {} is defined twice", target),
                "build_target",
            ));
        }
        self.index.insert(target, self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    pub fn with_rule(mut self, rule: Arc<dyn BuildRule>) -> Result<Self> {
        self.add_rule(rule)?;
        Ok(self)
    }

    /// Link dependencies and validate the graph
    pub fn finish(self) -> Result<RuleFinder> {
        let mut graph = DiGraph::<Arc<dyn BuildRule>, ()>::with_capacity(self.rules.len(), 0);
        let mut node_indices = HashMap::with_capacity(self.rules.len());
        for rule in &self.rules {
            let idx = graph.add_node(rule.clone());
            node_indices.insert(rule.build_target().clone(), idx);
        }

        for rule in &self.rules {
            let from = node_indices[rule.build_target()];
            for dep in rule.build_deps() {
                let to = *node_indices.get(&dep).ok_or_else(|| {
                    let target = format!("{} (dependency of {})", dep, rule.build_target());
                    DistBuildError::rule_not_found(target)
                })?;
                graph.add_edge(from, to, ());
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(DistBuildError::validation("rule graph contains a dependency cycle"));
        }

        debug!(
            "Rule graph ready: {} rules, {} dependency edges",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(RuleFinder {
            graph,
            node_indices,
        })
    }
}

/// Read-only lookup over the finished rule graph
pub struct RuleFinder {
    graph: DiGraph<Arc<dyn BuildRule>, ()>,
    node_indices: HashMap<BuildTarget, NodeIndex>,
}

impl RuleFinder {
    fn node(&self, target: &BuildTarget) -> Result<NodeIndex> {
        self.node_indices
            .get(target)
            .copied()
            .ok_or_else(|| DistBuildError::rule_not_found(target.to_string()))
    }

    pub fn get_rule(&self, target: &BuildTarget) -> Result<Arc<dyn BuildRule>> {
        Ok(self.graph[self.node(target)?].clone())
    }

    pub fn contains(&self, target: &BuildTarget) -> bool {
        self.node_indices.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Every transitive dependency of `target`, sorted by target name.
    /// The rule itself is not included.
    pub fn dependency_closure(&self, target: &BuildTarget) -> Result<Vec<Arc<dyn BuildRule>>> {
        let start = self.node(target)?;
        let mut dfs = Dfs::new(&self.graph, start);
        let mut closure = Vec::new();
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != start {
                closure.push(self.graph[idx].clone());
            }
        }
        closure.sort_by(|a, b| a.build_target().cmp(b.build_target()));
        Ok(closure)
    }
}
