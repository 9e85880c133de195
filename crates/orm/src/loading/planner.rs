//! Load planning - turn dot-separated relationship paths into a tree
//!
//! `["teachers", "teachers.students", "principal"]` becomes
//!
//! ```text
//! teachers
//! └── students
//! principal
//! ```
//!
//! Shared prefixes are merged so every relationship is fetched once per
//! level. Every segment is resolved while planning, which means a bad path
//! fails before any query runs.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ModelError, ModelResult};
use crate::model::Model;
use crate::registry::Registry;
use crate::relationships::ResolvedEdge;

/// One relationship to load, and what to load below it
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub edge: Arc<ResolvedEdge>,
    pub children: IndexMap<String, PlanNode>,
}

impl PlanNode {
    fn new(edge: Arc<ResolvedEdge>) -> Self {
        Self {
            edge,
            children: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.edge.name
    }

    fn depth(&self) -> usize {
        1 + self.children.values().map(PlanNode::depth).max().unwrap_or(0)
    }
}

/// Merged tree of relationship paths for one root model
#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    pub roots: IndexMap<String, PlanNode>,
}

impl LoadPlan {
    /// Build and validate a plan for `model`
    ///
    /// Fails with `NoSuchAttribute` when a segment is not declared on the
    /// model it is looked up on, with `NoSuchRelationship` when it names a
    /// scalar attribute, and with `Configuration` when a path is deeper than
    /// the registry's `max_depth`.
    pub fn build<S: AsRef<str>>(registry: &Registry, model: &Model, paths: &[S]) -> ModelResult<Self> {
        let mut plan = Self::default();

        for path in paths {
            let path = path.as_ref();
            let segments: Vec<&str> = path.split('.').collect();
            if segments.len() > registry.config().max_depth {
                return Err(ModelError::Configuration(format!(
                    "Relationship path '{}' is deeper than the maximum of {}",
                    path,
                    registry.config().max_depth
                )));
            }

            let mut current = model.clone();
            let mut level = &mut plan.roots;
            for segment in segments {
                if segment.is_empty() {
                    return Err(ModelError::no_such_attribute(current.name(), path));
                }
                let edge = registry.edge(&current, segment)?;
                current = edge.target.clone();
                level = &mut level
                    .entry(segment.to_string())
                    .or_insert_with(|| PlanNode::new(edge))
                    .children;
            }
        }

        tracing::debug!(
            model = %model.name(),
            paths = paths.len(),
            depth = plan.depth(),
            "built load plan"
        );
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of top-level relationships
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Length of the longest path
    pub fn depth(&self) -> usize {
        self.roots.values().map(PlanNode::depth).max().unwrap_or(0)
    }
}
