//! Identity map - one instance per (model, primary key) within an operation

use std::collections::HashMap;

use crate::error::{ModelError, ModelResult};
use crate::graph::{Graph, InstanceId};
use crate::model::Model;
use crate::primary_key::RecordKey;
use crate::query::Row;
use crate::relationships::column_key;

/// Maps (model name, primary key) to the instance created for it
///
/// Scoped to a single `find` or `pull_related` call and dropped afterwards.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<(String, RecordKey), InstanceId>,
    hits: usize,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from every keyed instance already held by `graph`
    pub fn seeded(graph: &Graph) -> Self {
        let mut map = Self::new();
        for instance in graph.iter() {
            if let Some(key) = instance.key() {
                map.entries
                    .entry((instance.model_name().to_string(), key.clone()))
                    .or_insert(instance.id());
            }
        }
        map
    }

    pub fn get(&self, model: &str, key: &RecordKey) -> Option<InstanceId> {
        self.entries.get(&(model.to_string(), key.clone())).copied()
    }

    /// Return the instance for `row`, creating it on first sight
    ///
    /// The flag is `true` when a new instance was created. An existing
    /// instance is returned unchanged; the row is dropped.
    pub fn get_or_create(
        &mut self,
        graph: &mut Graph,
        model: &Model,
        row: Row,
    ) -> ModelResult<(InstanceId, bool)> {
        let key = column_key(&row, model.primary_key()).ok_or_else(|| ModelError::MissingPrimaryKey {
            table: model.table().to_string(),
            column: model.primary_key().to_string(),
        })?;

        let entry_key = (model.name().to_string(), key);
        if let Some(id) = self.entries.get(&entry_key) {
            self.hits += 1;
            tracing::trace!(model = %model.name(), key = %entry_key.1, "identity map hit");
            return Ok((*id, false));
        }

        let id = graph.insert(model, Some(entry_key.1.clone()), row);
        self.entries.insert(entry_key, id);
        Ok((id, true))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of rows that resolved to an existing instance
    pub fn hits(&self) -> usize {
        self.hits
    }
}
