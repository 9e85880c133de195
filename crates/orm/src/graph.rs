//! Instance graph - loaded records and the relationship slots linking them
//!
//! Instances live in an arena owned by a [`Graph`] and refer to each other
//! through [`InstanceId`] handles, so back-references and cycles need no
//! shared ownership. A relationship slot that has never been populated is
//! simply absent; a populated slot holds [`Related::One`] or
//! [`Related::Many`].

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::{ModelError, ModelResult};
use crate::loading::{wire, IdentityMap};
use crate::model::Model;
use crate::primary_key::RecordKey;
use crate::query::Row;
use crate::registry::Registry;
use crate::relationships::{column_key, resolver_for};
use crate::schema::Cardinality;

/// Handle of an instance inside one [`Graph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value of a loaded relationship slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Related {
    /// Single relationship; `None` when nothing matched
    One(Option<InstanceId>),
    /// Multiple relationship, in fetch order without duplicates
    Many(Vec<InstanceId>),
}

impl Related {
    fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::One => Related::One(None),
            Cardinality::Many => Related::Many(Vec::new()),
        }
    }

    /// Every instance held by the slot
    pub fn ids(&self) -> Vec<InstanceId> {
        match self {
            Related::One(id) => id.iter().copied().collect(),
            Related::Many(ids) => ids.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct Instance {
    model: Model,
    key: Option<RecordKey>,
    attributes: Row,
    relations: IndexMap<String, Related>,
}

/// Arena of instances loaded or created within one operation
#[derive(Debug, Clone)]
pub struct Graph {
    registry: Registry,
    instances: Vec<Instance>,
}

impl Graph {
    pub(crate) fn new(registry: Registry) -> Self {
        Self {
            registry,
            instances: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Borrow an instance
    pub fn get(&self, id: InstanceId) -> Option<InstanceRef<'_>> {
        (id.0 < self.instances.len()).then_some(InstanceRef { graph: self, id })
    }

    /// Iterate every instance in creation order
    pub fn iter(&self) -> impl Iterator<Item = InstanceRef<'_>> + '_ {
        (0..self.instances.len()).map(move |index| InstanceRef {
            graph: self,
            id: InstanceId(index),
        })
    }

    /// Find the instance of `model` with primary key `key`
    pub fn find(&self, model: &str, key: &RecordKey) -> Option<InstanceRef<'_>> {
        self.iter()
            .find(|instance| instance.model_name() == model && instance.key() == Some(key))
    }

    /// Create a new, unsaved instance after validating its attributes
    pub fn create(&mut self, model: &Model, attributes: Row) -> ModelResult<InstanceId> {
        model.schema().validate_write(model.name(), &attributes)?;
        let key = column_key(&attributes, model.primary_key());
        Ok(self.insert(model, key, attributes))
    }

    /// Write one attribute after validating it against the schema
    pub fn set_attribute(&mut self, id: InstanceId, name: &str, value: JsonValue) -> ModelResult<()> {
        let instance = self.slot_mut(id)?;
        instance
            .model
            .schema()
            .validate_value(instance.model.name(), name, &value)?;

        if name == instance.model.primary_key() {
            instance.key = RecordKey::from_json(&value);
        }
        instance.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Fetch one relationship of one instance and wire the result in
    ///
    /// Instances already present in the graph are reused, so pulling a
    /// relationship never duplicates a record the graph already holds.
    pub async fn pull_related(&mut self, id: InstanceId, name: &str) -> ModelResult<Related> {
        let model = self.slot(id)?.model.clone();
        let registry = self.registry.clone();
        let edge = registry.edge(&model, name).map_err(|err| match err {
            ModelError::NoSuchAttribute { model, attribute } => ModelError::NoSuchRelationship {
                model,
                relation: attribute,
            },
            other => other,
        })?;

        let key = self.column_key(id, edge.strategy.source_column());
        let keys: Vec<RecordKey> = key.iter().cloned().collect();
        tracing::debug!(
            model = %model.name(),
            relation = %name,
            key = ?key,
            "pulling relationship"
        );

        let fetched = resolver_for(&edge, registry.config())
            .fetch(registry.executor().as_ref(), &keys)
            .await?;

        let mut identity = IdentityMap::seeded(self);
        wire(self, &mut identity, &edge, &[(id, key)], fetched)?;

        Ok(self
            .slot(id)?
            .relations
            .get(name)
            .cloned()
            .unwrap_or_else(|| Related::empty(edge.cardinality)))
    }

    /// Plain JSON view of an instance and its loaded relationships
    ///
    /// A relationship value pointing at an instance that is already being
    /// rendered further up is left out. An instance reached a second time
    /// through another branch renders its attributes only.
    pub fn to_json(&self, id: InstanceId) -> JsonValue {
        if id.0 >= self.instances.len() {
            return JsonValue::Null;
        }
        let mut path = Vec::new();
        let mut expanded = HashSet::new();
        self.render(id, &mut path, &mut expanded)
    }

    fn render(
        &self,
        id: InstanceId,
        path: &mut Vec<InstanceId>,
        expanded: &mut HashSet<InstanceId>,
    ) -> JsonValue {
        let instance = &self.instances[id.0];
        let mut map = instance.attributes.clone();
        if !expanded.insert(id) {
            return JsonValue::Object(map);
        }

        path.push(id);
        for (name, related) in &instance.relations {
            let value = match related {
                Related::One(None) => JsonValue::Null,
                Related::One(Some(target)) if path.contains(target) => continue,
                Related::One(Some(target)) => self.render(*target, path, expanded),
                Related::Many(targets) => {
                    let mut items = Vec::with_capacity(targets.len());
                    for target in targets {
                        if !path.contains(target) {
                            items.push(self.render(*target, path, expanded));
                        }
                    }
                    JsonValue::Array(items)
                }
            };
            map.insert(name.clone(), value);
        }
        path.pop();

        JsonValue::Object(map)
    }

    fn slot(&self, id: InstanceId) -> ModelResult<&Instance> {
        self.instances
            .get(id.0)
            .ok_or_else(|| ModelError::Configuration(format!("Unknown instance {}", id)))
    }

    fn slot_mut(&mut self, id: InstanceId) -> ModelResult<&mut Instance> {
        self.instances
            .get_mut(id.0)
            .ok_or_else(|| ModelError::Configuration(format!("Unknown instance {}", id)))
    }

    pub(crate) fn insert(&mut self, model: &Model, key: Option<RecordKey>, attributes: Row) -> InstanceId {
        let id = InstanceId(self.instances.len());
        self.instances.push(Instance {
            model: model.clone(),
            key,
            attributes,
            relations: IndexMap::new(),
        });
        id
    }

    /// Correlation key held in `column` of an instance
    pub(crate) fn column_key(&self, id: InstanceId, column: &str) -> Option<RecordKey> {
        self.instances
            .get(id.0)
            .and_then(|instance| column_key(&instance.attributes, column))
    }

    /// Set a slot to its empty loaded state
    pub(crate) fn reset_slot(&mut self, id: InstanceId, name: &str, cardinality: Cardinality) {
        if let Some(instance) = self.instances.get_mut(id.0) {
            instance
                .relations
                .insert(name.to_string(), Related::empty(cardinality));
        }
    }

    pub(crate) fn set_one(&mut self, id: InstanceId, name: &str, target: InstanceId) {
        if let Some(instance) = self.instances.get_mut(id.0) {
            instance
                .relations
                .insert(name.to_string(), Related::One(Some(target)));
        }
    }

    /// Append to a multiple slot, creating it when absent. Never duplicates.
    pub(crate) fn push_many(&mut self, id: InstanceId, name: &str, target: InstanceId) {
        let Some(instance) = self.instances.get_mut(id.0) else {
            return;
        };
        let slot = instance
            .relations
            .entry(name.to_string())
            .or_insert_with(|| Related::Many(Vec::new()));
        match slot {
            Related::Many(ids) => {
                if !ids.contains(&target) {
                    ids.push(target);
                }
            }
            Related::One(_) => *slot = Related::Many(vec![target]),
        }
    }
}

/// Borrowed view of one instance
#[derive(Clone, Copy)]
pub struct InstanceRef<'g> {
    graph: &'g Graph,
    id: InstanceId,
}

impl<'g> InstanceRef<'g> {
    fn instance(&self) -> &'g Instance {
        &self.graph.instances[self.id.0]
    }

    fn view(&self, id: InstanceId) -> InstanceRef<'g> {
        InstanceRef {
            graph: self.graph,
            id,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn model(&self) -> &'g Model {
        &self.instance().model
    }

    pub fn model_name(&self) -> &'g str {
        self.instance().model.name()
    }

    /// Primary key; `None` for unsaved instances
    pub fn key(&self) -> Option<&'g RecordKey> {
        self.instance().key.as_ref()
    }

    /// Scalar attribute value
    pub fn get(&self, attribute: &str) -> Option<&'g JsonValue> {
        self.instance().attributes.get(attribute)
    }

    pub fn attributes(&self) -> &'g Row {
        &self.instance().attributes
    }

    /// Raw slot value; `None` when the relationship was never loaded
    pub fn related(&self, name: &str) -> Option<&'g Related> {
        self.instance().relations.get(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.instance().relations.contains_key(name)
    }

    /// Target of a single slot
    pub fn one(&self, name: &str) -> Option<InstanceRef<'g>> {
        match self.related(name)? {
            Related::One(Some(id)) => Some(self.view(*id)),
            Related::One(None) | Related::Many(_) => None,
        }
    }

    /// Members of a multiple slot; empty when not loaded
    pub fn many(&self, name: &str) -> Vec<InstanceRef<'g>> {
        match self.related(name) {
            Some(Related::Many(ids)) => ids.iter().map(|id| self.view(*id)).collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        self.graph.to_json(self.id)
    }
}

impl PartialEq for InstanceRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.graph, other.graph) && self.id == other.id
    }
}

impl Eq for InstanceRef<'_> {}

impl fmt::Debug for InstanceRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRef")
            .field("id", &self.id)
            .field("model", &self.model_name())
            .field("key", &self.key())
            .finish()
    }
}

impl Serialize for InstanceRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Result of a `find`: root instances plus the graph holding everything loaded
#[derive(Debug, Clone)]
pub struct Collection {
    graph: Graph,
    roots: Vec<InstanceId>,
}

impl Collection {
    pub(crate) fn new(graph: Graph, roots: Vec<InstanceId>) -> Self {
        Self { graph, roots }
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Root instance ids in query order
    pub fn ids(&self) -> &[InstanceId] {
        &self.roots
    }

    pub fn get(&self, index: usize) -> Option<InstanceRef<'_>> {
        self.roots.get(index).and_then(|id| self.graph.get(*id))
    }

    pub fn first(&self) -> Option<InstanceRef<'_>> {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = InstanceRef<'_>> + '_ {
        self.roots.iter().filter_map(move |id| self.graph.get(*id))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn into_parts(self) -> (Graph, Vec<InstanceId>) {
        (self.graph, self.roots)
    }

    pub(crate) fn into_first(self) -> Option<Record> {
        let root = *self.roots.first()?;
        Some(Record::new(self.graph, root))
    }

    /// See [`Graph::pull_related`]
    pub async fn pull_related(&mut self, id: InstanceId, name: &str) -> ModelResult<Related> {
        self.graph.pull_related(id, name).await
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Array(self.roots.iter().map(|id| self.graph.to_json(*id)).collect())
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// A single instance together with its graph
#[derive(Debug, Clone)]
pub struct Record {
    graph: Graph,
    root: InstanceId,
}

impl Record {
    pub(crate) fn new(graph: Graph, root: InstanceId) -> Self {
        Self { graph, root }
    }

    pub fn id(&self) -> InstanceId {
        self.root
    }

    pub fn instance(&self) -> InstanceRef<'_> {
        InstanceRef {
            graph: &self.graph,
            id: self.root,
        }
    }

    pub fn get(&self, attribute: &str) -> Option<&JsonValue> {
        self.instance().get(attribute)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn into_parts(self) -> (Graph, InstanceId) {
        (self.graph, self.root)
    }

    pub fn set_attribute(&mut self, name: &str, value: JsonValue) -> ModelResult<()> {
        self.graph.set_attribute(self.root, name, value)
    }

    /// Fetch one relationship of this record; see [`Graph::pull_related`]
    pub async fn pull_related(&mut self, name: &str) -> ModelResult<Related> {
        self.graph.pull_related(self.root, name).await
    }

    pub fn to_json(&self) -> JsonValue {
        self.graph.to_json(self.root)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
