//! Model registry - runtime name resolution for models and relationships

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::backends::QueryExecutor;
use crate::config::LoaderConfig;
use crate::error::{ModelError, ModelResult};
use crate::graph::Graph;
use crate::model::Model;
use crate::relationships::ResolvedEdge;

pub(crate) struct RegistryInner {
    /// Model name and registered alias -> model
    models: DashMap<String, Model>,
    /// (model name, relationship name) -> resolved edge
    edges: DashMap<(String, String), Arc<ResolvedEdge>>,
    executor: Arc<dyn QueryExecutor>,
    config: LoaderConfig,
}

/// Thread-safe registry resolving model names and relationship edges
///
/// Models reference each other by name. A model must be attached to exactly
/// one registry before it can run queries; the registry supplies the query
/// executor and the loader configuration.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.inner.models.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("Registry")
            .field("models", &names)
            .field("edges", &self.inner.edges.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Registry {
    /// Create a registry with the default loader configuration
    pub fn new<E>(executor: E) -> Self
    where
        E: QueryExecutor + 'static,
    {
        Self::from_parts(Arc::new(executor), LoaderConfig::default())
    }

    /// Create a registry sharing an executor handle
    pub fn shared(executor: Arc<dyn QueryExecutor>) -> Self {
        Self::from_parts(executor, LoaderConfig::default())
    }

    /// Create a registry with an explicit loader configuration
    pub fn with_config(executor: Arc<dyn QueryExecutor>, config: LoaderConfig) -> ModelResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(executor, config))
    }

    fn from_parts(executor: Arc<dyn QueryExecutor>, config: LoaderConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                models: DashMap::new(),
                edges: DashMap::new(),
                executor,
                config,
            }),
        }
    }

    /// Attach a model under its name and its registered alias
    pub fn attach(&self, model: &Model) -> ModelResult<()> {
        let names = model.lookup_names();

        for name in &names {
            if let Some(existing) = self.inner.models.get(name) {
                if !Model::ptr_eq(existing.value(), model) {
                    return Err(ModelError::Configuration(format!(
                        "Model name '{}' is already taken by model '{}'",
                        name,
                        existing.name()
                    )));
                }
            }
        }

        model.bind(Arc::downgrade(&self.inner))?;

        for name in names {
            self.inner.models.insert(name, model.clone());
        }

        tracing::debug!(
            model = %model.name(),
            table = %model.table(),
            alias = %model.alias(),
            "attached model"
        );
        Ok(())
    }

    /// Look up a model by name or alias
    pub fn lookup(&self, name: &str) -> Option<Model> {
        self.inner.models.get(name).map(|entry| entry.value().clone())
    }

    /// Look up a model by name or alias, failing with `NoSuchModel`
    pub fn resolve(&self, name: &str) -> ModelResult<Model> {
        self.lookup(name)
            .ok_or_else(|| ModelError::NoSuchModel(name.to_string()))
    }

    /// Check whether a name resolves to a model
    pub fn contains(&self, name: &str) -> bool {
        self.inner.models.contains_key(name)
    }

    /// Resolve a relationship of `model`, memoized per registry
    pub fn edge(&self, model: &Model, relation: &str) -> ModelResult<Arc<ResolvedEdge>> {
        let key = (model.name().to_string(), relation.to_string());
        if let Some(edge) = self.inner.edges.get(&key) {
            return Ok(edge.value().clone());
        }

        let edge = Arc::new(ResolvedEdge::resolve(self, model, relation)?);
        Ok(self.inner.edges.entry(key).or_insert(edge).value().clone())
    }

    /// Query executor shared by every attached model
    pub fn executor(&self) -> &Arc<dyn QueryExecutor> {
        &self.inner.executor
    }

    /// Loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Start an empty instance graph
    pub fn graph(&self) -> Graph {
        Graph::new(self.clone())
    }

    pub(crate) fn from_inner(inner: Arc<RegistryInner>) -> Self {
        Self { inner }
    }
}
