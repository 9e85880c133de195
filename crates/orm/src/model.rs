//! Model definitions and their query entry points

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::error::{ModelError, ModelResult};
use crate::graph::{Collection, Graph, Record};
use crate::loading::{EagerLoader, IdentityMap, LoadPlan};
use crate::naming;
use crate::primary_key::RecordKey;
use crate::query::{Filter, Query, Row};
use crate::registry::{Registry, RegistryInner};
use crate::schema::Schema;

#[derive(Debug, Clone)]
struct ModelInner {
    name: String,
    table: String,
    primary_key: String,
    registered_as: String,
    schema: Schema,
    registry: OnceLock<Weak<RegistryInner>>,
}

/// A named model: schema, backing table and primary key column
///
/// `Model` is a cheap handle; clones refer to the same model. Configure it
/// with the builder methods before attaching it to a [`Registry`]; calling a
/// builder on an attached model yields a new, unattached model.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.inner.name)
            .field("table", &self.inner.table)
            .field("primary_key", &self.inner.primary_key)
            .finish()
    }
}

/// Options for `find` style operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Dot-separated relationship paths to eager load
    pub with_related: Vec<String>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Eager load every path in `paths`
    pub fn with_related<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            with_related: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Add one more path
    pub fn with(mut self, path: &str) -> Self {
        self.with_related.push(path.to_string());
        self
    }
}

impl Model {
    /// Define a model. The table defaults to the plural of `name`, the
    /// primary key to `id`.
    pub fn new(name: &str, schema: Schema) -> Self {
        let plural = naming::pluralize(name);
        Self {
            inner: Arc::new(ModelInner {
                name: name.to_string(),
                table: plural.clone(),
                primary_key: "id".to_string(),
                registered_as: plural,
                schema,
                registry: OnceLock::new(),
            }),
        }
    }

    /// Override the backing table
    pub fn table_name(mut self, table: &str) -> Self {
        self.edit().table = table.to_string();
        self
    }

    /// Override the primary key column
    pub fn primary_key_column(mut self, column: &str) -> Self {
        self.edit().primary_key = column.to_string();
        self
    }

    /// Override the alias the registry resolves in addition to the name
    pub fn registered_as(mut self, alias: &str) -> Self {
        self.edit().registered_as = alias.to_string();
        self
    }

    /// Mutable access for the builders. An attached model is never edited in
    /// place: the edit lands on a detached copy that has to be attached on
    /// its own, and the registry keeps the original.
    fn edit(&mut self) -> &mut ModelInner {
        if self.inner.registry.get().is_some() {
            let mut detached = ModelInner::clone(&self.inner);
            detached.registry = OnceLock::new();
            self.inner = Arc::new(detached);
        }
        Arc::make_mut(&mut self.inner)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn table(&self) -> &str {
        &self.inner.table
    }

    pub fn primary_key(&self) -> &str {
        &self.inner.primary_key
    }

    pub fn alias(&self) -> &str {
        &self.inner.registered_as
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Whether two handles refer to the same model
    pub fn ptr_eq(a: &Model, b: &Model) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// The registry this model is attached to
    pub fn registry(&self) -> ModelResult<Registry> {
        self.inner
            .registry
            .get()
            .and_then(Weak::upgrade)
            .map(Registry::from_inner)
            .ok_or_else(|| ModelError::NotAttached(self.inner.name.clone()))
    }

    pub(crate) fn lookup_names(&self) -> Vec<String> {
        let mut names = vec![self.inner.name.clone()];
        if self.inner.registered_as != self.inner.name {
            names.push(self.inner.registered_as.clone());
        }
        names
    }

    pub(crate) fn bind(&self, registry: Weak<RegistryInner>) -> ModelResult<()> {
        self.inner
            .registry
            .set(registry)
            .map_err(|_| ModelError::AlreadyAttached(self.inner.name.clone()))
    }

    /// Fetch every row matching `query` and eager load the requested paths
    ///
    /// Paths are validated before any query runs. All instances loaded by
    /// one call share a single [`Graph`], so one record is one instance no
    /// matter how many paths reach it.
    pub async fn find(&self, query: impl Into<Query>, options: FindOptions) -> ModelResult<Collection> {
        let registry = self.registry()?;
        let plan = LoadPlan::build(&registry, self, &options.with_related)?;

        let query: Query = query.into();
        let select = query.into_select(self.table());
        tracing::debug!(
            model = %self.name(),
            table = %self.table(),
            paths = plan.len(),
            "find"
        );
        let rows = registry.executor().execute(&select).await?;

        let mut graph = Graph::new(registry.clone());
        let mut identity = IdentityMap::new();
        let mut roots = Vec::with_capacity(rows.len());
        for row in rows {
            let (id, created) = identity.get_or_create(&mut graph, self, row)?;
            if created || !roots.contains(&id) {
                roots.push(id);
            }
        }

        EagerLoader::new(&registry)
            .load(&mut graph, &mut identity, &roots, &plan)
            .await?;

        Ok(Collection::new(graph, roots))
    }

    /// Like [`Model::find`], building the query with a closure
    pub async fn find_with<F>(&self, build: F, options: FindOptions) -> ModelResult<Collection>
    where
        F: FnOnce(Query) -> Query,
    {
        self.find(build(Query::new()), options).await
    }

    /// Fetch the record whose primary key equals `key`
    pub async fn find_by_id(
        &self,
        key: impl Into<RecordKey>,
        options: FindOptions,
    ) -> ModelResult<Option<Record>> {
        let key = key.into();
        let collection = self
            .find(Filter::eq(self.primary_key(), key.to_json()), options)
            .await?;
        Ok(collection.into_first())
    }

    /// Like [`Model::find_by_id`], failing with `NotFound` when nothing matches
    pub async fn find_or_fail(
        &self,
        key: impl Into<RecordKey>,
        options: FindOptions,
    ) -> ModelResult<Record> {
        let key = key.into();
        self.find_by_id(key.clone(), options)
            .await?
            .ok_or_else(|| ModelError::NotFound {
                table: self.table().to_string(),
                key: key.to_string(),
            })
    }

    /// Build a new, unsaved record in a graph of its own
    pub fn build(&self, attributes: Row) -> ModelResult<Record> {
        let mut graph = self.registry()?.graph();
        let id = graph.create(self, attributes)?;
        Ok(Record::new(graph, id))
    }
}
