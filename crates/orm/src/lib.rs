//! # elif-relations: relationship resolution and eager loading
//!
//! Models are declared with a [`Schema`] of scalar attributes and
//! relationship slots, attached to a [`Registry`], and queried through
//! [`Model::find`]. Relationship paths such as `"teachers.students"` are
//! planned up front and loaded breadth-first with one batched query per
//! relationship and level, so loading N parents and their children costs a
//! constant number of round trips.
//!
//! Every record loaded by one call is materialized exactly once in a
//! [`Graph`]; relationships are wired in both directions, and
//! [`Graph::to_json`] renders the result without looping on cycles.
//!
//! ```rust,no_run
//! use elif_relations::{
//!     AttributeDescriptor, FindOptions, MemoryExecutor, Model, Query, Registry,
//!     RelationshipDescriptor, Schema,
//! };
//!
//! # async fn demo() -> elif_relations::ModelResult<()> {
//! let registry = Registry::new(MemoryExecutor::new());
//! let teacher = Model::new(
//!     "teacher",
//!     Schema::define([
//!         ("name", AttributeDescriptor::from(AttributeDescriptor::string())),
//!         ("students", RelationshipDescriptor::has_many().into()),
//!     ])?,
//! );
//! let student = Model::new(
//!     "student",
//!     Schema::define([("teacher", RelationshipDescriptor::belongs_to())])?,
//! );
//! registry.attach(&teacher)?;
//! registry.attach(&student)?;
//!
//! let teachers = teacher
//!     .find(Query::new(), FindOptions::with_related(["students"]))
//!     .await?;
//! println!("{}", teachers.to_json());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod graph;
pub mod loading;
pub mod model;
pub mod naming;
pub mod primary_key;
pub mod query;
pub mod registry;
pub mod relationships;
pub mod schema;

// Re-export core types
pub use backends::{MemoryExecutor, PostgresConfig, PostgresExecutor, QueryExecutor};
pub use config::LoaderConfig;
pub use error::{ModelError, ModelResult, OrmError, OrmResult};
pub use graph::{Collection, Graph, InstanceId, InstanceRef, Record, Related};
pub use loading::{EagerLoader, IdentityMap, LoadPlan, LoadStats, PlanNode};
pub use model::{FindOptions, Model};
pub use primary_key::RecordKey;
pub use query::{Filter, OrderBy, OrderDirection, Query, Row, SelectQuery};
pub use registry::Registry;
pub use relationships::{InverseSlot, JoinStrategy, ResolvedEdge};
pub use schema::{
    AttributeDescriptor, Cardinality, KeyLocation, RelationshipDescriptor, ScalarField, ScalarType,
    Schema,
};
