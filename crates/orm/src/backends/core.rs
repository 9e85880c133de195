//! Core query collaborator trait
//!
//! The relationship engine talks to storage through this single narrow
//! interface: run a query description, get ordered rows back.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ModelResult;
use crate::query::{Row, SelectQuery};

/// Abstract query executor shared by every model attached to a registry
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a select query and return its rows in result order.
    ///
    /// Transport and query errors are reported as
    /// [`ModelError::QueryFailed`](crate::error::ModelError::QueryFailed).
    async fn execute(&self, query: &SelectQuery) -> ModelResult<Vec<Row>>;
}

#[async_trait]
impl<E> QueryExecutor for Arc<E>
where
    E: QueryExecutor + ?Sized,
{
    async fn execute(&self, query: &SelectQuery) -> ModelResult<Vec<Row>> {
        (**self).execute(query).await
    }
}
