//! Relationship resolution
//!
//! An edge is resolved once per registry ([`ResolvedEdge`]) and fetched
//! through one of three resolvers:
//!
//! - [`SingleResolver`] for belongs-to and has-one edges
//! - [`MultipleResolver`] for has-many edges
//! - [`ThroughResolver`] for edges going through a join table
//!
//! Resolvers only fetch. They return target rows together with the source
//! correlation key each row belongs to; turning rows into instances and
//! wiring slots is left to the loader.

pub mod edge;
pub mod multiple;
pub mod single;
pub mod through;

use async_trait::async_trait;

use crate::backends::QueryExecutor;
use crate::config::LoaderConfig;
use crate::error::ModelResult;
use crate::primary_key::RecordKey;
use crate::query::{Filter, Row, SelectQuery};

pub use edge::{InverseSlot, JoinStrategy, ResolvedEdge};
pub use multiple::MultipleResolver;
pub use single::SingleResolver;
pub use through::ThroughResolver;

/// Target rows fetched for a batch of sources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedRows {
    /// Target rows in fetch order
    pub rows: Vec<Row>,
    /// (source correlation key, index into `rows`), in fetch order
    pub links: Vec<(RecordKey, usize)>,
}

impl FetchedRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fetches the related rows of one edge for a set of correlation keys
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Fetch related rows for `keys`. Keys are distinct; an empty slice
    /// issues no query.
    async fn fetch(&self, executor: &dyn QueryExecutor, keys: &[RecordKey]) -> ModelResult<FetchedRows>;
}

/// Pick the resolver for an edge
pub fn resolver_for(edge: &ResolvedEdge, config: &LoaderConfig) -> Box<dyn Resolver> {
    let table = edge.target.table().to_string();
    let batch_size = config.max_batch_size;

    match &edge.strategy {
        JoinStrategy::BelongsTo { target_column, .. } | JoinStrategy::HasOne { target_column, .. } => {
            Box::new(SingleResolver::new(table, target_column.clone(), batch_size))
        }
        JoinStrategy::HasMany { target_column, .. } => {
            Box::new(MultipleResolver::new(table, target_column.clone(), batch_size))
        }
        JoinStrategy::Through {
            join_table,
            join_source_column,
            join_target_column,
            target_column,
            ..
        } => Box::new(ThroughResolver {
            join_table: join_table.clone(),
            join_source_column: join_source_column.clone(),
            join_target_column: join_target_column.clone(),
            target_table: table,
            target_column: target_column.clone(),
            batch_size,
        }),
    }
}

/// Fetch rows of `table` whose `column` is in `keys`, one query per chunk
pub(crate) async fn fetch_in(
    executor: &dyn QueryExecutor,
    table: &str,
    column: &str,
    keys: &[RecordKey],
    batch_size: usize,
) -> ModelResult<Vec<Row>> {
    let mut rows = Vec::new();
    for chunk in keys.chunks(batch_size.max(1)) {
        let query = SelectQuery::new(table, Filter::in_keys(column, chunk));
        let batch = executor.execute(&query).await?;
        tracing::debug!(
            table = %table,
            column = %column,
            keys = chunk.len(),
            rows = batch.len(),
            "fetched related rows"
        );
        rows.extend(batch);
    }
    Ok(rows)
}

/// Correlation key stored in `column` of a row
pub(crate) fn column_key(row: &Row, column: &str) -> Option<RecordKey> {
    row.get(column).and_then(RecordKey::from_json)
}
