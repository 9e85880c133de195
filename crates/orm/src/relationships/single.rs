//! Single resolver - belongs-to and has-one edges

use std::collections::HashSet;

use async_trait::async_trait;

use super::{column_key, fetch_in, FetchedRows, Resolver};
use crate::backends::QueryExecutor;
use crate::error::ModelResult;
use crate::primary_key::RecordKey;

/// Fetches at most one target row per correlation key.
///
/// For belongs-to the key is the source's foreign key and `column` the
/// target's primary key; for has-one the key is the source's primary key and
/// `column` the target's foreign key. When several rows match one key the
/// first one fetched wins and the rest are dropped.
#[derive(Debug, Clone)]
pub struct SingleResolver {
    table: String,
    column: String,
    batch_size: usize,
}

impl SingleResolver {
    pub fn new(table: String, column: String, batch_size: usize) -> Self {
        Self {
            table,
            column,
            batch_size,
        }
    }
}

#[async_trait]
impl Resolver for SingleResolver {
    async fn fetch(&self, executor: &dyn QueryExecutor, keys: &[RecordKey]) -> ModelResult<FetchedRows> {
        let mut fetched = FetchedRows::default();
        if keys.is_empty() {
            return Ok(fetched);
        }

        let mut seen = HashSet::new();
        for row in fetch_in(executor, &self.table, &self.column, keys, self.batch_size).await? {
            let Some(key) = column_key(&row, &self.column) else {
                continue;
            };
            if !seen.insert(key.clone()) {
                continue;
            }
            fetched.links.push((key, fetched.rows.len()));
            fetched.rows.push(row);
        }
        Ok(fetched)
    }
}
