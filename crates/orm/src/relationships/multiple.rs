//! Multiple resolver - has-many edges

use async_trait::async_trait;

use super::{column_key, fetch_in, FetchedRows, Resolver};
use crate::backends::QueryExecutor;
use crate::error::ModelResult;
use crate::primary_key::RecordKey;

/// Fetches every target row whose foreign key `column` holds one of the keys
#[derive(Debug, Clone)]
pub struct MultipleResolver {
    table: String,
    column: String,
    batch_size: usize,
}

impl MultipleResolver {
    pub fn new(table: String, column: String, batch_size: usize) -> Self {
        Self {
            table,
            column,
            batch_size,
        }
    }
}

#[async_trait]
impl Resolver for MultipleResolver {
    async fn fetch(&self, executor: &dyn QueryExecutor, keys: &[RecordKey]) -> ModelResult<FetchedRows> {
        let mut fetched = FetchedRows::default();
        if keys.is_empty() {
            return Ok(fetched);
        }

        for row in fetch_in(executor, &self.table, &self.column, keys, self.batch_size).await? {
            if let Some(key) = column_key(&row, &self.column) {
                fetched.links.push((key, fetched.rows.len()));
                fetched.rows.push(row);
            }
        }
        Ok(fetched)
    }
}
