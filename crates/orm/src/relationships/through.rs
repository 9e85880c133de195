//! Through resolver - many-to-many edges over a join table

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::{column_key, fetch_in, FetchedRows, Resolver};
use crate::backends::QueryExecutor;
use crate::error::ModelResult;
use crate::primary_key::RecordKey;

/// Fetches join rows first, then the target rows they point at
///
/// Two rounds of queries: the join table filtered by the source keys, then
/// the target table filtered by the distinct target keys found. Join rows
/// with a null on either side are ignored. Targets are linked in target
/// fetch order.
#[derive(Debug, Clone)]
pub struct ThroughResolver {
    pub join_table: String,
    pub join_source_column: String,
    pub join_target_column: String,
    pub target_table: String,
    pub target_column: String,
    pub batch_size: usize,
}

#[async_trait]
impl Resolver for ThroughResolver {
    async fn fetch(&self, executor: &dyn QueryExecutor, keys: &[RecordKey]) -> ModelResult<FetchedRows> {
        let mut fetched = FetchedRows::default();
        if keys.is_empty() {
            return Ok(fetched);
        }

        let join_rows = fetch_in(
            executor,
            &self.join_table,
            &self.join_source_column,
            keys,
            self.batch_size,
        )
        .await?;

        // target key -> source keys, in join row order
        let mut sources_by_target: HashMap<RecordKey, Vec<RecordKey>> = HashMap::new();
        let mut target_keys = Vec::new();
        for row in &join_rows {
            let (Some(source), Some(target)) = (
                column_key(row, &self.join_source_column),
                column_key(row, &self.join_target_column),
            ) else {
                continue;
            };
            let sources = sources_by_target.entry(target.clone()).or_insert_with(|| {
                target_keys.push(target);
                Vec::new()
            });
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        if target_keys.is_empty() {
            return Ok(fetched);
        }

        let targets = fetch_in(
            executor,
            &self.target_table,
            &self.target_column,
            &target_keys,
            self.batch_size,
        )
        .await?;

        let mut seen = HashSet::new();
        for row in targets {
            let Some(key) = column_key(&row, &self.target_column) else {
                continue;
            };
            let Some(sources) = sources_by_target.get(&key) else {
                continue;
            };
            if !seen.insert(key.clone()) {
                continue;
            }
            let index = fetched.rows.len();
            fetched
                .links
                .extend(sources.iter().map(|source| (source.clone(), index)));
            fetched.rows.push(row);
        }

        Ok(fetched)
    }
}
