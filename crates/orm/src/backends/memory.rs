//! In-memory query executor
//!
//! Keeps tables as ordered row lists and evaluates [`SelectQuery`]
//! descriptions directly. Every executed query is logged so callers can
//! assert how many round trips an operation took.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, RwLock};

use super::core::QueryExecutor;
use crate::error::{ModelError, ModelResult};
use crate::primary_key::RecordKey;
use crate::query::{Filter, OrderDirection, Row, SelectQuery};

/// Executor backed by in-memory tables
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    failing_tables: RwLock<HashMap<String, String>>,
    log: Mutex<Vec<SelectQuery>>,
}

impl MemoryExecutor {
    /// Create an executor with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table with rows. Non-object values are ignored.
    pub fn with_rows<I>(mut self, table: &str, rows: I) -> Self
    where
        I: IntoIterator<Item = JsonValue>,
    {
        let entries = self.tables.get_mut().entry(table.to_string()).or_default();
        entries.extend(rows.into_iter().filter_map(|row| match row {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }));
        self
    }

    /// Insert a row into a table
    pub async fn insert(&self, table: &str, row: Row) {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    /// Make every query against `table` fail with the given message
    pub async fn fail_table(&self, table: &str, message: &str) {
        self.failing_tables
            .write()
            .await
            .insert(table.to_string(), message.to_string());
    }

    /// All queries executed so far, in execution order
    pub async fn queries(&self) -> Vec<SelectQuery> {
        self.log.lock().await.clone()
    }

    /// Number of queries executed so far
    pub async fn query_count(&self) -> usize {
        self.log.lock().await.len()
    }

    /// Number of queries executed against one table
    pub async fn query_count_for(&self, table: &str) -> usize {
        self.log
            .lock()
            .await
            .iter()
            .filter(|query| query.table == table)
            .count()
    }

    /// Forget the query log
    pub async fn clear_log(&self) {
        self.log.lock().await.clear();
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn execute(&self, query: &SelectQuery) -> ModelResult<Vec<Row>> {
        self.log.lock().await.push(query.clone());

        if let Some(message) = self.failing_tables.read().await.get(&query.table) {
            return Err(ModelError::QueryFailed(message.clone()));
        }

        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&query.table) else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        for row in rows {
            if row_matches(&query.filter, row)? {
                matched.push(row.clone());
            }
        }

        if !query.order.is_empty() {
            matched.sort_by(|a, b| {
                for order in &query.order {
                    let ordering = compare_values(
                        a.get(&order.column).unwrap_or(&JsonValue::Null),
                        b.get(&order.column).unwrap_or(&JsonValue::Null),
                    );
                    let ordering = match order.direction {
                        OrderDirection::Asc => ordering,
                        OrderDirection::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit as usize);
        }

        tracing::trace!(table = %query.table, rows = matched.len(), "memory query executed");
        Ok(matched)
    }
}

fn row_matches(filter: &Filter, row: &Row) -> ModelResult<bool> {
    let column_value = |column: &str| row.get(column).unwrap_or(&JsonValue::Null);

    match filter {
        Filter::All => Ok(true),
        Filter::Eq { column, value } => Ok(values_equal(column_value(column), value)),
        Filter::In { column, values } => {
            let actual = column_value(column);
            Ok(values.iter().any(|candidate| values_equal(actual, candidate)))
        }
        Filter::IsNull(column) => Ok(column_value(column).is_null()),
        Filter::And(filters) => {
            for filter in filters {
                if !row_matches(filter, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Filter::Raw(sql) => Err(ModelError::QueryFailed(format!(
            "Raw filter '{}' is not supported by the memory executor",
            sql
        ))),
    }
}

fn values_equal(left: &JsonValue, right: &JsonValue) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match (RecordKey::from_json(left), RecordKey::from_json(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn compare_values(left: &JsonValue, right: &JsonValue) -> Ordering {
    match (left, right) {
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Less,
        (_, JsonValue::Null) => Ordering::Greater,
        (JsonValue::Number(a), JsonValue::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (JsonValue::String(a), JsonValue::String(b)) => a.cmp(b),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => a.cmp(b),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use serde_json::json;

    fn executor() -> MemoryExecutor {
        MemoryExecutor::new().with_rows(
            "students",
            vec![
                json!({"id": 1, "name": "Ada", "teacherId": 1}),
                json!({"id": 2, "name": "Brook", "teacherId": 2}),
                json!({"id": 3, "name": "Cy", "teacherId": 1}),
                json!({"id": 4, "name": "Dee", "teacherId": null}),
            ],
        )
    }

    #[tokio::test]
    async fn test_memory_filters_and_ordering() {
        let executor = executor();

        let query = Query::new()
            .where_in("teacherId", vec![1])
            .order_by_desc("name")
            .into_select("students");
        let rows = executor.execute(&query).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("Cy"), json!("Ada")]);

        let query = Query::new().where_null("teacherId").into_select("students");
        let rows = executor.execute(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(4));

        assert_eq!(executor.query_count().await, 2);
    }

    #[tokio::test]
    async fn test_memory_limit_and_unknown_table() {
        let executor = executor();

        let rows = executor
            .execute(&Query::new().order_by("id").limit(2).into_select("students"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        let rows = executor
            .execute(&Query::new().into_select("ghosts"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_memory_rejects_raw_and_reports_failures() {
        let executor = executor();

        let raw = Query::new().where_raw("id > 1").into_select("students");
        assert!(matches!(
            executor.execute(&raw).await,
            Err(ModelError::QueryFailed(_))
        ));

        executor.fail_table("students", "connection reset").await;
        let err = executor
            .execute(&Query::new().into_select("students"))
            .await
            .unwrap_err();
        assert_eq!(err, ModelError::QueryFailed("connection reset".to_string()));
    }
}
