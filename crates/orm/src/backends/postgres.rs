//! PostgreSQL query executor
//!
//! Renders [`SelectQuery`] descriptions to parameterised SQL and runs them
//! through a sqlx connection pool.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Postgres, Row as SqlxRow, TypeInfo};

use super::core::QueryExecutor;
use crate::error::{ModelError, ModelResult};
use crate::query::{Filter, Row, SelectQuery};

/// Connection pool configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a free connection
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: 30,
            idle_timeout: Some(600),
        }
    }
}

/// Executor running queries against PostgreSQL
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: PgPool,
}

impl PostgresExecutor {
    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pool for `database_url` and wrap it
    pub async fn connect(database_url: &str, config: &PostgresConfig) -> ModelResult<Self> {
        if !database_url.starts_with("postgresql://") && !database_url.starts_with("postgres://") {
            return Err(ModelError::Configuration(
                "Invalid PostgreSQL URL scheme".to_string(),
            ));
        }

        let mut options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout));
        if let Some(idle_timeout) = config.idle_timeout {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        let pool = options.connect(database_url).await.map_err(|e| {
            tracing::error!("Failed to create PostgreSQL pool: {}", e);
            ModelError::QueryFailed(format!("Failed to create PostgreSQL pool: {}", e))
        })?;

        tracing::info!(
            "PostgreSQL pool created with {} max connections",
            config.max_connections
        );
        Ok(Self { pool })
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Render a query description to SQL and its positional parameters
    pub fn render(query: &SelectQuery) -> (String, Vec<JsonValue>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT * FROM {}", quote_ident(&query.table));

        if query.filter != Filter::All {
            sql.push_str(" WHERE ");
            sql.push_str(&render_filter(&query.filter, &mut params));
        }

        if !query.order.is_empty() {
            let order: Vec<String> = query
                .order
                .iter()
                .map(|order| format!("{} {}", quote_ident(&order.column), order.direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        (sql, params)
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(&self, query: &SelectQuery) -> ModelResult<Vec<Row>> {
        let (sql, params) = Self::render(query);
        tracing::debug!(sql = %sql, params = params.len(), "executing select");

        let mut db_query = sqlx::query(&sql);
        for param in &params {
            db_query = bind_json_value(db_query, param)?;
        }

        let rows = db_query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_map).collect()
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column side of a comparison. Strings are bound as text, so a column
/// compared with UUID-shaped strings is cast to text; this matches both
/// `uuid` and `text` columns.
fn compared_column(column: &str, values: &[JsonValue]) -> String {
    let uuid_shaped = values.iter().any(|value| {
        value
            .as_str()
            .is_some_and(|s| uuid::Uuid::parse_str(s).is_ok())
    });
    if uuid_shaped {
        format!("{}::text", quote_ident(column))
    } else {
        quote_ident(column)
    }
}

fn push_param(params: &mut Vec<JsonValue>, value: &JsonValue) -> String {
    params.push(value.clone());
    format!("${}", params.len())
}

fn render_filter(filter: &Filter, params: &mut Vec<JsonValue>) -> String {
    match filter {
        Filter::All => "TRUE".to_string(),
        Filter::Eq { column, value } if value.is_null() => {
            format!("{} IS NULL", quote_ident(column))
        }
        Filter::Eq { column, value } => format!(
            "{} = {}",
            compared_column(column, std::slice::from_ref(value)),
            push_param(params, value)
        ),
        Filter::In { values, .. } if values.is_empty() => "FALSE".to_string(),
        Filter::In { column, values } => {
            let placeholders: Vec<String> =
                values.iter().map(|value| push_param(params, value)).collect();
            format!(
                "{} IN ({})",
                compared_column(column, values),
                placeholders.join(", ")
            )
        }
        Filter::IsNull(column) => format!("{} IS NULL", quote_ident(column)),
        Filter::And(filters) => {
            let parts: Vec<String> = filters
                .iter()
                .map(|filter| format!("({})", render_filter(filter, params)))
                .collect();
            if parts.is_empty() {
                "TRUE".to_string()
            } else {
                parts.join(" AND ")
            }
        }
        Filter::Raw(sql) => sql.clone(),
    }
}

/// Bind a JSON value to a sqlx query
fn bind_json_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: &JsonValue,
) -> ModelResult<sqlx::query::Query<'q, Postgres, PgArguments>> {
    match value {
        JsonValue::Null => Ok(query.bind(Option::<String>::None)),
        JsonValue::Bool(b) => Ok(query.bind(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(query.bind(i))
            } else if let Some(f) = n.as_f64() {
                Ok(query.bind(f))
            } else {
                Err(ModelError::QueryFailed(format!("Unsupported number parameter {}", n)))
            }
        }
        JsonValue::String(s) => Ok(query.bind(s.clone())),
        JsonValue::Array(_) | JsonValue::Object(_) => Ok(query.bind(value.clone())),
    }
}

/// Convert a PostgreSQL row to a column map
fn row_to_map(row: &PgRow) -> ModelResult<Row> {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), column_to_json(row, index)?);
    }
    Ok(map)
}

fn column_to_json(row: &PgRow, index: usize) -> ModelResult<JsonValue> {
    let type_name = row.columns()[index].type_info().name().to_string();
    let decode_error =
        |e: sqlx::Error| ModelError::QueryFailed(format!("Failed to decode {} column: {}", type_name, e));

    let value = match type_name.as_str() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map_err(decode_error)?
            .map(JsonValue::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map_err(decode_error)?
            .map(JsonValue::from),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map_err(decode_error)?
            .map(JsonValue::from),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map_err(decode_error)?
            .map(JsonValue::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map_err(decode_error)?
            .map(|v| JsonValue::from(v as f64)),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map_err(decode_error)?
            .map(JsonValue::from),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map_err(decode_error)?
            .map(|v| JsonValue::String(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map_err(decode_error)?
            .map(|v| JsonValue::String(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map_err(decode_error)?
            .map(|v| JsonValue::String(v.to_string())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map_err(decode_error)?
            .map(|v| JsonValue::String(v.to_string())),
        "JSON" | "JSONB" => row
            .try_get::<Option<JsonValue>, _>(index)
            .map_err(decode_error)?,
        _ => row
            .try_get::<Option<String>, _>(index)
            .map_err(decode_error)?
            .map(JsonValue::String),
    };

    Ok(value.unwrap_or(JsonValue::Null))
}
