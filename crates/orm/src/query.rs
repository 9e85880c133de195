//! Query descriptions handed to the query collaborator
//!
//! The engine never writes SQL. It composes a [`SelectQuery`] (table, filter,
//! ordering, limit) with the [`Query`] builder and lets the executor decide
//! how to run it.

use std::fmt;

use serde_json::Value as JsonValue;

use crate::primary_key::RecordKey;

/// A fetched row: column name to scalar value
pub type Row = serde_json::Map<String, JsonValue>;

/// Filter predicate of a query
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Match every row
    #[default]
    All,
    /// `column = value`
    Eq { column: String, value: JsonValue },
    /// `column IN (values)`, the batch key list of a relationship fetch
    In { column: String, values: Vec<JsonValue> },
    /// `column IS NULL`
    IsNull(String),
    /// Conjunction of filters
    And(Vec<Filter>),
    /// Backend specific raw predicate, passed through verbatim
    Raw(String),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn in_list<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn in_keys(column: &str, keys: &[RecordKey]) -> Self {
        Filter::In {
            column: column.to_string(),
            values: keys.iter().map(RecordKey::to_json).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Filter::IsNull(column.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Filter::Raw(sql.into())
    }

    /// Combine two filters with AND, flattening nested conjunctions
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, other) => other,
            (this, Filter::All) => this,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), other) => {
                left.push(other);
                Filter::And(left)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Ordering directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: OrderDirection,
}

/// Complete query description sent to a [`QueryExecutor`](crate::backends::QueryExecutor)
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub filter: Filter,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>, filter: Filter) -> Self {
        Self {
            table: table.into(),
            filter,
            order: Vec::new(),
            limit: None,
        }
    }
}

/// Query builder used by `find`, `find_with` and relationship fetches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Filter,
    order: Vec<OrderBy>,
    limit: Option<u64>,
}

impl Query {
    /// Create a query matching every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Add WHERE equals condition
    pub fn where_eq(mut self, column: &str, value: impl Into<JsonValue>) -> Self {
        self.filter = self.filter.and(Filter::eq(column, value));
        self
    }

    /// Add WHERE IN condition
    pub fn where_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        self.filter = self.filter.and(Filter::in_list(column, values));
        self
    }

    /// Add WHERE IS NULL condition
    pub fn where_null(mut self, column: &str) -> Self {
        self.filter = self.filter.and(Filter::is_null(column));
        self
    }

    /// Add raw WHERE condition
    pub fn where_raw(mut self, sql: &str) -> Self {
        self.filter = self.filter.and(Filter::raw(sql));
        self
    }

    /// Add an arbitrary filter
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    /// Add ORDER BY ascending
    pub fn order_by(mut self, column: &str) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            direction: OrderDirection::Asc,
        });
        self
    }

    /// Add ORDER BY descending
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            direction: OrderDirection::Desc,
        });
        self
    }

    /// Add LIMIT
    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Ordering directives carried by this query
    pub fn ordering(&self) -> &[OrderBy] {
        &self.order
    }

    /// Bind the query to a table
    pub fn into_select(self, table: &str) -> SelectQuery {
        SelectQuery {
            table: table.to_string(),
            filter: self.filter,
            order: self.order,
            limit: self.limit,
        }
    }
}

impl From<Filter> for Query {
    fn from(filter: Filter) -> Self {
        Query {
            filter,
            ..Query::default()
        }
    }
}
