// ============================================================================
// Query Criteria
// ============================================================================
//
// Structured replacement for WHERE / ORDER BY / LIMIT clauses. Sessions and
// autocommit reads both take a `Query`; deletes take a bare `Predicate`.
//
// Ordering is multi-column. NULLs sort last for ASC and first for DESC, which
// is what reversing `Value::compare` yields. With a limit, only the rows that
// survive it are fully sorted, and only they are cloned out of the table.
//
// ============================================================================

use crate::core::{DbError, Result, Row, Schema, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Row filter
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = value`; NULL never matches
    Eq(String, Value),
    /// `column NOT IN (values)`; NULL never matches
    NotIn(String, HashSet<Value>),
    /// Conjunction of all inner predicates
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn not_in(column: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self::NotIn(column.into(), values.into_iter().collect())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut inner) => {
                inner.push(other);
                Self::And(inner)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn evaluate(&self, schema: &Schema, table: &str, row: &Row) -> Result<bool> {
        match self {
            Self::Eq(column, expected) => {
                let value = column_value(schema, table, row, column)?;
                Ok(!value.is_null() && value == expected)
            }
            Self::NotIn(column, values) => {
                let value = column_value(schema, table, row, column)?;
                Ok(!value.is_null() && !values.contains(value))
            }
            Self::And(inner) => {
                for predicate in inner {
                    if !predicate.evaluate(schema, table, row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

fn column_value<'a>(schema: &Schema, table: &str, row: &'a Row, column: &str) -> Result<&'a Value> {
    schema
        .find_column_index(column)
        .and_then(|idx| row.get(idx))
        .ok_or_else(|| DbError::ColumnNotFound(column.to_string(), table.to_string()))
}

/// Single ORDER BY key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// Filter + ordering + limit + projection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Option<Predicate>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
    columns: Option<Vec<String>>,
}

impl Query {
    /// Every row, every column, storage order
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn maybe_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Project the result onto the named columns, in that order
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Apply the query to borrowed rows, cloning only what it returns.
    pub fn execute<'a, I>(&self, schema: &Schema, table: &str, rows: I) -> Result<Vec<Row>>
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let mut selected: Vec<&Row> = Vec::new();
        for row in rows {
            let keep = match &self.filter {
                Some(predicate) => predicate.evaluate(schema, table, row)?,
                None => true,
            };
            if keep {
                selected.push(row);
            }
        }

        if self.order_by.is_empty() {
            if let Some(limit) = self.limit {
                selected.truncate(limit);
            }
        } else {
            let keys = resolve_keys(schema, table, &self.order_by)?;
            check_orderable(&selected, &keys)?;
            order_rows(&mut selected, &keys, self.limit);
        }

        match &self.columns {
            Some(columns) => {
                let indices = resolve_columns(schema, table, columns)?;
                Ok(selected
                    .into_iter()
                    .map(|row| indices.iter().map(|&idx| row[idx].clone()).collect())
                    .collect())
            }
            None => Ok(selected.into_iter().cloned().collect()),
        }
    }
}

/// Column index and direction of each ORDER BY key
fn resolve_keys(schema: &Schema, table: &str, keys: &[OrderBy]) -> Result<Vec<(usize, bool)>> {
    keys.iter()
        .map(|key| {
            schema
                .find_column_index(&key.column)
                .map(|idx| (idx, key.descending))
                .ok_or_else(|| DbError::ColumnNotFound(key.column.clone(), table.to_string()))
        })
        .collect()
}

fn resolve_columns(schema: &Schema, table: &str, columns: &[String]) -> Result<Vec<usize>> {
    columns
        .iter()
        .map(|column| {
            schema
                .find_column_index(column)
                .ok_or_else(|| DbError::ColumnNotFound(column.clone(), table.to_string()))
        })
        .collect()
}

/// Every non-NULL value of a sort key must compare with every other one,
/// so the comparator below is a total order.
fn check_orderable(rows: &[&Row], keys: &[(usize, bool)]) -> Result<()> {
    for &(idx, _) in keys {
        let mut first: Option<&Value> = None;
        for row in rows {
            let value = &row[idx];
            if value.is_null() {
                continue;
            }
            match first {
                Some(seen) => {
                    seen.compare(value)?;
                }
                None => first = Some(value),
            }
        }
    }
    Ok(())
}

fn compare_rows(a: &Row, b: &Row, keys: &[(usize, bool)]) -> Ordering {
    for &(idx, descending) in keys {
        let ord = a[idx].compare(&b[idx]).unwrap_or(Ordering::Equal);
        if ord != Ordering::Equal {
            return if descending { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

/// Sort `rows`, keeping only the first `limit` of them when a limit is set.
fn order_rows(rows: &mut Vec<&Row>, keys: &[(usize, bool)], limit: Option<usize>) {
    let cmp = |a: &&Row, b: &&Row| compare_rows(a, b, keys);

    if let Some(limit) = limit {
        if limit == 0 {
            rows.clear();
            return;
        }
        if limit < rows.len() {
            rows.select_nth_unstable_by(limit - 1, cmp);
            rows.truncate(limit);
        }
    }
    rows.sort_by(cmp);
}
