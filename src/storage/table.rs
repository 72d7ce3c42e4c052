use super::query::{Predicate, Query};
use crate::core::{Column, DbError, Result, Row, Schema, Value};
use std::collections::{BTreeMap, HashMap};

/// Storage-assigned row identifier, stable for the life of the row
pub type RowId = u64;

#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .columns()
            .iter()
            .map(|col| col.name.clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.schema.find_column_index(name).is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<RowId, Row>,
    /// Primary key value -> row, for tables that declare one
    primary_index: HashMap<Value, RowId>,
    next_row_id: RowId,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            primary_index: HashMap::new(),
            next_row_id: 0,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn insert(&mut self, row: Row) -> Result<RowId> {
        self.validate_row(&row)?;
        self.check_uniqueness(&row)?;

        let id = self.next_row_id;
        self.next_row_id += 1;
        self.index_row(id, &row);
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Remove a row, returning it so the caller can undo the removal.
    pub fn remove(&mut self, id: RowId) -> Option<Row> {
        let row = self.rows.remove(&id)?;
        if let Some(pk) = self.schema.schema().primary_key_index() {
            self.primary_index.remove(&row[pk]);
        }
        Some(row)
    }

    /// Put a row back under its original id (undo of a delete).
    pub fn restore(&mut self, id: RowId, row: Row) {
        self.index_row(id, &row);
        self.rows.insert(id, row);
    }

    /// Row holding `key` in the primary key column
    pub fn find_by_key(&self, key: &Value) -> Option<RowId> {
        self.primary_index.get(key).copied()
    }

    pub fn select(&self, query: &Query) -> Result<Vec<Row>> {
        query.execute(self.schema.schema(), self.name(), self.rows.values())
    }

    pub fn matching_ids(&self, predicate: &Predicate) -> Result<Vec<RowId>> {
        if let Predicate::Eq(column, key) = predicate {
            let pk = self.schema.schema().primary_key_index();
            if pk.is_some() && pk == self.schema.schema().find_column_index(column) {
                return Ok(self.find_by_key(key).into_iter().collect());
            }
        }

        let mut ids = Vec::new();
        for (id, row) in &self.rows {
            if predicate.evaluate(self.schema.schema(), self.name(), row)? {
                ids.push(*id);
            }
        }
        Ok(ids)
    }

    /// Add a column; existing rows get NULL.
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.schema.has_column(&column.name) {
            return Err(DbError::ColumnExists(column.name, self.name().to_string()));
        }
        if !column.nullable && !self.rows.is_empty() {
            return Err(DbError::ConstraintViolation(format!(
                "Cannot add NOT NULL column '{}' to non-empty table '{}'",
                column.name,
                self.name()
            )));
        }

        self.schema.schema.push_column(column);
        for row in self.rows.values_mut() {
            row.push(Value::Null);
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<Column> {
        let idx = self
            .schema
            .schema()
            .find_column_index(name)
            .ok_or_else(|| DbError::ColumnNotFound(name.to_string(), self.name().to_string()))?;

        if self.schema.schema().columns()[idx].primary_key {
            return Err(DbError::ConstraintViolation(format!(
                "Cannot drop primary key column '{}'",
                name
            )));
        }

        for row in self.rows.values_mut() {
            row.remove(idx);
        }
        Ok(self.schema.schema.remove_column(idx))
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.schema().columns();
        if row.len() != columns.len() {
            return Err(DbError::ExecutionError(format!(
                "Table '{}' expects {} values, got {}",
                self.name(),
                columns.len(),
                row.len()
            )));
        }

        for (column, value) in columns.iter().zip(row) {
            column.validate(value)?;
        }
        Ok(())
    }

    fn check_uniqueness(&self, row: &Row) -> Result<()> {
        let Some(pk) = self.schema.schema().primary_key_index() else {
            return Ok(());
        };

        let value = &row[pk];
        if self.primary_index.contains_key(value) {
            return Err(DbError::ConstraintViolation(format!(
                "Unique constraint violation: Column '{}' already contains value {}",
                self.schema.schema().columns()[pk].name,
                value
            )));
        }
        Ok(())
    }

    fn index_row(&mut self, id: RowId, row: &Row) {
        if let Some(pk) = self.schema.schema().primary_key_index() {
            self.primary_index.insert(row[pk].clone(), id);
        }
    }
}
