use super::{DbError, Result, Value};

pub use super::value::DataType;

pub type Row = Vec<Value>;

/// Column definition. Columns are nullable unless marked otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
        }
    }

    pub fn not_null(self) -> Self {
        Self {
            nullable: false,
            ..self
        }
    }

    /// Unique and NOT NULL
    pub fn primary_key(self) -> Self {
        Self {
            nullable: false,
            primary_key: true,
            ..self
        }
    }

    /// Check that `value` may be stored in this column.
    pub fn validate(&self, value: &Value) -> Result<()> {
        match value {
            Value::Null if self.nullable => Ok(()),
            Value::Null => Err(DbError::ConstraintViolation(format!(
                "Column '{}' cannot be NULL",
                self.name
            ))),
            other if self.data_type.is_compatible(other) => Ok(()),
            other => Err(DbError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                other.type_name()
            ))),
        }
    }
}

/// Ordered column list of a table
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    /// Position of the primary key column; at most one per table.
    pub fn primary_key_index(&self) -> Option<usize> {
        self.columns.iter().position(|col| col.primary_key)
    }

    pub(crate) fn push_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub(crate) fn remove_column(&mut self, index: usize) -> Column {
        self.columns.remove(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_not_null_rejects_null() {
        let col = Column::new("flow_id", DataType::Uuid).not_null();
        assert!(matches!(
            col.validate(&Value::Null),
            Err(DbError::ConstraintViolation(_))
        ));
        assert!(col.validate(&Value::Uuid(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn test_type_mismatch_names_column() {
        let col = Column::new("is_component", DataType::Boolean);
        let err = col.validate(&Value::Text("yes".into())).unwrap_err();
        assert!(matches!(err, DbError::TypeMismatch(msg) if msg.contains("is_component")));
    }

    #[test]
    fn test_primary_key_lookup() {
        let schema = Schema::new(vec![
            Column::new("name", DataType::Text),
            Column::new("id", DataType::Integer).primary_key(),
        ]);
        assert_eq!(schema.primary_key_index(), Some(1));
        assert!(!schema.get_column("id").unwrap().nullable);
    }
}
