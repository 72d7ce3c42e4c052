use super::model::TransactionRecord;
use crate::core::{Column, DataType, DbError, Result, Row, Value};
use crate::storage::TableSchema;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const TRANSACTION_TABLE: &str = "transaction";

pub(crate) const ID: &str = "id";
pub(crate) const FLOW_ID: &str = "flow_id";
pub(crate) const TIMESTAMP: &str = "timestamp";

const COLUMN_COUNT: usize = 9;

pub fn transaction_table_schema() -> TableSchema {
    TableSchema::new(
        TRANSACTION_TABLE,
        vec![
            Column::new(ID, DataType::Uuid).primary_key(),
            Column::new(FLOW_ID, DataType::Uuid).not_null(),
            Column::new(TIMESTAMP, DataType::Timestamp).not_null(),
            Column::new("vertex_id", DataType::Text).not_null(),
            Column::new("target_id", DataType::Text),
            Column::new("inputs", DataType::Json),
            Column::new("outputs", DataType::Json),
            Column::new("status", DataType::Text).not_null(),
            Column::new("error", DataType::Text),
        ],
    )
}

pub(crate) fn record_to_row(record: &TransactionRecord) -> Row {
    vec![
        Value::Uuid(record.id),
        Value::Uuid(record.flow_id),
        Value::Timestamp(record.timestamp),
        Value::Text(record.vertex_id.clone()),
        record.target_id.clone().into(),
        record.inputs.clone().into(),
        record.outputs.clone().into(),
        Value::Text(record.status.clone()),
        record.error.clone().into(),
    ]
}

pub(crate) fn row_to_record(row: Row) -> Result<TransactionRecord> {
    let values: [Value; COLUMN_COUNT] = row.try_into().map_err(|row: Row| {
        DbError::ExecutionError(format!(
            "transaction row has {} columns, expected {}",
            row.len(),
            COLUMN_COUNT
        ))
    })?;
    let [id, flow_id, timestamp, vertex_id, target_id, inputs, outputs, status, error] = values;

    Ok(TransactionRecord {
        id: uuid_value(ID, id)?,
        flow_id: uuid_value(FLOW_ID, flow_id)?,
        timestamp: timestamp_value(timestamp)?,
        vertex_id: text("vertex_id", vertex_id)?,
        target_id: optional_text("target_id", target_id)?,
        inputs: optional_json("inputs", inputs)?,
        outputs: optional_json("outputs", outputs)?,
        status: text("status", status)?,
        error: optional_text("error", error)?,
    })
}

fn mismatch(column: &str, expected: &str, value: &Value) -> DbError {
    DbError::TypeMismatch(format!(
        "Column '{}' expects type {}, got {}",
        column,
        expected,
        value.type_name()
    ))
}

fn uuid_value(column: &str, value: Value) -> Result<Uuid> {
    value.as_uuid().ok_or_else(|| mismatch(column, "UUID", &value))
}

fn timestamp_value(value: Value) -> Result<DateTime<Utc>> {
    value
        .as_timestamp()
        .ok_or_else(|| mismatch(TIMESTAMP, "TIMESTAMP", &value))
}

fn text(column: &str, value: Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(mismatch(column, "TEXT", &other)),
    }
}

fn optional_text(column: &str, value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        other => text(column, other).map(Some),
    }
}

fn optional_json(column: &str, value: Value) -> Result<Option<serde_json::Value>> {
    match value {
        Value::Null => Ok(None),
        Value::Json(doc) => Ok(Some(doc)),
        other => Err(mismatch(column, "JSON", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::NewTransaction;
    use serde_json::json;

    #[test]
    fn test_row_layout_matches_schema() {
        let schema = transaction_table_schema();
        assert_eq!(schema.schema().column_count(), COLUMN_COUNT);

        let record = NewTransaction::new("v", "success")
            .inputs(json!({"q": 1}))
            .into_record(Uuid::new_v4());
        let row = record_to_row(&record);
        for (column, value) in schema.schema().columns().iter().zip(&row) {
            column.validate(value).unwrap();
        }
        assert_eq!(row_to_record(row).unwrap(), record);
    }

    #[test]
    fn test_short_row_is_rejected() {
        let err = row_to_record(vec![Value::Null]).unwrap_err();
        assert!(matches!(err, DbError::ExecutionError(_)));
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let record = NewTransaction::new("v", "ok").into_record(Uuid::new_v4());
        let mut row = record_to_row(&record);
        row[3] = Value::Integer(1);
        let err = row_to_record(row).unwrap_err();
        assert!(matches!(err, DbError::TypeMismatch(msg) if msg.contains("vertex_id")));
    }
}
