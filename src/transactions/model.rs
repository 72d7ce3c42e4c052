use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transaction as submitted by the caller.
///
/// `id` and `timestamp` are filled in at append time when absent. A missing
/// `flow_id` makes the append a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub flow_id: Option<Uuid>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub vertex_id: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub inputs: Option<serde_json::Value>,
    #[serde(default)]
    pub outputs: Option<serde_json::Value>,
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl NewTransaction {
    pub fn new(vertex_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            vertex_id: vertex_id.into(),
            status: status.into(),
            ..Self::default()
        }
    }

    pub fn flow_id(mut self, flow_id: Uuid) -> Self {
        self.flow_id = Some(flow_id);
        self
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn target_id(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn inputs(mut self, inputs: serde_json::Value) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn outputs(mut self, outputs: serde_json::Value) -> Self {
        self.outputs = Some(outputs);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Resolve into a storable record, assigning id and timestamp if missing.
    pub(crate) fn into_record(self, flow_id: Uuid) -> TransactionRecord {
        TransactionRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            flow_id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            vertex_id: self.vertex_id,
            target_id: self.target_id,
            inputs: self.inputs,
            outputs: self.outputs,
            status: self.status,
            error: self.error,
        }
    }
}

/// A stored transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub vertex_id: String,
    pub target_id: Option<String>,
    pub inputs: Option<serde_json::Value>,
    pub outputs: Option<serde_json::Value>,
    pub status: String,
    pub error: Option<String>,
}

/// Read model handed to API consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReadResponse {
    #[serde(rename = "transaction_id")]
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub vertex_id: String,
    pub target_id: Option<String>,
    pub inputs: Option<serde_json::Value>,
    pub outputs: Option<serde_json::Value>,
    pub status: String,
    pub error: Option<String>,
    pub flow_id: Uuid,
}

impl From<TransactionRecord> for TransactionReadResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id,
            timestamp: record.timestamp,
            vertex_id: record.vertex_id,
            target_id: record.target_id,
            inputs: record.inputs,
            outputs: record.outputs,
            status: record.status,
            error: record.error,
            flow_id: record.flow_id,
        }
    }
}

/// Projection into the read model that keeps the input's shape:
/// one record gives one response, a sequence gives a sequence in the same order.
pub trait IntoReadModel {
    type Output;

    fn into_read_model(self) -> Self::Output;
}

impl IntoReadModel for TransactionRecord {
    type Output = TransactionReadResponse;

    fn into_read_model(self) -> Self::Output {
        self.into()
    }
}

impl IntoReadModel for &TransactionRecord {
    type Output = TransactionReadResponse;

    fn into_read_model(self) -> Self::Output {
        self.clone().into()
    }
}

impl IntoReadModel for Vec<TransactionRecord> {
    type Output = Vec<TransactionReadResponse>;

    fn into_read_model(self) -> Self::Output {
        self.into_iter().map(Into::into).collect()
    }
}

impl IntoReadModel for &[TransactionRecord] {
    type Output = Vec<TransactionReadResponse>;

    fn into_read_model(self) -> Self::Output {
        self.iter().cloned().map(Into::into).collect()
    }
}

pub fn to_read_model<T: IntoReadModel>(value: T) -> T::Output {
    value.into_read_model()
}
