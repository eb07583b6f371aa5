//! Core types shared by the store, the sync engine and the HTTP surface.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding a task's text.
pub const TEXT_FIELD: &str = "text";

/// Field holding the uid of the identity that owns a task.
pub const OWNER_FIELD: &str = "owner";

/// Field name reserved for the document identifier.
pub const ID_FIELD: &str = "id";

/// Free-form document payload.
pub type Fields = Map<String, Value>;

/// A signed-in principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

/// A stored document: a store-assigned identifier plus its field payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Flatten into `{id, ...fields}`.
    pub fn to_json(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 1);
        map.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        for (key, value) in &self.fields {
            if key != ID_FIELD {
                map.insert(key.clone(), value.clone());
            }
        }
        Value::Object(map)
    }
}

/// Complete contents of a subscribed query at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<Document>,
}

/// What a snapshot subscription pushes to its handler.
#[derive(Debug, Clone)]
pub enum SnapshotEvent {
    Snapshot(Snapshot),
    /// The subscription failed after it was established. No further events follow.
    Error(StoreError),
}

/// Equality filter on one top-level field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

/// A live query: one collection, optionally narrowed by a field filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub collection: String,
    pub filter: Option<FieldFilter>,
}

impl Query {
    /// All documents of `collection` whose `owner` field equals `uid`.
    pub fn owned_by(collection: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Some(FieldFilter {
                field: OWNER_FIELD.to_string(),
                value: uid.into(),
            }),
        }
    }

    /// Check a document against the filter.
    pub fn matches(&self, doc: &Document) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => doc
                .fields
                .get(&filter.field)
                .and_then(Value::as_str)
                .is_some_and(|v| v == filter.value),
        }
    }
}

/// A task as rendered in the visible collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub owner: String,
    pub text: String,
}

impl TaskRecord {
    /// Build a record by merging the document id with its fields.
    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        let text = doc
            .fields
            .get(TEXT_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Malformed(format!("{}: missing text", doc.id)))?;
        let owner = doc
            .fields
            .get(OWNER_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Malformed(format!("{}: missing owner", doc.id)))?;

        Ok(Self {
            id: doc.id.clone(),
            owner: owner.to_string(),
            text: text.to_string(),
        })
    }
}

/// Insert payload for a new task.
pub fn task_fields(owner: &str, text: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert(TEXT_FIELD.to_string(), Value::String(text.to_string()));
    fields.insert(OWNER_FIELD.to_string(), Value::String(owner.to_string()));
    fields
}

/// Partial update payload replacing a task's text.
pub fn text_fields(text: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert(TEXT_FIELD.to_string(), Value::String(text.to_string()));
    fields
}
