use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use trellis_core::error::{Result, TrellisError};

/// How a field behaves when a stage update touches it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// The update value replaces the prior value.
    #[default]
    Overwrite,
    /// The update must be a JSON array; its entries are concatenated onto
    /// the prior array. The field only ever grows.
    Append,
}

/// Per-field merge policies for a graph's state.
///
/// Undeclared fields default to `Overwrite`; append-only fields (e.g. a
/// conversation `messages` log) must be declared so that a stage update can
/// never silently drop history.
#[derive(Debug, Clone, Default)]
pub struct StateSchema {
    policies: HashMap<String, MergePolicy>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field as append-only.
    pub fn append_only(mut self, field: impl Into<String>) -> Self {
        self.policies.insert(field.into(), MergePolicy::Append);
        self
    }

    /// The merge policy for a field.
    pub fn policy(&self, field: &str) -> MergePolicy {
        self.policies.get(field).copied().unwrap_or_default()
    }
}

/// The data threaded through a run.
///
/// Keys are strings; values are JSON for maximum flexibility. A record is
/// exclusively owned by the run executing it; stages see it by reference and
/// change it only through the `StateUpdate` they return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateRecord {
    data: HashMap<String, Value>,
}

impl StateRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record from initial data.
    pub fn from_map(data: HashMap<String, Value>) -> Self {
        Self { data }
    }

    /// Get a value by field name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }

    /// Get a value as a bool, if it's a bool.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.data.get(field).and_then(|v| v.as_bool())
    }

    /// Set a value.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.data.insert(field.into(), value);
    }

    /// Set a string value.
    pub fn set_str(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.data.insert(field.into(), Value::String(value.into()));
    }

    /// The underlying data map.
    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    /// Merge a stage's partial update into this record.
    ///
    /// The merge is shallow: only fields named by the update change.
    /// Overwrite fields are replaced; append-only fields are concatenated.
    pub fn apply(&mut self, update: StateUpdate, schema: &StateSchema) -> Result<()> {
        for (field, value) in update.into_fields() {
            match schema.policy(&field) {
                MergePolicy::Overwrite => {
                    self.data.insert(field, value);
                }
                MergePolicy::Append => {
                    let additions = match value {
                        Value::Array(items) => items,
                        other => {
                            return Err(TrellisError::StateMerge(format!(
                                "append-only field '{}' requires an array update, got {}",
                                field, other
                            )));
                        }
                    };
                    let entry = self
                        .data
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    match entry {
                        Value::Array(existing) => existing.extend(additions),
                        _ => {
                            return Err(TrellisError::StateMerge(format!(
                                "append-only field '{}' holds a non-array value",
                                field
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// The partial update a stage returns: only the fields it changes.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    fields: HashMap<String, Value>,
}

impl StateUpdate {
    /// An update that changes nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> HashMap<String, Value> {
        self.fields
    }
}
