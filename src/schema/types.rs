//! Schema and table type definitions
//!
//! A schema declares the field names a row may carry. Field kinds are
//! opaque metadata: only names are enforced.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of a table: field name to value
pub type Row = Map<String, Value>;

/// Ordered row collection, the shape of a table's `data`
pub type Rows = Vec<Row>;

/// Named record-shape declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: u64,
    /// Unique human key
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field name to field-kind descriptor
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Created timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ObjectSchema {
    /// Create a schema with the given attributes
    pub fn new(name: impl Into<String>, attributes: BTreeMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            description: None,
            attributes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convenience constructor from `(field, kind)` pairs
    pub fn with_fields(name: impl Into<String>, fields: &[(&str, &str)]) -> Self {
        let attributes = fields
            .iter()
            .map(|(field, kind)| (field.to_string(), Value::String(kind.to_string())))
            .collect();
        Self::new(name, attributes)
    }

    /// Whether rows of this schema may carry `field`
    pub fn declares(&self, field: &str) -> bool {
        self.attributes.contains_key(field)
    }
}

/// Validated row collection bound to one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: u64,
    /// Table name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Bound schema id
    pub object_id: u64,
    /// Rows conforming to the bound schema
    #[serde(default)]
    pub data: Rows,
    /// Created timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Table {
    /// Create a table bound to `object_id`
    pub fn new(name: impl Into<String>, object_id: u64, data: Rows) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            description: None,
            object_id,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Convert a JSON array of objects into rows.
///
/// Returns `None` when the value is not an array or an element is not an
/// object.
pub fn rows_from_value(value: &Value) -> Option<Rows> {
    value
        .as_array()?
        .iter()
        .map(|row| row.as_object().cloned())
        .collect()
}
