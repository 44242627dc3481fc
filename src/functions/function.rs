//! # Function Definition

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Supported implementation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplementationKind {
    /// Transform-script source run by the built-in interpreter
    Script,
    /// WebAssembly module run by wasmtime
    Wasm,
    /// Executable run as a child process
    External,
}

impl ImplementationKind {
    pub const SCRIPT: &'static str = "interpreted-script";
    pub const WASM: &'static str = "wasm";
    pub const EXTERNAL: &'static str = "external";

    /// Parse a stored `implementation_kind`; unknown kinds yield `None`
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            Self::SCRIPT => Some(Self::Script),
            Self::WASM => Some(Self::Wasm),
            Self::EXTERNAL => Some(Self::External),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => Self::SCRIPT,
            Self::Wasm => Self::WASM,
            Self::External => Self::EXTERNAL,
        }
    }
}

impl fmt::Display for ImplementationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_kind() -> String {
    ImplementationKind::SCRIPT.to_string()
}

/// A transformation with typed slot bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: u64,

    /// Function name
    pub name: String,

    /// Function description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Input slot to schema id
    #[serde(default)]
    pub input_schemas: BTreeMap<String, u64>,

    /// Output slot to schema id
    #[serde(default)]
    pub output_schemas: BTreeMap<String, u64>,

    /// How `implementation` is interpreted
    #[serde(default = "default_kind")]
    pub implementation_kind: String,

    /// Implementation payload
    #[serde(default)]
    pub implementation: String,

    /// SHA-256 of the implementation payload
    #[serde(default)]
    pub implementation_hash: String,

    /// Opaque configuration
    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// Created timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl FunctionDef {
    /// Create a new function definition
    pub fn new(
        name: impl Into<String>,
        kind: ImplementationKind,
        implementation: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let mut function = Self {
            id: 0,
            name: name.into(),
            description: None,
            input_schemas: BTreeMap::new(),
            output_schemas: BTreeMap::new(),
            implementation_kind: kind.as_str().to_string(),
            implementation: implementation.into(),
            implementation_hash: String::new(),
            parameters: Map::new(),
            created_at: now,
            updated_at: now,
        };
        function.refresh_hash();
        function
    }

    /// Bind an input slot
    pub fn with_input(mut self, slot: impl Into<String>, schema_id: u64) -> Self {
        self.input_schemas.insert(slot.into(), schema_id);
        self
    }

    /// Bind an output slot
    pub fn with_output(mut self, slot: impl Into<String>, schema_id: u64) -> Self {
        self.output_schemas.insert(slot.into(), schema_id);
        self
    }

    /// Set a configuration parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parsed implementation kind, `None` when unsupported
    pub fn kind(&self) -> Option<ImplementationKind> {
        ImplementationKind::parse(&self.implementation_kind)
    }

    /// Replace the implementation payload
    pub fn update_implementation(&mut self, implementation: impl Into<String>) {
        self.implementation = implementation.into();
        self.refresh_hash();
        self.updated_at = Utc::now();
    }

    /// Recompute `implementation_hash` from the payload
    pub fn refresh_hash(&mut self) {
        let mut hasher = Sha256::new();
        hasher.update(self.implementation.as_bytes());
        self.implementation_hash = format!("{:x}", hasher.finalize());
    }

    /// Every schema id referenced by an input or output slot
    pub fn referenced_schemas(&self) -> impl Iterator<Item = u64> + '_ {
        self.input_schemas
            .values()
            .chain(self.output_schemas.values())
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_creation() {
        let func = FunctionDef::new("double", ImplementationKind::Script, "fn process(x) {}")
            .with_input("x", 1)
            .with_output("y", 1);

        assert_eq!(func.name, "double");
        assert_eq!(func.kind(), Some(ImplementationKind::Script));
        assert!(!func.implementation_hash.is_empty());
        assert_eq!(func.referenced_schemas().count(), 2);
    }

    #[test]
    fn test_update_implementation() {
        let mut func = FunctionDef::new("f", ImplementationKind::Script, "a");
        let old_hash = func.implementation_hash.clone();
        func.update_implementation("b");
        assert_ne!(func.implementation_hash, old_hash);
    }

    #[test]
    fn test_unknown_kind_is_storable() {
        let func: FunctionDef = serde_json::from_value(json!({
            "name": "legacy",
            "implementation_kind": "python",
            "implementation": "def process(x): pass"
        }))
        .unwrap();
        assert_eq!(func.kind(), None);
        assert_eq!(func.implementation_kind, "python");
    }

    #[test]
    fn test_default_kind_is_script() {
        let func: FunctionDef = serde_json::from_value(json!({"name": "f"})).unwrap();
        assert_eq!(func.kind(), Some(ImplementationKind::Script));
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            ImplementationKind::Script,
            ImplementationKind::Wasm,
            ImplementationKind::External,
        ] {
            assert_eq!(ImplementationKind::parse(kind.as_str()), Some(kind));
        }
    }
}
