//! Test case definition and run status

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of the last run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Never run
    #[default]
    Unset,
    /// Every expected output matched
    Passed,
    /// An output differed from its expected table
    Failed,
    /// The run could not be evaluated
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Unset => "unset",
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unset" => Ok(RunStatus::Unset),
            "passed" => Ok(RunStatus::Passed),
            "failed" => Ok(RunStatus::Failed),
            "error" => Ok(RunStatus::Error),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// Harness-owned fields written when a run finishes
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub status: RunStatus,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
    /// Tables of a successful execution; `None` keeps the previous ones
    pub actual_output_tables: Option<BTreeMap<String, u64>>,
}

/// Binding of a function to input and expected-output tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: u64,

    /// Test case name
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Function under test
    pub function_id: u64,

    /// Input slot to table id
    #[serde(default)]
    pub input_tables: BTreeMap<String, u64>,

    /// Output slot to expected table id
    #[serde(default)]
    pub expected_output_tables: BTreeMap<String, u64>,

    /// Output slot to table produced by the last successful execution
    #[serde(default)]
    pub actual_output_tables: BTreeMap<String, u64>,

    /// Opaque configuration; `timeout` (seconds) bounds each run
    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// When the last run finished
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,

    /// Outcome of the last run
    #[serde(default)]
    pub last_status: RunStatus,

    /// Failure description of the last run
    #[serde(default)]
    pub last_error: Option<String>,

    /// Created timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl TestCase {
    /// Create an unrun test case for `function_id`
    pub fn new(name: impl Into<String>, function_id: u64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            description: None,
            function_id,
            input_tables: BTreeMap::new(),
            expected_output_tables: BTreeMap::new(),
            actual_output_tables: BTreeMap::new(),
            parameters: Map::new(),
            last_run: None,
            last_status: RunStatus::Unset,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bind an input slot to a table
    pub fn with_input(mut self, slot: impl Into<String>, table_id: u64) -> Self {
        self.input_tables.insert(slot.into(), table_id);
        self
    }

    /// Bind an output slot to an expected table
    pub fn with_expected(mut self, slot: impl Into<String>, table_id: u64) -> Self {
        self.expected_output_tables.insert(slot.into(), table_id);
        self
    }

    /// Set a configuration parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Run timeout from `parameters.timeout` (seconds), if set and positive.
    ///
    /// Values too large for a `Duration` saturate; the runtime caps them.
    pub fn timeout(&self) -> Option<Duration> {
        let seconds = self.parameters.get("timeout")?.as_f64()?;
        if seconds.is_finite() && seconds > 0.0 {
            Some(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
        } else {
            None
        }
    }

    /// Replace the client-owned fields with those of `update`
    pub fn apply_definition(&mut self, update: TestCase) {
        self.name = update.name;
        self.description = update.description;
        self.function_id = update.function_id;
        self.input_tables = update.input_tables;
        self.expected_output_tables = update.expected_output_tables;
        self.parameters = update.parameters;
    }

    /// Record a finished run.
    ///
    /// Returns the ids of previously owned tables that the new mapping no
    /// longer references.
    pub fn apply_run(&mut self, record: RunRecord) -> Vec<u64> {
        self.last_status = record.status;
        self.last_error = record.error;
        self.last_run = Some(record.finished_at);

        let Some(actual) = record.actual_output_tables else {
            return Vec::new();
        };
        let superseded = self
            .actual_output_tables
            .values()
            .copied()
            .filter(|old| !actual.values().any(|new| new == old))
            .collect();
        self.actual_output_tables = actual;
        superseded
    }

    /// Drop fields owned by the run harness
    pub fn clear_run_state(&mut self) {
        self.actual_output_tables.clear();
        self.last_run = None;
        self.last_status = RunStatus::Unset;
        self.last_error = None;
    }
}
