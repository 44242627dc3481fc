//! Test case runs
//!
//! A run re-reads the test case, its function and input tables from the
//! store, executes the function and records a terminal status:
//!
//! ```text
//! unset ──run──► passed | failed | error ──run──► ...
//! ```
//!
//! Execution failures never escape as errors; they become
//! `last_status = error` with the message in `last_error`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use super::compare::{compare_outputs, Comparison};
use super::errors::HarnessResult;
use super::test_case::{RunRecord, RunStatus, TestCase};
use crate::functions::{ExecutionEngine, FunctionError, RuntimeConfig};
use crate::observability::{Event, Logger, MetricsRegistry, Timer};
use crate::schema::Table;
use crate::store::{Store, StoreError};

/// `last_error` of a run whose outputs differ from the expected tables
pub const MISMATCH_MESSAGE: &str = "output does not match expected results";

/// Terminal outcome of one evaluation
#[derive(Debug)]
struct Evaluation {
    status: RunStatus,
    error: Option<String>,
    /// Tables produced by a successful execution
    outputs: Option<BTreeMap<String, Table>>,
}

impl Evaluation {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            error: Some(message.into()),
            outputs: None,
        }
    }

    fn executed(
        status: RunStatus,
        error: Option<String>,
        outputs: BTreeMap<String, Table>,
    ) -> Self {
        Self {
            status,
            error,
            outputs: Some(outputs),
        }
    }
}

/// Runs test cases against the shared store
#[derive(Debug, Clone)]
pub struct TestHarness {
    store: Arc<dyn Store>,
    engine: ExecutionEngine,
    config: RuntimeConfig,
    metrics: Arc<MetricsRegistry>,
}

impl TestHarness {
    pub fn new(store: Arc<dyn Store>, config: RuntimeConfig, metrics: Arc<MetricsRegistry>) -> Self {
        let engine = ExecutionEngine::new(store.clone()).with_metrics(metrics.clone());
        Self {
            store,
            engine,
            config,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Run a test case and record the outcome on it.
    ///
    /// Only the harness-owned fields are written, merged into the stored
    /// record in one store write. Returns the updated test case, or `None`
    /// when it no longer exists.
    pub fn run(&self, test_case_id: u64) -> HarnessResult<Option<TestCase>> {
        let id = test_case_id.to_string();
        let Some(test_case) = self.store.get_test_case(test_case_id)? else {
            Logger::warn(Event::RunSkipped.as_str(), &[("test_case_id", id.as_str())]);
            return Ok(None);
        };

        Logger::info(Event::RunBegin.as_str(), &[("test_case_id", id.as_str())]);
        let timer = Timer::new();
        let evaluation = self.evaluate(&test_case);
        let produced: Vec<u64> = evaluation
            .outputs
            .iter()
            .flat_map(|outputs| outputs.values().map(|t| t.id))
            .collect();

        let record = RunRecord {
            status: evaluation.status,
            error: evaluation.error,
            finished_at: Utc::now(),
            actual_output_tables: evaluation.outputs.map(|outputs| {
                outputs
                    .into_iter()
                    .map(|(slot, table)| (slot, table.id))
                    .collect()
            }),
        };

        let (saved, superseded) = match self.store.record_run(test_case_id, record) {
            Ok(recorded) => recorded,
            Err(StoreError::Missing { .. }) => {
                // Deleted while running; nothing owns the new tables
                self.release(test_case_id, produced.into_iter());
                Logger::warn(Event::RunSkipped.as_str(), &[("test_case_id", id.as_str())]);
                return Ok(None);
            }
            Err(e) => {
                self.release(test_case_id, produced.into_iter());
                return Err(e.into());
            }
        };
        self.release(test_case_id, superseded.into_iter());

        self.record(&saved, &timer);
        Ok(Some(saved))
    }

    fn evaluate(&self, test_case: &TestCase) -> Evaluation {
        let function = match self.store.get_function(test_case.function_id) {
            Ok(Some(function)) => function,
            Ok(None) => {
                return Evaluation::error(format!("Function {} not found", test_case.function_id))
            }
            Err(e) => return Evaluation::error(e.to_string()),
        };

        let mut inputs = BTreeMap::new();
        for (slot, table_id) in &test_case.input_tables {
            match self.store.get_table(*table_id) {
                Ok(Some(table)) => {
                    inputs.insert(slot.clone(), table);
                }
                Ok(None) => {
                    return Evaluation::error(format!(
                        "Input table {} (id: {}) not found",
                        slot, table_id
                    ))
                }
                Err(e) => return Evaluation::error(e.to_string()),
            }
        }

        let config = match test_case.timeout() {
            Some(timeout) => self.config.with_timeout(timeout),
            None => self.config,
        };
        let outputs = match self.engine.execute(&function, &inputs, test_case.id, &config) {
            Ok(outputs) => outputs,
            Err(e) => return Evaluation::error(e.to_string()),
        };

        match compare_outputs(&test_case.expected_output_tables, &outputs, self.store.as_ref()) {
            Ok(Comparison::Match) => Evaluation::executed(RunStatus::Passed, None, outputs),
            Ok(Comparison::Mismatch { .. }) => Evaluation::executed(
                RunStatus::Failed,
                Some(MISMATCH_MESSAGE.to_string()),
                outputs,
            ),
            Ok(Comparison::Missing { slot }) => Evaluation::executed(
                RunStatus::Error,
                Some(FunctionError::MissingOutput(slot).to_string()),
                outputs,
            ),
            Ok(Comparison::ExpectedTableMissing { slot, table_id }) => Evaluation::executed(
                RunStatus::Error,
                Some(format!(
                    "Expected output table {} (id: {}) not found",
                    slot, table_id
                )),
                outputs,
            ),
            Err(e) => Evaluation::executed(RunStatus::Error, Some(e.to_string()), outputs),
        }
    }

    fn release(&self, test_case_id: u64, tables: impl Iterator<Item = u64>) {
        let id = test_case_id.to_string();
        for table_id in tables {
            let table = table_id.to_string();
            match self.store.delete_table(table_id) {
                Ok(_) => Logger::trace(
                    Event::OutputsReleased.as_str(),
                    &[("table_id", table.as_str()), ("test_case_id", id.as_str())],
                ),
                Err(e) => {
                    let error = e.to_string();
                    Logger::error(
                        Event::OutputsReleased.as_str(),
                        &[
                            ("error", error.as_str()),
                            ("table_id", table.as_str()),
                            ("test_case_id", id.as_str()),
                        ],
                    );
                }
            }
        }
    }

    fn record(&self, test_case: &TestCase, timer: &Timer) {
        let id = test_case.id.to_string();
        let duration_ms = timer.elapsed_ms();
        match test_case.last_status {
            RunStatus::Passed => {
                self.metrics.increment_runs_passed();
                Logger::info(
                    Event::RunPassed.as_str(),
                    &[("duration_ms", duration_ms.as_str()), ("test_case_id", id.as_str())],
                );
            }
            RunStatus::Failed => {
                self.metrics.increment_runs_failed();
                Logger::info(
                    Event::RunFailed.as_str(),
                    &[("duration_ms", duration_ms.as_str()), ("test_case_id", id.as_str())],
                );
            }
            RunStatus::Error => {
                self.metrics.increment_runs_errored();
                let error = test_case.last_error.clone().unwrap_or_default();
                Logger::warn(
                    Event::RunErrored.as_str(),
                    &[
                        ("duration_ms", duration_ms.as_str()),
                        ("error", error.as_str()),
                        ("test_case_id", id.as_str()),
                    ],
                );
            }
            // A finished run always has a terminal status
            RunStatus::Unset => {}
        }
    }
}
