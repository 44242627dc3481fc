//! # Test Verification Harness
//!
//! Runs a test case's function against its input tables and compares the
//! produced tables with the expected ones.
//!
//! - Runs are queued and executed by background workers
//! - Every run re-reads its entities from the store
//! - Outcomes are recorded on the test case (`last_status`, `last_error`,
//!   `last_run`, `actual_output_tables`)

pub mod compare;
pub mod errors;
pub mod queue;
pub mod runner;
pub mod test_case;

pub use compare::{compare_outputs, Comparison};
pub use errors::{HarnessError, HarnessResult};
pub use queue::{RunQueue, RunTicket, RunWorkers};
pub use runner::{TestHarness, MISMATCH_MESSAGE};
pub use test_case::{RunRecord, RunStatus, TestCase};
