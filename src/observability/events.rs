//! Observable events
//!
//! Events are explicit and typed; the logger writes their string form.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Startup begins
    BootStart,
    /// Startup complete, ready to serve
    BootComplete,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,
    /// Configuration loaded
    ConfigLoaded,
    /// Entity store opened
    StoreOpened,
    /// Entity store failed its integrity check (FATAL)
    StoreCorrupted,
    /// HTTP server listening
    Serving,

    // Table validation
    /// Rows accepted by the validator
    TableValidated,
    /// Rows rejected by the validator
    TableRejected,

    // Function execution
    /// Implementation invoked
    InvocationBegin,
    /// Outputs produced and persisted
    InvocationComplete,
    /// Invocation or output materialization failed
    InvocationFailed,

    // Test runs
    /// Run accepted onto the queue
    RunQueued,
    /// Worker picked up a run
    RunBegin,
    /// All expected outputs matched
    RunPassed,
    /// An output differed from its expected table
    RunFailed,
    /// The run could not be evaluated
    RunErrored,
    /// Test case deleted before its run started
    RunSkipped,
    /// Output tables of a superseded run deleted
    OutputsReleased,

    // Workers
    /// Run worker started
    WorkerStarted,
    /// Run worker stopped
    WorkerStopped,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "TABULA_STARTUP_BEGIN",
            Event::BootComplete => "TABULA_STARTUP_COMPLETE",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::StoreOpened => "STORE_OPENED",
            Event::StoreCorrupted => "STORE_CORRUPTED",
            Event::Serving => "TABULA_SERVING",

            Event::TableValidated => "TABLE_VALIDATED",
            Event::TableRejected => "TABLE_REJECTED",

            Event::InvocationBegin => "INVOCATION_BEGIN",
            Event::InvocationComplete => "INVOCATION_COMPLETE",
            Event::InvocationFailed => "INVOCATION_FAILED",

            Event::RunQueued => "RUN_QUEUED",
            Event::RunBegin => "RUN_BEGIN",
            Event::RunPassed => "RUN_PASSED",
            Event::RunFailed => "RUN_FAILED",
            Event::RunErrored => "RUN_ERRORED",
            Event::RunSkipped => "RUN_SKIPPED",
            Event::OutputsReleased => "OUTPUTS_RELEASED",

            Event::WorkerStarted => "WORKER_STARTED",
            Event::WorkerStopped => "WORKER_STOPPED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::StoreCorrupted)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
