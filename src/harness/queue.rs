//! Background run queue
//!
//! `enqueue` acknowledges a run with a [`RunTicket`] and returns at once.
//! A fixed pool of worker tasks drains the queue; each run executes on the
//! blocking thread pool and re-reads everything it needs from the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::errors::{HarnessError, HarnessResult};
use super::runner::TestHarness;
use crate::observability::{Event, Logger};

/// Acknowledgement of an accepted run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunTicket {
    pub test_case_id: u64,
    pub run_id: Uuid,
    pub queued_at: DateTime<Utc>,
}

type TicketReceiver = Arc<Mutex<mpsc::UnboundedReceiver<RunTicket>>>;

/// Producer side of the run queue
#[derive(Debug, Clone)]
pub struct RunQueue {
    sender: mpsc::UnboundedSender<RunTicket>,
    harness: Arc<TestHarness>,
}

/// Worker tasks draining a [`RunQueue`]
#[derive(Debug)]
pub struct RunWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl RunQueue {
    /// Spawn `workers` tasks on the current runtime
    pub fn start(harness: Arc<TestHarness>, workers: usize) -> (Self, RunWorkers) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver: TicketReceiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker| tokio::spawn(work(worker, receiver.clone(), harness.clone())))
            .collect();

        (Self { sender, harness }, RunWorkers { handles })
    }

    /// Queue a run of an existing test case
    pub fn enqueue(&self, test_case_id: u64) -> HarnessResult<RunTicket> {
        if self.harness.store().get_test_case(test_case_id)?.is_none() {
            return Err(HarnessError::NotFound(test_case_id));
        }

        let ticket = RunTicket {
            test_case_id,
            run_id: Uuid::new_v4(),
            queued_at: Utc::now(),
        };
        self.sender
            .send(ticket)
            .map_err(|_| HarnessError::QueueClosed)?;

        self.harness.metrics().increment_runs_queued();
        let id = test_case_id.to_string();
        let run_id = ticket.run_id.to_string();
        Logger::info(
            Event::RunQueued.as_str(),
            &[("run_id", run_id.as_str()), ("test_case_id", id.as_str())],
        );
        Ok(ticket)
    }
}

impl RunWorkers {
    /// Wait for every worker to finish.
    ///
    /// Workers exit once all `RunQueue` handles are dropped and the queue
    /// is drained.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn work(worker: usize, receiver: TicketReceiver, harness: Arc<TestHarness>) {
    let worker = worker.to_string();
    Logger::trace(Event::WorkerStarted.as_str(), &[("worker", worker.as_str())]);

    loop {
        let ticket = { receiver.lock().await.recv().await };
        let Some(ticket) = ticket else {
            break;
        };

        let harness = harness.clone();
        let result = tokio::task::spawn_blocking(move || harness.run(ticket.test_case_id))
            .await
            .map_err(|err| HarnessError::Worker(format!("run join failed: {err}")))
            .and_then(|result| result);

        if let Err(err) = result {
            let id = ticket.test_case_id.to_string();
            let run_id = ticket.run_id.to_string();
            let error = err.to_string();
            Logger::error(
                Event::RunErrored.as_str(),
                &[
                    ("error", error.as_str()),
                    ("run_id", run_id.as_str()),
                    ("test_case_id", id.as_str()),
                    ("worker", worker.as_str()),
                ],
            );
        }
    }

    Logger::trace(Event::WorkerStopped.as_str(), &[("worker", worker.as_str())]);
}
