//! Chunked concurrent mutation runner
//!
//! Candidates are split into consecutive chunks of `batch_size`. Every item
//! of a chunk is in flight at once; the next chunk starts only after the
//! whole chunk has completed. Interrupts are honoured between chunks only.

use super::report::{BatchReport, MutationResult};
use crate::config::BatchSettings;
use crate::consistency::ConsistencyState;
use crate::graph::{MutationKind, Username};
use crate::integrations::{FailureReason, MutationOutcome, RemoteGraph};
use crate::metrics;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct BatchExecutor {
    client: Arc<dyn RemoteGraph>,
    state: Arc<ConsistencyState>,
    batch_size: usize,
    request_timeout: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl BatchExecutor {
    pub fn new(
        client: Arc<dyn RemoteGraph>,
        state: Arc<ConsistencyState>,
        settings: &BatchSettings,
    ) -> Self {
        Self {
            client,
            state,
            batch_size: settings.batch_size.max(1),
            request_timeout: settings.request_timeout(),
            cancel: None,
        }
    }

    /// Override the configured chunk size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Stop launching chunks once `cancel` reads `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub async fn run(&self, usernames: &[Username], kind: MutationKind) -> BatchReport {
        self.run_with_progress(usernames, kind, |_| {}).await
    }

    /// Run the batch, calling `on_result` as each item completes
    pub async fn run_with_progress<F>(
        &self,
        usernames: &[Username],
        kind: MutationKind,
        mut on_result: F,
    ) -> BatchReport
    where
        F: FnMut(&MutationResult),
    {
        let start = Instant::now();
        let mut report = BatchReport::default();
        let chunk_count = usernames.len().div_ceil(self.batch_size);

        info!(
            kind = %kind,
            total = usernames.len(),
            batch_size = self.batch_size,
            chunks = chunk_count,
            "Starting batch run"
        );

        for (index, chunk) in usernames.chunks(self.batch_size).enumerate() {
            if self.is_cancelled() {
                report.cancelled = true;
                report.skipped = usernames.len() - report.attempted;
                warn!(
                    completed_chunks = index,
                    skipped = report.skipped,
                    "Batch run interrupted, not starting further chunks"
                );
                break;
            }

            debug!(chunk = index + 1, of = chunk_count, size = chunk.len(), "Dispatching chunk");

            let mut in_flight: FuturesUnordered<_> = chunk
                .iter()
                .map(|username| self.execute_one(username, kind))
                .collect();

            while let Some(result) = in_flight.next().await {
                if result.is_success() {
                    self.state.record_mutation(&result.username, kind);
                }
                metrics::record_mutation(kind.verb(), result.is_success());
                on_result(&result);
                report.push(result);
            }
        }

        report.elapsed = start.elapsed();
        metrics::record_batch_duration(kind.verb(), report.elapsed.as_secs_f64());

        info!(
            kind = %kind,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            per_second = report.throughput(),
            "Batch run finished"
        );
        report
    }

    async fn execute_one(&self, username: &Username, kind: MutationKind) -> MutationResult {
        let outcome =
            match tokio::time::timeout(self.request_timeout, self.client.mutate(username, kind))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(username = %username, kind = %kind, "Mutation timed out");
                    MutationOutcome::Failure(FailureReason::Timeout)
                }
            };
        MutationResult::new(username.clone(), kind, outcome)
    }
}
