//! JSON-lines event feed with bounded, per-pool ordered concurrency.
//!
//! Events of one pool are applied strictly in feed order; events of
//! different pools overlap, up to `max_in_flight` at a time. An event that
//! touches no single pool (pool creation, configuration) waits for every
//! in-flight event and runs alone, since it may affect any pool.

use crate::domain::ChainEvent;
use crate::error::IndexerError;
use crate::orchestration::router::{DispatchReport, EventRouter};
use crate::orchestration::snapshot::SnapshotOutcome;
use alloy_primitives::Address;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub events: u64,
    pub applied: u64,
    /// Replayed events rejected by a unique key.
    pub duplicates: u64,
    pub malformed: u64,
    pub snapshots_written: u64,
    pub snapshots_skipped: u64,
}

#[derive(Default)]
struct Shared {
    stats: Mutex<FeedStats>,
    error: Mutex<Option<IndexerError>>,
}

impl Shared {
    fn failed(&self) -> bool {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    fn fail(&self, err: IndexerError) {
        let mut slot = self.error.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn record(&self, result: Result<DispatchReport, IndexerError>) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        match result {
            Ok(report) => {
                stats.events += 1;
                stats.applied += u64::from(report.applied);
                match report.snapshot {
                    Some(SnapshotOutcome::Written(_)) => stats.snapshots_written += 1,
                    Some(_) => stats.snapshots_skipped += 1,
                    None => {}
                }
            }
            Err(e) if e.is_duplicate() => {
                warn!(error = %e, "replayed event skipped");
                stats.events += 1;
                stats.duplicates += 1;
            }
            Err(e) => {
                drop(stats);
                self.fail(e);
            }
        }
    }
}

pub struct FeedRunner {
    router: EventRouter,
    max_in_flight: usize,
}

impl FeedRunner {
    pub fn new(router: EventRouter, max_in_flight: usize) -> Self {
        Self {
            router,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Consume one JSON-encoded [`ChainEvent`] per line until EOF.
    ///
    /// Malformed lines (including invalid UTF-8) and replayed events are
    /// logged and skipped. Any other error, a read failure included, stops
    /// the feed once in-flight events have settled.
    pub async fn run_lines<R>(&self, reader: R) -> Result<FeedStats, IndexerError>
    where
        R: AsyncBufRead + Unpin,
    {
        let shared = Arc::new(Shared::default());
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tails: HashMap<Address, JoinHandle<()>> = HashMap::new();
        let mut segments = reader.split(b'\n');

        loop {
            let line = match segments.next_segment().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    shared.fail(IndexerError::Io(e));
                    break;
                }
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            // bytes, not str: invalid UTF-8 is just another malformed line
            let event: ChainEvent = match serde_json::from_slice(&line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "malformed feed line skipped");
                    shared.stats.lock().unwrap_or_else(|e| e.into_inner()).malformed += 1;
                    continue;
                }
            };

            match event.pool_partition() {
                Some(pool) => {
                    let permit = match permits.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            shared.fail(IndexerError::Task(e.to_string()));
                            break;
                        }
                    };
                    let previous = tails.remove(&pool);
                    let router = self.router.clone();
                    let shared = shared.clone();
                    let handle = tokio::spawn(async move {
                        let _permit = permit;
                        if let Some(previous) = previous {
                            if let Err(e) = previous.await {
                                shared.fail(IndexerError::Task(e.to_string()));
                            }
                        }
                        if shared.failed() {
                            return;
                        }
                        shared.record(router.dispatch(&event).await);
                    });
                    tails.insert(pool, handle);
                }
                None => {
                    settle(&mut tails, &shared).await;
                    if !shared.failed() {
                        shared.record(self.router.dispatch(&event).await);
                    }
                }
            }

            if shared.failed() {
                break;
            }
        }

        settle(&mut tails, &shared).await;

        if let Some(err) = shared.error.lock().unwrap_or_else(|e| e.into_inner()).take() {
            return Err(err);
        }
        let stats = shared.stats.lock().unwrap_or_else(|e| e.into_inner()).clone();
        info!(
            events = stats.events,
            applied = stats.applied,
            duplicates = stats.duplicates,
            malformed = stats.malformed,
            snapshots = stats.snapshots_written,
            "feed drained"
        );
        Ok(stats)
    }
}

/// Wait for every in-flight event.
async fn settle(tails: &mut HashMap<Address, JoinHandle<()>>, shared: &Shared) {
    let results = join_all(tails.drain().map(|(_, handle)| handle)).await;
    for result in results {
        if let Err(e) = result {
            shared.fail(IndexerError::Task(e.to_string()));
        }
    }
}
