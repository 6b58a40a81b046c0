pub(crate) mod test_utils;

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use color_eyre::eyre::Result;
use futures::FutureExt;
use tokio::{select, time::sleep};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::Config;
use crate::source::{BlockSource, SourceError};
use crate::store::{SubscriptionRegistry, TransactionStore};
use crate::types::{Block, Transaction};

/// Reasons a tick stopped before reaching the head it observed
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to query head block: {0}")]
    Head(#[source] SourceError),

    #[error("failed to fetch block {number}: {source}")]
    Block {
        number: u64,
        #[source]
        source: SourceError,
    },
}

impl ScanError {
    pub fn source_error(&self) -> &SourceError {
        match self {
            Self::Head(source) | Self::Block { source, .. } => source,
        }
    }
}

/// Summary of a completed tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Head observed at the start of the tick
    pub head: u64,

    /// Number of blocks processed during the tick
    pub blocks_scanned: u64,

    /// Last scanned block after the tick
    pub last: u64,
}

/// Periodic catch-up poller
///
/// Every `interval`, asks the source for the head and replays blocks one at a time
/// up to it. Matching transactions go into the store, and the cursor advances after
/// each fully processed block. Ticks never overlap: the interval only restarts once the
/// previous catch-up loop has finished
#[derive(Debug)]
pub struct Scanner<S> {
    source: S,
    registry: Arc<SubscriptionRegistry>,
    store: Arc<TransactionStore>,

    /// Last successfully scanned block
    last: u64,

    interval: Duration,

    /// Deadline applied to every call into `source`
    request_timeout: Duration,

    /// Cancellation token for graceful shutdown
    cancellation_token: CancellationToken,
}

/// Handle to a spawned scanner
#[derive(Debug, Clone)]
pub struct ScannerHandle {
    cancellation_token: CancellationToken,
}

impl ScannerHandle {
    /// Signals the scanner to stop. Does not wait: a tick in flight runs to completion
    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

}

/// Decides which block to scan next. `0` means there is nothing to do.
///
/// On a cold start (`last == 0`) the scanner jumps straight to `head`; earlier blocks
/// are never backfilled
pub fn next_block_to_scan(last: u64, head: u64) -> u64 {
    if last == head {
        return 0;
    }

    if last == 0 {
        return head;
    }

    // saturates so the `next <= head` bound in `tick` ends the loop
    last.saturating_add(1)
}

impl<S: BlockSource> Scanner<S> {
    /// Creates a scanner starting at `sync.start_block`, and publishes that value as the
    /// store's cursor
    pub fn new(
        source: S,
        registry: Arc<SubscriptionRegistry>,
        store: Arc<TransactionStore>,
        config: &Config,
        cancellation_token: CancellationToken,
    ) -> Self {
        let last = config.sync.start_block;
        store.set_cursor(last);
        info!(start_block = last, "scanner set to start");

        Self {
            source,
            registry,
            store,
            last,
            interval: config.sync.interval(),
            request_timeout: config.rpc.timeout(),
            cancellation_token,
        }
    }

    /// Runs one catch-up pass up to the head observed at its start
    ///
    /// Blocks scanned before an error stay committed. A failed block is not marked
    /// scanned, so the next tick starts from it again
    pub async fn tick(&mut self) -> Result<TickOutcome, ScanError> {
        let head = self
            .with_deadline(self.source.head_block_number())
            .await
            .map_err(ScanError::Head)?;

        if self.last > head {
            debug!(last = self.last, head, "source is behind the cursor");
        }

        let mut blocks_scanned = 0;
        let mut next = next_block_to_scan(self.last, head);

        // a head that moves past `head` mid-tick is picked up on the next tick
        while next != 0 && next <= head {
            let block = self
                .with_deadline(self.source.block_by_number(next))
                .await
                .map_err(|source| ScanError::Block {
                    number: next,
                    source,
                })?;

            self.process_block(next, block).await;

            // cursor goes last, so a reader seeing N also sees all of block N
            self.last = next;
            self.store.set_cursor(next);
            blocks_scanned += 1;

            next = next_block_to_scan(self.last, head);
        }

        Ok(TickOutcome {
            head,
            blocks_scanned,
            last: self.last,
        })
    }

    async fn process_block(&self, number: u64, block: Block) {
        let count = block.transactions.len();
        let mut matches: HashMap<Address, Vec<Transaction>> = HashMap::new();

        for rpc_tx in block.transactions {
            let sides = [rpc_tx.sender(), rpc_tx.recipient()];
            let tx: Transaction = rpc_tx.into();

            for address in sides.into_iter().flatten() {
                if self.registry.is_subscribed(&address).await {
                    matches.entry(address).or_default().push(tx.clone());
                }
            }
        }

        trace!(block = number, txs = count, matched = matches.len(), "processed");

        for (address, txs) in matches {
            self.store.append(address, txs).await;
        }
    }

    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        tokio::time::timeout(self.request_timeout, fut)
            .await
            .unwrap_or(Err(SourceError::Timeout))
    }
}

impl<S: BlockSource + 'static> Scanner<S> {
    /// Spawns the tick loop onto `tracker`
    pub fn spawn(self, tracker: &TaskTracker) -> ScannerHandle {
        let handle = ScannerHandle {
            cancellation_token: self.cancellation_token.clone(),
        };
        tracker.spawn(self.run());
        handle
    }

    /// Tick loop. Failures inside a tick, panics included, are logged and the loop
    /// moves on to the next tick
    #[instrument(name = "scanner", skip(self))]
    pub async fn run(mut self) -> Result<()> {
        loop {
            select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                _ = sleep(self.interval) => {}
            }

            match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(Ok(outcome)) => {
                    debug!(
                        head = outcome.head,
                        scanned = outcome.blocks_scanned,
                        "last scanned block {}",
                        outcome.last
                    );
                }
                Ok(Err(err)) if err.source_error().is_unavailable() => {
                    warn!(last = self.last, "{}", err);
                }
                Ok(Err(err)) => {
                    error!(last = self.last, "{}", err);
                }
                Err(panic) => {
                    error!(last = self.last, "tick panicked: {}", panic_message(&*panic));
                }
            }
        }

        info!("stopping scanner");
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
