//! Adaptive block-range log scanning.
//!
//! Providers cap `eth_getLogs` by block span and by result size. The scanner
//! walks `[from_block, to_block]` in windows whose size adapts to those caps:
//!
//! ```text
//! success       ──▶ emit logs, advance cursor, batch = min(initial, batch * 2)
//! limit error   ──▶ batch = max(batch / 2, max(initial / 10, 1)), cooldown, same window
//! other error   ──▶ short delay, same window, bounded by the retry budget
//! cursor > end  ──▶ done
//! ```
//!
//! The chain tip is re-read before every window, so an open-ended scan
//! follows the moving head. Scans are lazy [`Stream`]s and hold no state
//! between calls: calling [`LogScanner::scan`] again re-walks the same range.
//!
//! ## Example
//!
//! ```no_run
//! use chain_lens::events::EventKind;
//! use chain_lens::retry::RetryPolicy;
//! use chain_lens::rpc::AlloyRpcClient;
//! use chain_lens::scanner::{LogScanner, ScanPacing, ScanRequest};
//! use futures_util::StreamExt;
//!
//! # async fn example(client: AlloyRpcClient) -> chain_lens::error::LensResult<()> {
//! let scanner = LogScanner::new(&client, RetryPolicy::default(), ScanPacing::default());
//! let request = ScanRequest::new(30_000_000, None)
//!     .signatures([EventKind::OwnershipTransferred.signature_hash()])
//!     .batch_size(1_000);
//!
//! let mut logs = std::pin::pin!(scanner.scan(request));
//! while let Some(log) = logs.next().await {
//!     println!("{:?}", log?);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use alloy::primitives::{Address, B256};
use futures_util::stream::{self, Stream, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::error::{LensError, LensResult};
use crate::retry::RetryPolicy;
use crate::rpc::{LogFilter, LogRecord, RpcClient};

/// Fixed sleeps used between scanner requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPacing {
    /// Pause between successful windows
    pub request_delay: Duration,
    /// Pause after a rate/size limit response
    pub rate_limit_cooldown: Duration,
    /// Pause after any other failed request
    pub error_delay: Duration,
}

impl Default for ScanPacing {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(500),
            rate_limit_cooldown: Duration::from_millis(2000),
            error_delay: Duration::from_millis(1000),
        }
    }
}

impl ScanPacing {
    /// No sleeps at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            request_delay: Duration::ZERO,
            rate_limit_cooldown: Duration::ZERO,
            error_delay: Duration::ZERO,
        }
    }
}

/// What to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// First block (inclusive)
    pub from_block: u64,
    /// Last block (inclusive); `None` follows the chain tip
    pub to_block: Option<u64>,
    /// Restrict to one emitting contract
    pub address: Option<Address>,
    /// OR-list of topic 0 hashes; empty matches every event
    pub signatures: Vec<B256>,
    /// Starting and maximum window size
    pub initial_batch_size: u64,
}

impl ScanRequest {
    /// Scan `[from_block, to_block]` with a default window of 1000 blocks.
    #[must_use]
    pub const fn new(from_block: u64, to_block: Option<u64>) -> Self {
        Self {
            from_block,
            to_block,
            address: None,
            signatures: Vec::new(),
            initial_batch_size: 1000,
        }
    }

    /// Restrict to one contract.
    #[must_use]
    pub const fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Restrict topic 0 to any of `signatures`.
    #[must_use]
    pub fn signatures(mut self, signatures: impl IntoIterator<Item = B256>) -> Self {
        self.signatures = signatures.into_iter().collect();
        self
    }

    /// Starting and maximum window size.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: u64) -> Self {
        self.initial_batch_size = batch_size;
        self
    }
}

/// Cursor and adaptive window size of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    current: u64,
    to_block: Option<u64>,
    batch_size: u64,
    initial_batch_size: u64,
}

impl ScanWindow {
    /// Start at `from_block` with `initial_batch_size` (at least 1).
    #[must_use]
    pub fn new(from_block: u64, to_block: Option<u64>, initial_batch_size: u64) -> Self {
        let initial_batch_size = initial_batch_size.max(1);
        Self {
            current: from_block,
            to_block,
            batch_size: initial_batch_size,
            initial_batch_size,
        }
    }

    /// Next unscanned block.
    #[must_use]
    pub const fn current(&self) -> u64 {
        self.current
    }

    /// Current window size.
    #[must_use]
    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Smallest window the scanner shrinks to.
    #[must_use]
    pub fn floor(&self) -> u64 {
        (self.initial_batch_size / 10).max(1)
    }

    /// Inclusive block range of the next window given the chain tip, or
    /// `None` once the cursor has passed the end.
    #[must_use]
    pub fn next_range(&self, latest: u64) -> Option<(u64, u64)> {
        let end = self.to_block.map_or(latest, |to| to.min(latest));
        if self.current > end {
            return None;
        }
        let window_end = self
            .current
            .saturating_add(self.batch_size - 1)
            .min(end);
        Some((self.current, window_end))
    }

    /// Record a successful window ending at `window_end` and grow the batch.
    pub fn advance(&mut self, window_end: u64) {
        self.current = self.current.max(window_end.saturating_add(1));
        self.grow();
    }

    /// Halve the batch, never below [`ScanWindow::floor`].
    pub fn shrink(&mut self) {
        self.batch_size = (self.batch_size / 2).max(self.floor());
    }

    /// Double the batch, never above the initial size.
    pub fn grow(&mut self) {
        self.batch_size = self
            .batch_size
            .saturating_mul(2)
            .min(self.initial_batch_size);
    }
}

/// Logs of one successful window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanBatch {
    /// First block of the window
    pub from_block: u64,
    /// Last block of the window
    pub to_block: u64,
    /// Window size used for the request
    pub batch_size: u64,
    /// Matching logs, in provider order
    pub logs: Vec<LogRecord>,
}

struct ScanState {
    window: ScanWindow,
    address: Option<Address>,
    signatures: Vec<B256>,
    pace_next: bool,
    done: bool,
}

/// Adaptive `eth_getLogs` walker.
pub struct LogScanner<'a, C: ?Sized> {
    client: &'a C,
    retry: RetryPolicy,
    pacing: ScanPacing,
}

impl<C: ?Sized> Clone for LogScanner<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for LogScanner<'_, C> {}

impl<'a, C: RpcClient + ?Sized> LogScanner<'a, C> {
    /// Create a scanner over `client`.
    #[must_use]
    pub const fn new(client: &'a C, retry: RetryPolicy, pacing: ScanPacing) -> Self {
        Self {
            client,
            retry,
            pacing,
        }
    }

    /// Stream successful windows.
    ///
    /// The stream ends after the last window, or after yielding one error
    /// when the retry budget for a window is spent.
    pub fn scan_windows(
        &self,
        request: ScanRequest,
    ) -> impl Stream<Item = LensResult<ScanBatch>> + 'a {
        let scanner = *self;
        let state = ScanState {
            window: ScanWindow::new(
                request.from_block,
                request.to_block,
                request.initial_batch_size,
            ),
            address: request.address,
            signatures: request.signatures,
            pace_next: false,
            done: false,
        };

        stream::unfold(state, move |mut state| async move {
            let item = scanner.next_batch(&mut state).await?;
            Some((item, state))
        })
    }

    /// Stream individual logs across all windows.
    pub fn scan(&self, request: ScanRequest) -> impl Stream<Item = LensResult<LogRecord>> + 'a {
        self.scan_windows(request).flat_map(|batch| {
            let items: Vec<LensResult<LogRecord>> = match batch {
                Ok(batch) => batch.logs.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
    }

    /// Drain a scan into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first error the scan yields.
    #[instrument(skip(self, request), fields(from = request.from_block, to = ?request.to_block))]
    pub async fn collect_logs(&self, request: ScanRequest) -> LensResult<Vec<LogRecord>> {
        let mut logs = Vec::new();
        let mut windows = 0u64;
        let mut batches = std::pin::pin!(self.scan_windows(request));

        while let Some(batch) = batches.next().await {
            let batch = batch?;
            windows += 1;
            logs.extend(batch.logs);
        }

        info!(windows, logs = logs.len(), "Log scan complete");
        Ok(logs)
    }

    async fn next_batch(&self, state: &mut ScanState) -> Option<LensResult<ScanBatch>> {
        if state.done {
            return None;
        }

        let mut failures = 0u32;
        loop {
            let latest = match self
                .retry
                .run("eth_blockNumber", || self.client.latest_block_number())
                .await
            {
                Ok(latest) => latest,
                Err(e) => {
                    state.done = true;
                    return Some(Err(e));
                }
            };

            let Some((from_block, to_block)) = state.window.next_range(latest) else {
                state.done = true;
                return None;
            };

            if state.pace_next {
                tokio::time::sleep(self.pacing.request_delay).await;
                state.pace_next = false;
            }

            let filter = LogFilter {
                from_block,
                to_block,
                address: state.address,
                signatures: state.signatures.clone(),
            };
            let batch_size = state.window.batch_size();

            match self.client.get_logs(&filter).await {
                Ok(logs) => {
                    debug!(
                        from_block,
                        to_block,
                        batch_size,
                        count = logs.len(),
                        "Window scanned"
                    );
                    state.window.advance(to_block);
                    state.pace_next = true;
                    return Some(Ok(ScanBatch {
                        from_block,
                        to_block,
                        batch_size,
                        logs,
                    }));
                }
                Err(e) if e.is_rate_limited() => {
                    // Shrinking is the recovery; only count attempts once it can't shrink further
                    if batch_size == state.window.floor() {
                        failures += 1;
                        if failures >= self.retry.max_attempts() {
                            state.done = true;
                            return Some(Err(LensError::retries_exhausted(
                                failures,
                                "eth_getLogs",
                                e,
                            )));
                        }
                    }
                    state.window.shrink();
                    warn!(
                        from_block,
                        to_block,
                        new_batch_size = state.window.batch_size(),
                        error = %e,
                        "Provider limit hit, shrinking window"
                    );
                    tokio::time::sleep(self.pacing.rate_limit_cooldown).await;
                }
                Err(e) if !e.is_retryable() => {
                    state.done = true;
                    return Some(Err(e));
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.retry.max_attempts() {
                        state.done = true;
                        return Some(Err(LensError::retries_exhausted(
                            failures,
                            "eth_getLogs",
                            e,
                        )));
                    }
                    warn!(
                        from_block,
                        to_block,
                        attempt = failures,
                        max_attempts = self.retry.max_attempts(),
                        error = %e,
                        "getLogs failed, retrying window"
                    );
                    tokio::time::sleep(self.pacing.error_delay).await;
                }
            }
        }
    }
}
