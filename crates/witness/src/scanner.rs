// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Progressive lookback scanning.
//!
//! Recent activity is searched in widening windows ending at the chain head. The first window
//! that yields entries wins, so the common case costs a single narrow `eth_getLogs` call.

use std::sync::Arc;

use alloy::primitives::Address;

use crate::{
    chain::{sort_most_recent_first, ChainClient, LogFilter, RawLogEntry, ScanWindow},
    error::ChainError,
    events::{EventDescriptor, TopicFilter},
    retry::RetryPolicy,
    Degradable,
};

/// Lookback sizes, in blocks, plus the block below which nothing is ever queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    windows: Vec<u64>,
    floor: u64,
}

impl ScanPlan {
    /// Windows are sorted ascending and deduplicated; zero sized windows are dropped.
    pub fn new(windows: impl IntoIterator<Item = u64>, floor: u64) -> Self {
        let mut windows: Vec<u64> = windows.into_iter().filter(|w| *w > 0).collect();
        windows.sort_unstable();
        windows.dedup();
        Self { windows, floor }
    }

    pub fn windows(&self) -> &[u64] {
        &self.windows
    }

    pub fn floor(&self) -> u64 {
        self.floor
    }

    /// One clamped range per window for the given head, narrowest first.
    ///
    /// Windows wider than the distance to the floor all clamp to the same range. Empty when the
    /// head is still below the floor.
    pub fn attempts(&self, head: u64) -> Vec<ScanWindow> {
        self.windows
            .iter()
            .map_while(|lookback| ScanWindow::lookback(head, *lookback, self.floor))
            .collect()
    }

    /// The distinct block ranges this plan covers for the given head, in order.
    pub fn ranges(&self, head: u64) -> Vec<ScanWindow> {
        let mut ranges = self.attempts(head);
        ranges.dedup();
        ranges
    }
}

/// Result of querying a single window.
#[derive(Debug)]
pub enum WindowOutcome {
    Entries(Vec<RawLogEntry>),
    Empty,
    Failed(ChainError),
}

/// Result of a whole progressive scan.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Entries from the narrowest window that had any, most recent first.
    Found { window: ScanWindow, entries: Vec<RawLogEntry> },
    /// A successful query spanning down to the floor returned nothing.
    Empty { window: ScanWindow },
    /// No window produced entries and the floor was never confirmed empty.
    Exhausted { attempted: usize, failures: usize, last_error: Option<ChainError> },
}

impl ScanOutcome {
    /// True when "nothing found" could be a false negative.
    pub fn is_degraded(&self) -> bool {
        matches!(self, ScanOutcome::Exhausted { .. })
    }

    pub fn entries(&self) -> &[RawLogEntry] {
        match self {
            ScanOutcome::Found { entries, .. } => entries,
            _ => &[],
        }
    }

    pub fn into_entries(self) -> Vec<RawLogEntry> {
        match self {
            ScanOutcome::Found { entries, .. } => entries,
            _ => Vec::new(),
        }
    }
}

/// Runs [ScanPlan]s against a [ChainClient], retrying each call with its [RetryPolicy].
pub struct LogScanner<C: ChainClient + ?Sized> {
    client: Arc<C>,
    retry: RetryPolicy,
}

impl<C: ChainClient + ?Sized> Clone for LogScanner<C> {
    fn clone(&self) -> Self {
        Self { client: self.client.clone(), retry: self.retry }
    }
}

impl<C: ChainClient + ?Sized> LogScanner<C> {
    pub fn new(client: Arc<C>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Current head, retried.
    pub async fn head(&self) -> Result<u64, ChainError> {
        self.retry.execute(|| self.client.block_number()).await
    }

    /// Query one window, retried. Failures are reported, never raised.
    pub async fn fetch_window(
        &self,
        event: &EventDescriptor,
        address: Address,
        topics: &TopicFilter,
        window: ScanWindow,
    ) -> WindowOutcome {
        let filter = LogFilter { event, address, window, topics: *topics };
        match self.retry.execute(|| self.client.get_logs(&filter)).await {
            Ok(entries) if entries.is_empty() => WindowOutcome::Empty,
            Ok(entries) => WindowOutcome::Entries(entries),
            Err(err) => WindowOutcome::Failed(err),
        }
    }

    /// Resolve the head, then scan the plan from it.
    pub async fn scan(
        &self,
        event: &EventDescriptor,
        address: Address,
        topics: &TopicFilter,
        plan: &ScanPlan,
    ) -> ScanOutcome {
        self.scan_matching(event, address, topics, plan, |_| true).await
    }

    /// Like [LogScanner::scan], but a window only counts as a hit when one of its entries
    /// satisfies `accept`. Windows whose entries all fail it are widened past like empty ones.
    pub async fn scan_matching(
        &self,
        event: &EventDescriptor,
        address: Address,
        topics: &TopicFilter,
        plan: &ScanPlan,
        accept: impl Fn(&RawLogEntry) -> bool,
    ) -> ScanOutcome {
        match self.head().await {
            Ok(head) => self.scan_from(head, event, address, topics, plan, accept).await,
            Err(err) => {
                tracing::warn!("Failed to fetch chain head for {} scan: {}", event.name(), err);
                ScanOutcome::Exhausted { attempted: 0, failures: 1, last_error: Some(err) }
            }
        }
    }

    /// Scan the plan's windows ending at `head`, narrowest first.
    ///
    /// A window clamping to the same range as the previous one is only issued again when the
    /// previous attempt failed.
    pub async fn scan_from(
        &self,
        head: u64,
        event: &EventDescriptor,
        address: Address,
        topics: &TopicFilter,
        plan: &ScanPlan,
        accept: impl Fn(&RawLogEntry) -> bool,
    ) -> ScanOutcome {
        let mut attempted = 0;
        let mut failures = 0;
        let mut last_error = None;
        let mut previous: Option<(ScanWindow, bool)> = None;

        for window in plan.attempts(head) {
            if matches!(previous, Some((range, false)) if range == window) {
                continue;
            }
            attempted += 1;
            let outcome = match self.fetch_window(event, address, topics, window).await {
                WindowOutcome::Entries(entries) => {
                    let total = entries.len();
                    let mut entries: Vec<RawLogEntry> =
                        entries.into_iter().filter(|entry| accept(entry)).collect();
                    if entries.is_empty() {
                        tracing::debug!(
                            "None of {} {} logs in blocks {}..={} matched",
                            total,
                            event.name(),
                            window.from_block,
                            window.to_block
                        );
                        WindowOutcome::Empty
                    } else {
                        sort_most_recent_first(&mut entries);
                        WindowOutcome::Entries(entries)
                    }
                }
                other => other,
            };

            match outcome {
                WindowOutcome::Entries(entries) => {
                    tracing::debug!(
                        "Found {} {} logs in blocks {}..={}",
                        entries.len(),
                        event.name(),
                        window.from_block,
                        window.to_block
                    );
                    return ScanOutcome::Found { window, entries };
                }
                WindowOutcome::Empty if window.reaches(plan.floor()) => {
                    return ScanOutcome::Empty { window };
                }
                WindowOutcome::Empty => {
                    tracing::debug!(
                        "No {} logs in blocks {}..={}, widening",
                        event.name(),
                        window.from_block,
                        window.to_block
                    );
                    previous = Some((window, false));
                }
                WindowOutcome::Failed(err) => {
                    tracing::warn!(
                        "Log query for {} in blocks {}..={} failed: {}",
                        event.name(),
                        window.from_block,
                        window.to_block,
                        err
                    );
                    failures += 1;
                    last_error = Some(err);
                    previous = Some((window, true));
                }
            }
        }

        ScanOutcome::Exhausted { attempted, failures, last_error }
    }

    /// Every entry in the widest range of the plan, for callers that need a complete set.
    ///
    /// Narrower ranges are only tried when a wider one fails, and a result from them is partial.
    /// The result is degraded unless a range reaching the floor was read.
    pub async fn scan_widest(
        &self,
        event: &EventDescriptor,
        address: Address,
        topics: &TopicFilter,
        plan: &ScanPlan,
    ) -> Degradable<Vec<RawLogEntry>> {
        let head = match self.head().await {
            Ok(head) => head,
            Err(err) => {
                tracing::warn!("Failed to fetch chain head for {} scan: {}", event.name(), err);
                return Degradable::degraded(Vec::new());
            }
        };

        for window in plan.ranges(head).into_iter().rev() {
            match self.fetch_window(event, address, topics, window).await {
                WindowOutcome::Entries(mut entries) => {
                    sort_most_recent_first(&mut entries);
                    return Degradable { value: entries, degraded: !window.reaches(plan.floor()) };
                }
                WindowOutcome::Empty => {
                    return Degradable { value: Vec::new(), degraded: !window.reaches(plan.floor()) };
                }
                WindowOutcome::Failed(err) => {
                    tracing::warn!(
                        "Log query for {} in blocks {}..={} failed, narrowing: {}",
                        event.name(),
                        window.from_block,
                        window.to_block,
                        err
                    );
                }
            }
        }
        Degradable::degraded(Vec::new())
    }
}
