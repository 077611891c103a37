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

//! Faction statistics over the full history of the commitment contract.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::{Duration, Instant},
};

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;

use crate::{
    cache::{AggregateCache, CacheKey},
    chain::{ChainClient, RawLogEntry, ScanWindow},
    config::WitnessConfig,
    decoder::decode_faction_choice,
    error::ConfigError,
    events::EventDescriptor,
    milestone::{Clock, MilestoneSchedule, MilestoneState},
    scanner::{LogScanner, WindowOutcome},
    Degradable,
};

/// Faction ids as emitted onchain.
pub const FACTION_FLAME: i64 = 0;
pub const FACTION_VEIL: i64 = 1;
pub const FACTION_ECHO: i64 = 2;

/// Display name for a faction id.
pub fn faction_name(faction: i64) -> &'static str {
    match faction {
        FACTION_FLAME => "Flame",
        FACTION_VEIL => "Veil",
        FACTION_ECHO => "Echo",
        _ => "Unknown",
    }
}

/// Position of the most recent event of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LastActivity {
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
}

impl LastActivity {
    fn from_entry(entry: Option<&RawLogEntry>) -> Self {
        match entry {
            Some(entry) => Self {
                block_number: Some(entry.block_number),
                transaction_hash: Some(entry.transaction_hash),
            },
            None => Self::default(),
        }
    }
}

/// Aggregated faction statistics for one block range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    /// Wallets per faction id, counting each wallet's latest choice only.
    pub faction_counts: BTreeMap<i64, u64>,
    pub unique_wallets: u64,
    pub last_faction_chosen: LastActivity,
    pub last_committed: LastActivity,
    pub milestone: MilestoneState,
    pub from_block: u64,
    pub to_block: u64,
}

impl AggregateStats {
    pub fn count_for(&self, faction: i64) -> u64 {
        self.faction_counts.get(&faction).copied().unwrap_or(0)
    }

    /// Counts keyed by display name; unrecognised ids fold into `Unknown`.
    pub fn named_counts(&self) -> BTreeMap<&'static str, u64> {
        let mut counts = BTreeMap::new();
        for (faction, count) in &self.faction_counts {
            *counts.entry(faction_name(*faction)).or_insert(0) += count;
        }
        counts
    }
}

/// Tunables for [StatsAggregator].
#[derive(Debug, Clone)]
pub struct StatsSettings {
    pub chunk_size: u64,
    pub concurrency: usize,
    pub ttl: Duration,
}

struct ChunkLogs {
    chosen: WindowOutcome,
    committed: WindowOutcome,
}

/// Computes [AggregateStats] by scanning `FactionChosen` and `Committed` in chunks.
pub struct StatsAggregator<C: ChainClient + ?Sized> {
    scanner: LogScanner<C>,
    cache: Arc<AggregateCache>,
    contract: Address,
    deployment_block: u64,
    faction_chosen: EventDescriptor,
    committed: EventDescriptor,
    schedule: MilestoneSchedule,
    clock: Arc<dyn Clock>,
    settings: StatsSettings,
}

impl<C: ChainClient + ?Sized> StatsAggregator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scanner: LogScanner<C>,
        cache: Arc<AggregateCache>,
        contract: Address,
        deployment_block: u64,
        faction_chosen: EventDescriptor,
        committed: EventDescriptor,
        schedule: MilestoneSchedule,
        clock: Arc<dyn Clock>,
        settings: StatsSettings,
    ) -> Self {
        Self {
            scanner,
            cache,
            contract,
            deployment_block,
            faction_chosen,
            committed,
            schedule,
            clock,
            settings,
        }
    }

    /// Build an aggregator over the configured commitment contract.
    pub fn from_config(
        client: Arc<C>,
        cache: Arc<AggregateCache>,
        clock: Arc<dyn Clock>,
        config: &WitnessConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            LogScanner::new(client, config.aggregate_retry_policy()),
            cache,
            config.deployment.commitment_address,
            config.deployment.commitment_deployment_block,
            EventDescriptor::faction_chosen()?,
            EventDescriptor::committed()?,
            config.milestone_schedule()?,
            clock,
            StatsSettings {
                chunk_size: config.stats_chunk_size,
                concurrency: config.stats_concurrency,
                ttl: config.ttls.stats,
            },
        ))
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn deployment_block(&self) -> u64 {
        self.deployment_block
    }

    pub fn schedule(&self) -> &MilestoneSchedule {
        &self.schedule
    }

    /// Stats from the deployment block to the current head.
    ///
    /// Cached under the "latest" range, so a new block does not invalidate the entry before
    /// its TTL runs out.
    pub async fn current_stats(&self) -> Degradable<AggregateStats> {
        let key = CacheKey::new(self.contract, "stats", format!("{}..latest", self.deployment_block));
        self.cache
            .get_or_compute(key, self.settings.ttl, || async move {
                match self.scanner.head().await {
                    Ok(head) => self.compute_uncached(self.deployment_block, head).await,
                    Err(err) => {
                        tracing::warn!("Failed to fetch chain head for stats: {}", err);
                        Degradable::degraded(self.empty_stats(self.deployment_block, self.deployment_block))
                    }
                }
            })
            .await
    }

    /// Stats over an explicit inclusive block range.
    pub async fn compute_stats(&self, from_block: u64, to_block: u64) -> Degradable<AggregateStats> {
        let key = CacheKey::new(self.contract, "stats", format!("{from_block}..{to_block}"));
        self.cache
            .get_or_compute(key, self.settings.ttl, || self.compute_uncached(from_block, to_block))
            .await
    }

    async fn compute_uncached(&self, from_block: u64, to_block: u64) -> Degradable<AggregateStats> {
        if from_block > to_block {
            return Degradable::confirmed(self.empty_stats(from_block, to_block));
        }
        let started = Instant::now();
        let chunks = ScanWindow::new(from_block, to_block).chunks(self.settings.chunk_size);
        tracing::info!(
            "Scanning {} chunks of commitment events in blocks {}..={}",
            chunks.len(),
            from_block,
            to_block
        );

        let results: Vec<ChunkLogs> = stream::iter(chunks)
            .map(|chunk| self.fetch_chunk(chunk))
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut degraded = false;
        let mut chosen = Vec::new();
        let mut committed = Vec::new();
        for result in results {
            for (outcome, sink) in [(result.chosen, &mut chosen), (result.committed, &mut committed)] {
                match outcome {
                    WindowOutcome::Entries(entries) => sink.extend(entries),
                    WindowOutcome::Empty => {}
                    WindowOutcome::Failed(_) => degraded = true,
                }
            }
        }

        let mut stats = self.empty_stats(from_block, to_block);
        let latest_choice = fold_choices(&mut stats, &mut chosen, &mut committed);

        let latest_event_at = match latest_choice {
            Some(block) => match self.scanner.retry().execute(|| self.scanner.client().block_timestamp(block)).await {
                Ok(timestamp) => DateTime::<Utc>::from_timestamp(timestamp as i64, 0),
                Err(err) => {
                    tracing::warn!("Failed to fetch timestamp for block {}: {}", block, err);
                    degraded = true;
                    None
                }
            },
            None => None,
        };
        stats.milestone = self.schedule.evaluate(stats.unique_wallets, latest_event_at, self.clock.now());

        tracing::info!(
            "Computed faction stats for {} wallets in {:.2}s{}",
            stats.unique_wallets,
            started.elapsed().as_secs_f64(),
            if degraded { " (degraded)" } else { "" }
        );
        Degradable { value: stats, degraded }
    }

    async fn fetch_chunk(&self, chunk: ScanWindow) -> ChunkLogs {
        let (chosen, committed) = tokio::join!(
            self.scanner.fetch_window(&self.faction_chosen, self.contract, &[None; 3], chunk),
            self.scanner.fetch_window(&self.committed, self.contract, &[None; 3], chunk),
        );
        for outcome in [&chosen, &committed] {
            if let WindowOutcome::Failed(err) = outcome {
                tracing::warn!(
                    "Commitment log query for blocks {}..={} failed: {}",
                    chunk.from_block,
                    chunk.to_block,
                    err
                );
            }
        }
        ChunkLogs { chosen, committed }
    }

    fn empty_stats(&self, from_block: u64, to_block: u64) -> AggregateStats {
        AggregateStats {
            faction_counts: BTreeMap::new(),
            unique_wallets: 0,
            last_faction_chosen: LastActivity::default(),
            last_committed: LastActivity::default(),
            milestone: self.schedule.evaluate(0, None, self.clock.now()),
            from_block,
            to_block,
        }
    }
}

/// Fold both event streams into `stats` and return the block of the latest decodable choice.
///
/// Entries are ordered by chain position first, so the result does not depend on the order
/// chunks completed in.
fn fold_choices(
    stats: &mut AggregateStats,
    chosen: &mut [RawLogEntry],
    committed: &mut [RawLogEntry],
) -> Option<u64> {
    chosen.sort_by_key(RawLogEntry::recency_key);
    committed.sort_by_key(RawLogEntry::recency_key);

    let mut wallets: HashMap<Address, i64> = HashMap::new();
    let mut latest_choice = None;
    for entry in chosen.iter() {
        match decode_faction_choice(entry) {
            Ok(choice) => {
                wallets.insert(choice.wallet, choice.faction);
                latest_choice = Some(choice.block_number);
            }
            Err(err) => tracing::debug!(
                "Skipping FactionChosen log in block {}: {}",
                entry.block_number,
                err
            ),
        }
    }

    for faction in wallets.values() {
        *stats.faction_counts.entry(*faction).or_insert(0) += 1;
    }
    stats.unique_wallets = wallets.len() as u64;
    stats.last_faction_chosen = LastActivity::from_entry(chosen.last());
    stats.last_committed = LastActivity::from_entry(committed.last());
    latest_choice
}
