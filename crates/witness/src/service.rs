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

//! Public witness queries built on the scanner, decoder and cache.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use alloy::primitives::Address;
use futures_util::future::join_all;

use crate::{
    cache::{AggregateCache, CacheKey},
    chain::{ChainClient, RawLogEntry},
    config::{CacheTtls, WitnessConfig},
    decoder::{decode_faction_choice, decode_witness, FactionChoice, WitnessRecord},
    error::ConfigError,
    events::{topic_for_address, topic_for_uint, EventDescriptor},
    retry::RetryPolicy,
    scanner::{LogScanner, ScanOutcome, ScanPlan},
    season::{season_progress, SeasonProgress},
    Degradable,
};

/// Answers witness questions for one witness registry and season.
pub struct WitnessQueryService<C: ChainClient + ?Sized> {
    scanner: LogScanner<C>,
    aggregate_scanner: LogScanner<C>,
    cache: Arc<AggregateCache>,
    witness_registry: Address,
    commitment: Address,
    witnessed: EventDescriptor,
    faction_chosen: EventDescriptor,
    existence_plan: ScanPlan,
    unique_plan: ScanPlan,
    recent_plan: ScanPlan,
    alignment_plan: ScanPlan,
    ttls: CacheTtls,
    season_id: u64,
    season_start_block: u64,
    season_end_block: Option<u64>,
}

impl<C: ChainClient + ?Sized> WitnessQueryService<C> {
    pub fn new(
        client: Arc<C>,
        cache: Arc<AggregateCache>,
        config: &WitnessConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            scanner: LogScanner::new(client.clone(), config.retry_policy()),
            aggregate_scanner: LogScanner::new(client, config.aggregate_retry_policy()),
            cache,
            witness_registry: config.deployment.witness_registry()?,
            commitment: config.deployment.commitment_address,
            witnessed: EventDescriptor::witnessed()?,
            faction_chosen: EventDescriptor::faction_chosen()?,
            existence_plan: config.existence_plan(),
            unique_plan: config.unique_plan(),
            recent_plan: config.recent_plan(),
            alignment_plan: config.alignment_plan(),
            ttls: config.ttls,
            season_id: config.season_id,
            season_start_block: config.deployment.witness_deployment_block,
            season_end_block: config.season_end_block,
        })
    }

    /// Season used when a caller does not name one.
    pub fn season_id(&self) -> u64 {
        self.season_id
    }

    pub fn witness_registry(&self) -> Address {
        self.witness_registry
    }

    /// Whether `wallet` has a `Witnessed` log for `season_id`.
    ///
    /// `false` with `degraded` set means the lookup could not be completed.
    pub async fn has_witnessed(&self, wallet: Address, season_id: u64) -> Degradable<bool> {
        let key = CacheKey::new(self.witness_registry, "has_witnessed", format!("{wallet}:{season_id}"));
        self.cache
            .get_or_compute(key, self.ttls.existence, || async move {
                let topics = self.witnessed.topic_filter(&[
                    ("user", topic_for_address(wallet)),
                    ("seasonId", topic_for_uint(season_id)),
                ]);
                // Providers may ignore the topic filter, so only a decoded match ends the scan.
                let is_match = |entry: &RawLogEntry| {
                    decode_witness(entry)
                        .is_ok_and(|record| record.wallet == wallet && record.season_id == season_id)
                };
                let outcome = self
                    .scanner
                    .scan_matching(
                        &self.witnessed,
                        self.witness_registry,
                        &topics,
                        &self.existence_plan,
                        is_match,
                    )
                    .await;
                match outcome {
                    ScanOutcome::Found { .. } => Degradable::confirmed(true),
                    ScanOutcome::Empty { .. } => Degradable::confirmed(false),
                    ScanOutcome::Exhausted { attempted, failures, .. } => {
                        tracing::warn!(
                            "Witness lookup for {} exhausted {} windows ({} failed)",
                            wallet,
                            attempted,
                            failures
                        );
                        Degradable::degraded(false)
                    }
                }
            })
            .await
    }

    /// Distinct wallets that witnessed `season_id`, read from the widest configured window.
    pub async fn unique_witness_count(&self, season_id: u64) -> Degradable<u64> {
        let key = CacheKey::new(self.witness_registry, "unique_witness_count", season_id.to_string());
        self.cache
            .get_or_compute(key, self.ttls.count, || async move {
                let topics = self.witnessed.topic_filter(&[("seasonId", topic_for_uint(season_id))]);
                let Degradable { value: entries, degraded } = self
                    .aggregate_scanner
                    .scan_widest(&self.witnessed, self.witness_registry, &topics, &self.unique_plan)
                    .await;
                let wallets: HashSet<Address> = entries
                    .iter()
                    .filter_map(|entry| decode_witness(entry).ok())
                    .filter(|record| record.season_id == season_id)
                    .map(|record| record.wallet)
                    .collect();
                Degradable { value: wallets.len() as u64, degraded }
            })
            .await
    }

    /// Latest witnesses, most recent first, with block timestamps.
    pub async fn recent_witnesses(&self, limit: usize) -> Degradable<Vec<WitnessRecord>> {
        let key = CacheKey::new(self.witness_registry, "recent_witnesses", limit.to_string());
        self.cache
            .get_or_compute(key, self.ttls.recent, || async move {
                let outcome = self
                    .scanner
                    .scan(&self.witnessed, self.witness_registry, &[None; 3], &self.recent_plan)
                    .await;
                let mut degraded = outcome.is_degraded();
                let mut records = decode_all(outcome.entries(), decode_witness, "Witnessed");
                records.truncate(limit);

                let blocks = records.iter().map(|record| record.block_number);
                let (timestamps, missing) = self.block_timestamps(blocks).await;
                degraded |= missing;
                for record in &mut records {
                    record.timestamp = timestamps.get(&record.block_number).copied().unwrap_or(0);
                }
                Degradable { value: records, degraded }
            })
            .await
    }

    /// Latest faction choices, most recent first, with block timestamps.
    pub async fn recent_alignments(&self, limit: usize) -> Degradable<Vec<FactionChoice>> {
        let key = CacheKey::new(self.commitment, "recent_alignments", limit.to_string());
        self.cache
            .get_or_compute(key, self.ttls.recent, || async move {
                let outcome = self
                    .scanner
                    .scan(&self.faction_chosen, self.commitment, &[None; 3], &self.alignment_plan)
                    .await;
                let mut degraded = outcome.is_degraded();
                let mut choices = decode_all(outcome.entries(), decode_faction_choice, "FactionChosen");
                choices.truncate(limit);

                let blocks = choices.iter().map(|choice| choice.block_number);
                let (timestamps, missing) = self.block_timestamps(blocks).await;
                degraded |= missing;
                for choice in &mut choices {
                    choice.timestamp = timestamps.get(&choice.block_number).copied().unwrap_or(0);
                }
                Degradable { value: choices, degraded }
            })
            .await
    }

    /// Season progress at the current head, if an end block is configured.
    pub async fn season_progress(&self) -> Result<Degradable<Option<SeasonProgress>>, ConfigError> {
        let end_block = self.season_end_block.ok_or(ConfigError::Missing("season end block"))?;
        Ok(match self.scanner.head().await {
            Ok(head) => Degradable::confirmed(Some(season_progress(
                self.season_id,
                self.season_start_block,
                end_block,
                head,
            ))),
            Err(err) => {
                tracing::warn!("Failed to fetch chain head for season progress: {}", err);
                Degradable::degraded(None)
            }
        })
    }

    /// Resolve timestamps for the distinct blocks concurrently.
    ///
    /// Blocks whose lookup failed are left out; the flag reports whether any were.
    async fn block_timestamps(&self, blocks: impl Iterator<Item = u64>) -> (HashMap<u64, u64>, bool) {
        let blocks: BTreeSet<u64> = blocks.collect();
        let retry: RetryPolicy = self.scanner.retry();
        let client = self.scanner.client();
        let results = join_all(blocks.into_iter().map(|block| async move {
            (block, retry.execute(|| client.block_timestamp(block)).await)
        }))
        .await;

        let mut timestamps = HashMap::with_capacity(results.len());
        let mut missing = false;
        for (block, result) in results {
            match result {
                Ok(timestamp) => {
                    timestamps.insert(block, timestamp);
                }
                Err(err) => {
                    tracing::warn!("Failed to fetch timestamp for block {}: {}", block, err);
                    missing = true;
                }
            }
        }
        (timestamps, missing)
    }
}

fn decode_all<T, E: std::fmt::Display>(
    entries: &[RawLogEntry],
    decode: impl Fn(&RawLogEntry) -> Result<T, E>,
    event: &str,
) -> Vec<T> {
    entries
        .iter()
        .filter_map(|entry| match decode(entry) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(
                    "Dropping {} log {}:{}: {}",
                    event,
                    entry.block_number,
                    entry.log_index,
                    err
                );
                None
            }
        })
        .collect()
}
