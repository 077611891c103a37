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

use std::collections::BTreeMap;

use anima_witness::{
    faction_name, stats::LastActivity, AggregateStats, FactionChoice, MilestoneState, SeasonProgress,
    WitnessRecord,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Query parameters for feeds
#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct LimitParams {
    /// Number of entries to return (default: 12, max: 50)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    12
}

impl LimitParams {
    pub const MAX: usize = 50;

    /// Clamp the limit to `1..=50`.
    pub fn validate(self) -> Self {
        Self { limit: self.limit.clamp(1, Self::MAX) }
    }
}

/// Query parameters for witness status
#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct WitnessStatusParams {
    /// Wallet address (hex)
    pub address: String,
    /// Season id (default: the configured season)
    pub season: Option<u64>,
}

/// Query parameters selecting a season
#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct SeasonParams {
    /// Season id (default: the configured season)
    pub season: Option<u64>,
}

/// Whether a wallet has witnessed a season
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WitnessStatusResponse {
    pub address: String,
    pub season_id: u64,
    pub has_witnessed: bool,
    /// When true, `has_witnessed = false` means "unknown" rather than "no"
    pub degraded: bool,
}

/// Distinct witnessing wallets in a season
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WitnessCountResponse {
    pub season_id: u64,
    pub unique_witnesses: u64,
    pub degraded: bool,
}

/// A `Witnessed` event
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WitnessEntry {
    pub transaction_hash: String,
    pub block_number: u64,
    /// Unix seconds; 0 if the block could not be read
    pub timestamp: u64,
    pub wallet: String,
    pub season_id: u64,
    /// -1 when the event carries no faction
    pub faction: i64,
    pub faction_name: String,
    pub proof: String,
}

impl From<WitnessRecord> for WitnessEntry {
    fn from(record: WitnessRecord) -> Self {
        Self {
            transaction_hash: record.transaction_hash.to_string(),
            block_number: record.block_number,
            timestamp: record.timestamp,
            wallet: record.wallet.to_string(),
            season_id: record.season_id,
            faction: record.faction,
            faction_name: faction_name(record.faction).to_string(),
            proof: record.proof.to_string(),
        }
    }
}

/// A `FactionChosen` event
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlignmentEntry {
    pub transaction_hash: String,
    pub block_number: u64,
    pub log_index: u64,
    pub timestamp: u64,
    pub wallet: String,
    pub faction: i64,
    pub faction_name: String,
}

impl From<FactionChoice> for AlignmentEntry {
    fn from(choice: FactionChoice) -> Self {
        Self {
            transaction_hash: choice.transaction_hash.to_string(),
            block_number: choice.block_number,
            log_index: choice.log_index,
            timestamp: choice.timestamp,
            wallet: choice.wallet.to_string(),
            faction: choice.faction,
            faction_name: faction_name(choice.faction).to_string(),
        }
    }
}

/// Most recent entries first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FeedResponse<T> {
    pub entries: Vec<T>,
    pub degraded: bool,
}

/// Onchain faction state of one wallet
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletAlignmentResponse {
    pub address: String,
    pub has_chosen: bool,
    /// -1 when no faction has been chosen
    pub faction: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faction_name: Option<String>,
    /// Registered with the SagaRegistry
    pub registered: bool,
    /// Which registry read established `registered`
    pub registration_source: String,
    pub degraded: bool,
}

/// Position of the most recent event of one kind
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityEntry {
    pub block_number: Option<u64>,
    pub transaction_hash: Option<String>,
}

impl From<LastActivity> for ActivityEntry {
    fn from(activity: LastActivity) -> Self {
        Self {
            block_number: activity.block_number,
            transaction_hash: activity.transaction_hash.map(|hash| hash.to_string()),
        }
    }
}

/// Eclipse milestone state
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EclipseState {
    /// The latest faction choice happened today
    pub is_active: bool,
    /// Highest milestone reached
    pub milestone: Option<u64>,
    pub next_milestone: u64,
    /// Today as YYYY-MM-DD in the milestone timezone
    pub calendar_day_key: String,
}

impl From<MilestoneState> for EclipseState {
    fn from(state: MilestoneState) -> Self {
        Self {
            is_active: state.is_active,
            milestone: state.milestone,
            next_milestone: state.next_milestone,
            calendar_day_key: state.calendar_day_key,
        }
    }
}

/// Eclipse milestone state with its degraded flag
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EclipseResponse {
    pub eclipse: EclipseState,
    pub degraded: bool,
}

/// Faction statistics from the commitment contract
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    /// Wallets per faction, by each wallet's latest choice
    pub faction_counts: BTreeMap<String, u64>,
    pub unique_wallets: u64,
    pub last_faction_chosen: ActivityEntry,
    pub last_committed: ActivityEntry,
    pub eclipse: EclipseState,
    pub from_block: u64,
    pub to_block: u64,
    /// Some chunks could not be read; counts may be low
    pub degraded: bool,
}

impl StatsResponse {
    pub fn new(stats: AggregateStats, degraded: bool) -> Self {
        let faction_counts =
            stats.named_counts().into_iter().map(|(name, count)| (name.to_string(), count)).collect();
        Self {
            faction_counts,
            unique_wallets: stats.unique_wallets,
            last_faction_chosen: stats.last_faction_chosen.into(),
            last_committed: stats.last_committed.into(),
            eclipse: stats.milestone.into(),
            from_block: stats.from_block,
            to_block: stats.to_block,
            degraded,
        }
    }
}

/// Content unlock thresholds
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnlockTargets {
    pub canon_ch_002: u64,
    pub eclipse: u64,
}

/// Which content is unlocked
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnlockState {
    pub canon_ch_002: bool,
    pub eclipse: bool,
}

/// Witness count against the content unlock thresholds
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MilestonesResponse {
    pub season_id: u64,
    pub witness_count: u64,
    pub targets: UnlockTargets,
    pub unlocked: UnlockState,
    pub degraded: bool,
}

/// Progress through a season
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SeasonProgressEntry {
    pub start_block: u64,
    pub end_block: u64,
    pub current_block: u64,
    pub blocks_remaining: u64,
    /// Fraction elapsed, 0.0 to 1.0
    pub progress: f64,
    pub estimated_seconds_remaining: u64,
    pub ended: bool,
}

impl From<SeasonProgress> for SeasonProgressEntry {
    fn from(progress: SeasonProgress) -> Self {
        Self {
            start_block: progress.start_block,
            end_block: progress.end_block,
            current_block: progress.current_block,
            blocks_remaining: progress.blocks_remaining,
            progress: progress.progress,
            estimated_seconds_remaining: progress.estimated_seconds_remaining,
            ended: progress.ended,
        }
    }
}

/// Season progress at the current head
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SeasonResponse {
    pub season_id: u64,
    /// Absent when the chain head could not be read
    pub progress: Option<SeasonProgressEntry>,
    pub degraded: bool,
}
