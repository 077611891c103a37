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

//! Runtime configuration for the witness query services.

use std::time::Duration;

use crate::{
    deployments::Deployment,
    error::ConfigError,
    milestone::{MilestoneSchedule, DEFAULT_MILESTONES, DEFAULT_TIMEZONE},
    retry::{RetryPolicy, DEFAULT_ATTEMPTS, DEFAULT_BASE_DELAY, MAX_ATTEMPTS},
    scanner::ScanPlan,
};

/// Lookback sizes for "has this wallet witnessed" checks.
pub const EXISTENCE_WINDOWS: &[u64] = &[40_000, 120_000, 300_000, 900_000];
/// Lookback sizes for the season-wide witness count.
pub const UNIQUE_WINDOWS: &[u64] = &[50_000, 200_000, 600_000, 1_200_000];
/// Lookback sizes for the recent witness feed.
pub const RECENT_WINDOWS: &[u64] = &[25_000, 80_000, 200_000, 600_000];
/// Lookback sizes for the recent alignment feed.
pub const ALIGNMENT_WINDOWS: &[u64] = &[20_000, 60_000, 150_000];
/// Blocks per `eth_getLogs` call when scanning full history.
pub const STATS_CHUNK_SIZE: u64 = 50_000;

/// Lookback sizes per query family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookbackWindows {
    pub existence: Vec<u64>,
    pub unique: Vec<u64>,
    pub recent: Vec<u64>,
    pub alignments: Vec<u64>,
}

impl Default for LookbackWindows {
    fn default() -> Self {
        Self {
            existence: EXISTENCE_WINDOWS.to_vec(),
            unique: UNIQUE_WINDOWS.to_vec(),
            recent: RECENT_WINDOWS.to_vec(),
            alignments: ALIGNMENT_WINDOWS.to_vec(),
        }
    }
}

/// How long each kind of result stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub existence: Duration,
    pub count: Duration,
    pub recent: Duration,
    pub stats: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            existence: Duration::from_millis(15_000),
            count: Duration::from_millis(15_000),
            recent: Duration::from_millis(12_000),
            stats: Duration::from_millis(15_000),
        }
    }
}

/// Everything needed to build the query services.
#[derive(Debug, Clone)]
pub struct WitnessConfig {
    pub deployment: Deployment,
    /// Season used when a request does not name one.
    pub season_id: u64,
    pub season_end_block: Option<u64>,
    pub windows: LookbackWindows,
    pub ttls: CacheTtls,
    pub retry_attempts: u32,
    /// Attempts for expensive aggregate scans.
    pub aggregate_retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub stats_chunk_size: u64,
    pub stats_concurrency: usize,
    pub milestones: Vec<u64>,
    pub milestone_timezone: String,
    pub request_timeout: Duration,
}

impl WitnessConfig {
    /// Defaults for everything but the deployment.
    pub fn new(deployment: Deployment) -> Self {
        Self {
            deployment,
            season_id: 1,
            season_end_block: None,
            windows: LookbackWindows::default(),
            ttls: CacheTtls::default(),
            retry_attempts: DEFAULT_ATTEMPTS,
            aggregate_retry_attempts: MAX_ATTEMPTS,
            retry_base_delay: DEFAULT_BASE_DELAY,
            stats_chunk_size: STATS_CHUNK_SIZE,
            stats_concurrency: 4,
            milestones: DEFAULT_MILESTONES.to_vec(),
            milestone_timezone: DEFAULT_TIMEZONE.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Check the configuration is usable before any service is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.deployment.witness_registry()?;
        for (name, windows) in [
            ("existence windows", &self.windows.existence),
            ("unique windows", &self.windows.unique),
            ("recent windows", &self.windows.recent),
            ("alignment windows", &self.windows.alignments),
        ] {
            if !windows.iter().any(|w| *w > 0) {
                return Err(ConfigError::Invalid { name, reason: "at least one non-zero window required".into() });
            }
        }
        if self.stats_chunk_size == 0 {
            return Err(ConfigError::Invalid { name: "stats chunk size", reason: "must be non-zero".into() });
        }
        if self.retry_attempts == 0 || self.retry_attempts > MAX_ATTEMPTS {
            return Err(ConfigError::Invalid {
                name: "retry attempts",
                reason: format!("must be between 1 and {MAX_ATTEMPTS}"),
            });
        }
        if let Some(end) = self.season_end_block {
            if end <= self.deployment.witness_deployment_block {
                return Err(ConfigError::Invalid {
                    name: "season end block",
                    reason: format!("{end} is not after the deployment block"),
                });
            }
        }
        self.milestone_schedule().map(|_| ())
    }

    pub fn milestone_schedule(&self) -> Result<MilestoneSchedule, ConfigError> {
        MilestoneSchedule::with_timezone_name(self.milestones.clone(), &self.milestone_timezone)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_base_delay)
    }

    pub fn aggregate_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.aggregate_retry_attempts, self.retry_base_delay)
    }

    pub fn existence_plan(&self) -> ScanPlan {
        ScanPlan::new(self.windows.existence.iter().copied(), self.deployment.witness_deployment_block)
    }

    pub fn unique_plan(&self) -> ScanPlan {
        ScanPlan::new(self.windows.unique.iter().copied(), self.deployment.witness_deployment_block)
    }

    pub fn recent_plan(&self) -> ScanPlan {
        ScanPlan::new(self.windows.recent.iter().copied(), self.deployment.witness_deployment_block)
    }

    pub fn alignment_plan(&self) -> ScanPlan {
        ScanPlan::new(self.windows.alignments.iter().copied(), self.deployment.commitment_deployment_block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployments::BASE;
    use alloy::primitives::Address;

    fn config() -> WitnessConfig {
        let mut deployment = BASE;
        deployment.witness_registry_address = Some(Address::repeat_byte(0x44));
        WitnessConfig::new(deployment)
    }

    #[test]
    fn defaults_validate() {
        config().validate().unwrap();
    }

    #[test]
    fn witness_registry_is_required() {
        let config = WitnessConfig::new(BASE);
        assert_eq!(config.validate(), Err(ConfigError::Missing("witness registry address")));
    }

    #[test]
    fn rejects_bad_values() {
        let mut bad = config();
        bad.windows.recent = vec![0];
        assert!(matches!(bad.validate(), Err(ConfigError::Invalid { name: "recent windows", .. })));

        let mut bad = config();
        bad.retry_attempts = 9;
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.milestone_timezone = "Nowhere/Special".into();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.season_end_block = Some(1);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn plans_use_deployment_floors() {
        let config = config();
        assert_eq!(config.existence_plan().floor(), BASE.witness_deployment_block);
        assert_eq!(config.alignment_plan().floor(), BASE.commitment_deployment_block);
        assert_eq!(config.recent_plan().windows(), RECENT_WINDOWS);
    }
}
