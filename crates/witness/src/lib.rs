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

//! Onchain witness, faction and milestone queries for AnimaSaga.
//!
//! Everything here reads event logs from a rate limited public RPC. Queries scan narrow
//! windows first, retry transient failures and report a `degraded` flag instead of failing
//! when the chain could not be fully read.

use serde::Serialize;

// Declare modules
pub mod alignment;
pub mod cache;
pub mod chain;
pub mod config;
pub mod decoder;
pub mod deployments;
pub mod error;
pub mod events;
pub mod milestone;
pub mod retry;
pub mod scanner;
pub mod season;
pub mod service;
pub mod stats;

// Re-export commonly used types
pub use alignment::{Alignment, AlignmentReader, Registration};
pub use cache::{AggregateCache, CacheKey};
pub use chain::{ChainClient, LogArgs, LogFilter, RawLogEntry, RpcChainClient, ScanWindow};
pub use config::WitnessConfig;
pub use decoder::{FactionChoice, WitnessRecord};
pub use deployments::Deployment;
pub use error::{ChainError, ConfigError, DecodeError};
pub use events::{EventDescriptor, EventKind};
pub use milestone::{Clock, FixedClock, MilestoneSchedule, MilestoneState, SystemClock};
pub use retry::RetryPolicy;
pub use scanner::{LogScanner, ScanOutcome, ScanPlan};
pub use season::SeasonProgress;
pub use service::WitnessQueryService;
pub use stats::{faction_name, AggregateStats, StatsAggregator, StatsSettings};

/// A query result plus whether it may be incomplete.
///
/// `degraded` is set when some RPC work failed, so an empty or zero `value` may be a false
/// negative rather than a confirmed absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradable<T> {
    pub value: T,
    pub degraded: bool,
}

impl<T> Degradable<T> {
    pub fn confirmed(value: T) -> Self {
        Self { value, degraded: false }
    }

    pub fn degraded(value: T) -> Self {
        Self { value, degraded: true }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Degradable<U> {
        Degradable { value: f(self.value), degraded: self.degraded }
    }
}
