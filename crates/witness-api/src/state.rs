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

use std::sync::Arc;

use anima_witness::{
    AggregateCache, AlignmentReader, ChainClient, Clock, ConfigError, RpcChainClient,
    StatsAggregator, SystemClock, WitnessConfig, WitnessQueryService,
};
use url::Url;

/// Services shared by every request.
///
/// All three share one [AggregateCache], so concurrent requests for the same query reuse a
/// single chain scan within its TTL.
pub struct AppState {
    pub witnesses: WitnessQueryService<dyn ChainClient>,
    pub stats: StatsAggregator<dyn ChainClient>,
    pub alignments: AlignmentReader<dyn ChainClient>,
}

impl AppState {
    /// Build the services over an existing client. Fails on invalid configuration.
    pub fn new(
        client: Arc<dyn ChainClient>,
        config: &WitnessConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let cache = Arc::new(AggregateCache::default());
        let witnesses = WitnessQueryService::new(client.clone(), cache.clone(), config)?;
        let stats = StatsAggregator::from_config(client.clone(), cache.clone(), clock, config)?;
        let alignments = AlignmentReader::from_config(client, cache, config);
        Ok(Self { witnesses, stats, alignments })
    }

    /// Build the services over a JSON-RPC endpoint using the wall clock.
    pub fn connect(rpc_url: Url, config: &WitnessConfig) -> Result<Self, ConfigError> {
        let client: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(rpc_url, config.request_timeout));
        Self::new(client, config, Arc::new(SystemClock))
    }
}
