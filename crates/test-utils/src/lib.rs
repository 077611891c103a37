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

//! Test utilities for the AnimaSaga witness services.
//!
//! [MockChain] is an in-memory [ChainClient] with scripted failures and call counters, so
//! scanning, retry and caching behaviour can be asserted without a node.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy::primitives::{address, keccak256, Address, Bytes, B256, U256};
use anima_witness::{
    chain::{ArgValue, LogArgs, LogFilter, RawLogEntry, ScanWindow},
    config::WitnessConfig,
    deployments::Deployment,
    events::{topic_for_address, topic_for_uint, EventDescriptor, TopicFilter},
    ChainClient, ChainError,
};
use async_trait::async_trait;

/// Witness registry used by [test_config].
pub const WITNESS_REGISTRY: Address = address!("0x000000000000000000000000000000000000a001");
/// Commitment contract used by [test_config].
pub const COMMITMENT: Address = address!("0x000000000000000000000000000000000000a002");
/// SagaRegistry used by [test_config].
pub const SAGA_REGISTRY: Address = address!("0x000000000000000000000000000000000000a003");

/// Timestamp of block zero; blocks are two seconds apart unless overridden.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// A config pointing at the mock contracts, with every deployment floor set to `floor`.
pub fn test_config(floor: u64) -> WitnessConfig {
    let deployment = Deployment::builder()
        .chain_id(31337u64)
        .witness_registry_address(WITNESS_REGISTRY)
        .witness_deployment_block(floor)
        .commitment_address(COMMITMENT)
        .commitment_deployment_block(floor)
        .saga_registry_address(SAGA_REGISTRY)
        .build()
        .expect("complete deployment");
    WitnessConfig::new(deployment)
}

struct MockLog {
    address: Address,
    selector: B256,
    topics: TopicFilter,
    entry: RawLogEntry,
}

#[derive(Default)]
struct State {
    head: u64,
    logs: Vec<MockLog>,
    timestamps: HashMap<u64, u64>,
    calls: HashMap<(Address, [u8; 4]), Bytes>,
    ignore_topics: bool,
    fail_head: bool,
    fail_all_logs: bool,
    fail_next_logs: usize,
    fail_log_ranges: Vec<ScanWindow>,
    fail_timestamps: bool,
    fail_calls: bool,
    log_queries: Vec<ScanWindow>,
    head_queries: usize,
    timestamp_queries: usize,
    call_queries: usize,
}

/// In-memory chain.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<State>,
}

impl MockChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        chain.state().head = head;
        chain
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("mock chain state poisoned")
    }

    pub fn set_head(&self, head: u64) {
        self.state().head = head;
    }

    /// Add a log as it would come back from the node, already decoded.
    pub fn push_log(&self, address: Address, event: &EventDescriptor, topics: TopicFilter, entry: RawLogEntry) {
        self.state().logs.push(MockLog { address, selector: event.selector(), topics, entry });
    }

    pub fn push_witnessed(
        &self,
        block_number: u64,
        log_index: u64,
        user: Address,
        season_id: u64,
        faction: u8,
    ) -> B256 {
        let event = EventDescriptor::witnessed().expect("valid Witnessed signature");
        let entry = RawLogEntry {
            transaction_hash: tx_hash(WITNESS_REGISTRY, block_number, log_index),
            block_number,
            log_index,
            args: LogArgs::Named(vec![
                ("user".into(), ArgValue::Address(user)),
                ("seasonId".into(), ArgValue::Uint(U256::from(season_id))),
                ("faction".into(), ArgValue::Uint(U256::from(faction))),
                ("proof".into(), ArgValue::Bytes(Bytes::copy_from_slice(keccak256(user).as_slice()))),
            ]),
        };
        let hash = entry.transaction_hash;
        let topics = [Some(topic_for_address(user)), Some(topic_for_uint(season_id)), None];
        self.push_log(WITNESS_REGISTRY, &event, topics, entry);
        hash
    }

    pub fn push_faction_chosen(&self, block_number: u64, log_index: u64, user: Address, faction: u8) -> B256 {
        let event = EventDescriptor::faction_chosen().expect("valid FactionChosen signature");
        let entry = RawLogEntry {
            transaction_hash: tx_hash(COMMITMENT, block_number, log_index),
            block_number,
            log_index,
            args: LogArgs::Named(vec![
                ("user".into(), ArgValue::Address(user)),
                ("faction".into(), ArgValue::Uint(U256::from(faction))),
            ]),
        };
        let hash = entry.transaction_hash;
        self.push_log(COMMITMENT, &event, [Some(topic_for_address(user)), None, None], entry);
        hash
    }

    pub fn push_committed(&self, block_number: u64, log_index: u64, user: Address) -> B256 {
        let event = EventDescriptor::committed().expect("valid Committed signature");
        let entry = RawLogEntry {
            transaction_hash: tx_hash(COMMITMENT, block_number, log_index),
            block_number,
            log_index,
            args: LogArgs::Named(vec![
                ("user".into(), ArgValue::Address(user)),
                ("commitment".into(), ArgValue::Bytes(Bytes::copy_from_slice(keccak256(user).as_slice()))),
            ]),
        };
        let hash = entry.transaction_hash;
        self.push_log(COMMITMENT, &event, [Some(topic_for_address(user)), None, None], entry);
        hash
    }

    pub fn set_timestamp(&self, block_number: u64, timestamp: u64) {
        self.state().timestamps.insert(block_number, timestamp);
    }

    /// Respond to `eth_call`s to `to` whose input starts with `selector`.
    pub fn set_call_response(&self, to: Address, selector: [u8; 4], data: impl Into<Bytes>) {
        self.state().calls.insert((to, selector), data.into());
    }

    /// Return every log in range regardless of the topic filter.
    pub fn ignore_topic_filters(&self) {
        self.state().ignore_topics = true;
    }

    pub fn fail_head(&self, fail: bool) {
        self.state().fail_head = fail;
    }

    pub fn fail_all_logs(&self, fail: bool) {
        self.state().fail_all_logs = fail;
    }

    /// Fail the next `count` log queries, whatever their range.
    pub fn fail_next_log_queries(&self, count: usize) {
        self.state().fail_next_logs = count;
    }

    /// Fail any log query overlapping the given inclusive range.
    pub fn fail_logs_between(&self, from_block: u64, to_block: u64) {
        self.state().fail_log_ranges.push(ScanWindow::new(from_block, to_block));
    }

    pub fn fail_timestamps(&self, fail: bool) {
        self.state().fail_timestamps = fail;
    }

    pub fn fail_calls(&self, fail: bool) {
        self.state().fail_calls = fail;
    }

    /// Windows of every `get_logs` call so far, failed ones included.
    pub fn log_queries(&self) -> Vec<ScanWindow> {
        self.state().log_queries.clone()
    }

    pub fn head_queries(&self) -> usize {
        self.state().head_queries
    }

    pub fn timestamp_queries(&self) -> usize {
        self.state().timestamp_queries
    }

    pub fn call_queries(&self) -> usize {
        self.state().call_queries
    }
}

fn tx_hash(address: Address, block_number: u64, log_index: u64) -> B256 {
    keccak256(format!("{address}:{block_number}:{log_index}"))
}

fn overlaps(a: &ScanWindow, b: &ScanWindow) -> bool {
    a.from_block <= b.to_block && b.from_block <= a.to_block
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        let mut state = self.state();
        state.head_queries += 1;
        if state.fail_head {
            return Err(ChainError::Rpc("mock: head unavailable".into()));
        }
        Ok(state.head)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64, ChainError> {
        let mut state = self.state();
        state.timestamp_queries += 1;
        if state.fail_timestamps {
            return Err(ChainError::Rpc("mock: block unavailable".into()));
        }
        if block_number > state.head {
            return Err(ChainError::MissingBlock(block_number));
        }
        Ok(state
            .timestamps
            .get(&block_number)
            .copied()
            .unwrap_or(GENESIS_TIMESTAMP + block_number * 2))
    }

    async fn get_logs(&self, filter: &LogFilter<'_>) -> Result<Vec<RawLogEntry>, ChainError> {
        let mut state = self.state();
        state.log_queries.push(filter.window);
        if state.fail_next_logs > 0 {
            state.fail_next_logs -= 1;
            return Err(ChainError::Rpc("mock: transient eth_getLogs failure".into()));
        }
        if state.fail_all_logs || state.fail_log_ranges.iter().any(|range| overlaps(range, &filter.window)) {
            return Err(ChainError::Rpc("mock: eth_getLogs failed".into()));
        }
        let selector = filter.event.selector();
        let ignore_topics = state.ignore_topics;
        Ok(state
            .logs
            .iter()
            .filter(|log| log.address == filter.address && log.selector == selector)
            .filter(|log| {
                log.entry.block_number >= filter.window.from_block
                    && log.entry.block_number <= filter.window.to_block
            })
            .filter(|log| {
                ignore_topics
                    || filter
                        .topics
                        .iter()
                        .zip(log.topics.iter())
                        .all(|(wanted, actual)| wanted.is_none() || wanted == actual)
            })
            .map(|log| log.entry.clone())
            .collect())
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError> {
        let mut state = self.state();
        state.call_queries += 1;
        if state.fail_calls {
            return Err(ChainError::Rpc("mock: eth_call failed".into()));
        }
        let selector: [u8; 4] = input
            .get(..4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| ChainError::Rpc("mock: call input shorter than a selector".into()))?;
        state
            .calls
            .get(&(to, selector))
            .cloned()
            .ok_or_else(|| ChainError::Rpc("execution reverted".into()))
    }
}
