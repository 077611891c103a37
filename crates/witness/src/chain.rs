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

//! Chain access: the [ChainClient] seam, its JSON-RPC implementation and the raw log types
//! the rest of the crate works with.

use std::{
    future::{Future, IntoFuture},
    time::Duration,
};

use alloy::{
    dyn_abi::DynSolValue,
    eips::BlockNumberOrTag,
    primitives::{Address, Bytes, B256, I256, U256},
    providers::{Provider, RootProvider},
    rpc::types::{Filter, TransactionRequest},
    transports::TransportError,
};
use async_trait::async_trait;
use url::Url;

use crate::{
    error::ChainError,
    events::{EventDescriptor, TopicFilter},
};

/// A single decoded event argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    Int(I256),
    Bool(bool),
    Bytes(Bytes),
    Text(String),
    List(Vec<ArgValue>),
}

impl ArgValue {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            ArgValue::Address(address) => Some(*address),
            ArgValue::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ArgValue::Uint(value) => u64::try_from(*value).ok(),
            ArgValue::Int(value) => i64::try_from(*value).ok().and_then(|v| u64::try_from(v).ok()),
            ArgValue::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Uint(value) => u64::try_from(*value).ok().and_then(|v| i64::try_from(v).ok()),
            ArgValue::Int(value) => i64::try_from(*value).ok(),
            ArgValue::Text(text) => text.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Byte strings only. Numbers are never reinterpreted as bytes.
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            ArgValue::Bytes(bytes) => Some(bytes.clone()),
            ArgValue::Text(text) if text.starts_with("0x") => text.parse().ok(),
            _ => None,
        }
    }
}

impl From<DynSolValue> for ArgValue {
    fn from(value: DynSolValue) -> Self {
        match value {
            DynSolValue::Address(address) => ArgValue::Address(address),
            DynSolValue::Uint(value, _) => ArgValue::Uint(value),
            DynSolValue::Int(value, _) => ArgValue::Int(value),
            DynSolValue::Bool(value) => ArgValue::Bool(value),
            DynSolValue::FixedBytes(word, size) => {
                ArgValue::Bytes(Bytes::copy_from_slice(&word[..size.min(32)]))
            }
            DynSolValue::Bytes(bytes) => ArgValue::Bytes(bytes.into()),
            DynSolValue::String(text) => ArgValue::Text(text),
            DynSolValue::Array(values)
            | DynSolValue::FixedArray(values)
            | DynSolValue::Tuple(values) => {
                ArgValue::List(values.into_iter().map(ArgValue::from).collect())
            }
            other => ArgValue::Text(format!("{other:?}")),
        }
    }
}

/// Arguments of a log, either keyed by ABI name or only by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogArgs {
    Named(Vec<(String, ArgValue)>),
    Positional(Vec<ArgValue>),
}

impl LogArgs {
    pub fn by_name(&self, name: &str) -> Option<&ArgValue> {
        match self {
            LogArgs::Named(values) => {
                values.iter().find(|(key, _)| key == name).map(|(_, value)| value)
            }
            LogArgs::Positional(_) => None,
        }
    }

    /// Positional lookup. Named bags do not answer positional reads.
    pub fn at(&self, index: usize) -> Option<&ArgValue> {
        match self {
            LogArgs::Positional(values) => values.get(index),
            LogArgs::Named(_) => None,
        }
    }
}

/// An undecoded-to-domain log as returned by a [ChainClient].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogEntry {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
    pub args: LogArgs,
}

impl RawLogEntry {
    /// Chain position of the log; larger is more recent.
    pub fn recency_key(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Sort entries most recent first: block number descending, then log index descending.
pub fn sort_most_recent_first(entries: &mut [RawLogEntry]) {
    entries.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
}

/// Inclusive block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanWindow {
    pub from_block: u64,
    pub to_block: u64,
}

impl ScanWindow {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self { from_block, to_block }
    }

    /// The window covering the last `lookback` blocks up to `head`, clamped to `floor`.
    ///
    /// Returns `None` when the head is still below the floor.
    pub fn lookback(head: u64, lookback: u64, floor: u64) -> Option<Self> {
        if head < floor {
            return None;
        }
        let from_block = head.saturating_sub(lookback).max(floor);
        Some(Self { from_block, to_block: head })
    }

    pub fn reaches(&self, floor: u64) -> bool {
        self.from_block <= floor
    }

    pub fn span(&self) -> u64 {
        self.to_block.saturating_sub(self.from_block) + 1
    }

    /// Split into consecutive inclusive chunks of at most `size` blocks.
    pub fn chunks(&self, size: u64) -> Vec<ScanWindow> {
        let size = size.max(1);
        let mut chunks = Vec::new();
        let mut from_block = self.from_block;
        while from_block <= self.to_block {
            let to_block = from_block.saturating_add(size - 1).min(self.to_block);
            chunks.push(ScanWindow { from_block, to_block });
            if to_block == u64::MAX {
                break;
            }
            from_block = to_block + 1;
        }
        chunks
    }
}

/// A log query for one event on one contract.
#[derive(Debug, Clone)]
pub struct LogFilter<'a> {
    pub event: &'a EventDescriptor,
    pub address: Address,
    pub window: ScanWindow,
    pub topics: TopicFilter,
}

/// Read-only access to the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest block number.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Unix timestamp, in seconds, of the given block.
    async fn block_timestamp(&self, block_number: u64) -> Result<u64, ChainError>;

    /// Logs matching the filter, decoded into argument bags. No ordering is guaranteed.
    async fn get_logs(&self, filter: &LogFilter<'_>) -> Result<Vec<RawLogEntry>, ChainError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError>;
}

/// [ChainClient] backed by a JSON-RPC HTTP endpoint.
#[derive(Clone)]
pub struct RpcChainClient {
    provider: RootProvider,
    timeout: Duration,
}

impl RpcChainClient {
    pub fn new(rpc_url: Url, timeout: Duration) -> Self {
        Self { provider: RootProvider::new_http(rpc_url), timeout }
    }

    async fn timed<T>(
        &self,
        request: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, ChainError> {
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))?
            .map_err(ChainError::from)
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.timed(self.provider.get_block_number()).await
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64, ChainError> {
        let block = self
            .timed(self.provider.get_block_by_number(BlockNumberOrTag::Number(block_number)).into_future())
            .await?
            .ok_or(ChainError::MissingBlock(block_number))?;
        Ok(block.header.timestamp)
    }

    async fn get_logs(&self, filter: &LogFilter<'_>) -> Result<Vec<RawLogEntry>, ChainError> {
        let mut rpc_filter = Filter::new()
            .address(filter.address)
            .event_signature(filter.event.selector())
            .from_block(filter.window.from_block)
            .to_block(filter.window.to_block);
        if let Some(topic) = filter.topics[0] {
            rpc_filter = rpc_filter.topic1(topic);
        }
        if let Some(topic) = filter.topics[1] {
            rpc_filter = rpc_filter.topic2(topic);
        }
        if let Some(topic) = filter.topics[2] {
            rpc_filter = rpc_filter.topic3(topic);
        }

        let logs = self.timed(self.provider.get_logs(&rpc_filter)).await?;
        let mut entries = Vec::with_capacity(logs.len());
        for log in &logs {
            match filter.event.decode_log(log) {
                Ok(entry) => entries.push(entry),
                Err(err) => tracing::warn!("Skipping undecodable {} log: {}", filter.event.name(), err),
            }
        }
        Ok(entries)
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::default().to(to).input(input.into());
        self.timed(self.provider.call(tx).into_future()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn entry(block_number: u64, log_index: u64) -> RawLogEntry {
        RawLogEntry {
            transaction_hash: B256::with_last_byte(log_index as u8),
            block_number,
            log_index,
            args: LogArgs::Positional(vec![]),
        }
    }

    #[test]
    fn lookback_clamps_to_floor() {
        assert_eq!(ScanWindow::lookback(1_000, 100, 0), Some(ScanWindow::new(900, 1_000)));
        assert_eq!(ScanWindow::lookback(1_000, 5_000, 400), Some(ScanWindow::new(400, 1_000)));
        assert_eq!(ScanWindow::lookback(50, 100, 0), Some(ScanWindow::new(0, 50)));
        assert_eq!(ScanWindow::lookback(399, 10, 400), None);
    }

    #[test]
    fn chunks_cover_window_without_overlap() {
        let window = ScanWindow::new(10, 34);
        let chunks = window.chunks(10);
        assert_eq!(
            chunks,
            vec![ScanWindow::new(10, 19), ScanWindow::new(20, 29), ScanWindow::new(30, 34)]
        );
        assert_eq!(chunks.iter().map(ScanWindow::span).sum::<u64>(), window.span());
        assert_eq!(ScanWindow::new(5, 5).chunks(0), vec![ScanWindow::new(5, 5)]);
    }

    #[test]
    fn most_recent_first_breaks_ties_on_log_index() {
        let mut entries = vec![entry(10, 1), entry(12, 0), entry(10, 4), entry(11, 9)];
        sort_most_recent_first(&mut entries);
        let keys: Vec<_> = entries.iter().map(RawLogEntry::recency_key).collect();
        assert_eq!(keys, vec![(12, 0), (11, 9), (10, 4), (10, 1)]);
    }

    #[test]
    fn arg_values_do_not_cross_kinds() {
        let number = ArgValue::Uint(U256::from(3));
        assert_eq!(number.as_u64(), Some(3));
        assert_eq!(number.as_bytes(), None);
        assert_eq!(number.as_address(), None);

        let bytes = ArgValue::Bytes(Bytes::from_static(&[1, 2, 3]));
        assert_eq!(bytes.as_u64(), None);
        assert_eq!(bytes.as_bytes(), Some(Bytes::from_static(&[1, 2, 3])));

        let negative = ArgValue::Int(I256::try_from(-1i64).unwrap());
        assert_eq!(negative.as_i64(), Some(-1));
        assert_eq!(negative.as_u64(), None);
    }

    #[test]
    fn named_and_positional_lookups() {
        let user = address!("0x3333333333333333333333333333333333333333");
        let named = LogArgs::Named(vec![("user".into(), ArgValue::Address(user))]);
        assert_eq!(named.by_name("user").and_then(ArgValue::as_address), Some(user));
        assert_eq!(named.at(0), None);

        let positional = LogArgs::Positional(vec![ArgValue::Address(user)]);
        assert_eq!(positional.by_name("user"), None);
        assert_eq!(positional.at(0).and_then(ArgValue::as_address), Some(user));
    }
}
