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

//! Error types shared by the chain client, the decoder and configuration.

use std::time::Duration;

use alloy::transports::TransportError;

/// Failure talking to the chain.
///
/// Cloneable so a scan can keep the last error around after retries are exhausted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Transport or JSON-RPC level failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The request did not complete within the configured timeout.
    #[error("rpc request timed out after {0:?}")]
    Timeout(Duration),

    /// The node does not know about the requested block.
    #[error("block {0} not found")]
    MissingBlock(u64),

    /// A log came back without a field required to order it.
    #[error("log is missing {0}")]
    IncompleteLog(&'static str),
}

impl From<TransportError> for ChainError {
    fn from(err: TransportError) -> Self {
        ChainError::Rpc(err.to_string())
    }
}

/// A log or call result could not be mapped into the typed fields we expect.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("required field `{field}` missing under every known encoding")]
    MissingField { field: &'static str },

    #[error("field `{field}` has an unexpected value: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("malformed {event} log: {reason}")]
    Malformed { event: String, reason: String },
}

/// Invalid or missing configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
