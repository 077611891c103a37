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

//! Event descriptors and raw log decoding.

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::Event,
    primitives::{Address, B256, U256},
    rpc::types::Log,
};

use crate::{
    chain::{ArgValue, LogArgs, RawLogEntry},
    error::{ConfigError, DecodeError},
};

/// `Witnessed` as emitted by the witness registry.
pub const WITNESSED_SIGNATURE: &str =
    "event Witnessed(address indexed user, uint256 indexed seasonId, uint8 faction, bytes32 proof)";
/// `FactionChosen` as emitted by the commitment contract.
pub const FACTION_CHOSEN_SIGNATURE: &str =
    "event FactionChosen(address indexed user, uint8 faction)";
/// `Committed` as emitted by the commitment contract.
pub const COMMITTED_SIGNATURE: &str = "event Committed(address indexed user, bytes32 commitment)";

/// Optional values for the three indexed topic slots after the selector.
pub type TopicFilter = [Option<B256>; 3];

/// Which event a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Witnessed,
    FactionChosen,
    Committed,
    Other,
}

/// A parsed event ABI together with its resolved parameter types.
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    kind: EventKind,
    event: Event,
    types: Vec<DynSolType>,
}

impl EventDescriptor {
    /// Parse a human readable event signature.
    pub fn parse(kind: EventKind, signature: &str) -> Result<Self, ConfigError> {
        let event = Event::parse(signature).map_err(|e| ConfigError::Invalid {
            name: "event signature",
            reason: format!("{signature}: {e}"),
        })?;
        let types = event
            .inputs
            .iter()
            .map(|param| param.resolve())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Invalid {
                name: "event signature",
                reason: format!("{signature}: {e}"),
            })?;
        Ok(Self { kind, event, types })
    }

    pub fn witnessed() -> Result<Self, ConfigError> {
        Self::parse(EventKind::Witnessed, WITNESSED_SIGNATURE)
    }

    pub fn faction_chosen() -> Result<Self, ConfigError> {
        Self::parse(EventKind::FactionChosen, FACTION_CHOSEN_SIGNATURE)
    }

    pub fn committed() -> Result<Self, ConfigError> {
        Self::parse(EventKind::Committed, COMMITTED_SIGNATURE)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.event.name
    }

    /// Keccak hash of the canonical signature, i.e. topic 0.
    pub fn selector(&self) -> B256 {
        self.event.selector()
    }

    /// Build a topic filter from named indexed arguments.
    ///
    /// Names that are not indexed parameters of this event are ignored.
    pub fn topic_filter(&self, args: &[(&str, B256)]) -> TopicFilter {
        let mut topics: TopicFilter = [None; 3];
        for (name, value) in args {
            let slot = self
                .event
                .inputs
                .iter()
                .filter(|param| param.indexed)
                .position(|param| param.name == *name);
            match slot {
                Some(slot) if slot < topics.len() => topics[slot] = Some(*value),
                _ => tracing::debug!("{} has no indexed argument named {}", self.name(), name),
            }
        }
        topics
    }

    /// Decode an RPC log into a [RawLogEntry].
    ///
    /// Indexed dynamic values only carry their hash in the topic, so they come back as a
    /// 32 byte string. Argument names are kept when every parameter has one.
    pub fn decode_log(&self, log: &Log) -> Result<RawLogEntry, DecodeError> {
        let malformed = |reason: String| DecodeError::Malformed {
            event: self.event.name.clone(),
            reason,
        };

        let topics = log.topics();
        if topics.first() != Some(&self.selector()) {
            return Err(malformed("selector mismatch".into()));
        }
        let mut indexed = topics.iter().skip(1);

        let body_types: Vec<DynSolType> = self
            .event
            .inputs
            .iter()
            .zip(&self.types)
            .filter(|(param, _)| !param.indexed)
            .map(|(_, ty)| ty.clone())
            .collect();
        let body = DynSolType::Tuple(body_types)
            .abi_decode_sequence(&log.data().data)
            .map_err(|e| malformed(format!("data: {e}")))?;
        let mut body = match body {
            DynSolValue::Tuple(values) => values.into_iter(),
            other => vec![other].into_iter(),
        };

        let mut values = Vec::with_capacity(self.types.len());
        for (param, ty) in self.event.inputs.iter().zip(&self.types) {
            let value = if param.indexed {
                let topic =
                    indexed.next().ok_or_else(|| malformed(format!("missing topic for {}", param.name)))?;
                decode_topic(ty, topic).map_err(|e| malformed(format!("{}: {e}", param.name)))?
            } else {
                body.next().ok_or_else(|| malformed(format!("missing value for {}", param.name)))?
            };
            values.push((param.name.clone(), ArgValue::from(value)));
        }

        let args = if values.iter().all(|(name, _)| !name.is_empty()) {
            LogArgs::Named(values)
        } else {
            LogArgs::Positional(values.into_iter().map(|(_, value)| value).collect())
        };

        Ok(RawLogEntry {
            transaction_hash: log.transaction_hash.ok_or_else(|| malformed("no transaction hash".into()))?,
            block_number: log.block_number.ok_or_else(|| malformed("no block number".into()))?,
            log_index: log.log_index.ok_or_else(|| malformed("no log index".into()))?,
            args,
        })
    }
}

fn decode_topic(ty: &DynSolType, topic: &B256) -> Result<DynSolValue, alloy::dyn_abi::Error> {
    match ty {
        DynSolType::Address
        | DynSolType::Bool
        | DynSolType::Int(_)
        | DynSolType::Uint(_)
        | DynSolType::FixedBytes(_)
        | DynSolType::Function => ty.abi_decode(topic.as_slice()),
        _ => Ok(DynSolValue::FixedBytes(*topic, 32)),
    }
}

/// Left padded topic for an indexed `address`.
pub fn topic_for_address(address: Address) -> B256 {
    address.into_word()
}

/// Big endian topic for an indexed unsigned integer.
pub fn topic_for_uint(value: u64) -> B256 {
    B256::from(U256::from(value).to_be_bytes::<32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256, Bytes, LogData};

    fn rpc_log(topics: Vec<B256>, data: Vec<u8>, block: u64, index: u64) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            block_number: Some(block),
            log_index: Some(index),
            transaction_hash: Some(B256::repeat_byte(0xab)),
            ..Default::default()
        }
    }

    #[test]
    fn standard_descriptors_parse() {
        let witnessed = EventDescriptor::witnessed().unwrap();
        assert_eq!(witnessed.name(), "Witnessed");
        assert_eq!(witnessed.kind(), EventKind::Witnessed);
        assert_eq!(
            witnessed.selector(),
            alloy::primitives::keccak256("Witnessed(address,uint256,uint8,bytes32)")
        );
        EventDescriptor::faction_chosen().unwrap();
        EventDescriptor::committed().unwrap();
    }

    #[test]
    fn bad_signature_is_config_error() {
        let err = EventDescriptor::parse(EventKind::Other, "event Broken(address indexed").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn topic_filter_places_indexed_args() {
        let witnessed = EventDescriptor::witnessed().unwrap();
        let user = address!("0x00000000000000000000000000000000000000aa");
        let topics = witnessed.topic_filter(&[
            ("seasonId", topic_for_uint(1)),
            ("user", topic_for_address(user)),
            ("faction", topic_for_uint(2)),
        ]);
        assert_eq!(topics[0], Some(topic_for_address(user)));
        assert_eq!(
            topics[1],
            Some(b256!("0x0000000000000000000000000000000000000000000000000000000000000001"))
        );
        assert_eq!(topics[2], None);
    }

    #[test]
    fn decodes_witnessed_log_with_names() {
        let witnessed = EventDescriptor::witnessed().unwrap();
        let user = address!("0x1111111111111111111111111111111111111111");
        let proof = B256::repeat_byte(0x42);
        let data = DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::from(2), 8),
            DynSolValue::FixedBytes(proof, 32),
        ])
        .abi_encode_params();
        let log = rpc_log(
            vec![witnessed.selector(), topic_for_address(user), topic_for_uint(7)],
            data,
            120,
            3,
        );

        let entry = witnessed.decode_log(&log).unwrap();
        assert_eq!(entry.block_number, 120);
        assert_eq!(entry.log_index, 3);
        assert_eq!(entry.args.by_name("user").and_then(ArgValue::as_address), Some(user));
        assert_eq!(entry.args.by_name("seasonId").and_then(ArgValue::as_u64), Some(7));
        assert_eq!(entry.args.by_name("faction").and_then(ArgValue::as_i64), Some(2));
        assert_eq!(
            entry.args.by_name("proof").and_then(ArgValue::as_bytes),
            Some(Bytes::copy_from_slice(proof.as_slice()))
        );
    }

    #[test]
    fn unnamed_params_decode_positionally() {
        let anonymous =
            EventDescriptor::parse(EventKind::Other, "event FactionChosen(address indexed, uint8)")
                .unwrap();
        let user = address!("0x2222222222222222222222222222222222222222");
        let data = DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(1), 8)]).abi_encode_params();
        let log = rpc_log(vec![anonymous.selector(), topic_for_address(user)], data, 5, 0);

        let entry = anonymous.decode_log(&log).unwrap();
        assert!(matches!(entry.args, LogArgs::Positional(_)));
        assert_eq!(entry.args.at(0).and_then(ArgValue::as_address), Some(user));
        assert_eq!(entry.args.at(1).and_then(ArgValue::as_i64), Some(1));
    }

    #[test]
    fn pending_or_foreign_logs_are_rejected() {
        let witnessed = EventDescriptor::witnessed().unwrap();
        let chosen = EventDescriptor::faction_chosen().unwrap();
        let data = DynSolValue::Tuple(vec![DynSolValue::Uint(U256::from(1), 8)]).abi_encode_params();

        let foreign = rpc_log(vec![witnessed.selector(), B256::ZERO], data.clone(), 1, 0);
        assert!(chosen.decode_log(&foreign).is_err());

        let mut pending = rpc_log(vec![chosen.selector(), B256::ZERO], data, 1, 0);
        pending.block_number = None;
        assert!(matches!(chosen.decode_log(&pending), Err(DecodeError::Malformed { .. })));
    }
}
