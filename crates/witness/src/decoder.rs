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

//! Tolerant field extraction from logs and call results.
//!
//! Deployed contracts have shipped more than one shape for the same event, and some RPC
//! providers return arguments only by position. Each field therefore lists the names it may
//! appear under and the positions it has occupied; the first compatible value wins.

use std::collections::BTreeMap;

use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    primitives::{Address, Bytes, B256},
};
use serde::Serialize;

use crate::{
    chain::{ArgValue, LogArgs, RawLogEntry},
    error::DecodeError,
};

/// Value kind a field is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Address,
    Unsigned,
    Signed,
    Bytes,
    Bool,
}

/// Where to look for one logical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: &'static str,
    pub names: &'static [&'static str],
    pub positions: &'static [usize],
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Address(Address),
    Unsigned(u64),
    Signed(i64),
    Bytes(Bytes),
    Bool(bool),
}

const USER_NAMES: &[&str] = &["user", "account", "addr"];

pub const WITNESS_USER: FieldSpec = FieldSpec {
    field: "user",
    names: USER_NAMES,
    positions: &[0, 2],
    kind: FieldKind::Address,
    required: true,
};
pub const WITNESS_SEASON: FieldSpec = FieldSpec {
    field: "seasonId",
    names: &["seasonId", "season"],
    positions: &[1],
    kind: FieldKind::Unsigned,
    required: true,
};
pub const WITNESS_FACTION: FieldSpec = FieldSpec {
    field: "faction",
    names: &["faction"],
    positions: &[2, 3],
    kind: FieldKind::Signed,
    required: false,
};
pub const WITNESS_PROOF: FieldSpec = FieldSpec {
    field: "proof",
    names: &["proof", "hash"],
    positions: &[3, 4],
    kind: FieldKind::Bytes,
    required: false,
};

/// Fields of a `Witnessed` log.
pub const WITNESS_FIELDS: &[FieldSpec] = &[WITNESS_USER, WITNESS_SEASON, WITNESS_FACTION, WITNESS_PROOF];

pub const CHOICE_USER: FieldSpec = FieldSpec {
    field: "user",
    names: USER_NAMES,
    positions: &[0],
    kind: FieldKind::Address,
    required: true,
};
pub const CHOICE_FACTION: FieldSpec = FieldSpec {
    field: "faction",
    names: &["faction"],
    positions: &[1],
    kind: FieldKind::Signed,
    required: true,
};

/// Fields of a `FactionChosen` log.
pub const FACTION_CHOICE_FIELDS: &[FieldSpec] = &[CHOICE_USER, CHOICE_FACTION];

fn coerce(value: &ArgValue, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Address => value.as_address().map(FieldValue::Address),
        FieldKind::Unsigned => value.as_u64().map(FieldValue::Unsigned),
        FieldKind::Signed => value.as_i64().map(FieldValue::Signed),
        FieldKind::Bytes => value.as_bytes().map(FieldValue::Bytes),
        FieldKind::Bool => value.as_bool().map(FieldValue::Bool),
    }
}

/// Read one field: named keys first, then positional fallbacks.
pub fn read_field(args: &LogArgs, spec: &FieldSpec) -> Option<FieldValue> {
    spec.names
        .iter()
        .filter_map(|name| args.by_name(name))
        .chain(spec.positions.iter().filter_map(|index| args.at(*index)))
        .find_map(|value| coerce(value, spec.kind))
}

/// Fields pulled out of a log, keyed by [FieldSpec::field].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFields(BTreeMap<&'static str, FieldValue>);

impl DecodedFields {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn address(&self, field: &str) -> Option<Address> {
        match self.0.get(field) {
            Some(FieldValue::Address(address)) => Some(*address),
            _ => None,
        }
    }

    pub fn unsigned(&self, field: &str) -> Option<u64> {
        match self.0.get(field) {
            Some(FieldValue::Unsigned(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn signed(&self, field: &str) -> Option<i64> {
        match self.0.get(field) {
            Some(FieldValue::Signed(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn bytes(&self, field: &str) -> Option<&Bytes> {
        match self.0.get(field) {
            Some(FieldValue::Bytes(value)) => Some(value),
            _ => None,
        }
    }
}

/// Decode every field in `specs`; fails if a required one is absent under every encoding.
pub fn decode(entry: &RawLogEntry, specs: &[FieldSpec]) -> Result<DecodedFields, DecodeError> {
    let mut fields = BTreeMap::new();
    for spec in specs {
        match read_field(&entry.args, spec) {
            Some(value) => {
                fields.insert(spec.field, value);
            }
            None if spec.required => return Err(DecodeError::MissingField { field: spec.field }),
            None => {}
        }
    }
    Ok(DecodedFields(fields))
}

/// A decoded `Witnessed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WitnessRecord {
    pub transaction_hash: B256,
    pub block_number: u64,
    /// Block time in unix seconds; `0` when it could not be resolved.
    pub timestamp: u64,
    pub wallet: Address,
    pub season_id: u64,
    /// `-1` when the log does not carry a faction.
    pub faction: i64,
    pub proof: Bytes,
}

/// A decoded `FactionChosen` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactionChoice {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
    pub timestamp: u64,
    pub wallet: Address,
    pub faction: i64,
}

pub fn decode_witness(entry: &RawLogEntry) -> Result<WitnessRecord, DecodeError> {
    let fields = decode(entry, WITNESS_FIELDS)?;
    Ok(WitnessRecord {
        transaction_hash: entry.transaction_hash,
        block_number: entry.block_number,
        timestamp: 0,
        wallet: fields.address(WITNESS_USER.field).ok_or(DecodeError::MissingField { field: "user" })?,
        season_id: fields
            .unsigned(WITNESS_SEASON.field)
            .ok_or(DecodeError::MissingField { field: "seasonId" })?,
        faction: fields.signed(WITNESS_FACTION.field).unwrap_or(-1),
        proof: fields.bytes(WITNESS_PROOF.field).cloned().unwrap_or_default(),
    })
}

pub fn decode_faction_choice(entry: &RawLogEntry) -> Result<FactionChoice, DecodeError> {
    let fields = decode(entry, FACTION_CHOICE_FIELDS)?;
    let faction = fields
        .signed(CHOICE_FACTION.field)
        .ok_or(DecodeError::MissingField { field: "faction" })?;
    if faction < 0 {
        return Err(DecodeError::InvalidField {
            field: "faction",
            reason: format!("negative faction {faction}"),
        });
    }
    Ok(FactionChoice {
        transaction_hash: entry.transaction_hash,
        block_number: entry.block_number,
        log_index: entry.log_index,
        timestamp: 0,
        wallet: fields.address(CHOICE_USER.field).ok_or(DecodeError::MissingField { field: "user" })?,
        faction,
    })
}

/// A boolean read out of a call result, with the index of the shape that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagReading {
    pub value: bool,
    pub candidate: usize,
}

/// Output shapes a registry lookup has used, widest first so the richest match wins.
pub fn registry_candidates() -> Vec<DynSolType> {
    vec![
        DynSolType::Tuple(vec![
            DynSolType::Bool,
            DynSolType::Uint(8),
            DynSolType::Uint(32),
            DynSolType::FixedBytes(32),
        ]),
        DynSolType::Tuple(vec![DynSolType::Bool, DynSolType::Uint(8), DynSolType::Uint(32)]),
        DynSolType::Tuple(vec![DynSolType::Bool, DynSolType::Uint(8)]),
        DynSolType::Tuple(vec![DynSolType::Bool]),
    ]
}

/// Single `bool` return.
pub fn bool_candidates() -> Vec<DynSolType> {
    vec![DynSolType::Tuple(vec![DynSolType::Bool])]
}

fn leading_bool(value: &DynSolValue) -> Option<bool> {
    match value {
        DynSolValue::Bool(flag) => Some(*flag),
        DynSolValue::Tuple(values) => match values.first() {
            Some(DynSolValue::Bool(flag)) => Some(*flag),
            _ => None,
        },
        _ => None,
    }
}

/// Try each candidate output shape in order. The first that decodes and yields a leading
/// `bool` wins; `None` means no candidate fit and the flag should be treated as absent.
pub fn decode_flag(data: &[u8], candidates: &[DynSolType]) -> Option<FlagReading> {
    candidates.iter().enumerate().find_map(|(candidate, ty)| {
        let decoded = ty.abi_decode_sequence(data).ok()?;
        leading_bool(&decoded).map(|value| FlagReading { value, candidate })
    })
}

/// Decode a single `uint8`-like return value.
pub fn decode_small_uint(data: &[u8]) -> Option<i64> {
    match DynSolType::Uint(8).abi_decode(data).ok()? {
        DynSolValue::Uint(value, _) => u64::try_from(value).ok().and_then(|v| i64::try_from(v).ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};

    fn entry(args: LogArgs) -> RawLogEntry {
        RawLogEntry { transaction_hash: B256::repeat_byte(1), block_number: 10, log_index: 0, args }
    }

    #[test]
    fn named_witness_log() {
        let user = address!("0x4444444444444444444444444444444444444444");
        let record = decode_witness(&entry(LogArgs::Named(vec![
            ("user".into(), ArgValue::Address(user)),
            ("seasonId".into(), ArgValue::Uint(U256::from(1))),
            ("faction".into(), ArgValue::Uint(U256::from(2))),
            ("proof".into(), ArgValue::Bytes(Bytes::from_static(&[9; 32]))),
        ])))
        .unwrap();
        assert_eq!(record.wallet, user);
        assert_eq!(record.season_id, 1);
        assert_eq!(record.faction, 2);
        assert_eq!(record.proof, Bytes::from_static(&[9; 32]));
        assert_eq!(record.timestamp, 0);
    }

    #[test]
    fn alternate_names_are_accepted() {
        let user = address!("0x5555555555555555555555555555555555555555");
        let record = decode_witness(&entry(LogArgs::Named(vec![
            ("account".into(), ArgValue::Address(user)),
            ("season".into(), ArgValue::Uint(U256::from(3))),
        ])))
        .unwrap();
        assert_eq!(record.wallet, user);
        assert_eq!(record.season_id, 3);
        assert_eq!(record.faction, -1);
        assert!(record.proof.is_empty());
    }

    #[test]
    fn positional_shapes_fall_back_by_kind() {
        let user = address!("0x6666666666666666666666666666666666666666");
        let proof = Bytes::from_static(&[7; 32]);

        // user, seasonId, faction, proof
        let current = decode_witness(&entry(LogArgs::Positional(vec![
            ArgValue::Address(user),
            ArgValue::Uint(U256::from(1)),
            ArgValue::Uint(U256::from(0)),
            ArgValue::Bytes(proof.clone()),
        ])))
        .unwrap();
        assert_eq!((current.wallet, current.season_id, current.faction), (user, 1, 0));
        assert_eq!(current.proof, proof);

        // id, seasonId, user, faction, proof
        let legacy = decode_witness(&entry(LogArgs::Positional(vec![
            ArgValue::Uint(U256::from(77)),
            ArgValue::Uint(U256::from(1)),
            ArgValue::Address(user),
            ArgValue::Uint(U256::from(2)),
            ArgValue::Bytes(proof.clone()),
        ])))
        .unwrap();
        assert_eq!((legacy.wallet, legacy.season_id, legacy.faction), (user, 1, 2));
        assert_eq!(legacy.proof, proof);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = decode_witness(&entry(LogArgs::Named(vec![(
            "seasonId".into(),
            ArgValue::Uint(U256::from(1)),
        )])))
        .unwrap_err();
        assert_eq!(err, DecodeError::MissingField { field: "user" });
    }

    #[test]
    fn faction_choice_rejects_negative_faction() {
        let user = address!("0x7777777777777777777777777777777777777777");
        let ok = decode_faction_choice(&entry(LogArgs::Positional(vec![
            ArgValue::Address(user),
            ArgValue::Uint(U256::from(1)),
        ])))
        .unwrap();
        assert_eq!(ok.faction, 1);

        let negative = LogArgs::Named(vec![
            ("user".into(), ArgValue::Address(user)),
            ("faction".into(), ArgValue::Int(alloy::primitives::I256::MINUS_ONE)),
        ]);
        assert!(matches!(
            decode_faction_choice(&entry(negative)),
            Err(DecodeError::InvalidField { field: "faction", .. })
        ));
    }

    #[test]
    fn decoder_tries_candidates_in_order() {
        let data = DynSolValue::Tuple(vec![DynSolValue::Bool(true)]).abi_encode_params();
        let candidates = vec![
            DynSolType::Tuple(vec![DynSolType::Bool, DynSolType::Uint(8), DynSolType::Uint(32)]),
            DynSolType::Tuple(vec![DynSolType::Bool]),
        ];
        assert_eq!(decode_flag(&data, &candidates), Some(FlagReading { value: true, candidate: 1 }));
    }

    #[test]
    fn registry_shape_picks_widest_fit() {
        let data = DynSolValue::Tuple(vec![
            DynSolValue::Bool(true),
            DynSolValue::Uint(U256::from(2), 8),
            DynSolValue::Uint(U256::from(1_700_000_000u64), 32),
        ])
        .abi_encode_params();
        assert_eq!(
            decode_flag(&data, &registry_candidates()),
            Some(FlagReading { value: true, candidate: 1 })
        );
    }

    #[test]
    fn undecodable_flag_is_absent() {
        assert_eq!(decode_flag(&[0u8; 4], &registry_candidates()), None);
        assert_eq!(decode_flag(&[], &bool_candidates()), None);
    }

    #[test]
    fn small_uint_return() {
        let data = DynSolValue::Uint(U256::from(2), 8).abi_encode();
        assert_eq!(decode_small_uint(&data), Some(2));
        assert_eq!(decode_small_uint(&[1, 2]), None);
    }
}
