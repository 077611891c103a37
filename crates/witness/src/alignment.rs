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

//! Per-wallet reads against the commitment contract and the SagaRegistry.

use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::{Address, Bytes},
    sol,
    sol_types::SolCall,
};
use serde::Serialize;

use crate::{
    cache::{AggregateCache, CacheKey},
    chain::ChainClient,
    config::WitnessConfig,
    decoder::{bool_candidates, decode_flag, decode_small_uint, registry_candidates},
    error::ChainError,
    retry::RetryPolicy,
    Degradable,
};

sol! {
    interface IElyndraCommitment {
        function hasChosen(address user) external view returns (bool);
        function factionOf(address user) external view returns (uint8);
    }

    interface ISagaRegistry {
        function hasChosen(address user) external view returns (bool);
        function registry(address user) external view returns (bool);
    }
}

/// Output shapes of `ISagaRegistry.registry`, in the order they are tried.
pub const REGISTRY_SHAPES: &[&str] =
    &["(bool,uint8,uint32,bytes32)", "(bool,uint8,uint32)", "(bool,uint8)", "(bool)"];

/// A wallet's faction as recorded by the commitment contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alignment {
    pub has_chosen: bool,
    /// `-1` when no faction has been chosen.
    pub faction: i64,
}

impl Alignment {
    pub const NONE: Alignment = Alignment { has_chosen: false, faction: -1 };
}

/// Whether a wallet is registered with the SagaRegistry and which read established it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub registered: bool,
    /// `hasChosen`, one of [REGISTRY_SHAPES], or `none`.
    pub source: String,
}

pub struct AlignmentReader<C: ChainClient + ?Sized> {
    client: Arc<C>,
    retry: RetryPolicy,
    cache: Arc<AggregateCache>,
    ttl: Duration,
    commitment: Address,
    saga_registry: Address,
}

impl<C: ChainClient + ?Sized> AlignmentReader<C> {
    pub fn new(
        client: Arc<C>,
        retry: RetryPolicy,
        cache: Arc<AggregateCache>,
        ttl: Duration,
        commitment: Address,
        saga_registry: Address,
    ) -> Self {
        Self { client, retry, cache, ttl, commitment, saga_registry }
    }

    pub fn from_config(client: Arc<C>, cache: Arc<AggregateCache>, config: &WitnessConfig) -> Self {
        Self::new(
            client,
            config.retry_policy(),
            cache,
            config.ttls.existence,
            config.deployment.commitment_address,
            config.deployment.saga_registry_address,
        )
    }

    async fn call(&self, to: Address, input: Vec<u8>) -> Result<Bytes, ChainError> {
        let input = Bytes::from(input);
        self.retry.execute(|| self.client.call(to, input.clone())).await
    }

    /// `hasChosen`, then `factionOf` for wallets that have.
    pub async fn alignment(&self, wallet: Address) -> Degradable<Alignment> {
        let key = CacheKey::new(self.commitment, "alignment", wallet.to_string());
        self.cache
            .get_or_compute(key, self.ttl, || async move {
                let input = IElyndraCommitment::hasChosenCall { user: wallet }.abi_encode();
                let chosen = match self.call(self.commitment, input).await {
                    Ok(data) => decode_flag(&data, &bool_candidates()).is_some_and(|flag| flag.value),
                    Err(err) => {
                        tracing::warn!("hasChosen failed for {}: {}", wallet, err);
                        return Degradable::degraded(Alignment::NONE);
                    }
                };
                if !chosen {
                    return Degradable::confirmed(Alignment::NONE);
                }

                let input = IElyndraCommitment::factionOfCall { user: wallet }.abi_encode();
                match self.call(self.commitment, input).await {
                    Ok(data) => Degradable::confirmed(Alignment {
                        has_chosen: true,
                        faction: decode_small_uint(&data).unwrap_or(-1),
                    }),
                    Err(err) => {
                        tracing::warn!("factionOf failed for {}: {}", wallet, err);
                        Degradable::degraded(Alignment { has_chosen: true, faction: -1 })
                    }
                }
            })
            .await
    }

    /// Registration with the SagaRegistry.
    ///
    /// `hasChosen` is authoritative when it answers. Otherwise the `registry` getter is decoded
    /// against each historical output shape.
    pub async fn registration(&self, wallet: Address) -> Degradable<Registration> {
        let key = CacheKey::new(self.saga_registry, "registration", wallet.to_string());
        self.cache
            .get_or_compute(key, self.ttl, || async move {
                let mut degraded = false;

                let input = ISagaRegistry::hasChosenCall { user: wallet }.abi_encode();
                match self.call(self.saga_registry, input).await {
                    Ok(data) => {
                        if let Some(flag) = decode_flag(&data, &bool_candidates()) {
                            return Degradable::confirmed(Registration {
                                registered: flag.value,
                                source: "hasChosen".into(),
                            });
                        }
                    }
                    Err(err) => {
                        tracing::debug!("SagaRegistry hasChosen unavailable for {}: {}", wallet, err);
                        degraded = true;
                    }
                }

                let input = ISagaRegistry::registryCall { user: wallet }.abi_encode();
                match self.call(self.saga_registry, input).await {
                    Ok(data) => match decode_flag(&data, &registry_candidates()) {
                        Some(flag) => Degradable::confirmed(Registration {
                            registered: flag.value,
                            source: REGISTRY_SHAPES.get(flag.candidate).copied().unwrap_or("unknown").into(),
                        }),
                        None => Degradable {
                            value: Registration { registered: false, source: "none".into() },
                            degraded,
                        },
                    },
                    Err(err) => {
                        tracing::warn!("SagaRegistry registry failed for {}: {}", wallet, err);
                        Degradable::degraded(Registration { registered: false, source: "none".into() })
                    }
                }
            })
            .await
    }
}
