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

use alloy::primitives::{address, Address};
use alloy_chains::NamedChain;
use derive_builder::Builder;

use crate::error::ConfigError;

/// Block the SagaRegistry was deployed at on Base; nothing older is ever queried.
pub const BASE_SAGA_DEPLOYMENT_BLOCK: u64 = 41_338_131;

/// Contract addresses and deployment blocks for one network.
#[non_exhaustive]
#[derive(Clone, Debug, Builder, PartialEq, Eq)]
pub struct Deployment {
    /// EIP-155 chain ID of the network.
    #[builder(setter(into, strip_option), default)]
    pub chain_id: Option<u64>,

    /// Address of the registry emitting `Witnessed`. Not part of any published deployment.
    #[builder(setter(into, strip_option), default)]
    pub witness_registry_address: Option<Address>,

    /// First block that can contain `Witnessed` logs.
    #[builder(default)]
    pub witness_deployment_block: u64,

    /// Address of the commitment contract emitting `FactionChosen` and `Committed`.
    #[builder(setter(into))]
    pub commitment_address: Address,

    /// First block that can contain commitment logs.
    #[builder(default)]
    pub commitment_deployment_block: u64,

    /// Address of the SagaRegistry.
    #[builder(setter(into))]
    pub saga_registry_address: Address,
}

impl Deployment {
    /// Create a new [DeploymentBuilder].
    pub fn builder() -> DeploymentBuilder {
        Default::default()
    }

    /// Lookup the [Deployment] for a named chain.
    pub const fn from_chain(chain: NamedChain) -> Option<Deployment> {
        match chain {
            NamedChain::Base => Some(BASE),
            _ => None,
        }
    }

    /// Lookup the [Deployment] by chain ID.
    pub fn from_chain_id(chain_id: impl Into<u64>) -> Option<Deployment> {
        let chain = NamedChain::try_from(chain_id.into()).ok()?;
        Self::from_chain(chain)
    }

    /// The witness registry, which has no published default.
    pub fn witness_registry(&self) -> Result<Address, ConfigError> {
        self.witness_registry_address.ok_or(ConfigError::Missing("witness registry address"))
    }
}

/// [Deployment] for Base mainnet.
pub const BASE: Deployment = Deployment {
    chain_id: Some(NamedChain::Base as u64),
    witness_registry_address: None,
    witness_deployment_block: BASE_SAGA_DEPLOYMENT_BLOCK,
    commitment_address: address!("0x2355451edBEE92138AB06231ED2b391089E9d4d1"),
    commitment_deployment_block: BASE_SAGA_DEPLOYMENT_BLOCK,
    saga_registry_address: address!("0xE5b05DA1C3A1cDF9438187c9C3f9621C5DDD325A"),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_lookup() {
        let deployment = Deployment::from_chain_id(8453u64).unwrap();
        assert_eq!(deployment, BASE);
        assert_eq!(deployment.commitment_deployment_block, BASE_SAGA_DEPLOYMENT_BLOCK);
        assert_eq!(deployment.witness_registry(), Err(ConfigError::Missing("witness registry address")));
        assert!(Deployment::from_chain_id(1u64).is_none());
    }

    #[test]
    fn builder_fills_defaults() {
        let registry = Address::repeat_byte(0x11);
        let deployment = Deployment::builder()
            .witness_registry_address(registry)
            .commitment_address(Address::repeat_byte(0x22))
            .saga_registry_address(Address::repeat_byte(0x33))
            .build()
            .unwrap();
        assert_eq!(deployment.chain_id, None);
        assert_eq!(deployment.witness_deployment_block, 0);
        assert_eq!(deployment.witness_registry(), Ok(registry));
    }
}
