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

use std::{net::SocketAddr, sync::Arc, time::Duration};

use alloy::primitives::Address;
use anima_witness::{
    config::{
        CacheTtls, LookbackWindows, ALIGNMENT_WINDOWS, EXISTENCE_WINDOWS, RECENT_WINDOWS,
        STATS_CHUNK_SIZE, UNIQUE_WINDOWS,
    },
    milestone::{DEFAULT_MILESTONES, DEFAULT_TIMEZONE},
    retry::{DEFAULT_ATTEMPTS, MAX_ATTEMPTS},
    Deployment, WitnessConfig,
};
use anyhow::{Context, Result};
use clap::Parser;
use url::Url;
use witness_api::{create_app, AppState};

/// Arguments for the witness API server.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct WitnessServerArgs {
    /// URL of the Base JSON-RPC endpoint.
    #[clap(short, long, env)]
    rpc_url: Url,

    /// Chain ID used to look up known contract deployments.
    #[clap(long, env, default_value = "8453")]
    chain_id: u64,

    /// Address of the contract emitting `Witnessed`.
    #[clap(long, env)]
    witness_registry_address: Option<Address>,

    /// First block that can contain `Witnessed` logs.
    #[clap(long, env)]
    witness_deployment_block: Option<u64>,

    /// Address of the ElyndraCommitment contract (defaults to the known deployment).
    #[clap(long, env)]
    commitment_address: Option<Address>,

    /// Deployment block of the commitment contract.
    #[clap(long, env)]
    commitment_deployment_block: Option<u64>,

    /// Address of the SagaRegistry contract (defaults to the known deployment).
    #[clap(long, env)]
    saga_registry_address: Option<Address>,

    /// Season used when a request does not name one.
    #[clap(long, env, default_value = "1")]
    season_id: u64,

    /// Last block of the current season.
    #[clap(long, env)]
    season_end_block: Option<u64>,

    /// Lookback windows for witness existence checks, in blocks.
    #[clap(long, env, value_delimiter = ',', default_values_t = EXISTENCE_WINDOWS.to_vec())]
    existence_windows: Vec<u64>,

    /// Lookback windows for unique witness counts, in blocks.
    #[clap(long, env, value_delimiter = ',', default_values_t = UNIQUE_WINDOWS.to_vec())]
    unique_windows: Vec<u64>,

    /// Lookback windows for the recent witness feed, in blocks.
    #[clap(long, env, value_delimiter = ',', default_values_t = RECENT_WINDOWS.to_vec())]
    recent_windows: Vec<u64>,

    /// Lookback windows for the recent alignment feed, in blocks.
    #[clap(long, env, value_delimiter = ',', default_values_t = ALIGNMENT_WINDOWS.to_vec())]
    alignment_windows: Vec<u64>,

    /// Cache TTL for witness existence checks, in milliseconds.
    #[clap(long, env, default_value = "15000")]
    existence_ttl_ms: u64,

    /// Cache TTL for unique witness counts, in milliseconds.
    #[clap(long, env, default_value = "15000")]
    count_ttl_ms: u64,

    /// Cache TTL for recent feeds, in milliseconds.
    #[clap(long, env, default_value = "12000")]
    recent_ttl_ms: u64,

    /// Cache TTL for faction statistics, in milliseconds.
    #[clap(long, env, default_value = "15000")]
    stats_ttl_ms: u64,

    /// Attempts per RPC call.
    #[clap(long, env, default_value_t = DEFAULT_ATTEMPTS)]
    retry_attempts: u32,

    /// Attempts per RPC call during aggregate scans.
    #[clap(long, env, default_value_t = MAX_ATTEMPTS)]
    aggregate_retry_attempts: u32,

    /// Base delay between attempts, in milliseconds; grows linearly per attempt.
    #[clap(long, env, default_value = "150")]
    retry_base_delay_ms: u64,

    /// Blocks per `eth_getLogs` request when computing statistics.
    #[clap(long, env, default_value_t = STATS_CHUNK_SIZE)]
    stats_chunk_size: u64,

    /// Concurrent chunk requests when computing statistics.
    #[clap(long, env, default_value = "4")]
    stats_concurrency: usize,

    /// Strictly ascending milestone thresholds.
    #[clap(long, env, value_delimiter = ',', default_values_t = DEFAULT_MILESTONES.to_vec())]
    milestones: Vec<u64>,

    /// IANA timezone defining calendar days for milestones.
    #[clap(long, env, default_value = DEFAULT_TIMEZONE)]
    milestone_timezone: String,

    /// Timeout per RPC request, in seconds.
    #[clap(long, env, default_value = "30")]
    request_timeout: u64,

    /// Address to bind.
    #[clap(long, env, default_value = "127.0.0.1")]
    host: std::net::IpAddr,

    /// Port to listen on.
    #[clap(long, env, default_value = "3000")]
    port: u16,

    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    log_json: bool,
}

impl WitnessServerArgs {
    /// The known deployment for the chain, with any addresses given on the command line
    /// taking precedence.
    fn deployment(&self) -> Result<Deployment> {
        let mut deployment = match Deployment::from_chain_id(self.chain_id) {
            Some(deployment) => deployment,
            None => Deployment::builder()
                .chain_id(self.chain_id)
                .commitment_address(
                    self.commitment_address
                        .context("--commitment-address is required for this chain")?,
                )
                .saga_registry_address(
                    self.saga_registry_address
                        .context("--saga-registry-address is required for this chain")?,
                )
                .build()?,
        };
        if let Some(address) = self.witness_registry_address {
            deployment.witness_registry_address = Some(address);
        }
        if let Some(block) = self.witness_deployment_block {
            deployment.witness_deployment_block = block;
        }
        if let Some(address) = self.commitment_address {
            deployment.commitment_address = address;
        }
        if let Some(block) = self.commitment_deployment_block {
            deployment.commitment_deployment_block = block;
        }
        if let Some(address) = self.saga_registry_address {
            deployment.saga_registry_address = address;
        }
        Ok(deployment)
    }

    fn config(&self) -> Result<WitnessConfig> {
        let mut config = WitnessConfig::new(self.deployment()?);
        config.season_id = self.season_id;
        config.season_end_block = self.season_end_block;
        config.windows = LookbackWindows {
            existence: self.existence_windows.clone(),
            unique: self.unique_windows.clone(),
            recent: self.recent_windows.clone(),
            alignments: self.alignment_windows.clone(),
        };
        config.ttls = CacheTtls {
            existence: Duration::from_millis(self.existence_ttl_ms),
            count: Duration::from_millis(self.count_ttl_ms),
            recent: Duration::from_millis(self.recent_ttl_ms),
            stats: Duration::from_millis(self.stats_ttl_ms),
        };
        config.retry_attempts = self.retry_attempts;
        config.aggregate_retry_attempts = self.aggregate_retry_attempts;
        config.retry_base_delay = Duration::from_millis(self.retry_base_delay_ms);
        config.stats_chunk_size = self.stats_chunk_size;
        config.stats_concurrency = self.stats_concurrency;
        config.milestones = self.milestones.clone();
        config.milestone_timezone = self.milestone_timezone.clone();
        config.request_timeout = Duration::from_secs(self.request_timeout);
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = WitnessServerArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    if args.log_json {
        tracing_subscriber::fmt().with_ansi(false).json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_ansi(false).with_env_filter(filter).init();
    }

    let config = args.config().context("Invalid configuration")?;
    tracing::info!("Starting witness-api server");
    tracing::info!(
        "Witness registry: {:?}, commitment: {}, season: {}",
        config.deployment.witness_registry_address,
        config.deployment.commitment_address,
        config.season_id
    );

    let state = AppState::connect(args.rpc_url.clone(), &config)
        .context("Failed to create application state")?;
    let app = create_app(Arc::new(state));

    let addr = SocketAddr::new(args.host, args.port);
    tracing::info!("Server listening on http://{}", addr);

    let listener =
        tokio::net::TcpListener::bind(addr).await.context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}
