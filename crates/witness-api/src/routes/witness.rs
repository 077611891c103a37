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

use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Router,
};

use crate::{
    handler::respond,
    models::{
        FeedResponse, LimitParams, SeasonParams, WitnessCountResponse, WitnessEntry,
        WitnessStatusParams, WitnessStatusResponse,
    },
    routes::parse_address,
    state::AppState,
};

/// Create witness routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_witness_status))
        .route("/count", get(get_witness_count))
        .route("/recent", get(get_recent_witnesses))
}

/// GET /v1/witness/status
/// Returns whether a wallet has witnessed a season
#[utoipa::path(
    get,
    path = "/v1/witness/status",
    tag = "Witness",
    params(WitnessStatusParams),
    responses(
        (status = 200, description = "Witness status", body = WitnessStatusResponse),
        (status = 400, description = "Invalid address")
    )
)]
pub(crate) async fn get_witness_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WitnessStatusParams>,
) -> Response {
    respond(get_witness_status_impl(state, params).await, "public, max-age=15")
}

async fn get_witness_status_impl(
    state: Arc<AppState>,
    params: WitnessStatusParams,
) -> anyhow::Result<WitnessStatusResponse> {
    let wallet = parse_address(&params.address)?;
    let season_id = params.season.unwrap_or_else(|| state.witnesses.season_id());
    tracing::debug!("Checking witness status of {} for season {}", wallet, season_id);

    let status = state.witnesses.has_witnessed(wallet, season_id).await;
    Ok(WitnessStatusResponse {
        address: wallet.to_string(),
        season_id,
        has_witnessed: status.value,
        degraded: status.degraded,
    })
}

/// GET /v1/witness/count
/// Returns the number of distinct wallets that witnessed a season
#[utoipa::path(
    get,
    path = "/v1/witness/count",
    tag = "Witness",
    params(SeasonParams),
    responses(
        (status = 200, description = "Unique witness count", body = WitnessCountResponse)
    )
)]
pub(crate) async fn get_witness_count(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeasonParams>,
) -> Response {
    let season_id = params.season.unwrap_or_else(|| state.witnesses.season_id());
    let count = state.witnesses.unique_witness_count(season_id).await;
    respond(
        Ok(WitnessCountResponse { season_id, unique_witnesses: count.value, degraded: count.degraded }),
        "public, max-age=15",
    )
}

/// GET /v1/witness/recent
/// Returns the most recent witnesses, newest first
#[utoipa::path(
    get,
    path = "/v1/witness/recent",
    tag = "Witness",
    params(LimitParams),
    responses(
        (status = 200, description = "Recent witnesses", body = FeedResponse<WitnessEntry>)
    )
)]
pub(crate) async fn get_recent_witnesses(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Response {
    let params = params.validate();
    let recent = state.witnesses.recent_witnesses(params.limit).await;
    respond(
        Ok(FeedResponse {
            entries: recent.value.into_iter().map(WitnessEntry::from).collect(),
            degraded: recent.degraded,
        }),
        "public, max-age=10",
    )
}
