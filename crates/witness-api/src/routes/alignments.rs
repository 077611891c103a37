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

use anima_witness::faction_name;
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};

use crate::{
    handler::respond,
    models::{AlignmentEntry, FeedResponse, LimitParams, WalletAlignmentResponse},
    routes::parse_address,
    state::AppState,
};

/// Create alignment routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recent", get(get_recent_alignments))
        .route("/{address}", get(get_wallet_alignment))
}

/// GET /v1/alignments/recent
/// Returns the most recent faction choices, newest first
#[utoipa::path(
    get,
    path = "/v1/alignments/recent",
    tag = "Alignments",
    params(LimitParams),
    responses(
        (status = 200, description = "Recent faction choices", body = FeedResponse<AlignmentEntry>)
    )
)]
pub(crate) async fn get_recent_alignments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Response {
    let params = params.validate();
    let recent = state.witnesses.recent_alignments(params.limit).await;
    respond(
        Ok(FeedResponse {
            entries: recent.value.into_iter().map(AlignmentEntry::from).collect(),
            degraded: recent.degraded,
        }),
        "public, max-age=10",
    )
}

/// GET /v1/alignments/{address}
/// Returns the faction and registration state of a wallet
#[utoipa::path(
    get,
    path = "/v1/alignments/{address}",
    tag = "Alignments",
    params(
        ("address" = String, Path, description = "Wallet address (hex)")
    ),
    responses(
        (status = 200, description = "Wallet alignment", body = WalletAlignmentResponse),
        (status = 400, description = "Invalid address")
    )
)]
pub(crate) async fn get_wallet_alignment(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Response {
    respond(get_wallet_alignment_impl(state, address).await, "public, max-age=15")
}

async fn get_wallet_alignment_impl(
    state: Arc<AppState>,
    address: String,
) -> anyhow::Result<WalletAlignmentResponse> {
    let wallet = parse_address(&address)?;
    tracing::debug!("Reading alignment of {}", wallet);

    let (alignment, registration) =
        tokio::join!(state.alignments.alignment(wallet), state.alignments.registration(wallet));
    Ok(WalletAlignmentResponse {
        address: wallet.to_string(),
        has_chosen: alignment.value.has_chosen,
        faction: alignment.value.faction,
        faction_name: alignment.value.has_chosen.then(|| faction_name(alignment.value.faction).to_string()),
        registered: registration.value.registered,
        registration_source: registration.value.source,
        degraded: alignment.degraded || registration.degraded,
    })
}
