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

use anima_witness::ConfigError;
use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Router,
};

use crate::{
    handler::{respond, ApiError},
    models::{
        EclipseResponse, MilestonesResponse, SeasonParams, SeasonProgressEntry, SeasonResponse,
        StatsResponse, UnlockState, UnlockTargets,
    },
    state::AppState,
};

/// Witnesses needed to unlock the second canon chapter.
pub const CANON_CHAPTER_TWO_TARGET: u64 = 5;
/// Witnesses needed to unlock the eclipse cue.
pub const ECLIPSE_TARGET: u64 = 10;

/// Create stats, milestone and season routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/eclipse", get(get_eclipse))
        .route("/milestones", get(get_milestones))
        .route("/season", get(get_season))
}

/// GET /v1/stats
/// Returns faction statistics from the commitment deployment block to the chain head
#[utoipa::path(
    get,
    path = "/v1/stats",
    tag = "Stats",
    responses(
        (status = 200, description = "Faction statistics", body = StatsResponse)
    )
)]
pub(crate) async fn get_stats(State(state): State<Arc<AppState>>) -> Response {
    let stats = state.stats.current_stats().await;
    respond(Ok(StatsResponse::new(stats.value, stats.degraded)), "public, max-age=15")
}

/// GET /v1/eclipse
/// Returns only the eclipse milestone state
#[utoipa::path(
    get,
    path = "/v1/eclipse",
    tag = "Stats",
    responses(
        (status = 200, description = "Eclipse state", body = EclipseResponse)
    )
)]
pub(crate) async fn get_eclipse(State(state): State<Arc<AppState>>) -> Response {
    let stats = state.stats.current_stats().await;
    respond(
        Ok(EclipseResponse { eclipse: stats.value.milestone.into(), degraded: stats.degraded }),
        "public, max-age=15",
    )
}

/// GET /v1/milestones
/// Returns the season's witness count against the content unlock targets
#[utoipa::path(
    get,
    path = "/v1/milestones",
    tag = "Stats",
    params(SeasonParams),
    responses(
        (status = 200, description = "Unlock state", body = MilestonesResponse)
    )
)]
pub(crate) async fn get_milestones(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeasonParams>,
) -> Response {
    let season_id = params.season.unwrap_or_else(|| state.witnesses.season_id());
    let count = state.witnesses.unique_witness_count(season_id).await;
    respond(
        Ok(MilestonesResponse {
            season_id,
            witness_count: count.value,
            targets: UnlockTargets { canon_ch_002: CANON_CHAPTER_TWO_TARGET, eclipse: ECLIPSE_TARGET },
            unlocked: UnlockState {
                canon_ch_002: count.value >= CANON_CHAPTER_TWO_TARGET,
                eclipse: count.value >= ECLIPSE_TARGET,
            },
            degraded: count.degraded,
        }),
        "public, max-age=10",
    )
}

/// GET /v1/season
/// Returns progress through the configured season
#[utoipa::path(
    get,
    path = "/v1/season",
    tag = "Stats",
    responses(
        (status = 200, description = "Season progress", body = SeasonResponse),
        (status = 404, description = "No season end block configured")
    )
)]
pub(crate) async fn get_season(State(state): State<Arc<AppState>>) -> Response {
    respond(get_season_impl(state).await, "public, max-age=15")
}

async fn get_season_impl(state: Arc<AppState>) -> anyhow::Result<SeasonResponse> {
    let progress = state.witnesses.season_progress().await.map_err(|err| match err {
        ConfigError::Missing(name) => ApiError::NotConfigured(name),
        ConfigError::Invalid { name, .. } => ApiError::NotConfigured(name),
    })?;
    Ok(SeasonResponse {
        season_id: state.witnesses.season_id(),
        progress: progress.value.map(SeasonProgressEntry::from),
        degraded: progress.degraded,
    })
}
