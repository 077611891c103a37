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

use crate::models::*;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AnimaSaga Witness API",
        version = "1.0.0",
        description = "Witness, faction and milestone state read from the AnimaSaga contracts. Every response carries a `degraded` flag that is set when the chain could not be fully read.",
        contact(name = "AnimaSaga Development Team")
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Witness", description = "Witness status, counts and feed"),
        (name = "Alignments", description = "Faction choices and wallet alignment"),
        (name = "Stats", description = "Faction statistics, milestones and season progress")
    ),
    paths(
        crate::handler::health_check,
        // Witness endpoints
        crate::routes::witness::get_witness_status,
        crate::routes::witness::get_witness_count,
        crate::routes::witness::get_recent_witnesses,
        // Alignment endpoints
        crate::routes::alignments::get_recent_alignments,
        crate::routes::alignments::get_wallet_alignment,
        // Stats endpoints
        crate::routes::stats::get_stats,
        crate::routes::stats::get_eclipse,
        crate::routes::stats::get_milestones,
        crate::routes::stats::get_season,
    ),
    components(schemas(
        HealthResponse,
        WitnessStatusResponse,
        WitnessCountResponse,
        FeedResponse<WitnessEntry>,
        FeedResponse<AlignmentEntry>,
        WitnessEntry,
        AlignmentEntry,
        WalletAlignmentResponse,
        StatsResponse,
        ActivityEntry,
        EclipseState,
        EclipseResponse,
        MilestonesResponse,
        UnlockTargets,
        UnlockState,
        SeasonResponse,
        SeasonProgressEntry,
        LimitParams,
        SeasonParams,
        WitnessStatusParams,
    ))
)]
pub struct ApiDoc;
