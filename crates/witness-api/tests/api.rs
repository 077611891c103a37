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

use alloy::primitives::{keccak256, Address};
use anima_test_utils::{test_config, MockChain, COMMITMENT, SAGA_REGISTRY};
use anima_witness::{ChainClient, FixedClock, WitnessConfig};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use witness_api::{create_app, AppState};

const HEAD: u64 = 1_000_000;
const FLOOR: u64 = 900_000;

fn config() -> WitnessConfig {
    let mut config = test_config(FLOOR);
    config.windows.existence = vec![1_000, 10_000, 200_000];
    config.windows.unique = vec![5_000, 200_000];
    config.windows.recent = vec![1_000, 10_000];
    config.windows.alignments = vec![1_000, 10_000];
    config.milestones = vec![2, 5, 10];
    config
}

fn app_with(chain: &Arc<MockChain>, config: &WitnessConfig) -> Router {
    let client: Arc<dyn ChainClient> = chain.clone();
    let clock = FixedClock(Utc.timestamp_opt(1_767_261_600, 0).unwrap());
    let state = AppState::new(client, config, Arc::new(clock)).unwrap();
    create_app(Arc::new(state))
}

fn app(chain: &Arc<MockChain>) -> Router {
    app_with(chain, &config())
}

async fn get(app: Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    let response =
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, serde_json::from_slice(&body).unwrap())
}

/// ABI word holding a small integer or bool.
fn word(value: u8) -> Vec<u8> {
    let mut word = vec![0u8; 32];
    word[31] = value;
    word
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature);
    [hash[0], hash[1], hash[2], hash[3]]
}

#[tokio::test(start_paused = true)]
async fn health_is_ok() {
    let chain = Arc::new(MockChain::new(HEAD));
    let (status, _, body) = get(app(&chain), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[test_log::test(tokio::test(start_paused = true))]
async fn witness_status_reports_found() {
    let chain = Arc::new(MockChain::new(HEAD));
    let wallet = Address::repeat_byte(0x0a);
    chain.push_witnessed(999_500, 0, wallet, 1, 2);

    let uri = format!("/v1/witness/status?address={wallet}&season=1");
    let (status, headers, body) = get(app(&chain), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=15");
    assert_eq!(body["has_witnessed"], true);
    assert_eq!(body["degraded"], false);
    assert_eq!(body["address"], wallet.to_string());
}

#[tokio::test(start_paused = true)]
async fn witness_status_defaults_to_configured_season() {
    let chain = Arc::new(MockChain::new(HEAD));
    let wallet = Address::repeat_byte(0x0b);
    chain.push_witnessed(999_500, 0, wallet, 2, 0);

    let uri = format!("/v1/witness/status?address={wallet}");
    let (_, _, body) = get(app(&chain), &uri).await;
    assert_eq!(body["season_id"], 1);
    assert_eq!(body["has_witnessed"], false);
}

#[tokio::test(start_paused = true)]
async fn invalid_address_is_bad_request() {
    let chain = Arc::new(MockChain::new(HEAD));
    let (status, _, body) = get(app(&chain), "/v1/witness/status?address=0x1234").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");

    let (status, _, _) = get(app(&chain), "/v1/alignments/nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    // No chain work for rejected requests.
    assert!(chain.log_queries().is_empty());
    assert_eq!(chain.call_queries(), 0);
}

#[tokio::test(start_paused = true)]
async fn rpc_outage_is_degraded_not_an_error() {
    let chain = Arc::new(MockChain::new(HEAD));
    chain.fail_all_logs(true);
    let app = app(&chain);

    let uri = format!("/v1/witness/status?address={}", Address::repeat_byte(0x0c));
    let (status, _, body) = get(app.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_witnessed"], false);
    assert_eq!(body["degraded"], true);

    let (status, _, body) = get(app, "/v1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["degraded"], true);
}

#[tokio::test(start_paused = true)]
async fn recent_feed_limit_is_clamped() {
    let chain = Arc::new(MockChain::new(HEAD));
    for i in 0..3u8 {
        chain.push_witnessed(999_000 + i as u64, 0, Address::repeat_byte(0x30 + i), 1, i);
    }
    let app = app(&chain);

    let (_, headers, body) = get(app.clone(), "/v1/witness/recent?limit=500").await;
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=10");
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["block_number"], 999_002);
    assert_eq!(entries[0]["faction_name"], "Echo");

    let (_, _, body) = get(app, "/v1/witness/recent?limit=0").await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn recent_alignments_are_listed() {
    let chain = Arc::new(MockChain::new(HEAD));
    chain.push_faction_chosen(999_100, 0, Address::repeat_byte(0x40), 1);

    let (status, _, body) = get(app(&chain), "/v1/alignments/recent").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["faction_name"], "Veil");
    assert_eq!(body["degraded"], false);
}

#[tokio::test(start_paused = true)]
async fn wallet_alignment_combines_both_contracts() {
    let chain = Arc::new(MockChain::new(HEAD));
    chain.set_call_response(COMMITMENT, selector("hasChosen(address)"), word(1));
    chain.set_call_response(COMMITMENT, selector("factionOf(address)"), word(0));
    chain.set_call_response(SAGA_REGISTRY, selector("hasChosen(address)"), word(1));

    let uri = format!("/v1/alignments/{}", Address::repeat_byte(0x41));
    let (status, _, body) = get(app(&chain), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_chosen"], true);
    assert_eq!(body["faction"], 0);
    assert_eq!(body["faction_name"], "Flame");
    assert_eq!(body["registered"], true);
    assert_eq!(body["registration_source"], "hasChosen");
    assert_eq!(body["degraded"], false);
}

#[tokio::test(start_paused = true)]
async fn milestones_unlock_at_targets() {
    let chain = Arc::new(MockChain::new(HEAD));
    for i in 0..6u8 {
        chain.push_witnessed(998_000 + i as u64, 0, Address::repeat_byte(0x50 + i), 1, 0);
    }

    let (_, _, body) = get(app(&chain), "/v1/milestones").await;
    assert_eq!(body["witness_count"], 6);
    assert_eq!(body["targets"]["canon_ch_002"], 5);
    assert_eq!(body["targets"]["eclipse"], 10);
    assert_eq!(body["unlocked"]["canon_ch_002"], true);
    assert_eq!(body["unlocked"]["eclipse"], false);
}

#[tokio::test(start_paused = true)]
async fn stats_and_eclipse_share_one_scan() {
    let chain = Arc::new(MockChain::new(HEAD));
    chain.push_faction_chosen(950_000, 0, Address::repeat_byte(0x60), 0);
    chain.push_faction_chosen(960_000, 0, Address::repeat_byte(0x61), 2);
    chain.push_faction_chosen(970_000, 0, Address::repeat_byte(0x60), 1);
    chain.set_timestamp(970_000, 1_767_261_000);
    let app = app(&chain);

    let (_, _, stats) = get(app.clone(), "/v1/stats").await;
    assert_eq!(stats["unique_wallets"], 2);
    assert_eq!(stats["faction_counts"]["Veil"], 1);
    assert_eq!(stats["faction_counts"]["Echo"], 1);
    assert_eq!(stats["eclipse"]["milestone"], 2);
    assert_eq!(stats["eclipse"]["is_active"], true);
    let queries = chain.log_queries().len();

    let (_, _, eclipse) = get(app, "/v1/eclipse").await;
    assert_eq!(eclipse["eclipse"], stats["eclipse"]);
    assert_eq!(chain.log_queries().len(), queries);
}

#[tokio::test(start_paused = true)]
async fn season_requires_end_block() {
    let chain = Arc::new(MockChain::new(HEAD));
    let (status, _, _) = get(app(&chain), "/v1/season").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut config = config();
    config.season_end_block = Some(1_100_000);
    let (status, _, body) = get(app_with(&chain, &config), "/v1/season").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"]["blocks_remaining"], 100_000);
    assert_eq!(body["progress"]["ended"], false);
}

#[tokio::test(start_paused = true)]
async fn unknown_route_is_not_found() {
    let chain = Arc::new(MockChain::new(HEAD));
    let (status, _, body) = get(app(&chain), "/v1/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test(start_paused = true)]
async fn openapi_yaml_lists_routes() {
    let chain = Arc::new(MockChain::new(HEAD));
    let response = app(&chain)
        .oneshot(Request::builder().uri("/openapi.yaml").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/x-yaml");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let yaml = String::from_utf8(body.to_vec()).unwrap();
    for path in ["/v1/witness/status", "/v1/alignments/{address}", "/v1/eclipse", "/v1/season"] {
        assert!(yaml.contains(path), "missing {path}");
    }
}
