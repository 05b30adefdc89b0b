//! Mock remote data service

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Materialization timestamp served by the mock
pub const MATERIALIZED_AT: f64 = 1_700_000_000.0;

/// A three-vertex skeleton: soma with one output branch and one input branch
pub fn skeleton_body() -> serde_json::Value {
    json!({
        "vertices": [[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [-100.0, 0.0, 0.0]],
        "edges": [[0, 1], [0, 2]],
        "root": 0,
        "pre_syn": [{"id": 1, "vertex": 1}, {"id": 2, "vertex": 1}],
        "post_syn": [{"id": 3, "vertex": 2}, {"id": 4, "vertex": 2}]
    })
}

/// Start a mock service that skeletonizes every root id except `failing`
pub async fn start_service(failing: &[u64]) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/materialize/api/v3/datastack/minnie65_public/timestamp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"timestamp": MATERIALIZED_AT})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/info/api/v2/datastack/full/minnie65_public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"synapse_table": "synapses_v1"})))
        .mount(&server)
        .await;

    for root_id in failing {
        Mock::given(method("POST"))
            .and(path("/skeleton/api/v1/minnie65_public/skeleton"))
            .and(body_partial_json(json!({"root_id": root_id})))
            .respond_with(ResponseTemplate::new(500).set_body_string("mesh missing"))
            .with_priority(1)
            .mount(&server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path("/skeleton/api/v1/minnie65_public/skeleton"))
        .respond_with(ResponseTemplate::new(200).set_body_json(skeleton_body()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/skeleton/api/v1/minnie65_public/volumes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "area_nm2": [1.0, 2.0, 3.0],
            "volume_nm3": [4.0, 5.0, 6.0]
        })))
        .mount(&server)
        .await;

    server
}

/// Bodies of the skeleton queries the server has received
pub async fn skeleton_requests(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().ends_with("/skeleton"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}
