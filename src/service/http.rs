//! HTTP client for the remote data service
//!
//! Endpoints, relative to the server address:
//!
//! | call | request |
//! |---|---|
//! | dataset info | `GET info/api/v2/datastack/full/{datastack}` |
//! | materialization timestamp | `GET materialize/api/v3/datastack/{datastack}/timestamp` |
//! | skeleton | `POST skeleton/api/v1/{datastack}/skeleton` |
//! | volumetric properties | `POST skeleton/api/v1/{datastack}/volumes` |

use super::{
    DatasetInfo, RawSkeleton, RemoteDataService, ServiceParams, SkeletonRequest, VolumeProperties,
};
use crate::error::ComputeError;
use crate::types::RootId;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for a single request; skeleton queries can take minutes
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Deserialize)]
struct TimestampResponse {
    timestamp: f64,
}

#[derive(Serialize)]
struct VolumeRequest<'a> {
    root_id: RootId,
    timestamp: Option<DateTime<Utc>>,
    vertices: &'a [[f64; 3]],
}

/// Production [`RemoteDataService`] over HTTP/JSON
#[derive(Debug, Clone)]
pub struct HttpDataService {
    client: reqwest::Client,
    base: url::Url,
    params: ServiceParams,
}

impl HttpDataService {
    /// Build a client for `params`; no request is made until first use
    pub fn connect(params: &ServiceParams) -> Result<Self, ComputeError> {
        let base = url::Url::parse(&params.server_address).map_err(|e| {
            ComputeError::Service(format!(
                "invalid server address {}: {}",
                params.server_address, e
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base,
            params: params.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<url::Url, ComputeError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ComputeError::Service(format!(
                    "server address {} cannot be a base URL",
                    self.base
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl RemoteDataService for HttpDataService {
    async fn materialization_timestamp(&self) -> Result<DateTime<Utc>, ComputeError> {
        let url = self.endpoint(&[
            "materialize",
            "api",
            "v3",
            "datastack",
            &self.params.datastack,
            "timestamp",
        ])?;
        let body: TimestampResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let secs = body.timestamp;
        let nanos = ((secs - secs.floor()) * 1e9).round().min(999_999_999.0) as u32;
        Utc.timestamp_opt(secs.floor() as i64, nanos)
            .single()
            .ok_or_else(|| ComputeError::Service(format!("invalid timestamp {secs} from service")))
    }

    async fn dataset_info(&self) -> Result<DatasetInfo, ComputeError> {
        let url = self.endpoint(&["info", "api", "v2", "datastack", "full", &self.params.datastack])?;
        let info = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(info)
    }

    async fn fetch_skeleton(&self, request: &SkeletonRequest) -> Result<RawSkeleton, ComputeError> {
        let url = self.endpoint(&["skeleton", "api", "v1", &self.params.datastack, "skeleton"])?;
        tracing::debug!(root_id = %request.root_id, %url, "requesting skeleton");
        let skeleton = self
            .client
            .post(url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(skeleton)
    }

    async fn volumetric_properties(
        &self,
        root_id: RootId,
        vertices: &[[f64; 3]],
    ) -> Result<VolumeProperties, ComputeError> {
        let url = self.endpoint(&["skeleton", "api", "v1", &self.params.datastack, "volumes"])?;
        let props = self
            .client
            .post(url)
            .json(&VolumeRequest {
                root_id,
                timestamp: self.params.timestamp,
                vertices,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(props)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Synapse;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params_for(server: &MockServer) -> ServiceParams {
        ServiceParams {
            datastack: "minnie65_public".into(),
            server_address: server.uri(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn dataset_info_reads_synapse_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info/api/v2/datastack/full/minnie65_public"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "synapse_table": "synapses_pni_2",
                "viewer_site": "https://neuroglancer.example",
            })))
            .mount(&server)
            .await;

        let service = HttpDataService::connect(&params_for(&server)).unwrap();
        let info = service.dataset_info().await.unwrap();

        assert_eq!(info.synapse_table.as_deref(), Some("synapses_pni_2"));
        assert_eq!(info.segmentation_source, None);
    }

    #[tokio::test]
    async fn materialization_timestamp_converts_posix_seconds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/materialize/api/v3/datastack/minnie65_public/timestamp"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"timestamp": 1700000000.5})),
            )
            .mount(&server)
            .await;

        let service = HttpDataService::connect(&params_for(&server)).unwrap();
        let ts = service.materialization_timestamp().await.unwrap();

        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[tokio::test]
    async fn fetch_skeleton_posts_request_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/skeleton/api/v1/minnie65_public/skeleton"))
            .and(body_partial_json(serde_json::json!({
                "root_id": 42,
                "collapse_soma": true,
                "collapse_radius": 7500.0,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vertices": [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
                "edges": [[0, 1]],
                "root": 0,
                "pre_syn": [{"id": 9, "vertex": 1}],
            })))
            .mount(&server)
            .await;

        let service = HttpDataService::connect(&params_for(&server)).unwrap();
        let raw = service
            .fetch_skeleton(&SkeletonRequest {
                root_id: RootId(42),
                root_point: [0.0, 0.0, 0.0],
                collapse_soma: true,
                collapse_radius: 7500.0,
                timestamp: None,
                synapse_table: None,
                require_complete: true,
            })
            .await
            .unwrap();

        assert_eq!(raw.vertices.len(), 2);
        assert_eq!(raw.pre_syn, vec![Synapse { id: 9, vertex: 1 }]);
        assert!(raw.post_syn.is_empty());
    }

    #[tokio::test]
    async fn server_error_becomes_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/skeleton/api/v1/minnie65_public/volumes"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let service = HttpDataService::connect(&params_for(&server)).unwrap();
        let result = service
            .volumetric_properties(RootId(1), &[[0.0, 0.0, 0.0]])
            .await;

        match result {
            Err(ComputeError::Service(msg)) => assert!(msg.contains("503"), "got {msg}"),
            other => panic!("expected Service error, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let service = HttpDataService::connect(&ServiceParams {
            datastack: "ds".into(),
            server_address: "https://example.org/".into(),
            timestamp: None,
        })
        .unwrap();

        let url = service.endpoint(&["info", "api"]).unwrap();
        assert_eq!(url.as_str(), "https://example.org/info/api");
    }

    #[test]
    fn connect_rejects_invalid_address() {
        let result = HttpDataService::connect(&ServiceParams {
            datastack: "ds".into(),
            server_address: "not an address".into(),
            timestamp: None,
        });
        assert!(matches!(result, Err(ComputeError::Service(_))));
    }
}
