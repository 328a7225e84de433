//! HTTP server for mentor matching

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{MatchEngine, MatchError, MatchRequest, MatchResponse};

/// Request bodies can carry thousands of candidate records
const BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub message: String,
}

fn error_reply(err: MatchError) -> (StatusCode, Json<ErrorResponse>) {
    if err.is_validation() {
        warn!("Rejected match request: {}", err);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Incomplete or invalid request".to_string(),
                details: Some(err.to_string()),
            }),
        )
    } else {
        error!("Matching failed: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Matching failed".to_string(),
                details: Some(err.to_string()),
            }),
        )
    }
}

/// Match handler. A client that disconnects drops this future, which
/// abandons every scoring call still in flight for its batch.
async fn match_handler(
    State(engine): State<Arc<MatchEngine>>,
    payload: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Json<MatchResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Json(req) = payload.map_err(|rejection| {
        error_reply(MatchError::validation(rejection.body_text()))
    })?;

    match engine.run_match(req).await {
        Ok(response) => {
            info!(
                "Match complete: {} matches, {} failed, {:.2}s",
                response.matches.len(),
                response.stats.failed,
                response.stats.total_elapsed_seconds
            );
            Ok(Json(response))
        }
        Err(e) => Err(error_reply(e)),
    }
}

async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse {
        message: "Server is running".to_string(),
    })
}

/// Health check handler
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "mentormatch".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create and configure the HTTP router
pub fn create_router(engine: Arc<MatchEngine>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/test", get(ping_handler))
        .route("/api/match", post(match_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(engine)
}

/// Run the HTTP server
pub async fn run_server(engine: Arc<MatchEngine>, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting mentormatch server on {}", addr);

    let app = create_router(engine);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineSettings, MockScorer};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        create_router(MatchEngine::new_simple(
            Box::new(MockScorer::new()),
            EngineSettings::default(),
        ))
    }

    async fn post_json(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/match")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_ping() {
        let response = router()
            .oneshot(Request::builder().uri("/api/test").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_match_with_original_field_names() {
        let body = json!({
            "mentee": {"name": "Ana", "lookingFor": "product design leadership"},
            "mentors": [
                {"id": 1, "name": "Kernel Dev", "title": "Engineer", "bio": "Operating systems"},
                {
                    "id": 2,
                    "name": "Jane Smith",
                    "current_title": "Design Lead",
                    "bio": "Product design leadership"
                }
            ]
        });

        let (status, json) = post_json(router(), body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "completed");
        assert_eq!(json["matches"][0]["candidate"]["id"], "2");
        assert_eq!(json["stats"]["succeeded"], 2);
        assert_eq!(json["stats"]["failed"], 0);
        assert_eq!(json["selectedCandidateIds"], json!(["1", "2"]));
    }

    #[tokio::test]
    async fn test_missing_seeker_is_bad_request() {
        let (status, json) = post_json(router(), json!({"candidates": [{"name": "x"}]})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["details"].as_str().unwrap().contains("seeker"));
    }

    #[tokio::test]
    async fn test_non_array_candidates_is_bad_request() {
        let body = json!({
            "seeker": {"displayName": "Ana", "goalText": "public speaking"},
            "candidates": {"name": "not a list"}
        });
        let (status, _) = post_json(router(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_seeker_is_bad_request() {
        let body = json!({"seeker": "Ana", "candidates": [{"name": "x"}]});
        let (status, json) = post_json(router(), body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Incomplete or invalid request");
        assert!(json["details"].as_str().unwrap().contains("seeker"));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/match")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["details"].is_string());
    }
}
