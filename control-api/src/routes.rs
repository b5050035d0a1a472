use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use stage_control::{BatchOutcome, StageUpdate};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiErrorResponse};
use crate::state::ApiState;

/// Create the control-plane router with all endpoints.
pub fn api_router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/stream", get(stream_handler))
        .route(
            "/api/motioncells",
            get(get_stage_handler).post(update_stage_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "video-handler",
        "uptime": state.uptime().as_secs_f64(),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "version": state.version,
    }))
}

/// Effective adaptation targets.
async fn stream_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let snapshot = state.controller.snapshot();
    let now = Instant::now();
    let ms_ago = |t: Instant| now.saturating_duration_since(t).as_millis() as u64;

    Json(json!({
        "bitrate": snapshot.bitrate,
        "fps": snapshot.fps,
        "last_adapt_ms_ago": snapshot.last_adapt.map(ms_ago),
        "last_activity_ms_ago": state.decoder.last_activity().map(ms_ago),
        "apply": state.apply,
        "bounds": snapshot.bounds,
    }))
}

/// Current stage properties plus the `enabled` flag.
///
/// Unreadable properties come back as `null`.
async fn get_stage_handler(
    State(state): State<Arc<ApiState>>,
) -> Result<impl IntoResponse, ApiErrorResponse> {
    let stage = Arc::clone(&state.stage);
    let report = tokio::task::spawn_blocking(move || stage.get_properties()).await??;

    let mut body = Map::new();
    for (prop, value) in report.properties {
        body.insert(prop.name().to_string(), json!(value));
    }
    body.insert("enabled".to_string(), Value::Bool(report.enabled));
    Ok(Json(Value::Object(body)))
}

/// Toggle the stage and/or write properties.
///
/// Every key is attempted. Any rejected key turns the response into a 400
/// that still lists what was applied.
async fn update_stage_handler(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Response, ApiErrorResponse> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let update = parse_update(body)?;

    let stage = Arc::clone(&state.stage);
    let outcome = tokio::task::spawn_blocking(move || stage.apply_batch(update)).await??;

    Ok(batch_response(outcome))
}

fn parse_update(body: Map<String, Value>) -> Result<StageUpdate, ApiError> {
    let mut update = StageUpdate::default();
    for (key, value) in body {
        if key == "enabled" {
            let enabled = value
                .as_bool()
                .ok_or_else(|| ApiError::BadRequest(format!("enabled must be a boolean, got {}", value)))?;
            update.enabled = Some(enabled);
        } else {
            update.properties.push((key, value));
        }
    }
    Ok(update)
}

fn batch_response(outcome: BatchOutcome) -> Response {
    let mut updated: Map<String, Value> = outcome
        .updated
        .iter()
        .map(|(key, value)| (key.clone(), json!(value)))
        .collect();
    if let Some(enabled) = outcome.toggled {
        updated.insert("enabled".to_string(), Value::Bool(enabled));
    }

    if outcome.failed.is_empty() {
        return Json(json!({
            "updated": updated,
            "enabled": outcome.enabled,
        }))
        .into_response();
    }

    let keys: Vec<&str> = outcome.failed.keys().map(String::as_str).collect();
    let failed: Map<String, Value> = outcome
        .failed
        .iter()
        .map(|(key, e)| (key.clone(), Value::String(e.to_string())))
        .collect();

    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": format!("Failed to set: {}", keys.join(", ")),
            "updated": updated,
            "failed": failed,
            "enabled": outcome.enabled,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_bitrate::{AdaptationBounds, AdaptiveController, SharedController};
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use rtcp_feedback::FeedbackDecoder;
    use stage_control::testing::FakePipeline;
    use stage_control::{PipelineState, StageController};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> (FakePipeline, Router) {
        let pipeline = FakePipeline::new();
        let stage = StageController::new(pipeline.clone(), Duration::from_millis(100));
        let controller =
            SharedController::new(AdaptiveController::new(AdaptationBounds::default()).expect("bounds"));
        let state = ApiState::new(
            Arc::new(stage),
            controller,
            Arc::new(FeedbackDecoder::new()),
            true,
            "1.2.3".to_string(),
        );
        (pipeline, api_router(Arc::new(state)))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("request");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app();
        let (status, body) = send(app, get("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "video-handler");
        assert_eq!(body["version"], "1.2.3");
        assert!(body["uptime"].as_f64().is_some());
        assert!(body["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
    }

    #[tokio::test]
    async fn test_stream_reports_controller_targets() {
        let (_, app) = app();
        let (status, body) = send(app, get("/api/stream")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bitrate"], 4_000_000);
        assert_eq!(body["fps"], 30);
        assert!(body["last_adapt_ms_ago"].is_null());
        assert!(body["last_activity_ms_ago"].is_null());
        assert_eq!(body["apply"], true);
        assert_eq!(body["bounds"]["bitrate_min"], 500_000);
        assert_eq!(body["bounds"]["fps_step"], 5);
        assert_eq!(body["bounds"]["cooldown_micros"], 5_000_000);
    }

    #[tokio::test]
    async fn test_get_stage_config() {
        let (pipeline, app) = app();
        pipeline.break_property_read("gap");
        let (status, body) = send(app, get("/api/motioncells")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], true);
        assert_eq!(body["display"], true);
        assert_eq!(body["gridx"], 10);
        assert!(body["gap"].is_null());
        assert_eq!(body.as_object().map(|o| o.len()), Some(13));
    }

    #[tokio::test]
    async fn test_post_toggle_and_properties() {
        let (pipeline, app) = app();
        let (status, body) = send(
            app,
            post(
                "/api/motioncells",
                json!({"enabled": false, "threshold": 0.3, "gridy": 12}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);
        assert_eq!(body["updated"]["enabled"], false);
        assert_eq!(body["updated"]["threshold"], 0.3);
        assert_eq!(body["updated"]["gridy"], 12);
        assert!(pipeline.is_bypassed());
        assert_eq!(pipeline.state(), PipelineState::Playing);
    }

    #[tokio::test]
    async fn test_post_noop_toggle_is_not_reported_as_updated() {
        let (_, app) = app();
        let (status, body) = send(app, post("/api/motioncells", json!({"enabled": true}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], true);
        assert_eq!(body["updated"], json!({}));
    }

    #[tokio::test]
    async fn test_post_partial_failure_is_client_error() {
        let (pipeline, app) = app();
        let (status, body) = send(
            app,
            post(
                "/api/motioncells",
                json!({"threshold": 0.3, "gridx": 8, "usealpha": false, "nonsense": 1}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|e| e.contains("nonsense")));
        assert_eq!(body["updated"].as_object().map(|o| o.len()), Some(3));
        assert!(body["failed"]["nonsense"].is_string());
        assert_eq!(body["enabled"], true);
        assert_eq!(
            pipeline.stage_property("gridx"),
            Some(stage_control::PropertyValue::Int(8))
        );
    }

    #[tokio::test]
    async fn test_post_missing_neighbor_is_server_error() {
        let (pipeline, app) = app();
        pipeline.remove_element("stage-in");
        let (status, body) = send(app, post("/api/motioncells", json!({"enabled": false}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "chain neighbor elements not found");
        assert_eq!(pipeline.state(), PipelineState::Playing);
    }

    #[tokio::test]
    async fn test_post_timeout_is_gateway_timeout() {
        let (pipeline, app) = app();
        pipeline.stall_state(PipelineState::Paused);
        let (status, body) = send(app, post("/api/motioncells", json!({"enabled": false}))).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body["error"].is_string());
        assert_eq!(pipeline.state(), PipelineState::Playing);
    }

    #[tokio::test]
    async fn test_post_rejects_bad_bodies() {
        let (_, app) = app();
        let (status, body) = send(app.clone(), post("/api/motioncells", json!({"enabled": "yes"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let request = Request::builder()
            .method("POST")
            .uri("/api/motioncells")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
