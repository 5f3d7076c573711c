// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP API
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/v1/inspect` | Evaluate evidence, returns an `InspectionReport` |
//! | `GET` | `/v1/packs` | Active protocol packs |
//! | `GET` | `/v1/packs/{id}` | One pack with its effective standards |
//! | `GET/POST` | `/v1/profiles` | List or create standards profiles |
//! | `PUT/DELETE` | `/v1/profiles/{id}` | Edit or deactivate a profile |
//! | `GET` | `/v1/credits` | Credit balance of the calling account |
//! | `GET` | `/v1/events` | Server-Sent Events stream of evaluation events |
//! | `GET` | `/health` | Liveness |
//!
//! The calling account is read from the `X-Account-Id` header; authenticating
//! that header is the job of whatever sits in front of this service.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::application::evaluation::{EvaluationService, InspectionReport};
use crate::application::profile_service::ProfileService;
use crate::domain::catalog::ProtocolPack;
use crate::domain::errors::{EngineError, ValidationError};
use crate::domain::events::EvaluationEvent;
use crate::domain::evidence::InspectRequest;
use crate::domain::profile::{ProfileDraft, ProfileId};
use crate::domain::repository::RepositoryError;
use crate::infrastructure::event_bus::EventBusError;

pub const ACCOUNT_HEADER: &str = "x-account-id";

pub struct AppState {
    pub evaluation: Arc<EvaluationService>,
    pub profiles: Arc<ProfileService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(evaluation: Arc<EvaluationService>, profiles: Arc<ProfileService>) -> Self {
        Self {
            evaluation,
            profiles,
            start_time: Instant::now(),
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/inspect", post(inspect))
        .route("/v1/packs", get(list_packs))
        .route("/v1/packs/{id}", get(get_pack))
        .route("/v1/profiles", get(list_profiles).post(create_profile))
        .route("/v1/profiles/{id}", put(update_profile).delete(delete_profile))
        .route("/v1/credits", get(credit_balance))
        .route("/v1/events", get(stream_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error body: `{"error": {"code", "message", ...}}`
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": { "code": code, "message": message.into() } }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            EngineError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            EngineError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            EngineError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            error!("Inspection failed: {}", err);
        }

        let mut api_error = ApiError::new(status, err.code(), err.to_string());
        if let EngineError::InsufficientCredits { remaining, required } = err {
            api_error.body["error"]["remaining"] = json!(remaining);
            api_error.body["error"]["required"] = json!(required);
        }
        api_error
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match &err {
            RepositoryError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, "not_found", err.to_string()),
            RepositoryError::Forbidden(_) => ApiError::new(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
            RepositoryError::Invalid(errors) => {
                let mut api_error = ApiError::new(StatusCode::BAD_REQUEST, "validation_error", "Invalid profile");
                api_error.body["error"]["details"] = json!(errors);
                api_error
            }
            RepositoryError::Database(_) | RepositoryError::Serialization(_) => {
                error!("Profile repository failure: {}", err);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "repository_error", err.to_string())
            }
        }
    }
}

fn account_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(ACCOUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| EngineError::from(ValidationError::MissingAccount).into())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn inspect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<InspectRequest>,
) -> Result<Json<InspectionReport>, ApiError> {
    let account = account_id(&headers)?;

    // The evaluation runs in its own task so that a client disconnect cancels
    // it cleanly and the credit reservation is still settled.
    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();
    let evaluation = state.evaluation.clone();
    let task = tokio::spawn(async move { evaluation.evaluate(&account, &request, &cancel).await });

    let report = task
        .await
        .map_err(|e| EngineError::Backend(format!("evaluation task failed: {}", e)))??;
    info!(inspection_id = %report.inspection_id, status = ?report.status, "Inspection served");
    Ok(Json(report))
}

fn pack_summary(pack: &ProtocolPack, standards: usize) -> serde_json::Value {
    json!({
        "id": pack.id,
        "name": pack.name,
        "version": pack.version,
        "sector": pack.sector,
        "description": pack.description,
        "coverage": pack.coverage,
        "standards_count": standards,
        "maps_to": pack.maps_to,
    })
}

async fn list_packs(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let catalog = state.evaluation.catalog();
    let packs: Vec<serde_json::Value> = catalog
        .active_packs()
        .into_iter()
        .map(|p| pack_summary(p, catalog.effective_standards(&p.id).len()))
        .collect();
    Json(json!({ "packs": packs }))
}

async fn get_pack(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let catalog = state.evaluation.catalog();
    let pack = catalog.get(&id).ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, "not_found", format!("Protocol pack \"{}\" not found", id))
    })?;

    let mut body = serde_json::to_value(pack)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "serialization_error", e.to_string()))?;
    body["standards"] = json!(catalog.effective_standards(&id));
    Ok(Json(body))
}

async fn list_profiles(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = account_id(&headers)?;
    let listing = state.profiles.list(&account).await?;
    Ok(Json(json!(listing)))
}

async fn create_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<ProfileDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let account = account_id(&headers)?;
    let profile = state.profiles.create(&account, draft).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "profile": profile }))))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(draft): Json<ProfileDraft>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = account_id(&headers)?;
    let profile = state.profiles.update(&ProfileId::new(id), &account, draft).await?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

async fn delete_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = account_id(&headers)?;
    state.profiles.deactivate(&ProfileId::new(id), &account).await?;
    Ok(Json(json!({ "success": true })))
}

async fn credit_balance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let account = account_id(&headers)?;
    let balance = state
        .evaluation
        .ledger()
        .balance(&account)
        .await
        .map_err(EngineError::from)?;
    Ok(Json(json!(balance)))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    inspection_id: Option<Uuid>,
}

fn event_name(event: &EvaluationEvent) -> &'static str {
    match event {
        EvaluationEvent::EvaluationStarted { .. } => "evaluation_started",
        EvaluationEvent::EvidenceAnalyzed { .. } => "evidence_analyzed",
        EvaluationEvent::EvidenceFailed { .. } => "evidence_failed",
        EvaluationEvent::EvaluationCompleted { .. } => "evaluation_completed",
        EvaluationEvent::CreditsSettled { .. } => "credits_settled",
        EvaluationEvent::EvaluationRejected { .. } => "evaluation_rejected",
    }
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.evaluation.event_bus().subscribe();
    let filter = query.inspection_id;

    let events = stream::unfold(receiver, move |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if filter.is_some_and(|id| id != event.inspection_id()) {
                        continue;
                    }
                    let sse = Event::default()
                        .event(event_name(&event))
                        .json_data(&event)
                        .unwrap_or_else(|_| Event::default().comment("unserializable event"));
                    return Some((Ok(sse), receiver));
                }
                Err(EventBusError::Lagged(_)) | Err(EventBusError::Empty) => continue,
                Err(EventBusError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::evidence_dispatcher::{DispatchSettings, EvidenceDispatcher};
    use crate::application::prompt_composer::PromptComposer;
    use crate::domain::catalog::RuleCatalog;
    use crate::domain::evidence_fetch::{EvidenceFetcher, FetchError, FetchedEvidence};
    use crate::domain::reasoning::{ImagePayload, ReasoningError, ReasoningService};
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::repositories::{InMemoryCreditLedger, InMemoryProfileRepository};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct PassingReasoning;

    #[async_trait]
    impl ReasoningService for PassingReasoning {
        async fn invoke(&self, _prompt: &str, _image: Option<&ImagePayload>) -> Result<String, ReasoningError> {
            Ok(r#"{"status":"pass","confidence":0.9,"findings":[]}"#.to_string())
        }
    }

    struct NoFetch;

    #[async_trait]
    impl EvidenceFetcher for NoFetch {
        async fn fetch(&self, _url: &str) -> Result<FetchedEvidence, FetchError> {
            Err(FetchError::Status(404))
        }
    }

    fn router(balance: u64) -> Router {
        let profiles = Arc::new(InMemoryProfileRepository::with_system_profiles());
        let composer = Arc::new(PromptComposer::new());
        let dispatcher = EvidenceDispatcher::new(
            Arc::new(PassingReasoning),
            Arc::new(NoFetch),
            composer.clone(),
            DispatchSettings::default(),
        );
        let ledger = Arc::new(InMemoryCreditLedger::with_balances([("acct-1".to_string(), balance)]));
        let evaluation = EvaluationService::new(
            Arc::new(RuleCatalog::builtin()),
            profiles.clone(),
            composer,
            dispatcher,
            ledger,
            EventBus::default(),
        );
        app(Arc::new(AppState::new(
            Arc::new(evaluation),
            Arc::new(ProfileService::new(profiles)),
        )))
    }

    fn inspect_request(account: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/inspect")
            .header("content-type", "application/json");
        if let Some(account) = account {
            builder = builder.header(ACCOUNT_HEADER, account);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(0)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_inspect_text() {
        let body = json!({
            "protocol_pack": "food_service_nationwide_v1",
            "input_type": "text",
            "payload": {"text": "Walk-in cooler at 38F, logs complete."}
        });
        let response = router(5).oneshot(inspect_request(Some("acct-1"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let report = json_body(response).await;
        assert_eq!(report["status"], "pass");
        assert_eq!(report["metadata"]["credits_used"], 1);
        assert_eq!(report["metadata"]["remaining_credits"], 4);
    }

    #[tokio::test]
    async fn test_inspect_requires_account_header() {
        let body = json!({"input_type": "text", "payload": {"text": "x"}});
        let response = router(5).oneshot(inspect_request(None, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_insufficient_credits_is_402() {
        let body = json!({"input_type": "text", "payload": {"text": "x"}});
        let response = router(0).oneshot(inspect_request(Some("acct-1"), body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let error = json_body(response).await;
        assert_eq!(error["error"]["code"], "insufficient_credits");
        assert_eq!(error["error"]["required"], 1);
    }

    #[tokio::test]
    async fn test_video_is_501() {
        let body = json!({"input_type": "video", "payload": {"url": "https://cdn/x.mp4"}});
        let response = router(5).oneshot(inspect_request(Some("acct-1"), body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_list_and_get_packs() {
        let app = router(0);
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/v1/packs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let packs = json_body(response).await;
        assert!(packs["packs"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["id"] == "food_service_nationwide_v1"));

        let response = app
            .oneshot(Request::builder().uri("/v1/packs/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_create_and_forbidden_update() {
        let app = router(0);
        let create = Request::builder()
            .method("POST")
            .uri("/v1/profiles")
            .header("content-type", "application/json")
            .header(ACCOUNT_HEADER, "acct-1")
            .body(Body::from(json!({"profile_name": "Dock", "industry": "food"}).to_string()))
            .unwrap();
        let response = app.clone().oneshot(create).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = json_body(response).await["profile"]["id"].as_str().unwrap().to_string();

        let update = Request::builder()
            .method("PUT")
            .uri(format!("/v1/profiles/{}", id))
            .header("content-type", "application/json")
            .header(ACCOUNT_HEADER, "acct-2")
            .body(Body::from(json!({"profile_name": "Mine"}).to_string()))
            .unwrap();
        let response = app.oneshot(update).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_profile_is_400_with_details() {
        let create = Request::builder()
            .method("POST")
            .uri("/v1/profiles")
            .header("content-type", "application/json")
            .header(ACCOUNT_HEADER, "acct-1")
            .body(Body::from(json!({"profile_name": "", "industry": "mining"}).to_string()))
            .unwrap();
        let response = router(0).oneshot(create).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["details"].as_array().unwrap().len(), 2);
    }
}
