use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::Response,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use farmcred_identity::{IdentityCheck, is_valid_nigerian_phone, normalize_nigerian_phone};
use farmcred_location::{CapturedLocation, FixedPosition, Position};
use farmcred_media::{PhotoDescriptor, PhotoValidation};
use farmcred_store::AuditEntry;
use farmcred_types::{
    Agent, AgentLocation, Coordinates, FarmCredError, Recommendation, RequestStatus, Submission,
    VerificationReport, VerificationRequest,
};
use farmcred_workflow::{
    AgentCandidate, AgentMatcher, Decision, StatusWatcher, VerificationWorkflow,
};

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    // Oversized photos must reach the validator to be reported as too large.
    let body_limit = usize::try_from(state.photo_rules.max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_mul(2);

    Router::new()
        .route("/api/v1/verification/submit", post(submit_request))
        .route("/api/v1/verification/{request_id}", get(get_request))
        .route(
            "/api/v1/verification/{request_id}/history",
            get(get_history),
        )
        .route("/api/v1/verification/{request_id}/assign", post(assign_agent))
        .route(
            "/api/v1/verification/{request_id}/schedule",
            post(schedule_visit),
        )
        .route("/api/v1/verification/{request_id}/start", post(start_visit))
        .route("/api/v1/verification/{request_id}/report", post(attach_report))
        .route("/api/v1/verification/{request_id}/decision", post(decide))
        .route("/api/v1/verification/{request_id}/fail", post(fail_assignment))
        .route(
            "/api/v1/verification/{request_id}/candidates",
            get(request_candidates),
        )
        .route("/api/v1/verification/{request_id}/watch", get(watch_request))
        .route(
            "/api/v1/farmers/{farmer_id}/requests",
            get(list_farmer_requests),
        )
        .route("/api/v1/agents", post(register_agent).get(list_agents))
        .route("/api/v1/agents/search", post(search_agents))
        .route("/api/v1/agents/{agent_id}", get(get_agent))
        .route("/api/v1/agents/{agent_id}/status", post(set_agent_status))
        .route("/api/v1/photos/validate", post(validate_photo))
        .route("/api/v1/photos/upload", post(upload_photo))
        .route("/api/v1/identity/nin", post(verify_nin))
        .route("/api/v1/identity/bvn", post(verify_bvn))
        .route("/api/v1/identity/cross", post(cross_verify))
        .route("/api/v1/location/resolve", post(resolve_location))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// Verification requests

#[derive(Serialize, Deserialize)]
pub struct SubmitResponse {
    pub request_id: Uuid,
    pub status: RequestStatus,
}

async fn submit_request(
    State(state): State<AppState>,
    ApiJson(submission): ApiJson<Submission>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let request_id = state.workflow.submit(submission).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            request_id,
            status: RequestStatus::Pending,
        }),
    ))
}

async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<VerificationRequest>, ApiError> {
    Ok(Json(state.workflow.get_status(request_id).await?))
}

async fn get_history(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    Ok(Json(state.workflow.history(request_id).await?))
}

async fn list_farmer_requests(
    State(state): State<AppState>,
    Path(farmer_id): Path<String>,
) -> Result<Json<Vec<VerificationRequest>>, ApiError> {
    Ok(Json(state.workflow.list_for_farmer(&farmer_id).await?))
}

#[derive(Deserialize)]
struct AssignRequest {
    agent_id: Uuid,
}

async fn assign_agent(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    ApiJson(req): ApiJson<AssignRequest>,
) -> Result<Json<VerificationRequest>, ApiError> {
    let agent = state
        .agents
        .get_agent(req.agent_id)
        .await?
        .ok_or(FarmCredError::AgentNotFound(req.agent_id))?;
    Ok(Json(state.workflow.assign_agent(request_id, agent).await?))
}

#[derive(Deserialize)]
struct ScheduleRequest {
    scheduled_visit: DateTime<Utc>,
}

async fn schedule_visit(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    ApiJson(req): ApiJson<ScheduleRequest>,
) -> Result<Json<VerificationRequest>, ApiError> {
    Ok(Json(
        state
            .workflow
            .schedule_visit(request_id, req.scheduled_visit)
            .await?,
    ))
}

async fn start_visit(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<VerificationRequest>, ApiError> {
    Ok(Json(state.workflow.start_visit(request_id).await?))
}

#[derive(Deserialize)]
struct ReportSubmission {
    agent_id: Uuid,
    recommendation: Recommendation,
    confidence_score: u8,
    farm_exists: bool,
    farm_size_accurate: bool,
    farm_type_accurate: bool,
    location_accurate: bool,
    #[serde(default)]
    additional_notes: String,
    #[serde(default)]
    verification_photos: Vec<String>,
    #[serde(default)]
    gps_coordinates: Option<Coordinates>,
    #[serde(default)]
    visit_date: Option<DateTime<Utc>>,
}

async fn attach_report(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    ApiJson(req): ApiJson<ReportSubmission>,
) -> Result<Json<VerificationRequest>, ApiError> {
    let mut report = VerificationReport::new(
        request_id,
        req.agent_id,
        req.recommendation,
        req.confidence_score,
    )
    .with_findings(
        req.farm_exists,
        req.farm_size_accurate,
        req.farm_type_accurate,
        req.location_accurate,
    )
    .with_notes(req.additional_notes);
    report.verification_photos = req.verification_photos;
    report.gps_coordinates = req.gps_coordinates;
    if let Some(visit_date) = req.visit_date {
        report.visit_date = visit_date;
    }
    Ok(Json(state.workflow.attach_report(request_id, report).await?))
}

#[derive(Deserialize)]
struct DecisionRequest {
    decision: Decision,
    #[serde(default)]
    note: String,
}

async fn decide(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    ApiJson(req): ApiJson<DecisionRequest>,
) -> Result<Json<VerificationRequest>, ApiError> {
    Ok(Json(
        state
            .workflow
            .decide(request_id, req.decision, req.note)
            .await?,
    ))
}

#[derive(Deserialize)]
struct FailRequest {
    reason: String,
}

async fn fail_assignment(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    ApiJson(req): ApiJson<FailRequest>,
) -> Result<Json<VerificationRequest>, ApiError> {
    if req.reason.trim().is_empty() {
        return Err(ApiError::bad_request("a failure reason is required"));
    }
    Ok(Json(
        state
            .workflow
            .fail_assignment(request_id, req.reason)
            .await?,
    ))
}

async fn request_candidates(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<AgentCandidate>>, ApiError> {
    let request = state.workflow.get_status(request_id).await?;
    let agents = state.agents.list_agents().await?;
    Ok(Json(state.matcher.candidates(&request, &agents)))
}

async fn watch_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    state.workflow.get_status(request_id).await?;
    let workflow = state.workflow.clone();
    let interval = state.watch_interval;
    let shutdown_rx = state.shutdown_rx.clone();
    Ok(ws.on_upgrade(move |socket| {
        stream_status(socket, workflow, request_id, interval, shutdown_rx)
    }))
}

async fn stream_status(
    mut socket: WebSocket,
    workflow: Arc<VerificationWorkflow>,
    request_id: Uuid,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
) {
    let (mut changes, handle) = StatusWatcher::new(workflow, request_id)
        .with_poll_interval(interval)
        .spawn(shutdown_rx);
    while let Some(change) = changes.recv().await {
        let text = match serde_json::to_string(&change) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(%request_id, %e, "failed to encode status change");
                break;
            }
        };
        if socket.send(Message::Text(text.into())).await.is_err() {
            tracing::debug!(%request_id, "watch client disconnected");
            break;
        }
    }
    drop(changes);
    let _ = handle.await;
    let _ = socket.send(Message::Close(None)).await;
}

// Agents

#[derive(Deserialize)]
struct RegisterAgentRequest {
    name: String,
    certification_id: String,
    location: AgentLocation,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: String,
    #[serde(default)]
    specializations: Vec<String>,
    #[serde(default)]
    rating: f64,
}

async fn register_agent(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    if req.name.trim().is_empty() || req.certification_id.trim().is_empty() {
        return Err(ApiError::bad_request(
            "agent name and certification id are required",
        ));
    }
    if !req.location.coordinates.is_valid() {
        return Err(ApiError::bad_request("agent coordinates are out of range"));
    }
    let phone = if req.phone.trim().is_empty() {
        String::new()
    } else if is_valid_nigerian_phone(&req.phone) {
        normalize_nigerian_phone(&req.phone)
    } else {
        return Err(ApiError::bad_request(format!(
            "invalid Nigerian phone number: {}",
            req.phone
        )));
    };

    let agent = Agent::new(req.name, req.certification_id, req.location)
        .with_contact(req.email, phone)
        .with_specializations(req.specializations)
        .with_rating(req.rating);
    state.agents.register(agent.clone()).await?;
    tracing::info!(agent_id = %agent.id, name = %agent.name, "agent registered");

    Ok((StatusCode::CREATED, Json(agent)))
}

async fn list_agents(State(state): State<AppState>) -> Result<Json<Vec<Agent>>, ApiError> {
    Ok(Json(state.agents.list_agents().await?))
}

async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<Agent>, ApiError> {
    let agent = state
        .agents
        .get_agent(agent_id)
        .await?
        .ok_or(FarmCredError::AgentNotFound(agent_id))?;
    Ok(Json(agent))
}

#[derive(Deserialize)]
struct AgentStatusRequest {
    active: bool,
}

async fn set_agent_status(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
    ApiJson(req): ApiJson<AgentStatusRequest>,
) -> Result<Json<Agent>, ApiError> {
    Ok(Json(state.agents.set_active(agent_id, req.active).await?))
}

#[derive(Deserialize)]
struct AreaSearch {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    radius_km: Option<f64>,
}

async fn search_agents(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AreaSearch>,
) -> Result<Json<Vec<AgentCandidate>>, ApiError> {
    let center = Coordinates::new(req.latitude, req.longitude);
    if !center.is_valid() {
        return Err(ApiError::bad_request("search center is out of range"));
    }
    let agents = state.agents.list_agents().await?;
    let found = match req.radius_km {
        Some(radius) if radius > 0.0 => AgentMatcher::new(radius).in_area(center, &agents),
        Some(_) => return Err(ApiError::bad_request("radius_km must be positive")),
        None => state.matcher.in_area(center, &agents),
    };
    Ok(Json(found))
}

// Photos

fn describe_upload(headers: &HeaderMap, body: &[u8]) -> PhotoDescriptor {
    let file_name = headers
        .get("x-file-name")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("upload");
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    PhotoDescriptor::from_bytes(file_name, declared, body)
}

async fn validate_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<PhotoValidation> {
    let photo = describe_upload(&headers, &body);
    Json(state.photo_rules.validate(&photo))
}

#[derive(Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
}

async fn upload_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let photo = describe_upload(&headers, &body);
    let validation = state.photo_rules.validate(&photo);
    if !validation.is_valid {
        return Err(ApiError::bad_request(validation.errors.join("; ")));
    }
    let uploader = state
        .uploader
        .as_ref()
        .ok_or_else(|| FarmCredError::external("photo storage is not configured"))?;
    let url = uploader
        .upload(&photo.file_name, &photo.mime_type, body.to_vec())
        .await
        .map_err(|e| FarmCredError::external(e.to_string()))?;
    Ok(Json(UploadResponse { url }))
}

// Identity

#[derive(Deserialize)]
struct NinRequest {
    nin: String,
}

#[derive(Deserialize)]
struct BvnRequest {
    bvn: String,
}

#[derive(Deserialize)]
struct CrossRequest {
    nin: String,
    bvn: String,
}

async fn verify_nin(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NinRequest>,
) -> Json<IdentityCheck> {
    Json(state.identity.verify_nin(req.nin.trim()).await)
}

async fn verify_bvn(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BvnRequest>,
) -> Json<IdentityCheck> {
    Json(state.identity.verify_bvn(req.bvn.trim()).await)
}

async fn cross_verify(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CrossRequest>,
) -> Json<IdentityCheck> {
    Json(
        state
            .identity
            .cross_verify(req.nin.trim(), req.bvn.trim())
            .await,
    )
}

// Location

async fn resolve_location(
    State(state): State<AppState>,
    ApiJson(position): ApiJson<Position>,
) -> Result<Json<CapturedLocation>, ApiError> {
    let captured = state
        .location
        .capture(&FixedPosition(position))
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(captured))
}
