use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::watch;
use tower::ServiceExt;

use farmcred_server::{AppState, FarmCredConfig, router};
use farmcred_store::InMemoryStore;

struct TestApp {
    router: Router,
    _shutdown_tx: watch::Sender<bool>,
}

fn app() -> TestApp {
    let mut config = FarmCredConfig::default();
    config.persist = false;
    // Nothing listens here, so geocoding always falls back to coordinates.
    config.geocoding.base_url = "http://127.0.0.1:9".into();
    config.geocoding.timeout_secs = 2;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::with_store(Arc::new(InMemoryStore::new()), &config, shutdown_rx).unwrap();
    TestApp {
        router: router(state),
        _shutdown_tx: shutdown_tx,
    }
}

impl TestApp {
    async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn register_agent(&self, name: &str, lat: f64) -> String {
        let (status, agent) = self
            .call(
                "POST",
                "/api/v1/agents",
                Some(json!({
                    "name": name,
                    "certification_id": format!("CERT-{name}"),
                    "location": {
                        "state": "Kaduna",
                        "lga": "Zaria",
                        "coordinates": {"latitude": lat, "longitude": 10.0}
                    },
                    "phone": "0803 123 4567",
                    "specializations": ["Crop Farming"],
                    "rating": 4.5
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(agent["phone"], "+2348031234567");
        agent["id"].as_str().unwrap().to_string()
    }

    async fn submit(&self, photos: Value) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/api/v1/verification/submit",
            Some(json!({
                "farmer_id": "f1",
                "farmer_name": "Halima Bello",
                "farmer_phone": "08031234567",
                "farm_location": {"latitude": 10.0, "longitude": 10.0, "address": "addr"},
                "farm_photos": photos,
                "farm_type": "crop",
                "farm_size": "1-5"
            })),
        )
        .await
    }
}

fn report(agent_id: &str, recommendation: &str) -> Value {
    json!({
        "agent_id": agent_id,
        "recommendation": recommendation,
        "confidence_score": 88,
        "farm_exists": true,
        "farm_size_accurate": true,
        "farm_type_accurate": true,
        "location_accurate": true,
        "additional_notes": "Visited with the farmer",
        "gps_coordinates": {"latitude": 10.0001, "longitude": 10.0002}
    })
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 2, 0, 0, 0]);
    bytes
}

fn raw_post(uri: &str, content_type: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .header("x-file-name", "farm.png")
        .body(Body::from(bytes))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, _) = app.call("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

/// Submit, assign, visit and approve over HTTP.
#[tokio::test]
async fn test_verification_lifecycle_over_http() {
    let app = app();
    let agent_id = app.register_agent("Agent A", 10.05).await;

    let (status, body) = app.submit(json!(["p1"])).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    let id = body["request_id"].as_str().unwrap().to_string();

    let (status, req) = app.call("GET", &format!("/api/v1/verification/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(req["status"], "pending");
    assert_eq!(req["farm_size"], "1-5");

    let (status, candidates) = app
        .call("GET", &format!("/api/v1/verification/{id}/candidates"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(candidates[0]["agent"]["id"], agent_id.as_str());
    assert_eq!(candidates[0]["specialization_match"], true);

    let (status, req) = app
        .call(
            "POST",
            &format!("/api/v1/verification/{id}/assign"),
            Some(json!({"agent_id": agent_id})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(req["status"], "assigned");

    let (status, err) = app
        .call(
            "POST",
            &format!("/api/v1/verification/{id}/report"),
            Some(report(&agent_id, "approve")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "invalid_state");

    let (status, req) = app
        .call("POST", &format!("/api/v1/verification/{id}/start"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(req["status"], "in_progress");

    let (status, req) = app
        .call(
            "POST",
            &format!("/api/v1/verification/{id}/report"),
            Some(report(&agent_id, "approve")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(req["status"], "completed");
    assert_eq!(req["verification_report"]["confidence_score"], 88);

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/v1/verification/{id}/report"),
            Some(report(&agent_id, "reject")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, history) = app
        .call("GET", &format!("/api/v1/verification/{id}/history"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 4);

    let (_, mine) = app.call("GET", "/api/v1/farmers/f1/requests", None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_additional_info_then_operator_decision() {
    let app = app();
    let agent_id = app.register_agent("Agent B", 10.1).await;
    let (_, body) = app.submit(json!(["p1", "p2"])).await;
    let id = body["request_id"].as_str().unwrap().to_string();

    app.call(
        "POST",
        &format!("/api/v1/verification/{id}/assign"),
        Some(json!({"agent_id": agent_id})),
    )
    .await;
    app.call(
        "POST",
        &format!("/api/v1/verification/{id}/schedule"),
        Some(json!({"scheduled_visit": "2030-01-15T09:00:00Z"})),
    )
    .await;
    app.call("POST", &format!("/api/v1/verification/{id}/start"), None)
        .await;

    let (status, req) = app
        .call(
            "POST",
            &format!("/api/v1/verification/{id}/report"),
            Some(report(&agent_id, "requires_additional_info")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(req["status"], "in_progress");

    let (status, req) = app
        .call(
            "POST",
            &format!("/api/v1/verification/{id}/decision"),
            Some(json!({"decision": "reject", "note": "title documents missing"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(req["status"], "rejected");
    assert_eq!(req["resolution_note"], "title documents missing");
}

#[tokio::test]
async fn test_submit_validation_errors() {
    let app = app();
    let (status, err) = app.submit(json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    let (_, mine) = app.call("GET", "/api/v1/farmers/f1/requests", None).await;
    assert!(mine.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_bodies_use_error_shape() {
    let app = app();
    let (_, body) = app.submit(json!(["p1"])).await;
    let id = body["request_id"].as_str().unwrap().to_string();

    let mut overflow = report(&uuid::Uuid::new_v4().to_string(), "approve");
    overflow["confidence_score"] = json!(300);
    let (status, err) = app
        .call("POST", &format!("/api/v1/verification/{id}/report"), Some(overflow))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");
    assert!(err["message"].is_string());

    let (status, err) = app
        .call(
            "POST",
            "/api/v1/verification/submit",
            Some(json!({"farmer_id": "f1"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    let req = raw_post(
        &format!("/api/v1/verification/{id}/fail"),
        "application/json",
        b"{not json".to_vec(),
    );
    let (status, err) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    let (_, req) = app.call("GET", &format!("/api/v1/verification/{id}"), None).await;
    assert_eq!(req["status"], "pending");
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let app = app();
    let missing = uuid::Uuid::new_v4();
    let (status, err) = app
        .call("GET", &format!("/api/v1/verification/{missing}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");

    let (_, body) = app.submit(json!(["p1"])).await;
    let id = body["request_id"].as_str().unwrap().to_string();
    let (status, _) = app
        .call(
            "POST",
            &format!("/api/v1/verification/{id}/assign"),
            Some(json!({"agent_id": missing})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call("GET", &format!("/api/v1/agents/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_agent_search_and_deactivation() {
    let app = app();
    let near = app.register_agent("Near", 10.05).await;
    app.register_agent("Far", 12.0).await;

    let (status, found) = app
        .call(
            "POST",
            "/api/v1/agents/search",
            Some(json!({"latitude": 10.0, "longitude": 10.0})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["agent"]["id"], near.as_str());

    let (_, wide) = app
        .call(
            "POST",
            "/api/v1/agents/search",
            Some(json!({"latitude": 10.0, "longitude": 10.0, "radius_km": 500.0})),
        )
        .await;
    assert_eq!(wide.as_array().unwrap().len(), 2);

    let (status, agent) = app
        .call(
            "POST",
            &format!("/api/v1/agents/{near}/status"),
            Some(json!({"active": false})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent["is_active"], false);

    let (_, body) = app.submit(json!(["p1"])).await;
    let id = body["request_id"].as_str().unwrap().to_string();
    let (status, err) = app
        .call(
            "POST",
            &format!("/api/v1/verification/{id}/assign"),
            Some(json!({"agent_id": near})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");
}

#[tokio::test]
async fn test_agent_phone_is_validated() {
    let app = app();
    let (status, _) = app
        .call(
            "POST",
            "/api/v1/agents",
            Some(json!({
                "name": "Bad Phone",
                "certification_id": "CERT-X",
                "location": {
                    "state": "Oyo",
                    "lga": "Ibadan North",
                    "coordinates": {"latitude": 7.4, "longitude": 3.9}
                },
                "phone": "12345"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_photo_validation_endpoint() {
    let app = app();
    let (status, result) = app
        .send(raw_post("/api/v1/photos/validate", "image/png", png(1920, 1080)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["is_valid"], true);

    let (_, result) = app
        .send(raw_post("/api/v1/photos/validate", "image/png", png(640, 480)))
        .await;
    assert_eq!(result["is_valid"], false);
    assert_eq!(result["errors"][0], "Resolution must be at least 1280x720");

    let (_, result) = app
        .send(raw_post(
            "/api/v1/photos/validate",
            "application/pdf",
            b"%PDF-1.7 not a photo".to_vec(),
        ))
        .await;
    assert_eq!(result["is_valid"], false);
    assert_eq!(result["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_photo_upload_requires_valid_photo_and_storage() {
    let app = app();
    let (status, err) = app
        .send(raw_post("/api/v1/photos/upload", "image/png", png(320, 240)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["message"].as_str().unwrap().contains("Resolution"));

    let (status, err) = app
        .send(raw_post("/api/v1/photos/upload", "image/png", png(1920, 1080)))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(err["error"], "external_service_error");
}

#[tokio::test]
async fn test_identity_checks_fail_softly() {
    let app = app();
    let (status, check) = app
        .call(
            "POST",
            "/api/v1/identity/nin",
            Some(json!({"nin": "12345678901"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["is_valid"], false);
    assert_eq!(check["message"], "NIN API credentials are not configured");

    let (status, check) = app
        .call("POST", "/api/v1/identity/bvn", Some(json!({"bvn": "123"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["message"], "BVN must be exactly 11 digits");

    let (_, check) = app
        .call(
            "POST",
            "/api/v1/identity/cross",
            Some(json!({"nin": "12345678901", "bvn": "22345678901"})),
        )
        .await;
    assert_eq!(check["is_valid"], false);
}

#[tokio::test]
async fn test_location_resolve_falls_back_to_coordinates() {
    let app = app();
    let (status, loc) = app
        .call(
            "POST",
            "/api/v1/location/resolve",
            Some(json!({"latitude": 6.5244, "longitude": 3.3792, "accuracy": 15.0})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loc["address"], "6.524400, 3.379200");

    let (status, _) = app
        .call(
            "POST",
            "/api/v1/location/resolve",
            Some(json!({"latitude": 200.0, "longitude": 3.3792})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
