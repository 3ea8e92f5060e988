use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use rapid_response::api::rest::router;
use rapid_response::geo::Coordinate;
use rapid_response::intake::{ExtractError, Extractor, IntakeSettings};
use rapid_response::models::capability::{Need, NeedSet};
use rapid_response::models::emergency::{Emergency, EmergencyStatus, EmergencyType, Urgency};
use rapid_response::models::intake::{ChatMessage, Confidence, EmergencyIntakeData};
use rapid_response::security::RateLimitConfig;
use rapid_response::state::AppState;
use rapid_response::store::{MemoryStore, Store};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

/// Always reports a complete, recordable flood request.
struct CompleteExtractor;

#[async_trait]
impl Extractor for CompleteExtractor {
    async fn extract(&self, _conversation: &[ChatMessage]) -> Result<EmergencyIntakeData, ExtractError> {
        let mut data = EmergencyIntakeData::fallback();
        data.emergency_type = EmergencyType::Flood;
        data.urgency = Urgency::Critical;
        data.location_address = "12 River Road".to_string();
        data.location_city = Some("Springfield".to_string());
        data.requester_name = Some("Sam".to_string());
        data.requester_phone = Some("555-0142".to_string());
        data.specific_needs = [Need::Shelter].into_iter().collect();
        data.confidence = Confidence::High;
        data.follow_up_question = None;
        data.is_complete = true;
        Ok(data)
    }
}

fn setup() -> (axum::Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), RateLimitConfig::default())
        .with_extractor(Arc::new(CompleteExtractor))
        .with_intake_settings(IntakeSettings {
            apply_progressive_delay: false,
            ..IntakeSettings::default()
        });
    (router(Arc::new(state)), store)
}

/// No extractor configured, so every turn falls back and sessions stay open.
fn setup_without_extraction() -> axum::Router {
    let state = AppState::new(Arc::new(MemoryStore::new()), RateLimitConfig::default())
        .with_intake_settings(IntakeSettings {
            apply_progressive_delay: false,
            ..IntakeSettings::default()
        });
    router(Arc::new(state))
}

fn turn(session_id: Option<&str>) -> Value {
    let mut body = json!({
        "messages": [{ "role": "user", "content": "we need help, the river is over the road" }]
    });
    if let Some(id) = session_id {
        body["sessionId"] = json!(id);
    }
    body
}

async fn seed_emergency(store: &MemoryStore) -> Uuid {
    let needs: NeedSet = [Need::Shelter].into_iter().collect();
    store
        .insert_emergency(Emergency {
            id: Uuid::new_v4(),
            emergency_type: EmergencyType::Flood,
            urgency: Urgency::Critical,
            description: Some("water rising in the basement".to_string()),
            location: Some(Coordinate::new(40.0, -74.0)),
            location_address: Some("12 River Road".to_string()),
            people_affected: Some(3),
            has_children: true,
            has_elderly: false,
            has_disabilities: false,
            specific_needs: needs,
            status: EmergencyStatus::Open,
            requester_name: Some("Sam".to_string()),
            requester_phone: Some("555-0142".to_string()),
            requester_email: None,
            session_id: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn intake_request(ip: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/intake")
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn flood_volunteer() -> Value {
    json!({
        "name": "Riley",
        "phone": "555-0101",
        "location": { "lat": 40.0, "lng": -74.0 },
        "skills": ["cleanup", "first_aid", "childcare"],
        "availability": "immediate"
    })
}

fn shelter_business() -> Value {
    json!({
        "business_name": "Harbor Inn",
        "location": { "lat": 40.01, "lng": -74.0 },
        "services_offered": { "shelter": true, "food": false },
        "capacity": 10,
        "can_handle_critical": true
    })
}

async fn create_volunteer(app: &axum::Router, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/volunteers", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn create_business(app: &axum::Router, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/businesses", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _store) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["emergencies"], 0);
    assert_eq!(body["volunteers"], 0);
    assert_eq!(body["matches"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _store) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("rate_limit_tracked_addresses"));
    assert!(body.contains("intake_active_sessions"));
}

#[tokio::test]
async fn create_volunteer_returns_available_volunteer() {
    let (app, _store) = setup();
    let body = create_volunteer(&app, flood_volunteer()).await;

    assert_eq!(body["name"], "Riley");
    assert_eq!(body["status"], "available");
    assert_eq!(body["max_concurrent_missions"], 1);
    assert_eq!(body["current_missions"], 0);
    assert_eq!(body["skills"], json!(["first_aid", "childcare", "cleanup"]));
}

#[tokio::test]
async fn create_volunteer_empty_name_returns_400() {
    let (app, _store) = setup();
    let mut payload = flood_volunteer();
    payload["name"] = json!("  ");

    let response = app
        .oneshot(json_request("POST", "/volunteers", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_volunteer_zero_missions_returns_400() {
    let (app, _store) = setup();
    let mut payload = flood_volunteer();
    payload["max_concurrent_missions"] = json!(0);

    let response = app
        .oneshot(json_request("POST", "/volunteers", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_business_over_capacity_returns_400() {
    let (app, _store) = setup();
    let mut payload = shelter_business();
    payload["current_load"] = json!(11);

    let response = app
        .oneshot(json_request("POST", "/businesses", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn find_ranks_candidates_for_emergency() {
    let (app, store) = setup();
    let emergency_id = seed_emergency(&store).await;
    create_volunteer(&app, flood_volunteer()).await;
    create_business(&app, shelter_business()).await;

    let response = app
        .oneshot(get_request(&format!("/match?emergencyId={emergency_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["volunteers"][0]["name"], "Riley");
    assert_eq!(body["volunteers"][0]["distance"], 0.0);
    // 50 proximity + 20 flood skills + 5 general + 10 immediate + 5 capacity + 3 children
    assert_eq!(body["volunteers"][0]["score"], 93);
    assert_eq!(body["businesses"][0]["name"], "Harbor Inn");
    assert_eq!(body["businesses"][0]["score"], 100);
}

#[tokio::test]
async fn find_missing_emergency_returns_404() {
    let (app, _store) = setup();
    let response = app
        .oneshot(get_request(&format!("/match?emergencyId={}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn find_without_emergency_id_returns_400() {
    let (app, _store) = setup();
    let response = app.oneshot(get_request("/match")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_action_returns_400() {
    let (app, store) = setup();
    let emergency_id = seed_emergency(&store).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/match",
            json!({ "emergencyId": emergency_id, "action": "dispatch" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_then_conflict_on_busy_volunteer() {
    let (app, store) = setup();
    let emergency_id = seed_emergency(&store).await;
    let volunteer = create_volunteer(&app, flood_volunteer()).await;
    let volunteer_id = volunteer["id"].as_str().unwrap().to_string();

    let payload = json!({
        "emergencyId": emergency_id,
        "action": "create",
        "volunteerId": volunteer_id,
    });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/match", payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["matchId"].is_string());

    let emergency = store.get_emergency(emergency_id).await.unwrap().unwrap();
    assert_eq!(emergency.status, EmergencyStatus::Matched);

    let response = app
        .oneshot(json_request("POST", "/match", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn create_without_helper_returns_400() {
    let (app, store) = setup();
    let emergency_id = seed_emergency(&store).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/match",
            json!({ "emergencyId": emergency_id, "action": "create" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn auto_match_then_accept_and_complete() {
    let (app, store) = setup();
    let emergency_id = seed_emergency(&store).await;
    create_volunteer(&app, flood_volunteer()).await;
    create_business(&app, shelter_business()).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/match",
            json!({ "emergencyId": emergency_id, "action": "auto" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["matchIds"].as_array().unwrap().len(), 2);
    assert_eq!(body["message"], "Successfully matched with 2 helper(s)");

    let match_id = body["matchIds"][0].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/matches/{match_id}/status"),
            json!({ "status": "accepted" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "accepted");
    assert!(body["accepted_at"].is_string());

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/matches/{match_id}/status"),
            json!({ "status": "completed", "feedbackRating": 5, "feedbackNotes": "quick help" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["feedback"]["rating"], 5);

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/matches/{match_id}/status"),
            json!({ "status": "accepted" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn auto_without_helpers_reports_failure() {
    let (app, store) = setup();
    let emergency_id = seed_emergency(&store).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/match",
            json!({ "emergencyId": emergency_id, "action": "auto" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["matchIds"], json!([]));
}

#[tokio::test]
async fn rating_out_of_range_returns_400() {
    let (app, _store) = setup();
    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/matches/{}/status", Uuid::new_v4()),
            json!({ "status": "completed", "feedbackRating": 9 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn intake_records_emergency_and_matches() {
    let (app, store) = setup();
    create_volunteer(&app, flood_volunteer()).await;

    let response = app
        .clone()
        .oneshot(intake_request(
            "198.51.100.4",
            json!({
                "messages": [{ "role": "user", "content": "Our street is flooding, I'm Sam at 555-0142" }],
                "sessionId": "chat-1"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["sessionId"], "chat-1");
    assert_eq!(body["isComplete"], true);
    assert_eq!(body["delayMs"], 0);
    assert!(body["emergencyId"].is_string());
    assert_eq!(body["matchIds"].as_array().unwrap().len(), 1);
    assert!(body["aiResponse"].as_str().unwrap().contains("critical"));

    let emergencies = store.list_emergencies().await.unwrap();
    assert_eq!(emergencies.len(), 1);
    assert_eq!(emergencies[0].session_id.as_deref(), Some("chat-1"));

    let response = app
        .oneshot(get_request("/intake?sessionId=chat-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["emergency"]["requester_name"], "Sam");
}

#[tokio::test]
async fn intake_without_messages_returns_400() {
    let (app, _store) = setup();
    let response = app
        .oneshot(intake_request("198.51.100.5", json!({ "messages": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn intake_lookup_unknown_session_returns_404() {
    let (app, _store) = setup();
    let response = app
        .oneshot(get_request("/intake?sessionId=nobody"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sixth_conversation_in_an_hour_is_rate_limited() {
    let (app, _store) = setup();
    let message = json!({
        "messages": [{ "role": "user", "content": "flood at my house" }]
    });

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(intake_request("203.0.113.9", message.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(intake_request("203.0.113.9", message.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Rate limit exceeded"));
    assert!(body["retryAfter"].as_u64().unwrap() > 3500);

    let response = app
        .oneshot(intake_request("203.0.113.10", message))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_security_reports_tracked_addresses() {
    let (app, _store) = setup();
    let response = app
        .clone()
        .oneshot(intake_request(
            "192.0.2.1",
            json!({ "messages": [{ "role": "user", "content": "fire nearby" }] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/admin/security")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["summary"]["totalIPs"], 1);
    assert_eq!(body["summary"]["recentRequests"], 1);
    assert_eq!(body["config"]["maxRequestsPerHour"], 5);
    assert_eq!(body["config"]["maxSessionsPerIP"], 3);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn list_matches_filters_by_emergency() {
    let (app, store) = setup();
    let emergency_id = seed_emergency(&store).await;
    create_volunteer(&app, flood_volunteer()).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/match",
            json!({ "emergencyId": emergency_id, "action": "auto" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/matches?emergencyId={emergency_id}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["status"], "pending");
    assert!(body[0]["volunteer_id"].is_string());

    let response = app
        .oneshot(get_request(&format!("/matches?emergencyId={}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn blocked_address_is_refused_on_follow_up_turns() {
    let app = setup_without_extraction();
    let ip = "9.9.9.9";

    let response = app
        .clone()
        .oneshot(intake_request(ip, turn(Some("chat-kept"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // two more sessions, two session denials, then three hourly-cap violations
    for _ in 0..7 {
        app.clone().oneshot(intake_request(ip, turn(None))).await.unwrap();
    }

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(intake_request(ip, turn(Some("chat-kept"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));

        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Temporary block"));
    }

    let response = app.oneshot(get_request("/admin/security")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["summary"]["blockedIPs"], 1);
    assert_eq!(body["ips"][0]["violations"], 3);
}

#[tokio::test]
async fn session_id_cannot_be_reused_from_another_address() {
    let app = setup_without_extraction();

    let response = app
        .clone()
        .oneshot(intake_request("198.51.100.20", turn(Some("chat-owned"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(intake_request("198.51.100.21", turn(Some("chat-owned"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("another client"));

    let response = app
        .clone()
        .oneshot(intake_request("198.51.100.20", turn(Some("chat-owned"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["sessionId"], "chat-owned");

    let response = app.oneshot(get_request("/admin/security")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["summary"]["totalSessions"], 1);
}
