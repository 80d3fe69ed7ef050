use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceExt;

use salonbook::config::AppConfig;
use salonbook::db;
use salonbook::db::queries;
use salonbook::handlers;
use salonbook::models::hours::parse_hhmm;
use salonbook::models::{Salon, Service, Staff};
use salonbook::services::notifications::{BookingEvent, BookingEventKind, NotificationDispatcher};
use salonbook::state::AppState;

// ── Mock Notifier ──

struct RecordingNotifier {
    events: Arc<Mutex<Vec<BookingEvent>>>,
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn dispatch(&self, event: &BookingEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        cancellation_grace_minutes: 0,
        request_timeout_secs: 5,
        notify_webhook_url: None,
    }
}

/// Salon open 09:00-20:00 with a 30-minute and a 45-minute service.
fn seed_catalog(conn: &rusqlite::Connection) {
    queries::insert_salon(
        conn,
        &Salon {
            id: "salon-1".into(),
            name: "Shear Genius".into(),
            opening_time: parse_hhmm("09:00").unwrap(),
            closing_time: parse_hhmm("20:00").unwrap(),
        },
    )
    .unwrap();
    queries::insert_staff(
        conn,
        &Staff {
            id: "staff-1".into(),
            salon_id: "salon-1".into(),
            name: "Sam".into(),
        },
    )
    .unwrap();
    queries::insert_service(
        conn,
        &Service {
            id: "svc-a".into(),
            salon_id: "salon-1".into(),
            name: "Haircut".into(),
            duration_minutes: 30,
            price: 25.0,
        },
    )
    .unwrap();
    queries::insert_service(
        conn,
        &Service {
            id: "svc-b".into(),
            salon_id: "salon-1".into(),
            name: "Color".into(),
            duration_minutes: 45,
            price: 60.0,
        },
    )
    .unwrap();
}

fn test_state() -> (Arc<AppState>, Arc<Mutex<Vec<BookingEvent>>>) {
    let conn = db::init_db(":memory:").unwrap();
    seed_catalog(&conn);
    let events = Arc::new(Mutex::new(vec![]));
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        notifier: Arc::new(RecordingNotifier {
            events: Arc::clone(&events),
        }),
    });
    (state, events)
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/availability", get(handlers::availability::get_availability))
        .route(
            "/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_bookings),
        )
        .route("/bookings/:id", put(handlers::bookings::update_booking))
        .route(
            "/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .with_state(state)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn booking_body(customer: &str, services: &[&str], date: &str, start: &str) -> serde_json::Value {
    serde_json::json!({
        "customerId": customer,
        "salonId": "salon-1",
        "staffId": "staff-1",
        "serviceIds": services,
        "bookingDate": date,
        "startTime": start,
    })
}

// Comfortably in the future relative to any test run
const DATE: &str = "2099-06-01";

// ── Health ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

// ── Availability ──

#[tokio::test]
async fn test_availability_lists_slots() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/availability?salonId=salon-1&staffId=staff-1&serviceId=svc-a&date={DATE}"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = read_json(res).await;
    assert_eq!(json["serviceDuration"], 30);
    assert_eq!(json["openingTime"], "09:00");
    assert_eq!(json["closingTime"], "20:00");

    let slots = json["slots"].as_array().unwrap();
    assert_eq!(slots[0]["startTime"], "09:00");
    assert_eq!(slots[0]["endTime"], "09:30");
    assert_eq!(slots[0]["available"], true);
    // Last candidate that still fits before 20:00
    assert_eq!(slots.last().unwrap()["startTime"], "19:30");
}

#[tokio::test]
async fn test_availability_reflects_bookings() {
    let (state, _) = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a"], DATE, "10:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let app = test_app(state);
    let res = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/availability?salonId=salon-1&staffId=staff-1&serviceId=svc-a&date={DATE}"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = read_json(res).await;
    let slot = json["slots"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["startTime"] == "10:00")
        .unwrap();
    assert_eq!(slot["available"], false);
}

#[tokio::test]
async fn test_availability_unknown_service_404() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/availability?salonId=salon-1&staffId=staff-1&serviceId=svc-x&date={DATE}"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_availability_past_date_400() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/availability?salonId=salon-1&staffId=staff-1&serviceId=svc-a&date=2020-01-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// ── Booking creation ──

#[tokio::test]
async fn test_multi_service_booking_created() {
    let (state, events) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a", "svc-b"], DATE, "10:00"),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let json = read_json(res).await;
    assert!(json["groupId"].as_str().unwrap().len() > 10);

    let appts = json["appointments"].as_array().unwrap();
    assert_eq!(appts.len(), 2);
    assert_eq!(appts[0]["startTime"], "10:00");
    assert_eq!(appts[0]["endTime"], "10:30");
    assert_eq!(appts[1]["startTime"], "10:30");
    assert_eq!(appts[1]["endTime"], "11:15");
    assert_eq!(appts[0]["status"], "pending");
    assert_eq!(appts[1]["status"], "pending");

    // Fire-and-forget notification lands shortly after the response
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, BookingEventKind::Created);
    assert_eq!(events[0].service_ids, vec!["svc-a", "svc-b"]);
}

#[tokio::test]
async fn test_overlapping_booking_409() {
    let (state, _) = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a", "svc-b"], DATE, "10:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    // 10:15 overlaps the first service's tail
    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-2", &["svc-a"], DATE, "10:15"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // 11:15 abuts the visit's end and succeeds
    let app = test_app(state);
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-2", &["svc-a"], DATE, "11:15"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_booking_validation_errors() {
    let (state, _) = test_state();

    // Malformed time
    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a"], DATE, "25:99"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // No services
    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &[], DATE, "10:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Unknown staff
    let app = test_app(state);
    let mut body = booking_body("cust-1", &["svc-a"], DATE, "10:00");
    body["staffId"] = serde_json::json!("staff-9");
    let res = app
        .oneshot(json_request("POST", "/bookings", body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── Group cancel ──

#[tokio::test]
async fn test_cancel_group() {
    let (state, events) = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a", "svc-b"], DATE, "10:00"),
        ))
        .await
        .unwrap();
    let json = read_json(res).await;
    let group_id = json["groupId"].as_str().unwrap().to_string();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/bookings/{group_id}/cancel"),
            serde_json::json!({"actorId": "cust-1"}),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = read_json(res).await;
    assert_eq!(json["cancelledCount"], 2);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let kinds: Vec<BookingEventKind> = events.lock().unwrap().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&BookingEventKind::Cancelled));

    // The freed window is bookable again
    let app = test_app(state);
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-2", &["svc-a"], DATE, "10:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_cancel_group_wrong_customer_403() {
    let (state, _) = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a"], DATE, "10:00"),
        ))
        .await
        .unwrap();
    let json = read_json(res).await;
    let group_id = json["groupId"].as_str().unwrap().to_string();

    let app = test_app(state);
    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/bookings/{group_id}/cancel"),
            serde_json::json!({"actorId": "cust-9"}),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cancel_unknown_group_404() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings/no-such-group/cancel",
            serde_json::json!({"actorId": "cust-1", "actorRole": "owner"}),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── Reschedule ──

#[tokio::test]
async fn test_reschedule_group() {
    let (state, _) = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a", "svc-b"], DATE, "10:00"),
        ))
        .await
        .unwrap();
    let json = read_json(res).await;
    let group_id = json["groupId"].as_str().unwrap().to_string();

    let app = test_app(state);
    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/bookings/{group_id}"),
            serde_json::json!({"startTime": "14:00", "actorId": "cust-1"}),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = read_json(res).await;
    assert_ne!(json["groupId"].as_str().unwrap(), group_id);
    let appts = json["appointments"].as_array().unwrap();
    assert_eq!(appts[0]["startTime"], "14:00");
    assert_eq!(appts[1]["startTime"], "14:30");
    assert_eq!(appts[1]["endTime"], "15:15");
}

#[tokio::test]
async fn test_reschedule_into_taken_window_409() {
    let (state, _) = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a"], DATE, "10:00"),
        ))
        .await
        .unwrap();
    let json = read_json(res).await;
    let group_id = json["groupId"].as_str().unwrap().to_string();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-2", &["svc-b"], DATE, "14:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/bookings/{group_id}"),
            serde_json::json!({"startTime": "14:30", "actorId": "cust-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Original rows unchanged
    let app = test_app(state);
    let res = app
        .oneshot(
            Request::builder()
                .uri(format!("/bookings?staffId=staff-1&date={DATE}&status=pending"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = read_json(res).await;
    let times: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["startTime"].as_str().unwrap())
        .collect();
    assert!(times.contains(&"10:00"));
}

// ── Status transitions ──

#[tokio::test]
async fn test_status_transition_and_closure() {
    let (state, _) = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a"], DATE, "10:00"),
        ))
        .await
        .unwrap();
    let json = read_json(res).await;
    let id = json["appointments"][0]["id"].as_str().unwrap().to_string();

    // Owner confirms
    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/bookings/{id}"),
            serde_json::json!({"status": "confirmed"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = read_json(res).await;
    assert_eq!(json["status"], "confirmed");

    // Customer cancels their own appointment
    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/bookings/{id}"),
            serde_json::json!({"status": "cancelled", "actorId": "cust-1", "actorRole": "customer"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Cancelled is terminal
    let app = test_app(state);
    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/bookings/{id}"),
            serde_json::json!({"status": "confirmed"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_customer_cannot_confirm() {
    let (state, _) = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request(
            "POST",
            "/bookings",
            booking_body("cust-1", &["svc-a"], DATE, "10:00"),
        ))
        .await
        .unwrap();
    let json = read_json(res).await;
    let id = json["appointments"][0]["id"].as_str().unwrap().to_string();

    let app = test_app(state);
    let res = app
        .oneshot(json_request(
            "PUT",
            &format!("/bookings/{id}"),
            serde_json::json!({"status": "confirmed", "actorId": "cust-1", "actorRole": "customer"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_without_fields_400() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(json_request(
            "PUT",
            "/bookings/whatever",
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// ── Idempotent retry ──

#[tokio::test]
async fn test_idempotency_key_replay() {
    let (state, _) = test_state();

    let mut body = booking_body("cust-1", &["svc-a"], DATE, "10:00");
    body["idempotencyKey"] = serde_json::json!("req-1");

    let app = test_app(state.clone());
    let res = app
        .oneshot(json_request("POST", "/bookings", body.clone()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let first = read_json(res).await;

    let app = test_app(state);
    let res = app
        .oneshot(json_request("POST", "/bookings", body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let replay = read_json(res).await;

    assert_eq!(first["groupId"], replay["groupId"]);
    assert_eq!(
        first["appointments"][0]["id"],
        replay["appointments"][0]["id"]
    );
}
