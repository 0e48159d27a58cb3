//! End-to-end tests of the HTTP surface against in-memory stores, the
//! sandbox gateway and a frozen clock.

#![allow(clippy::panic)]

use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

use marina_gateway::api;
use marina_gateway::app_state::AppState;
use marina_gateway::domain::{
    BookingStore, Clock, EventBus, FixedClock, InMemoryBookingStore, InMemoryYachtCatalog, Yacht,
    YachtCatalog, YachtId,
};
use marina_gateway::payment::{PaymentGateway, SIGNATURE_HEADER, SandboxGateway, WebhookVerifier};
use marina_gateway::service::{AdmissionController, BookingService, ReconciliationService};

const WEBHOOK_SECRET: &str = "whsec_integration";
const ADMIN_TOKEN: &str = "admin-secret";
// 2024-05-01T00:00:00Z
const NOW: i64 = 1_714_521_600;

struct TestApp {
    router: Router,
    yacht_id: YachtId,
    signer: WebhookVerifier,
    events: EventBus,
}

fn test_app(admin_token: Option<&str>) -> TestApp {
    let yacht = Yacht {
        id: YachtId::new(),
        name: "Aurora".to_string(),
        daily_rate: Decimal::from(500),
        capacity: 8,
    };
    let yacht_id = yacht.id;
    let Some(now) = DateTime::from_timestamp(NOW, 0) else {
        panic!("invalid timestamp");
    };

    let store: Arc<dyn BookingStore> = Arc::new(InMemoryBookingStore::new());
    let catalog: Arc<dyn YachtCatalog> = Arc::new(InMemoryYachtCatalog::with_yachts([yacht]));
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(now));
    let gateway: Arc<dyn PaymentGateway> = Arc::new(SandboxGateway::new());
    let event_bus = EventBus::new(64);

    let admission = Arc::new(AdmissionController::new(
        catalog,
        Arc::clone(&store),
        event_bus.clone(),
        Arc::clone(&clock),
    ));
    let bookings = Arc::new(BookingService::new(store, event_bus.clone(), clock));
    let reconciliation = Arc::new(ReconciliationService::new(
        Arc::clone(&bookings),
        gateway,
        WebhookVerifier::new(WEBHOOK_SECRET, 300),
        "usd",
    ));

    let state = AppState {
        admission,
        bookings,
        reconciliation,
        event_bus: event_bus.clone(),
        admin_token: admin_token.map(Arc::from),
    };

    TestApp {
        router: api::build_router().with_state(state),
        yacht_id,
        signer: WebhookVerifier::new(WEBHOOK_SECRET, 300),
        events: event_bus,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let Ok(response) = app.router.clone().oneshot(request).await else {
        panic!("router failed");
    };
    let status = response.status();
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body read failed");
    };
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        let Ok(value) = serde_json::from_slice(&bytes) else {
            panic!("non-JSON body: {}", String::from_utf8_lossy(&bytes));
        };
        value
    };
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    let Ok(request) = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
    else {
        panic!("invalid request");
    };
    request
}

fn get(uri: &str) -> Request<Body> {
    let Ok(request) = Request::get(uri).body(Body::empty()) else {
        panic!("invalid request");
    };
    request
}

fn with_bearer(uri: &str, token: &str) -> Request<Body> {
    let Ok(request) = Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
    else {
        panic!("invalid request");
    };
    request
}

fn booking_body(app: &TestApp, start: &str, end: &str) -> Value {
    booking_body_paid_by(app, start, end, "card")
}

fn booking_body_paid_by(app: &TestApp, start: &str, end: &str, method: &str) -> Value {
    json!({
        "yacht_id": app.yacht_id,
        "start_date": start,
        "end_date": end,
        "guest_count": 2,
        "payment_method": method,
    })
}

fn string_field<'a>(value: &'a Value, pointer: &str) -> &'a str {
    let Some(field) = value.pointer(pointer).and_then(Value::as_str) else {
        panic!("missing {pointer} in {value}");
    };
    field
}

fn decimal_field(value: &Value, pointer: &str) -> Decimal {
    let raw = match value.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => panic!("missing {pointer} in {value}"),
    };
    let Ok(amount) = Decimal::from_str(&raw) else {
        panic!("not a decimal: {raw}");
    };
    amount
}

fn signed_webhook(app: &TestApp, event_type: &str, intent_id: &str, booking_id: &str) -> Request<Body> {
    let payload = json!({
        "id": format!("evt_{event_type}_{intent_id}"),
        "type": event_type,
        "data": { "object": { "id": intent_id, "metadata": { "booking_id": booking_id } } }
    })
    .to_string();
    let Ok(signature) = app.signer.sign(payload.as_bytes(), NOW) else {
        panic!("signing failed");
    };
    let Ok(request) = Request::post("/api/v1/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(payload))
    else {
        panic!("invalid request");
    };
    request
}

#[tokio::test]
async fn health_is_degraded_until_events_have_a_subscriber() {
    let app = test_app(None);
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(string_field(&body, "/status"), "degraded");
    assert_eq!(body.pointer("/admin_enabled"), Some(&json!(false)));

    let _recorder = app.events.subscribe();
    let (_, body) = send(&app, get("/health")).await;
    assert_eq!(string_field(&body, "/status"), "healthy");
    assert_eq!(body.pointer("/event_subscribers"), Some(&json!(1)));
}

#[tokio::test]
async fn create_booking_returns_created_with_price() {
    let app = test_app(None);
    let (status, body) = send(
        &app,
        post_json("/api/v1/bookings", &booking_body(&app, "2024-07-01", "2024-07-04")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(string_field(&body, "/status"), "pending");
    assert_eq!(string_field(&body, "/payment_status"), "pending");
    assert_eq!(decimal_field(&body, "/pricing/total"), Decimal::from(1650));
}

#[tokio::test]
async fn caller_identity_header_is_recorded() {
    let app = test_app(None);
    let Ok(request) = Request::post("/api/v1/bookings")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user-id", "guest-42")
        .body(Body::from(
            booking_body(&app, "2024-07-01", "2024-07-04").to_string(),
        ))
    else {
        panic!("invalid request");
    };
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(string_field(&body, "/guest_id"), "guest-42");
}

#[tokio::test]
async fn overlapping_request_conflicts_with_details() {
    let app = test_app(None);
    let (status, _) = send(
        &app,
        post_json("/api/v1/bookings", &booking_body(&app, "2024-07-01", "2024-07-04")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        post_json("/api/v1/bookings", &booking_body(&app, "2024-07-03", "2024-07-06")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.pointer("/error/code"), Some(&json!(2003)));
    assert_eq!(
        string_field(&body, "/error/details/conflicts/0/start"),
        "2024-07-01"
    );
    assert_eq!(
        string_field(&body, "/error/details/conflicts/0/end"),
        "2024-07-04"
    );
}

#[tokio::test]
async fn malformed_and_unknown_fields_are_invalid_requests() {
    let app = test_app(None);

    let Ok(garbage) = Request::post("/api/v1/bookings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
    else {
        panic!("invalid request");
    };
    let (status, body) = send(&app, garbage).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.pointer("/error/code"), Some(&json!(1001)));

    let extra = json!({
        "yacht_id": app.yacht_id,
        "start_date": "2024-07-01",
        "end_date": "2024-07-04",
        "guest_count": 2,
        "payment_method": "card",
        "total": "0.01",
    });
    let (status, body) = send(&app, post_json("/api/v1/bookings", &extra)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.pointer("/error/code"), Some(&json!(1001)));

    let (status, body) = send(
        &app,
        post_json("/api/v1/bookings", &booking_body(&app, "2024-07-04", "2024-07-01")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.pointer("/error/code"), Some(&json!(1001)));
}

#[tokio::test]
async fn unknown_booking_and_yacht_are_not_found() {
    let app = test_app(None);
    let (status, body) = send(
        &app,
        get(&format!("/api/v1/bookings/{}", uuid::Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.pointer("/error/code"), Some(&json!(2001)));

    let (status, body) = send(
        &app,
        get(&format!(
            "/api/v1/yachts/{}/availability?start=2024-07-01&end=2024-07-04",
            uuid::Uuid::new_v4()
        )),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.pointer("/error/code"), Some(&json!(2002)));
}

#[tokio::test]
async fn availability_reflects_admitted_bookings() {
    let app = test_app(None);
    let uri = format!(
        "/api/v1/yachts/{}/availability?start=2024-07-02&end=2024-07-03",
        app.yacht_id
    );
    let (_, body) = send(&app, get(&uri)).await;
    assert_eq!(body.pointer("/available"), Some(&json!(true)));

    send(
        &app,
        post_json("/api/v1/bookings", &booking_body(&app, "2024-07-01", "2024-07-04")),
    )
    .await;

    let (status, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.pointer("/available"), Some(&json!(false)));
    assert_eq!(string_field(&body, "/conflicts/0/start"), "2024-07-01");
}

#[tokio::test]
async fn webhook_requires_valid_signature() {
    let app = test_app(None);
    let payload = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_1", "metadata": {} } }
    })
    .to_string();

    let Ok(unsigned) = Request::post("/api/v1/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.clone()))
    else {
        panic!("invalid request");
    };
    let (status, body) = send(&app, unsigned).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.pointer("/error/code"), Some(&json!(1003)));

    let forger = WebhookVerifier::new("whsec_wrong", 300);
    let Ok(forged) = forger.sign(payload.as_bytes(), NOW) else {
        panic!("signing failed");
    };
    let Ok(request) = Request::post("/api/v1/payments/webhook")
        .header(SIGNATURE_HEADER, forged)
        .body(Body::from(payload))
    else {
        panic!("invalid request");
    };
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_for_unknown_booking_is_acknowledged_as_orphaned() {
    let app = test_app(None);
    let request = signed_webhook(
        &app,
        "payment_intent.succeeded",
        "pi_ghost",
        &uuid::Uuid::new_v4().to_string(),
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.pointer("/received"), Some(&json!(true)));
    assert_eq!(string_field(&body, "/outcome"), "orphaned");
}

#[tokio::test]
async fn admin_routes_require_the_bearer_token() {
    let app = test_app(Some(ADMIN_TOKEN));

    let (status, body) = send(&app, get("/api/v1/admin/bookings")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.pointer("/error/code"), Some(&json!(1004)));

    let (status, _) = send(&app, with_bearer("/api/v1/admin/bookings", "nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    send(
        &app,
        post_json("/api/v1/bookings", &booking_body(&app, "2024-07-01", "2024-07-04")),
    )
    .await;
    let (status, body) = send(&app, with_bearer("/api/v1/admin/bookings", ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.pointer("/pagination/total"), Some(&json!(1)));
}

#[tokio::test]
async fn admin_routes_refuse_everything_without_a_configured_token() {
    let app = test_app(None);
    let (status, _) = send(&app, with_bearer("/api/v1/admin/bookings", "anything")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_lifecycle_frees_dates_after_cancel() {
    let app = test_app(None);

    // Booking A, 3 nights at 500 plus a 10% fee.
    let (status, booking) = send(
        &app,
        post_json("/api/v1/bookings", &booking_body(&app, "2024-07-01", "2024-07-04")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal_field(&booking, "/pricing/total"), Decimal::from(1650));
    let booking_id = string_field(&booking, "/id").to_string();

    let (status, intent) = send(
        &app,
        post_json(
            &format!("/api/v1/bookings/{booking_id}/payment-intent"),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent.pointer("/amount_minor"), Some(&json!(165_000)));
    let intent_id = string_field(&intent, "/intent_id").to_string();

    // Gateway reports success.
    let (status, ack) = send(
        &app,
        signed_webhook(&app, "payment_intent.succeeded", &intent_id, &booking_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(string_field(&ack, "/outcome"), "applied");

    let (_, confirmed) = send(&app, get(&format!("/api/v1/bookings/{booking_id}"))).await;
    assert_eq!(string_field(&confirmed, "/status"), "confirmed");
    assert_eq!(string_field(&confirmed, "/payment_status"), "paid");

    // Redelivery changes nothing.
    let (_, ack) = send(
        &app,
        signed_webhook(&app, "payment_intent.succeeded", &intent_id, &booking_id),
    )
    .await;
    assert_eq!(string_field(&ack, "/outcome"), "duplicate");

    // Overlapping request conflicts with A.
    let second = booking_body(&app, "2024-07-03", "2024-07-06");
    let (status, body) = send(&app, post_json("/api/v1/bookings", &second)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        string_field(&body, "/error/details/conflicts/0/start"),
        "2024-07-01"
    );

    // Cancelling A refunds it and frees the dates.
    let (status, cancelled) = send(
        &app,
        post_json(&format!("/api/v1/bookings/{booking_id}/cancel"), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(string_field(&cancelled, "/status"), "cancelled");
    assert_eq!(string_field(&cancelled, "/payment_status"), "refunded");

    let (status, _) = send(&app, post_json("/api/v1/bookings", &second)).await;
    assert_eq!(status, StatusCode::CREATED);

    // A second cancel is a stale view.
    let (status, body) = send(
        &app,
        post_json(&format!("/api/v1/bookings/{booking_id}/cancel"), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.pointer("/error/code"), Some(&json!(2004)));
}

#[tokio::test]
async fn crypto_booking_waits_for_admin_settlement() {
    let app = test_app(Some(ADMIN_TOKEN));
    let body = booking_body_paid_by(&app, "2024-08-01", "2024-08-03", "crypto");
    let (status, booking) = send(&app, post_json("/api/v1/bookings", &body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let booking_id = string_field(&booking, "/id").to_string();

    let (status, claimed) = send(
        &app,
        post_json(
            &format!("/api/v1/bookings/{booking_id}/confirm-payment"),
            &json!({ "reference": "0xabc" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(string_field(&claimed, "/status"), "pending");
    assert_eq!(string_field(&claimed, "/payment_status"), "pending");
    assert_eq!(string_field(&claimed, "/claimed_payment_ref"), "0xabc");

    let Ok(settle) = Request::post(format!("/api/v1/admin/bookings/{booking_id}/settle"))
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::from(json!({ "outcome": "paid" }).to_string()))
    else {
        panic!("invalid request");
    };
    let (status, settled) = send(&app, settle).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(string_field(&settled, "/status"), "confirmed");
    assert_eq!(string_field(&settled, "/external_payment_ref"), "0xabc");
}
