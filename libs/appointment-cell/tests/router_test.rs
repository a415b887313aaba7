mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::router::appointment_routes;
use security_cell::{AuditAction, AuditService, MemoryAuditSink};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use common::Harness;

struct TestApp {
    router: Router,
    harness: Harness,
    audit: Arc<MemoryAuditSink>,
    secret: String,
}

impl TestApp {
    async fn new() -> Self {
        let config = TestConfig::default();
        let harness = Harness::new();
        harness.open_slot("2024-01-10", "10:00").await;
        harness.open_slot("2024-01-11", "11:00").await;

        let audit = Arc::new(MemoryAuditSink::new());
        let router = appointment_routes(
            config.to_arc(),
            harness.engine.clone(),
            AuditService::new(audit.clone()),
        );

        Self {
            router,
            harness,
            audit,
            secret: config.jwt_secret,
        }
    }

    fn doctor(&self) -> TestUser {
        TestUser::doctor("doc@example.com").with_id(self.harness.doctor_id)
    }

    async fn call(&self, method: &str, uri: &str, user: &TestUser, body: Option<Value>) -> Response {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", JwtTestUtils::bearer(user, &self.secret));

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn book(&self, patient: &TestUser, date: &str, time: &str) -> Response {
        self.call(
            "POST",
            "/",
            patient,
            Some(json!({
                "doctor_id": self.harness.doctor_id,
                "appointment_date": date,
                "appointment_time": time,
                "reason": "Checkup"
            })),
        )
        .await
    }
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn patient_books_for_self_and_double_booking_conflicts() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("pat@example.com");

    let response = app.book(&patient, "2024-01-10", "10:00").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["patient_id"], patient.id.as_str());
    assert_eq!(created["status"], "scheduled");
    assert_eq!(created["appointment_time"], "10:00");

    let response = app.book(&TestUser::patient("other@example.com"), "2024-01-10", "10:00").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error"],
        "No availability slot found for this date and time"
    );

    let entries = app.audit.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Create);
}

#[tokio::test]
async fn staff_must_name_the_patient() {
    let app = TestApp::new().await;

    let response = app.book(&TestUser::admin("admin@example.com"), "2024-01-10", "10:00").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let patient_id = Uuid::new_v4();
    let response = app
        .call(
            "POST",
            "/",
            &app.doctor(),
            Some(json!({
                "patient_id": patient_id,
                "doctor_id": app.harness.doctor_id,
                "appointment_date": "2024-01-10",
                "appointment_time": "10:00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["patient_id"], json!(patient_id));
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("pat@example.com");

    let response = app
        .call(
            "POST",
            "/",
            &patient,
            Some(json!({ "doctor_id": app.harness.doctor_id, "appointment_date": "10/01/2024", "appointment_time": "10:00" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_participants_see_an_appointment() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("pat@example.com");
    let created = body_json(app.book(&patient, "2024-01-10", "10:00").await).await;
    let uri = format!("/{}", created["id"].as_str().unwrap());

    assert_eq!(app.call("GET", &uri, &patient, None).await.status(), StatusCode::OK);
    assert_eq!(app.call("GET", &uri, &app.doctor(), None).await.status(), StatusCode::OK);
    assert_eq!(app.call("GET", &uri, &TestUser::admin("a@example.com"), None).await.status(), StatusCode::OK);
    assert_eq!(
        app.call("GET", &uri, &TestUser::patient("nosy@example.com"), None).await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.call("GET", &format!("/{}", Uuid::new_v4()), &patient, None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn listing_is_narrowed_to_the_caller() {
    let app = TestApp::new().await;
    let alice = TestUser::patient("alice@example.com");
    let bob = TestUser::patient("bob@example.com");
    app.book(&alice, "2024-01-10", "10:00").await;
    app.book(&bob, "2024-01-11", "11:00").await;

    let mine = body_json(app.call("GET", &format!("/?patient_id={}", bob.id), &alice, None).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["patient_id"], alice.id.as_str());

    let doctors = body_json(app.call("GET", "/", &app.doctor(), None).await).await;
    assert_eq!(doctors.as_array().unwrap().len(), 2);

    let filtered = body_json(
        app.call("GET", &format!("/?patient_id={}", bob.id), &TestUser::admin("a@example.com"), None).await,
    )
    .await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);
    assert_eq!(filtered[0]["patient_id"], bob.id.as_str());
}

#[tokio::test]
async fn reschedule_and_cancel_flow() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("pat@example.com");
    let created = body_json(app.book(&patient, "2024-01-10", "10:00").await).await;
    let id = created["id"].as_str().unwrap().to_string();

    let response = app
        .call(
            "PATCH",
            &format!("/{}/reschedule", id),
            &patient,
            Some(json!({ "new_date_time": "2024-01-11T11:00", "reason": "Work" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let moved = body_json(response).await;
    assert_eq!(moved["appointment_date"], "2024-01-11");
    assert_eq!(moved["appointment_time"], "11:00");
    assert_eq!(app.harness.slot_state("2024-01-10", "10:00").await, (true, None));

    let response = app.call("PATCH", &format!("/{}/cancel", id), &patient, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");

    let response = app
        .call("PATCH", &format!("/{}/cancel", id), &patient, Some(json!({ "reason": "again" })))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "Appointment is already cancelled");

    let actions: Vec<_> = app.audit.entries().await.into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Create, AuditAction::Reschedule, AuditAction::Cancel]);
}

#[tokio::test]
async fn updates_are_for_staff() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("pat@example.com");
    let created = body_json(app.book(&patient, "2024-01-10", "10:00").await).await;
    let uri = format!("/{}", created["id"].as_str().unwrap());

    let response = app.call("PUT", &uri, &patient, Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.call("PUT", &uri, &app.doctor(), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "confirmed");

    let response = app.call("PUT", &uri, &app.doctor(), Some(json!({ "appointment_time": "15:00" }))).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn only_admins_delete() {
    let app = TestApp::new().await;
    let patient = TestUser::patient("pat@example.com");
    let created = body_json(app.book(&patient, "2024-01-10", "10:00").await).await;
    let uri = format!("/{}", created["id"].as_str().unwrap());
    let admin = TestUser::admin("admin@example.com");

    assert_eq!(app.call("DELETE", &uri, &patient, None).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.call("DELETE", &uri, &admin, None).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.call("DELETE", &uri, &admin, None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = TestApp::new().await;

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/")
        .header("authorization", format!("Bearer {}", JwtTestUtils::create_malformed_token()))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
