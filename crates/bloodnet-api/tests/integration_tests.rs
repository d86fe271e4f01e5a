//! # Integration Tests for bloodnet-api
//!
//! Drives the assembled router end to end: health probes, authentication,
//! role gates, the donation fan-out into donor and inventory records, and
//! the emergency-request lifecycle with stock deduction on approval.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use bloodnet_api::state::{AdminBootstrap, AppConfig, AppState, ApprovalStockPolicy};

/// Helper: build the test app with default configuration, in memory.
fn test_app() -> Router {
    bloodnet_api::app(AppState::new())
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Helper: send a request, optionally authenticated and with a JSON body.
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let text = body_string(response).await;
    let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
    (status, value)
}

/// Helper: register an account and return `(token, id)`.
async fn register(app: &Router, role: &str, email: &str, blood_group: Option<&str>) -> (String, String) {
    let mut body = json!({
        "name": format!("Test {role}"),
        "email": email,
        "password": "secret1",
        "phone": "9876543210",
        "role": role,
        "city": "Pune",
        "state": "MH",
    });
    if let Some(group) = blood_group {
        body["bloodGroup"] = json!(group);
    }
    if role == "hospital" {
        body["hospitalName"] = json!("City Care Hospital");
    }
    let (status, value) = send(app, "POST", "/api/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "register {email}: {value}");
    let token = value["data"]["token"].as_str().unwrap().to_string();
    let id = value["data"]["user"]["id"].as_str().unwrap().to_string();
    (token, id)
}

/// Helper: an app with a bootstrapped administrator, and that admin's token.
async fn app_with_admin() -> (Router, String) {
    let config = AppConfig {
        bootstrap_admin: Some(AdminBootstrap {
            email: "root@bloodnet.org".into(),
            password: "changeme".into(),
            name: "Root".into(),
        }),
        ..AppConfig::default()
    };
    let state = AppState::with_config(config, None);
    state.bootstrap_admin().await.unwrap();
    let app = bloodnet_api::app(state);
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "root@bloodnet.org", "password": "changeme" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "admin login: {body}");
    let token = body["data"]["token"].as_str().unwrap().to_string();
    (app, token)
}

fn request_body(group: &str, quantity: u32) -> Value {
    json!({
        "bloodGroup": group,
        "quantity": quantity,
        "urgencyLevel": "critical",
        "location": { "address": "12 FC Road", "city": "Pune", "state": "MH" },
        "patientName": "Ravi Kulkarni",
        "patientPhone": "9123456780",
        "hospital": "City Care Hospital",
        "requiredBy": (Utc::now() + Duration::hours(6)).to_rfc3339(),
    })
}

fn stock_body(group: &str, quantity: u32, days: i64) -> Value {
    json!({
        "bloodGroup": group,
        "quantity": quantity,
        "expiryDate": (Utc::now() + Duration::days(days)).to_rfc3339(),
    })
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let (status, body) = send(&test_app(), "GET", "/health/liveness", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn test_readiness_probe() {
    let (status, body) = send(&test_app(), "GET", "/health/readiness", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ready".into()));
}

#[tokio::test]
async fn test_metrics_count_requests_and_errors() {
    let app = test_app();
    send(&app, "GET", "/health/liveness", None, None).await;
    send(&app, "GET", "/api/auth/me", None, None).await;
    let (status, body) = send(&app, "GET", "/health/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["requests"].as_u64().unwrap() >= 2);
    assert!(body["errors"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_openapi_spec_is_public() {
    let (status, body) = send(&test_app(), "GET", "/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/requests/{id}/status"].is_object());
}

// -- Errors & Authentication --------------------------------------------------

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (status, body) = send(&test_app(), "GET", "/api/nothing-here", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Route /api/nothing-here not found"));
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/inventory", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(&app, "GET", "/api/inventory", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = test_app();
    let (token, id) = register(&app, "donor", "Asha@Example.com", Some("O+")).await;

    let (status, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["id"], json!(id));
    assert_eq!(me["data"]["email"], json!("asha@example.com"));
    assert_eq!(me["data"]["role"], json!("donor"));
    assert_eq!(me["data"]["isAvailable"], json!(true));
    assert!(me["data"].get("passwordHash").is_none());

    let (status, login) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "asha@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(login["data"]["token"].as_str().is_some());

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "asha@example.com", "password": "wrong-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_admin_role() {
    let app = test_app();
    register(&app, "patient", "ravi@example.com", Some("B+")).await;

    let duplicate = json!({
        "name": "Ravi Again",
        "email": "RAVI@example.com",
        "password": "secret1",
        "phone": "9876543210",
        "role": "patient",
        "bloodGroup": "B+",
        "city": "Pune",
        "state": "MH",
    });
    let (status, body) = send(&app, "POST", "/api/auth/register", None, Some(duplicate)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("User already exists with this email"));

    let admin = json!({
        "name": "Sneaky",
        "email": "root@example.com",
        "password": "secret1",
        "phone": "9876543210",
        "role": "admin",
        "city": "Pune",
        "state": "MH",
    });
    let (status, _) = send(&app, "POST", "/api/auth/register", None, Some(admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = test_app();
    let (token, _) = register(&app, "patient", "meera@example.com", Some("A-")).await;
    let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_gates_return_403() {
    let app = test_app();
    let (donor, _) = register(&app, "donor", "gate@example.com", Some("A+")).await;
    let (status, body) = send(&app, "GET", "/api/inventory", Some(&donor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        json!("User role donor is not authorized to access this route")
    );
    let (status, _) = send(&app, "GET", "/api/requests/stats", Some(&donor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_path_id_returns_404() {
    let app = test_app();
    let (hospital, _) = register(&app, "hospital", "care@example.com", None).await;
    let (status, body) = send(&app, "GET", "/api/inventory/not-a-uuid", Some(&hospital), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

// -- Inventory ----------------------------------------------------------------

#[tokio::test]
async fn test_summary_lists_all_eight_groups() {
    let app = test_app();
    let (hospital, _) = register(&app, "hospital", "summary@example.com", None).await;
    let (status, _) = send(&app, "POST", "/api/inventory", Some(&hospital), Some(stock_body("A+", 4, 30))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/api/inventory/summary", Some(&hospital), None).await;
    assert_eq!(status, StatusCode::OK);
    let groups = body["data"].as_array().unwrap();
    assert_eq!(groups.len(), 8);
    let a_pos = groups.iter().find(|g| g["bloodGroup"] == json!("A+")).unwrap();
    assert_eq!(a_pos["totalQuantity"], json!(4));
    assert_eq!(a_pos["itemCount"], json!(1));
    let o_neg = groups.iter().find(|g| g["bloodGroup"] == json!("O-")).unwrap();
    assert_eq!(o_neg["totalQuantity"], json!(0));
}

#[tokio::test]
async fn test_public_search_finds_stock() {
    let app = test_app();
    let (hospital, _) = register(&app, "hospital", "search@example.com", None).await;
    send(&app, "POST", "/api/inventory", Some(&hospital), Some(stock_body("AB-", 3, 10))).await;

    let (status, body) = send(&app, "GET", "/api/inventory/search?bloodGroup=AB-&city=pune", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["hospitals"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/api/inventory/search", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// -- Donations ----------------------------------------------------------------

#[tokio::test]
async fn test_donation_updates_donor_and_inventory() {
    let app = test_app();
    let (hospital, _) = register(&app, "hospital", "bank@example.com", None).await;
    let (donor, donor_id) = register(&app, "donor", "giver@example.com", Some("O+")).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/donations",
        Some(&hospital),
        Some(json!({ "donorId": donor_id, "bloodGroup": "O+" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["donation"]["status"], json!("completed"));
    assert_eq!(body["data"]["donation"]["quantity"], json!(1));
    let item = &body["data"]["inventoryItem"];
    assert_eq!(item["bloodGroup"], json!("O+"));
    assert_eq!(item["quantity"], json!(1));
    assert_eq!(item["source"], json!("donation"));
    let days = item["daysUntilExpiry"].as_i64().unwrap();
    assert!((41..=42).contains(&days), "expiry in {days} days");

    let (_, me) = send(&app, "GET", "/api/auth/me", Some(&donor), None).await;
    assert_eq!(me["data"]["isAvailable"], json!(false));
    assert!(me["data"]["lastDonationDate"].is_string());

    let (_, summary) = send(&app, "GET", "/api/inventory/summary", Some(&hospital), None).await;
    let o_pos = summary["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["bloodGroup"] == json!("O+"))
        .cloned()
        .unwrap();
    assert_eq!(o_pos["totalQuantity"], json!(1));

    // Within 90 days of the last donation the donor is ineligible.
    let (status, _) = send(
        &app,
        "POST",
        "/api/donations",
        Some(&hospital),
        Some(json!({ "donorId": donor_id, "bloodGroup": "O+" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, mine) = send(&app, "GET", "/api/donations/my-donations", Some(&donor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["pagination"]["total"], json!(1));
    assert_eq!(mine["data"][0]["hospital"]["name"], json!("Test hospital"));

    let (status, stats) = send(&app, "GET", "/api/donations/stats", Some(&donor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["data"]["totalDonations"], json!(1));
}

#[tokio::test]
async fn test_donation_for_unknown_donor_is_404() {
    let app = test_app();
    let (hospital, _) = register(&app, "hospital", "ghost@example.com", None).await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/donations",
        Some(&hospital),
        Some(json!({ "donorId": uuid::Uuid::new_v4().to_string(), "bloodGroup": "O+" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Emergency Requests -------------------------------------------------------

#[tokio::test]
async fn test_request_lifecycle_with_stock_deduction() {
    let app = test_app();
    let (hospital, hospital_id) = register(&app, "hospital", "er@example.com", None).await;
    let (patient, _) = register(&app, "patient", "needy@example.com", Some("B+")).await;
    send(&app, "POST", "/api/inventory", Some(&hospital), Some(stock_body("B+", 5, 20))).await;

    let (status, opened) = send(&app, "POST", "/api/requests", Some(&patient), Some(request_body("B+", 3))).await;
    assert_eq!(status, StatusCode::CREATED, "{opened}");
    assert_eq!(opened["data"]["request"]["status"], json!("pending"));
    let matches = opened["data"]["matchingHospitals"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["hospital"]["id"], json!(hospital_id));
    assert_eq!(matches[0]["availableQuantity"], json!(5));
    let request_id = opened["data"]["request"]["id"].as_str().unwrap().to_string();

    let (status, critical) = send(&app, "GET", "/api/requests/critical", Some(&hospital), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(critical["data"].as_array().unwrap().len(), 1);

    let (status, approved) = send(
        &app,
        "PUT",
        &format!("/api/requests/{request_id}/status"),
        Some(&hospital),
        Some(json!({ "status": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    assert_eq!(approved["data"]["status"], json!("approved"));
    assert_eq!(approved["data"]["assignedHospital"], json!(hospital_id));
    assert_eq!(approved["data"]["inventoryDeducted"], json!(true));

    let (_, stock) = send(&app, "GET", "/api/inventory", Some(&hospital), None).await;
    assert_eq!(stock["data"][0]["quantity"], json!(2));

    // approved cannot go back to rejected
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/requests/{request_id}/status"),
        Some(&hospital),
        Some(json!({ "status": "rejected", "rejectionReason": "too late" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, completed) = send(
        &app,
        "PUT",
        &format!("/api/requests/{request_id}/status"),
        Some(&hospital),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(completed["data"]["completedAt"].is_string());

    // completed is terminal
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/requests/{request_id}/status"),
        Some(&hospital),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, mine) = send(&app, "GET", "/api/requests/my-requests", Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"][0]["status"], json!("completed"));
    assert_eq!(mine["data"][0]["transitions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_strict_policy_keeps_request_pending_without_stock() {
    let config = AppConfig {
        approval_stock_policy: ApprovalStockPolicy::Strict,
        ..AppConfig::default()
    };
    let app = bloodnet_api::app(AppState::with_config(config, None));
    let (hospital, _) = register(&app, "hospital", "strict@example.com", None).await;
    let (patient, _) = register(&app, "patient", "waiting@example.com", Some("A+")).await;

    let (_, opened) = send(&app, "POST", "/api/requests", Some(&patient), Some(request_body("A+", 2))).await;
    let request_id = opened["data"]["request"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/requests/{request_id}/status"),
        Some(&hospital),
        Some(json!({ "status": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, current) = send(&app, "GET", &format!("/api/requests/{request_id}"), Some(&patient), None).await;
    assert_eq!(current["data"]["status"], json!("pending"));
}

#[tokio::test]
async fn test_patient_cancels_only_own_pending_request() {
    let app = test_app();
    let (owner, _) = register(&app, "patient", "owner@example.com", Some("O-")).await;
    let (other, _) = register(&app, "patient", "other@example.com", Some("O-")).await;

    let (_, opened) = send(&app, "POST", "/api/requests", Some(&owner), Some(request_body("O-", 1))).await;
    let request_id = opened["data"]["request"]["id"].as_str().unwrap().to_string();
    let cancel = format!("/api/requests/{request_id}/cancel");

    let (status, _) = send(&app, "PUT", &cancel, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", &format!("/api/requests/{request_id}"), Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "PUT", &cancel, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("cancelled"));

    let (status, _) = send(&app, "PUT", &cancel, Some(&owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_with_past_deadline_is_rejected() {
    let app = test_app();
    let (patient, _) = register(&app, "patient", "late@example.com", Some("A+")).await;
    let mut body = request_body("A+", 1);
    body["requiredBy"] = json!((Utc::now() - Duration::hours(1)).to_rfc3339());
    let (status, value) = send(&app, "POST", "/api/requests", Some(&patient), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["success"], json!(false));
}

// -- Inventory Alerts ---------------------------------------------------------

#[tokio::test]
async fn test_low_stock_and_expiry_alerts() {
    let (app, admin) = app_with_admin().await;
    let (hospital, hospital_id) = register(&app, "hospital", "alerts@example.com", None).await;
    let (other, _) = register(&app, "hospital", "elsewhere@example.com", None).await;
    let (donor, _) = register(&app, "donor", "d@example.com", Some("A+")).await;

    send(&app, "POST", "/api/inventory", Some(&hospital), Some(stock_body("A+", 3, 30))).await;
    send(&app, "POST", "/api/inventory", Some(&hospital), Some(stock_body("A+", 20, 3))).await;
    let (_, stale) = send(&app, "POST", "/api/inventory", Some(&hospital), Some(stock_body("B+", 12, 60))).await;
    let stale_id = stale["data"]["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/inventory/{stale_id}"),
        Some(&hospital),
        Some(json!({ "expiryDate": (Utc::now() - Duration::days(1)).to_rfc3339() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Another hospital's batches never show up in these alerts.
    send(&app, "POST", "/api/inventory", Some(&other), Some(stock_body("A+", 1, 2))).await;

    let (status, low) = send(&app, "GET", "/api/inventory/alerts/low-stock", Some(&hospital), None).await;
    assert_eq!(status, StatusCode::OK);
    let low = low["data"].as_array().unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0]["quantity"], json!(3));
    assert_eq!(low[0]["isLowStock"], json!(true));

    let (status, expiring) = send(&app, "GET", "/api/inventory/alerts/expiring", Some(&hospital), None).await;
    assert_eq!(status, StatusCode::OK);
    let soon = &expiring["data"]["expiringSoon"];
    assert_eq!(soon["count"], json!(1));
    assert_eq!(soon["items"][0]["quantity"], json!(20));
    assert_eq!(soon["items"][0]["isExpiringSoon"], json!(true));
    let expired = &expiring["data"]["expired"];
    assert_eq!(expired["count"], json!(1));
    assert_eq!(expired["items"][0]["id"], json!(stale_id));
    assert_eq!(expired["items"][0]["isExpired"], json!(true));

    for uri in ["/api/inventory/alerts/low-stock", "/api/inventory/alerts/expiring"] {
        let (status, _) = send(&app, "GET", uri, Some(&donor), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        let (status, body) = send(&app, "GET", uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["message"], json!("Hospital ID is required"));
    }

    let (status, low) = send(
        &app,
        "GET",
        &format!("/api/inventory/alerts/low-stock?hospitalId={hospital_id}"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(low["data"].as_array().unwrap().len(), 1);
}

// -- Donation Amendments ------------------------------------------------------

#[tokio::test]
async fn test_amending_a_donation_leaves_inventory_alone() {
    let (app, admin) = app_with_admin().await;
    let (hospital, _) = register(&app, "hospital", "bank@example.com", None).await;
    let (other, _) = register(&app, "hospital", "rival@example.com", None).await;
    let (donor, donor_id) = register(&app, "donor", "giver@example.com", Some("O+")).await;

    let (status, recorded) = send(
        &app,
        "POST",
        "/api/donations",
        Some(&hospital),
        Some(json!({ "donorId": donor_id, "bloodGroup": "O+" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{recorded}");
    let donation_id = recorded["data"]["donation"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/donations/{donation_id}");

    let amendment = json!({
        "vitals": { "hemoglobin": 13.5 },
        "notes": "rechecked",
        "status": "rejected",
        "rejectionReason": "low iron",
    });
    let (status, _) = send(&app, "PUT", &uri, Some(&other), Some(amendment.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "PUT", &uri, Some(&donor), Some(amendment.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, amended) = send(&app, "PUT", &uri, Some(&hospital), Some(amendment)).await;
    assert_eq!(status, StatusCode::OK, "{amended}");
    assert_eq!(amended["message"], json!("Donation updated successfully"));
    assert_eq!(amended["data"]["status"], json!("rejected"));
    assert_eq!(amended["data"]["rejectionReason"], json!("low iron"));
    assert_eq!(amended["data"]["notes"], json!("rechecked"));
    assert_eq!(amended["data"]["hemoglobin"], json!(13.5));

    let (status, amended) = send(&app, "PUT", &uri, Some(&admin), Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::OK, "{amended}");
    assert_eq!(amended["data"]["status"], json!("completed"));
    assert_eq!(amended["data"]["hemoglobin"], json!(13.5));

    // Only the original recording created stock.
    let (_, stock) = send(&app, "GET", "/api/inventory", Some(&hospital), None).await;
    assert_eq!(stock["pagination"]["total"], json!(1));
    assert_eq!(stock["data"][0]["quantity"], json!(1));

    let (status, _) = send(&app, "DELETE", &uri, Some(&hospital), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "DELETE", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Pagination ---------------------------------------------------------------

#[tokio::test]
async fn test_unparseable_page_values_fall_back_to_defaults() {
    let app = test_app();
    let (hospital, _) = register(&app, "hospital", "pages@example.com", None).await;
    for days in [10, 20, 30] {
        send(&app, "POST", "/api/inventory", Some(&hospital), Some(stock_body("O-", 6, days))).await;
    }

    let (status, body) = send(&app, "GET", "/api/inventory?page=-2&limit=abc", Some(&hospital), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["pagination"]["page"], json!(1));
    assert_eq!(body["pagination"]["limit"], json!(10));
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, body) = send(&app, "GET", "/api/inventory?page=2abc&limit=2", Some(&hospital), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["page"], json!(2));
    assert_eq!(body["pagination"]["pages"], json!(2));
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}
