use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use trip_dispatch::api::rest::router;
use trip_dispatch::config::Config;
use trip_dispatch::models::identity::{Actor, Role};
use trip_dispatch::state::AppState;

struct Harness {
    state: Arc<AppState>,
    app: axum::Router,
}

impl Harness {
    fn token(&self, id: Uuid, role: Role) -> String {
        self.state
            .auth
            .issue(Actor::new(id, role), Duration::hours(1))
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

fn setup() -> Harness {
    let state = Arc::new(AppState::new(Config::default()));
    Harness {
        app: router(state.clone()),
        state,
    }
}

fn json_request(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn post_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
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

fn trip_body() -> Value {
    json!({
        "start": { "name": "Plateau", "lat": 5.3236, "lng": -4.0199 },
        "destination": { "name": "Cocody", "lat": 5.3599, "lng": -3.9870 },
        "passengers": 2,
        "bags": 1
    })
}

async fn create_order(h: &Harness, client_token: &str) -> String {
    let res = h
        .send(json_request("POST", "/orders", client_token, trip_body()))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let order = body_json(res).await;
    order["id"].as_str().unwrap().to_string()
}

/// Drives an order through claim, start, and complete with one driver.
async fn completed_order(h: &Harness, client_token: &str, driver_token: &str) -> String {
    let id = create_order(h, client_token).await;
    for step in ["accept", "start", "complete"] {
        let res = h
            .send(post_request(&format!("/orders/{id}/{step}"), driver_token))
            .await;
        assert_eq!(res.status(), StatusCode::OK, "step {step}");
    }
    id
}

#[tokio::test]
async fn health_returns_ok() {
    let h = setup();
    let res = h.send(get_request("/health", None)).await;

    assert_eq!(res.status(), StatusCode::OK);

    let body = body_json(res).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["connectedDrivers"], 0);
    assert_eq!(body["trackingTokens"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let h = setup();
    let res = h.send(get_request("/metrics", None)).await;

    assert_eq!(res.status(), StatusCode::OK);

    let content_type = res
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(res).await;
    assert!(body.contains("connected_drivers"));
}

#[tokio::test]
async fn create_order_returns_pending() {
    let h = setup();
    let client = h.token(Uuid::new_v4(), Role::Client);

    let res = h
        .send(json_request("POST", "/orders", &client, trip_body()))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = body_json(res).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["passengers"], 2);
    assert_eq!(body["bags"], 1);
    assert!(body["driverId"].is_null());
    assert!(body["priceEstimate"].as_u64().unwrap() > 300);
}

#[tokio::test]
async fn create_order_rejects_too_many_passengers() {
    let h = setup();
    let client = h.token(Uuid::new_v4(), Role::Client);
    let mut body = trip_body();
    body["passengers"] = json!(4);

    let res = h.send(json_request("POST", "/orders", &client, body)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let h = setup();
    let res = h.send(get_request("/orders/available", None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = h
        .send(get_request("/orders/available", Some("not-a-jwt")))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_role_is_forbidden() {
    let h = setup();
    let driver = h.token(Uuid::new_v4(), Role::Driver);

    let res = h
        .send(json_request("POST", "/orders", &driver, trip_body()))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_order_returns_404() {
    let h = setup();
    let admin = h.token(Uuid::new_v4(), Role::Admin);
    let fake_id = "00000000-0000-0000-0000-000000000000";

    let res = h
        .send(get_request(&format!("/orders/{fake_id}"), Some(&admin)))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn second_claimant_gets_conflict() {
    let h = setup();
    let client = h.token(Uuid::new_v4(), Role::Client);
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let id = create_order(&h, &client).await;

    let res = h
        .send(get_request("/orders/available", Some(&h.token(first, Role::Driver))))
        .await;
    let pending = body_json(res).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let res = h
        .send(post_request(
            &format!("/orders/{id}/accept"),
            &h.token(first, Role::Driver),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["status"], "assigned");
    assert_eq!(body["driverId"], first.to_string());

    let res = h
        .send(post_request(
            &format!("/orders/{id}/accept"),
            &h.token(second, Role::Driver),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = h
        .send(get_request("/orders/available", Some(&h.token(second, Role::Driver))))
        .await;
    let pending = body_json(res).await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn full_trip_flow() {
    let h = setup();
    let client_id = Uuid::new_v4();
    let driver_id = Uuid::new_v4();
    let client = h.token(client_id, Role::Client);
    let driver = h.token(driver_id, Role::Driver);

    let id = create_order(&h, &client).await;

    let res = h
        .send(post_request(&format!("/orders/{id}/start"), &driver))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = h
        .send(post_request(&format!("/orders/{id}/accept"), &driver))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = h
        .send(get_request("/orders/driver/active", Some(&driver)))
        .await;
    let active = body_json(res).await;
    assert_eq!(active["id"], id.as_str());

    let res = h
        .send(post_request(&format!("/orders/{id}/start"), &driver))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "in_progress");

    let res = h
        .send(post_request(&format!("/orders/{id}/complete"), &driver))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let order = body_json(res).await;
    assert_eq!(order["status"], "completed");
    assert!(order["acceptedAt"].is_string());
    assert!(order["startedAt"].is_string());
    assert!(order["completedAt"].is_string());

    let res = h
        .send(json_request(
            "POST",
            &format!("/orders/{id}/finalize"),
            &client,
            json!({ "tip": 500, "paymentMethod": "cash", "receiptRequested": "email" }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let order = body_json(res).await;
    assert_eq!(order["tip"], 500);
    assert_eq!(order["receiptPreference"], "email");
    assert!(order["finalizedAt"].is_string());

    let res = h
        .send(get_request("/orders/driver/stats", Some(&driver)))
        .await;
    let stats = body_json(res).await;
    assert_eq!(stats["dayTrips"], 1);
    assert_eq!(stats["acceptRate"], 100);

    let res = h
        .send(get_request("/orders/client/recent", Some(&client)))
        .await;
    let recent = body_json(res).await;
    assert_eq!(recent.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn tracking_link_follows_order_lifecycle() {
    let h = setup();
    let client = h.token(Uuid::new_v4(), Role::Client);
    let driver = h.token(Uuid::new_v4(), Role::Driver);
    let id = create_order(&h, &client).await;

    let res = h
        .send(post_request(&format!("/orders/{id}/share"), &client))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    h.send(post_request(&format!("/orders/{id}/accept"), &driver))
        .await;

    let res = h
        .send(post_request(&format!("/orders/{id}/share"), &client))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let link = body_json(res).await;
    let token = link["token"].as_str().unwrap().to_string();
    assert!(link["url"].as_str().unwrap().ends_with(&format!("/track/{token}")));

    let res = h
        .send(post_request(&format!("/orders/{id}/share"), &client))
        .await;
    assert_eq!(body_json(res).await["token"], token.as_str());

    let res = h
        .send(get_request(&format!("/share/{token}"), None))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let view = body_json(res).await;
    assert_eq!(view["status"], "assigned");
    assert_eq!(view["redirectTo"], format!("/order-accepted?id={id}"));

    h.send(post_request(&format!("/orders/{id}/start"), &driver))
        .await;
    let res = h
        .send(get_request(&format!("/share/{token}"), None))
        .await;
    assert_eq!(
        body_json(res).await["redirectTo"],
        format!("/trip-in-progress?id={id}")
    );

    h.send(post_request(&format!("/orders/{id}/complete"), &driver))
        .await;
    let res = h
        .send(get_request(&format!("/share/{token}"), None))
        .await;
    assert_eq!(res.status(), StatusCode::GONE);
    assert_eq!(body_json(res).await["expired"], true);

    let res = h.send(get_request("/share/unknown-token", None)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_cancel_is_recorded_and_idempotent() {
    let h = setup();
    let client = h.token(Uuid::new_v4(), Role::Client);
    let admin = h.token(Uuid::new_v4(), Role::Admin);
    let driver = h.token(Uuid::new_v4(), Role::Driver);
    let id = create_order(&h, &client).await;

    let res = h
        .send(json_request(
            "POST",
            &format!("/orders/{id}/cancel"),
            &admin,
            json!({ "reason": "duplicate booking" }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let order = body_json(res).await;
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["cancellation"]["by"], "admin");
    assert_eq!(order["cancellation"]["reason"], "duplicate booking");
    let cancelled_at = order["cancelledAt"].clone();

    let res = h
        .send(post_request(&format!("/orders/{id}/cancel"), &client))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let again = body_json(res).await;
    assert_eq!(again["cancelledAt"], cancelled_at);
    assert_eq!(again["cancellation"]["by"], "admin");

    let res = h
        .send(post_request(&format!("/orders/{id}/accept"), &driver))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = h
        .send(get_request("/orders/admin/cancelled", Some(&admin)))
        .await;
    let cancelled = body_json(res).await;
    assert_eq!(cancelled.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn stranger_cannot_cancel() {
    let h = setup();
    let client = h.token(Uuid::new_v4(), Role::Client);
    let stranger = h.token(Uuid::new_v4(), Role::Client);
    let id = create_order(&h, &client).await;

    let res = h
        .send(post_request(&format!("/orders/{id}/cancel"), &stranger))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ratings_refresh_driver_profile() {
    let h = setup();
    let client = h.token(Uuid::new_v4(), Role::Client);
    let driver_id = Uuid::new_v4();
    let driver = h.token(driver_id, Role::Driver);

    let res = h
        .send(get_request(&format!("/drivers/{driver_id}"), Some(&client)))
        .await;
    assert_eq!(body_json(res).await["rating"], 4.8);

    for rating in [4, 5] {
        let id = completed_order(&h, &client, &driver).await;
        let res = h
            .send(json_request(
                "POST",
                &format!("/orders/{id}/rate"),
                &client,
                json!({ "rating": rating, "review": "smooth ride" }),
            ))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["rating"], rating);
    }

    let mut rating = Value::Null;
    for _ in 0..50 {
        let res = h
            .send(get_request(&format!("/drivers/{driver_id}"), Some(&client)))
            .await;
        rating = body_json(res).await["rating"].clone();
        if rating == json!(4.5) {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
    }
    assert_eq!(rating, json!(4.5));
}

#[tokio::test]
async fn rating_out_of_range_returns_400() {
    let h = setup();
    let client = h.token(Uuid::new_v4(), Role::Client);
    let driver = h.token(Uuid::new_v4(), Role::Driver);
    let id = completed_order(&h, &client, &driver).await;

    for rating in [json!(0), json!(6), json!(4.5)] {
        let res = h
            .send(json_request(
                "POST",
                &format!("/orders/{id}/rate"),
                &client,
                json!({ "rating": rating }),
            ))
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn promo_admin_endpoints() {
    let h = setup();
    let admin = h.token(Uuid::new_v4(), Role::Admin);
    let client = h.token(Uuid::new_v4(), Role::Client);

    let res = h
        .send(json_request(
            "POST",
            "/promos/admin",
            &admin,
            json!({ "code": "welcome", "type": "percent", "value": 10 }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let promo = body_json(res).await;
    assert_eq!(promo["code"], "WELCOME");
    assert_eq!(promo["active"], true);
    let promo_id = promo["id"].as_str().unwrap().to_string();

    let res = h
        .send(json_request(
            "POST",
            "/promos/admin",
            &admin,
            json!({ "code": "WELCOME", "value": 5 }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let mut body = trip_body();
    body["priceEstimate"] = json!(2000);
    body["promoCode"] = json!("welcome");
    let res = h.send(json_request("POST", "/orders", &client, body)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let order = body_json(res).await;
    assert_eq!(order["priceEstimate"], 1800);
    assert_eq!(order["promoCode"], "WELCOME");

    let res = h
        .send(post_request(&format!("/promos/admin/{promo_id}/toggle"), &admin))
        .await;
    assert_eq!(body_json(res).await["active"], false);

    let res = h
        .send(
            Request::builder()
                .method("DELETE")
                .uri(format!("/promos/admin/{promo_id}"))
                .header("authorization", format!("Bearer {admin}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = h.send(get_request("/promos/admin", Some(&admin))).await;
    assert!(body_json(res).await.as_array().unwrap().is_empty());

    let res = h.send(get_request("/promos/admin", Some(&client))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tariff_is_public_and_admin_editable() {
    let h = setup();
    let admin = h.token(Uuid::new_v4(), Role::Admin);

    let res = h.send(get_request("/pricing/public", None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["base"], 300);

    let res = h
        .send(json_request(
            "PUT",
            "/pricing/admin",
            &admin,
            json!({ "base": 500, "peakEnabled": true, "peakMultiplier": 1.2 }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let tariff = body_json(res).await;
    assert_eq!(tariff["base"], 500);
    assert_eq!(tariff["peakEnabled"], true);

    let res = h
        .send(json_request(
            "PUT",
            "/pricing/admin",
            &admin,
            json!({ "peakMultiplier": 0.5 }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

fn stream_request(token: Option<&str>) -> Request<Body> {
    let uri = match token {
        Some(token) => format!("/orders/stream?token={token}"),
        None => "/orders/stream".to_string(),
    };
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn driver_stream_checks_token_before_upgrade() {
    let h = setup();
    let driver_id = Uuid::new_v4();
    let client = h.token(Uuid::new_v4(), Role::Client);
    let expired = h
        .state
        .auth
        .issue(Actor::new(driver_id, Role::Driver), Duration::hours(-1))
        .unwrap();

    let res = h.send(stream_request(None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(res).await["error"].is_string());

    let res = h.send(stream_request(Some(&expired))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = h.send(stream_request(Some(&client))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.state.hub.connected(), 0);

    // Past auth the handshake itself decides; a bare service call cannot upgrade.
    let driver = h.token(driver_id, Role::Driver);
    let res = h.send(stream_request(Some(&driver))).await;
    assert_ne!(res.status(), StatusCode::UNAUTHORIZED);
    assert_ne!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.state.hub.connected(), 0);
}

#[tokio::test]
async fn malformed_input_returns_json_400() {
    let h = setup();
    let client = h.token(Uuid::new_v4(), Role::Client);
    let driver = h.token(Uuid::new_v4(), Role::Driver);

    let mut body = trip_body();
    body["passengers"] = json!("two");
    let res = h.send(json_request("POST", "/orders", &client, body)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());

    let res = h
        .send(get_request("/orders/not-a-uuid", Some(&client)))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());

    let id = completed_order(&h, &client, &driver).await;
    let res = h
        .send(json_request(
            "POST",
            &format!("/orders/{id}/finalize"),
            &client,
            json!({ "tip": -5 }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(res).await["error"].is_string());

    let res = h
        .send(
            Request::builder()
                .method("POST")
                .uri(format!("/orders/{id}/finalize"))
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {client}"))
                .body(Body::from("{\"tip\": "))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let admin = h.token(Uuid::new_v4(), Role::Admin);
    let res = h
        .send(get_request("/orders/admin/list?limit=lots", Some(&admin)))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn driver_presence_and_heartbeat() {
    let h = setup();
    let driver = h.token(Uuid::new_v4(), Role::Driver);
    let client = h.token(Uuid::new_v4(), Role::Client);

    let res = h.send(get_request("/drivers/me/status", Some(&driver))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let status = body_json(res).await;
    assert_eq!(status["online"], false);
    assert!(status["lastSeenAt"].is_null());

    let res = h
        .send(json_request(
            "POST",
            "/drivers/me/status",
            &driver,
            json!({ "online": true }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["online"], true);

    let res = h
        .send(post_request("/drivers/me/heartbeat", &driver))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let beat = body_json(res).await;
    assert_eq!(beat["ok"], true);
    assert!(beat["lastSeenAt"].is_string());

    let res = h
        .send(json_request(
            "POST",
            "/drivers/me/status",
            &driver,
            json!({ "online": false }),
        ))
        .await;
    let status = body_json(res).await;
    assert_eq!(status["online"], false);
    assert!(status["lastSeenAt"].is_string());

    let res = h
        .send(json_request(
            "POST",
            "/drivers/me/status",
            &driver,
            json!({ "online": "yes" }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = h.send(get_request("/drivers/me/status", Some(&client))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn driver_location_is_published() {
    let h = setup();
    let driver_id = Uuid::new_v4();
    let driver = h.token(driver_id, Role::Driver);
    let client = h.token(Uuid::new_v4(), Role::Client);

    let res = h
        .send(get_request(&format!("/drivers/{}/location", Uuid::new_v4()), Some(&client)))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = h
        .send(json_request(
            "POST",
            "/drivers/me/location",
            &driver,
            json!({ "lat": 5.3411, "lon": -4.0280, "acc": 12.5 }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let location = body_json(res).await;
    assert_eq!(location["lat"], 5.3411);
    assert_eq!(location["lng"], -4.028);
    assert_eq!(location["accuracy"], 12.5);

    let res = h
        .send(json_request(
            "POST",
            "/drivers/me/location",
            &driver,
            json!({ "lat": 95.0, "lng": 0.0 }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = h
        .send(get_request(&format!("/drivers/{driver_id}/location"), Some(&client)))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let view = body_json(res).await;
    assert_eq!(view["id"], driver_id.to_string());
    assert_eq!(view["location"]["lat"], 5.3411);
    assert!(view["lastSeenAt"].is_string());
}

#[tokio::test]
async fn admin_sees_payments_for_finalized_trips() {
    let h = setup();
    let admin = h.token(Uuid::new_v4(), Role::Admin);
    let client = h.token(Uuid::new_v4(), Role::Client);
    let driver = h.token(Uuid::new_v4(), Role::Driver);

    create_order(&h, &client).await;
    let id = completed_order(&h, &client, &driver).await;

    let res = h.send(get_request("/orders/admin/payments", Some(&admin))).await;
    assert!(body_json(res).await.as_array().unwrap().is_empty());

    let res = h
        .send(json_request(
            "POST",
            &format!("/orders/{id}/finalize"),
            &client,
            json!({ "tip": 200, "paymentMethod": "card" }),
        ))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = h.send(get_request("/orders/admin/payments", Some(&admin))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let payments = body_json(res).await;
    let payments = payments.as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["orderId"], id.as_str());
    assert_eq!(payments[0]["status"], "success");
    assert_eq!(payments[0]["method"], "card");
    assert_eq!(payments[0]["tip"], 200);
    assert!(payments[0]["paymentId"].as_str().unwrap().starts_with("P-"));

    let res = h.send(get_request("/orders/admin/payments", Some(&client))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}
