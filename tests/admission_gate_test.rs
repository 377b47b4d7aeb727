// ============================================================================
// Admission Gate Tests
// ============================================================================
//
// Drives the full router (gate + routes) with an in-memory bucket store,
// a manual clock and an in-memory user directory:
// - Anonymous and user bursts, refill over time
// - Independence of user and origin buckets
// - 429 shape (body, Retry-After)
// - Invalid / expired / unknown credentials degrade to anonymous
// - Fail-open on store failure and timeout
// - Fallback 404, panic 500, invalid policy 500, disabled switch
//
// ============================================================================

use axum::{
    Router,
    http::{StatusCode, header::RETRY_AFTER},
    routing::get,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tollgate_server::{
    auth::AuthManager,
    context::AppContext,
    db::Role,
    routes::extractors::CallerIdentity,
};
use uuid::Uuid;

use test_utils::{
    FailingStore, StalledStore, TEST_SECRET, TestAppBuilder, body_json, request_from,
    request_with_auth,
};

async fn admin_only(CallerIdentity(caller): CallerIdentity) -> StatusCode {
    if caller.is_admin() {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    }
}

async fn explode() -> &'static str {
    panic!("handler bug")
}

fn api() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/admin", get(admin_only))
        .route("/explode", get(explode))
}

#[tokio::test]
async fn test_anonymous_burst_then_429() {
    let app = TestAppBuilder::new().build();

    for i in 0..10 {
        let response = app.send(request_from("203.0.113.7", "/health")).await;
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i + 1);
    }

    let response = app.send(request_from("203.0.113.7", "/health")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "6");

    let body = body_json(response).await;
    assert_eq!(body["error"], "Too many requests per minute");
    assert_eq!(body["error_code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["retry_after_ms"], 6000);
}

#[tokio::test]
async fn test_anonymous_refills_one_token_per_interval() {
    let app = TestAppBuilder::new().build();

    for _ in 0..11 {
        app.send(request_from("203.0.113.7", "/health")).await;
    }

    app.clock.advance(Duration::from_millis(6_000));
    let response = app.send(request_from("203.0.113.7", "/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(request_from("203.0.113.7", "/health")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_full_window_restores_burst() {
    let app = TestAppBuilder::new().build();

    for _ in 0..11 {
        app.send(request_from("203.0.113.7", "/health")).await;
    }

    app.clock.advance(Duration::from_millis(60_000));
    for i in 0..10 {
        let response = app.send(request_from("203.0.113.7", "/health")).await;
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i + 1);
    }
    let response = app.send(request_from("203.0.113.7", "/health")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_origins_have_separate_buckets() {
    let app = TestAppBuilder::new().build();

    for _ in 0..10 {
        app.send(request_from("203.0.113.7", "/health")).await;
    }
    assert_eq!(
        app.send(request_from("203.0.113.7", "/health")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
        app.send(request_from("198.51.100.9", "/health")).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_user_burst_is_larger() {
    let user_id = Uuid::new_v4();
    let app = TestAppBuilder::new().user(user_id, Role::Student).build();
    let auth = format!("Bearer {}", app.token_for(&user_id));

    for i in 0..30 {
        let response = app.send(request_with_auth("203.0.113.7", "/health", &auth)).await;
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i + 1);
    }

    let response = app.send(request_with_auth("203.0.113.7", "/health", &auth)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "2");
}

#[tokio::test]
async fn test_user_and_origin_buckets_are_independent() {
    let user_id = Uuid::new_v4();
    let app = TestAppBuilder::new().user(user_id, Role::Student).build();
    let auth = format!("Bearer {}", app.token_for(&user_id));

    for _ in 0..30 {
        app.send(request_with_auth("203.0.113.7", "/health", &auth)).await;
    }
    assert_eq!(
        app.send(request_with_auth("203.0.113.7", "/health", &auth))
            .await
            .status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // Same machine without the token still has its full anonymous burst
    for i in 0..10 {
        let response = app.send(request_from("203.0.113.7", "/health")).await;
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i + 1);
    }
}

#[tokio::test]
async fn test_user_bucket_follows_user_across_origins() {
    let user_id = Uuid::new_v4();
    let app = TestAppBuilder::new().user(user_id, Role::Student).build();
    let auth = format!("Bearer {}", app.token_for(&user_id));

    for i in 0..30 {
        let ip = format!("10.0.0.{}", i + 1);
        app.send(request_with_auth(&ip, "/health", &auth)).await;
    }
    assert_eq!(
        app.send(request_with_auth("10.0.0.200", "/health", &auth))
            .await
            .status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_bad_credentials_are_charged_to_origin() {
    let known = Uuid::new_v4();
    let app = TestAppBuilder::new().user(known, Role::Admin).build();

    let expired = AuthManager::from_secret(TEST_SECRET, None, -1)
        .unwrap()
        .create_token(&known)
        .unwrap()
        .0;
    let forged = AuthManager::from_secret("someone-else", None, 24)
        .unwrap()
        .create_token(&known)
        .unwrap()
        .0;
    let unknown_user = app.token_for(&Uuid::new_v4());

    let headers = [
        "Bearer not-a-jwt".to_string(),
        format!("Bearer {}", expired),
        format!("Bearer {}", forged),
        format!("Bearer {}", unknown_user),
        format!("Token {}", app.token_for(&known)),
    ];

    for header in &headers {
        let response = app.send(request_with_auth("203.0.113.7", "/whoami", header)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["authenticated"], false, "credential {:?}", header);
        assert_eq!(body["origin"], "203.0.113.7");
    }

    // Five of the ten anonymous tokens are gone
    for _ in 0..5 {
        assert_eq!(
            app.send(request_from("203.0.113.7", "/health")).await.status(),
            StatusCode::OK
        );
    }
    assert_eq!(
        app.send(request_from("203.0.113.7", "/health")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_caller_identity_reaches_handlers() {
    let admin = Uuid::new_v4();
    let student = Uuid::new_v4();
    let app = TestAppBuilder::new()
        .user(admin, Role::Admin)
        .user(student, Role::Student)
        .api(api())
        .build();

    let response = app
        .send(request_with_auth(
            "203.0.113.7",
            "/whoami",
            &format!("Bearer {}", app.token_for(&admin)),
        ))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user_id"], admin.to_string());
    assert_eq!(body["role"], "admin");

    let response = app
        .send(request_with_auth(
            "203.0.113.7",
            "/admin",
            &format!("Bearer {}", app.token_for(&admin)),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(request_with_auth(
            "203.0.113.7",
            "/admin",
            &format!("Bearer {}", app.token_for(&student)),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_store_failure_fails_open() {
    let app = TestAppBuilder::new().store(Arc::new(FailingStore)).build();

    for _ in 0..50 {
        let response = app.send(request_from("203.0.113.7", "/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body = body_json(app.send(request_from("203.0.113.7", "/health")).await).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "down");
}

#[tokio::test(start_paused = true)]
async fn test_store_timeout_fails_open() {
    let app = TestAppBuilder::new().store(Arc::new(StalledStore)).build();

    let response = app.send(request_from("203.0.113.7", "/whoami")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_404_and_still_charged() {
    let app = TestAppBuilder::new().build();

    let response = app.send(request_from("203.0.113.7", "/nope?x=1")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Requested resource /nope?x=1 does not exist");

    for _ in 0..9 {
        app.send(request_from("203.0.113.7", "/nope")).await;
    }
    assert_eq!(
        app.send(request_from("203.0.113.7", "/nope")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_panicking_handler_is_500() {
    let app = TestAppBuilder::new().api(api()).build();

    let response = app.send(request_from("203.0.113.7", "/explode")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Server error.  Please try again later.");
}

#[tokio::test]
async fn test_invalid_policy_is_500_and_never_reaches_handler() {
    let ran = Arc::new(AtomicBool::new(false));
    let handler_ran = ran.clone();
    let api = Router::new().route(
        "/work",
        get(move || {
            let handler_ran = handler_ran.clone();
            async move {
                handler_ran.store(true, Ordering::SeqCst);
                StatusCode::OK
            }
        }),
    );

    let app = TestAppBuilder::new()
        .config(|c| c.rate_limit.anonymous_capacity = 0)
        .api(api)
        .build();

    let response = app.send(request_from("203.0.113.7", "/work")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!ran.load(Ordering::SeqCst));

    let body = body_json(response).await;
    assert_eq!(body["error_code"], "INTERNAL_ERROR");
    assert_eq!(body["error"], "Server error.  Please try again later.");
}

#[tokio::test]
async fn test_disabled_gate_admits_everything_but_still_resolves() {
    let user_id = Uuid::new_v4();
    let app = TestAppBuilder::new()
        .config(|c| c.rate_limit.enabled = false)
        .user(user_id, Role::Instructor)
        .build();

    for _ in 0..25 {
        assert_eq!(
            app.send(request_from("203.0.113.7", "/health")).await.status(),
            StatusCode::OK
        );
    }

    let response = app
        .send(request_with_auth(
            "203.0.113.7",
            "/whoami",
            &format!("Bearer {}", app.token_for(&user_id)),
        ))
        .await;
    let body = body_json(response).await;
    assert_eq!(body["role"], "instructor");
}

#[tokio::test]
async fn test_forwarded_headers_only_when_trusted() {
    let untrusting = TestAppBuilder::new().build();
    let mut request = request_from("10.0.0.1", "/whoami");
    request
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.23".parse().unwrap());
    let body = body_json(untrusting.send(request).await).await;
    assert_eq!(body["origin"], "10.0.0.1");

    let trusting = TestAppBuilder::new()
        .config(|c| c.trust_forwarded_headers = true)
        .build();
    let mut request = request_from("10.0.0.1", "/whoami");
    request
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.23, 10.0.0.1".parse().unwrap());
    let body = body_json(trusting.send(request).await).await;
    assert_eq!(body["origin"], "198.51.100.23");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_burst_admits_exactly_capacity() {
    let app = Arc::new(TestAppBuilder::new().build());

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { app.send(request_from("203.0.113.7", "/health")).await.status() })
        })
        .collect();

    let mut ok = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(ok, 10);
    assert_eq!(limited, 30);
}

#[tokio::test]
async fn test_ipv6_origin() {
    let app = TestAppBuilder::new().build();
    let body = body_json(app.send(request_from("2001:db8::5", "/whoami")).await).await;
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["origin"], "2001:db8::5");
}
