// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! HTTP-level tests: status codes, CORS headers, and the management API.

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use formgate::{
    config::Config,
    db::Database,
    handlers::{router, AppState},
    intake::SubmissionPipeline,
    limiter::{MemoryStore, RateLimiter},
    metrics::Metrics,
    models::{Form, Session, User},
    origin::OriginPolicy,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

async fn setup() -> (Arc<AppState>, Router) {
    let config = Config::default();
    let db = Database::connect("memory").await.expect("in-memory store");
    let limiter = RateLimiter::new(Arc::new(MemoryStore::new()), config.rate_limit.clone());
    let origins = OriginPolicy::new(config.origins.trusted_suffixes.clone());
    let metrics = Metrics::new();
    let pipeline = SubmissionPipeline::new(db.clone(), limiter, origins.clone(), None, metrics.clone());

    let state = Arc::new(AppState {
        db,
        pipeline,
        origins,
        metrics,
        config,
    });
    let app = router(state.clone());
    (state, app)
}

async fn seed_user(state: &AppState, user_id: &str, email: &str, token: &str) {
    state
        .db
        .insert_user(&User {
            user_id: user_id.to_string(),
            email: email.to_string(),
            name: None,
        })
        .await
        .expect("seed user");
    state
        .db
        .insert_session(&Session {
            token: token.to_string(),
            user_id: user_id.to_string(),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        })
        .await
        .expect("seed session");
}

async fn seed_form(state: &AppState, owner_id: &str, active: bool, allowed: &[&str]) -> Form {
    let mut form = Form::new(owner_id.to_string(), "Contact".to_string(), None);
    form.is_active = active;
    form.allowed_origins = allowed.iter().map(|s| s.to_string()).collect();
    state.db.create_form(&form).await.expect("seed form")
}

fn submit_request(form_id: &str, ip: &str, origin: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/submit/{form_id}"))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip);
    if let Some(origin) = origin {
        builder = builder.header(header::ORIGIN, origin);
    }
    let mut request = builder.body(Body::from(body.to_string())).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo::<SocketAddr>("127.0.0.1:9999".parse().unwrap()));
    request
}

fn authed(request: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    request.header(header::AUTHORIZATION, format!("Bearer {token}"))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_the_service() {
    let (_state, app) = setup().await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["service"], "formgate");
}

#[tokio::test]
async fn preflight_is_204_and_wildcard_for_open_forms() {
    let (state, app) = setup().await;
    let form = seed_form(&state, "user-1", true, &[]).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri(format!("/submit/{}", form.form_id))
                .header(header::ORIGIN, "https://anywhere.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap(),
        "POST, OPTIONS"
    );
}

#[tokio::test]
async fn preflight_reflects_an_allow_listed_origin() {
    let (state, app) = setup().await;
    let form = seed_form(&state, "user-1", true, &["https://Example.com/"]).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri(format!("/submit/{}", form.form_id))
                .header(header::ORIGIN, "https://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://example.com"
    );
}

#[tokio::test]
async fn json_submit_returns_200_with_wildcard_cors() {
    let (state, app) = setup().await;
    let form = seed_form(&state, "user-1", true, &[]).await;

    let response = app
        .oneshot(submit_request(
            &form.form_id,
            "203.0.113.10",
            None,
            r#"{"email":"a@b.com","message":"hi"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
    assert_eq!(state.db.count_submissions(&form.form_id).await.unwrap(), 1);
}

#[tokio::test]
async fn rejected_origin_is_403_with_permissive_cors() {
    let (state, app) = setup().await;
    let form = seed_form(&state, "user-1", true, &["https://example.com"]).await;

    let response = app
        .oneshot(submit_request(
            &form.form_id,
            "203.0.113.11",
            Some("https://evil.com"),
            r#"{"email":"a@b.com"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    // the error path still carries a permissive header so browsers can
    // surface the body instead of a generic network failure
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
    assert_eq!(state.db.count_submissions(&form.form_id).await.unwrap(), 0);
}

#[tokio::test]
async fn missing_and_inactive_forms_answer_identically() {
    let (state, app) = setup().await;
    let inactive = seed_form(&state, "user-1", false, &[]).await;

    let missing = app
        .clone()
        .oneshot(submit_request("no-such-form", "203.0.113.12", None, "{}"))
        .await
        .unwrap();
    let disabled = app
        .oneshot(submit_request(&inactive.form_id, "203.0.113.13", None, "{}"))
        .await
        .unwrap();

    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(disabled.status(), StatusCode::NOT_FOUND);

    let missing_body = to_bytes(missing.into_body(), usize::MAX).await.unwrap();
    let disabled_body = to_bytes(disabled.into_body(), usize::MAX).await.unwrap();
    assert_eq!(missing_body, disabled_body);
}

#[tokio::test]
async fn sixth_rapid_post_is_429_with_retry_after() {
    let (state, app) = setup().await;
    let form = seed_form(&state, "user-1", true, &[]).await;

    for i in 0..5 {
        let response = app
            .clone()
            .oneshot(submit_request(&form.form_id, "198.51.100.30", None, "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
    }

    let response = app
        .oneshot(submit_request(&form.form_id, "198.51.100.30", None, "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("Retry-After header");
    assert!(retry_after <= 60);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
    assert_eq!(state.db.count_submissions(&form.form_id).await.unwrap(), 5);
}

#[tokio::test]
async fn management_routes_require_a_session() {
    let (_state, app) = setup().await;
    let response = app
        .oneshot(Request::get("/forms").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_sessions_are_rejected() {
    let (state, app) = setup().await;
    state
        .db
        .insert_user(&User {
            user_id: "user-1".into(),
            email: "owner@example.com".into(),
            name: None,
        })
        .await
        .unwrap();
    state
        .db
        .insert_session(&Session {
            token: "stale".into(),
            user_id: "user-1".into(),
            expires_at: Utc::now() - ChronoDuration::minutes(1),
        })
        .await
        .unwrap();

    let response = app
        .oneshot(
            authed(Request::get("/forms"), "stale")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn form_crud_roundtrip() {
    let (state, app) = setup().await;
    seed_user(&state, "user-1", "owner@example.com", "tok").await;

    // create
    let response = app
        .clone()
        .oneshot(
            authed(Request::post("/forms"), "tok")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"name": "Contact", "description": "front page"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let form_id = created["form_id"].as_str().unwrap().to_string();
    assert_eq!(created["is_active"], true);
    assert_eq!(created["settings"]["email_notifications"], true);

    // list
    let response = app
        .clone()
        .oneshot(authed(Request::get("/forms"), "tok").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    // patch
    let response = app
        .clone()
        .oneshot(
            authed(Request::patch(format!("/forms/{form_id}")), "tok")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "is_active": false,
                        "allowed_origins": ["https://example.com"],
                        "settings": {"email_notifications": false}
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let patched = body_json(response).await;
    assert_eq!(patched["is_active"], false);
    assert_eq!(patched["allowed_origins"][0], "https://example.com");
    assert_eq!(patched["settings"]["email_notifications"], false);
    // description untouched by the patch
    assert_eq!(patched["description"], "front page");

    // delete
    let response = app
        .clone()
        .oneshot(
            authed(Request::delete(format!("/forms/{form_id}")), "tok")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // gone
    let response = app
        .oneshot(
            authed(Request::get(format!("/forms/{form_id}")), "tok")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn someone_elses_form_reads_as_not_found() {
    let (state, app) = setup().await;
    seed_user(&state, "user-1", "owner@example.com", "tok-1").await;
    seed_user(&state, "user-2", "other@example.com", "tok-2").await;
    let form = seed_form(&state, "user-1", true, &[]).await;

    let response = app
        .oneshot(
            authed(Request::get(format!("/forms/{}", form.form_id)), "tok-2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transfer_validations_and_happy_path() {
    let (state, app) = setup().await;
    seed_user(&state, "user-1", "owner@example.com", "tok-1").await;
    seed_user(&state, "user-2", "other@example.com", "tok-2").await;
    let form = seed_form(&state, "user-1", true, &[]).await;
    let transfer_uri = format!("/forms/{}/transfer", form.form_id);

    // missing email
    let response = app
        .clone()
        .oneshot(
            authed(Request::post(transfer_uri.as_str()), "tok-1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // self-transfer
    let response = app
        .clone()
        .oneshot(
            authed(Request::post(transfer_uri.as_str()), "tok-1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"email": "owner@example.com"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // unknown target
    let response = app
        .clone()
        .oneshot(
            authed(Request::post(transfer_uri.as_str()), "tok-1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"email": "nobody@example.com"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // happy path
    let response = app
        .clone()
        .oneshot(
            authed(Request::post(transfer_uri.as_str()), "tok-1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"email": "other@example.com"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["new_owner"], "other@example.com");

    // the old owner no longer sees it, the new owner does
    let response = app
        .clone()
        .oneshot(
            authed(Request::get(format!("/forms/{}", form.form_id)), "tok-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(
            authed(Request::get(format!("/forms/{}", form.form_id)), "tok-2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn submissions_can_be_listed_and_exported_as_csv() {
    let (state, app) = setup().await;
    seed_user(&state, "user-1", "owner@example.com", "tok").await;
    let form = seed_form(&state, "user-1", true, &[]).await;

    for (ip, body) in [
        ("203.0.113.20", r#"{"email":"a@b.com","message":"hi"}"#),
        ("203.0.113.21", r#"{"email":"c@d.com","rating":"5"}"#),
    ] {
        let response = app
            .clone()
            .oneshot(submit_request(&form.form_id, ip, None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // list
    let response = app
        .clone()
        .oneshot(
            authed(
                Request::get(format!("/forms/{}/submissions", form.form_id)),
                "tok",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["submissions"].as_array().unwrap().len(), 2);

    // export
    let response = app
        .oneshot(
            authed(
                Request::get(format!("/forms/{}/submissions/export", form.form_id)),
                "tok",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv"
    );
    let csv = String::from_utf8(
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec(),
    )
    .unwrap();
    // column union across both rows
    assert_eq!(csv.lines().next().unwrap(), "submitted_at,email,message,rating");
    assert!(csv.contains("a@b.com"));
    assert!(csv.contains("c@d.com"));
    assert_eq!(csv.lines().count(), 3);
}
