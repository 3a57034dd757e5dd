//! End-to-end route tests
//!
//! Drives the full router over an in-memory database with a TestServer.
//! The weather provider base URLs point at an unroutable address, so
//! only the parameter-validation paths of the proxy are exercised here;
//! the reshaping logic has its own unit tests in `services::weather`.

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::api::{build_router, middleware::RequestStats, AppState};
use crate::config::WeatherConfig;
use crate::db::repositories::{
    SqlxActivityLogRepository, SqlxFeaturedCityRepository, SqlxMessageRepository,
    SqlxNotificationRepository, SqlxSettingsRepository, SqlxUserRepository, UserRepository,
};
use crate::db::{create_test_pool, migrations};
use crate::models::UserRole;
use crate::services::settings::SettingsService;
use crate::services::stats::StatsService;
use crate::services::token::TokenKeys;
use crate::services::user::UserService;
use crate::services::weather::WeatherService;

async fn test_server() -> (TestServer, SqlitePool) {
    let pool = create_test_pool().await.unwrap();
    migrations::run_migrations(&pool).await.unwrap();

    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let activity_repo = SqlxActivityLogRepository::boxed(pool.clone());
    let message_repo = SqlxMessageRepository::boxed(pool.clone());
    let notification_repo = SqlxNotificationRepository::boxed(pool.clone());
    let featured_repo = SqlxFeaturedCityRepository::boxed(pool.clone());

    let keys = Arc::new(TokenKeys::new("test-secret"));
    let user_service = Arc::new(UserService::new(
        user_repo.clone(),
        activity_repo.clone(),
        keys,
    ));
    let settings_service = Arc::new(SettingsService::from_sqlx(SqlxSettingsRepository::new(
        pool.clone(),
    )));
    let stats_service = Arc::new(StatsService::new(
        user_repo.clone(),
        message_repo.clone(),
        activity_repo.clone(),
    ));
    let weather_service = Arc::new(
        WeatherService::new(WeatherConfig {
            api_key: "test".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            geo_base: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            cache_ttl_secs: 60,
        })
        .unwrap(),
    );

    let state = AppState {
        user_service,
        settings_service,
        stats_service,
        weather_service,
        user_repo,
        message_repo,
        notification_repo,
        featured_repo,
        activity_repo,
        request_stats: Arc::new(RequestStats::new()),
        secure_cookies: false,
    };

    let server = TestServer::new(build_router(state, "http://localhost:3000"));
    (server, pool)
}

fn cookie_token(response: &TestResponse) -> String {
    let cookie = response.header(header::SET_COOKIE);
    cookie
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .strip_prefix("token=")
        .unwrap()
        .to_string()
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

async fn register(server: &TestServer, name: &str, email: &str) {
    let response = server
        .post("/api/auth/register")
        .json(&json!({ "name": name, "email": email, "password": "hunter2!" }))
        .await;
    response.assert_status(StatusCode::CREATED);
}

async fn login(server: &TestServer, email: &str) -> String {
    let response = server
        .post("/api/auth/login")
        .json(&json!({ "email": email, "password": "hunter2!" }))
        .await;
    response.assert_status_ok();
    cookie_token(&response)
}

/// Register, log in, and promote the account to admin through the store.
/// The returned pre-promotion token resolves the fresh role on its next
/// use, so it works against admin routes immediately.
async fn admin_token(server: &TestServer, pool: &SqlitePool, email: &str) -> String {
    register(server, "Admin", email).await;
    let token = login(server, email).await;

    let users = SqlxUserRepository::new(pool.clone());
    let user = users.get_by_email(email).await.unwrap().unwrap();
    users.set_role(user.id, UserRole::Admin).await.unwrap();

    token
}

async fn user_id(pool: &SqlitePool, email: &str) -> i64 {
    SqlxUserRepository::new(pool.clone())
        .get_by_email(email)
        .await
        .unwrap()
        .unwrap()
        .id
}

#[tokio::test]
async fn test_register_login_me_flow() {
    let (server, _pool) = test_server().await;

    register(&server, "Alice", "alice@example.com").await;
    let token = login(&server, "alice@example.com").await;

    let response = server
        .get("/api/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_me_is_anonymous_without_or_with_bad_token() {
    let (server, _pool) = test_server().await;

    let response = server.get("/api/auth/me").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["user"].is_null());

    // Garbage tokens resolve to anonymous, never a 5xx
    let response = server
        .get("/api/auth/me")
        .add_header(header::AUTHORIZATION, bearer("not.a.token"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["user"].is_null());
}

#[tokio::test]
async fn test_expired_token_is_anonymous() {
    let (server, pool) = test_server().await;
    register(&server, "Alice", "alice@example.com").await;

    // Signed with the wrong secret stands in for an expired signature
    let users = SqlxUserRepository::new(pool.clone());
    let user = users.get_by_email("alice@example.com").await.unwrap().unwrap();
    let forged = TokenKeys::new("other-secret").sign(&user).unwrap();

    let response = server
        .get("/api/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&forged))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["user"].is_null());
}

#[tokio::test]
async fn test_login_banned_user_gets_no_cookie() {
    let (server, pool) = test_server().await;
    register(&server, "Banned", "banned@example.com").await;

    let users = SqlxUserRepository::new(pool.clone());
    let user = users.get_by_email("banned@example.com").await.unwrap().unwrap();
    users.set_banned(user.id, true).await.unwrap();

    let response = server
        .post("/api/auth/login")
        .json(&json!({ "email": "banned@example.com", "password": "hunter2!" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert!(response.maybe_header(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (server, _pool) = test_server().await;
    register(&server, "Bob", "bob@example.com").await;

    let wrong = server
        .post("/api/auth/login")
        .json(&json!({ "email": "bob@example.com", "password": "wrong-pass" }))
        .await;
    wrong.assert_status(StatusCode::BAD_REQUEST);

    let unknown = server
        .post("/api/auth/login")
        .json(&json!({ "email": "ghost@example.com", "password": "hunter2!" }))
        .await;
    unknown.assert_status(StatusCode::BAD_REQUEST);

    let wrong: Value = wrong.json();
    let unknown: Value = unknown.json();
    assert_eq!(wrong["error"]["message"], unknown["error"]["message"]);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let (server, _pool) = test_server().await;
    register(&server, "Alice", "alice@example.com").await;
    let token = login(&server, "alice@example.com").await;

    let response = server
        .post("/api/auth/logout")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let cookie = response.header(header::SET_COOKIE);
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_registration_gate() {
    let (server, pool) = test_server().await;

    let settings = SettingsService::from_sqlx(SqlxSettingsRepository::new(pool.clone()));
    settings
        .update(&crate::services::settings::SettingsPatch {
            registration_enabled: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();

    let response = server
        .post("/api/auth/register")
        .json(&json!({ "name": "Late", "email": "late@example.com", "password": "hunter2!" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_email_conflict() {
    let (server, _pool) = test_server().await;
    register(&server, "Alice", "alice@example.com").await;

    let response = server
        .post("/api/auth/register")
        .json(&json!({ "name": "Clone", "email": "alice@example.com", "password": "hunter2!" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_gate_rejects_plain_users_and_anonymous() {
    let (server, _pool) = test_server().await;
    register(&server, "Plain", "plain@example.com").await;
    let token = login(&server, "plain@example.com").await;

    server
        .get("/api/admin/users")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .get("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_promotion_visible_through_original_token() {
    let (server, pool) = test_server().await;
    register(&server, "Alice", "alice@example.com").await;
    let token = login(&server, "alice@example.com").await;

    // Pre-promotion the token is not enough
    server
        .get("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let users = SqlxUserRepository::new(pool.clone());
    let id = user_id(&pool, "alice@example.com").await;
    users.set_role(id, UserRole::Admin).await.unwrap();

    // Same token, next request: the fresh role is read from the store
    let response = server
        .get("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_banned_admin_locked_out_immediately() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;

    server
        .get("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status_ok();

    let users = SqlxUserRepository::new(pool.clone());
    let id = user_id(&pool, "admin@example.com").await;
    users.set_banned(id, true).await.unwrap();

    server
        .get("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_ban_toggle_idempotence() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;
    register(&server, "Target", "target@example.com").await;
    let target = user_id(&pool, "target@example.com").await;

    let response = server
        .put("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": target, "is_banned": true }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["is_banned"], true);

    let response = server
        .put("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": target, "is_banned": false }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["is_banned"], false);
}

#[tokio::test]
async fn test_role_toggle_round_trip() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;
    register(&server, "Target", "target@example.com").await;
    let target = user_id(&pool, "target@example.com").await;

    let response = server
        .patch("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": target, "role": "admin" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["role"], "admin");

    let response = server
        .patch("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": target, "role": "user" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["role"], "user");

    // Unknown roles never reach the store
    server
        .patch("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": target, "role": "superuser" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_self_protection_on_single_user_endpoints() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;
    let self_id = user_id(&pool, "admin@example.com").await;

    server
        .put("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": self_id, "is_banned": true }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .patch("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": self_id, "role": "user" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .delete("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("id", self_id)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // Missing id is a distinct bad request
    server
        .delete("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_missing_user_not_found() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;

    server
        .delete("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("id", 9999)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_delete_excludes_admins_and_self() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;
    let _ = admin_token(&server, &pool, "admin2@example.com").await;
    register(&server, "U1", "u1@example.com").await;
    register(&server, "U2", "u2@example.com").await;

    let ids = vec![
        user_id(&pool, "admin@example.com").await,
        user_id(&pool, "admin2@example.com").await,
        user_id(&pool, "u1@example.com").await,
        user_id(&pool, "u2@example.com").await,
    ];

    let response = server
        .post("/api/admin/users/bulk")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "user_ids": ids, "action": "delete" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["affected"], 2);

    // Unknown actions and empty target lists are rejected
    server
        .post("/api/admin/users/bulk")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "user_ids": [1], "action": "promote" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/api/admin/users/bulk")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "user_ids": [], "action": "ban" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_ban_excludes_self() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;
    register(&server, "U1", "u1@example.com").await;

    let ids = vec![
        user_id(&pool, "admin@example.com").await,
        user_id(&pool, "u1@example.com").await,
    ];

    let response = server
        .post("/api/admin/users/bulk")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "user_ids": ids, "action": "ban" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["affected"], 1);
}

#[tokio::test]
async fn test_stats_growth_series_has_30_points() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;
    register(&server, "U1", "u1@example.com").await;

    let response = server
        .get("/api/admin/stats")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["total_users"], 2);
    assert_eq!(body["admin_users"], 1);
    let growth = body["user_growth"].as_array().unwrap();
    assert_eq!(growth.len(), 30);
    // Both signups land on today, the last point
    assert_eq!(growth[29]["count"], 2);
    assert!(growth[..29].iter().all(|p| p["count"] == 0));
}

#[tokio::test]
async fn test_favorites_flow() {
    let (server, _pool) = test_server().await;

    // Anonymous read is an empty list, not an error
    let response = server.get("/api/favorites").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 0);

    // Anonymous write is rejected with the login prompt
    let response = server
        .post("/api/favorites")
        .json(&json!({ "name": "Lisbon" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "Please login to save favorites");

    register(&server, "Alice", "alice@example.com").await;
    let token = login(&server, "alice@example.com").await;

    server
        .post("/api/favorites")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Lisbon", "country": "PT" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get("/api/favorites")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = response.json();
    assert_eq!(body[0]["name"], "Lisbon");
    assert_eq!(body[0]["country"], "PT");

    server
        .delete("/api/favorites")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("name", "Lisbon")
        .await
        .assert_status_ok();

    let response = server
        .get("/api/favorites")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_contact_intake_and_triage() {
    let (server, pool) = test_server().await;

    server
        .post("/api/contact")
        .json(&json!({ "name": "Visitor", "email": "v@example.com", "message": "Hello" }))
        .await
        .assert_status(StatusCode::CREATED);

    // Missing fields are rejected
    server
        .post("/api/contact")
        .json(&json!({ "name": "", "email": "v@example.com", "message": "Hello" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let token = admin_token(&server, &pool, "admin@example.com").await;

    let response = server
        .get("/api/admin/messages")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let id = body[0]["id"].as_i64().unwrap();
    assert_eq!(body[0]["status"], "new");

    // Replying stamps the admin and flips the status
    let response = server
        .put("/api/admin/messages")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": id, "reply": "Thanks!" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "replied");
    assert_eq!(body["reply"], "Thanks!");
    assert!(body["replied_at"].is_string());

    server
        .delete("/api/admin/messages")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("id", id)
        .await
        .assert_status_ok();

    server
        .delete("/api/admin/messages")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("id", id)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notifications_audience_filtering() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;

    server
        .post("/api/admin/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "title": "For members", "message": "Hi", "audience": "users" }))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/api/admin/notifications")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "title": "For everyone", "message": "Hi", "type": "warning" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get("/api/notifications")
        .add_query_param("audience", "users")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 2);

    let response = server
        .get("/api/notifications")
        .add_query_param("audience", "admins")
        .await;
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "For everyone");
    assert_eq!(body[0]["type"], "warning");

    server
        .get("/api/notifications")
        .add_query_param("audience", "nobody")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_locations_crud_and_popularity() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;

    let response = server
        .post("/api/admin/locations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Lisbon", "country": "PT" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    let id = created["id"].as_i64().unwrap();

    // A saved city shows up in the popularity read
    register(&server, "Fan", "fan@example.com").await;
    let fan = login(&server, "fan@example.com").await;
    server
        .post("/api/favorites")
        .add_header(header::AUTHORIZATION, bearer(&fan))
        .json(&json!({ "name": "Lisbon" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get("/api/admin/locations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["featured"][0]["name"], "Lisbon");
    assert_eq!(body["popular"][0]["name"], "Lisbon");
    assert_eq!(body["popular"][0]["count"], 1);

    let response = server
        .put("/api/admin/locations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": id, "is_active": false, "sort_order": 3 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["is_active"], false);
    assert_eq!(body["sort_order"], 3);

    server
        .delete("/api/admin/locations")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .add_query_param("id", id)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_settings_public_read_and_admin_update() {
    let (server, pool) = test_server().await;

    let response = server.get("/api/settings").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["registration_enabled"], true);
    assert_eq!(body["maintenance_mode"], false);
    assert_eq!(body["announcement"], "");

    let token = admin_token(&server, &pool, "admin@example.com").await;
    let response = server
        .post("/api/admin/settings")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "announcement": "Maintenance on Sunday" }))
        .await;
    response.assert_status_ok();

    let response = server.get("/api/settings").await;
    let body: Value = response.json();
    assert_eq!(body["announcement"], "Maintenance on Sunday");
    assert_eq!(body["registration_enabled"], true);

    // Empty patches are rejected
    server
        .post("/api/admin/settings")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_update() {
    let (server, _pool) = test_server().await;
    register(&server, "Alice", "alice@example.com").await;
    let token = login(&server, "alice@example.com").await;

    let response = server
        .put("/api/user")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "name": "Alice Cooper", "preferences": { "unit": "F" } }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "Alice Cooper");
    assert_eq!(body["preferences"]["unit"], "F");

    server.put("/api/user").await.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_change_applies_on_next_login() {
    let (server, _pool) = test_server().await;
    register(&server, "Alice", "alice@example.com").await;
    let token = login(&server, "alice@example.com").await;

    server
        .put("/api/user")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "password": "new-password-9" }))
        .await
        .assert_status_ok();

    server
        .post("/api/auth/login")
        .json(&json!({ "email": "alice@example.com", "password": "hunter2!" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/api/auth/login")
        .json(&json!({ "email": "alice@example.com", "password": "new-password-9" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_weather_endpoints_validate_params() {
    let (server, _pool) = test_server().await;

    server
        .get("/api/weather")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/api/forecast")
        .add_query_param("lat", 38.7)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // Unreachable provider surfaces as 502, not a hang or a 500
    server
        .get("/api/weather")
        .add_query_param("city", "Lisbon")
        .await
        .assert_status(StatusCode::BAD_GATEWAY);

    // Empty search never touches the provider
    let response = server.get("/api/search").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_admin_logs_records_actions() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;
    register(&server, "Target", "target@example.com").await;
    let target = user_id(&pool, "target@example.com").await;

    server
        .put("/api/admin/users")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "id": target, "is_banned": true }))
        .await
        .assert_status_ok();

    let response = server
        .get("/api/admin/logs")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let entries = body.as_array().unwrap();
    assert!(!entries.is_empty());
    // Newest first: the ban precedes the login entry
    assert_eq!(entries[0]["action"], "ADMIN_ACTION");
    assert!(entries[0]["details"]
        .as_str()
        .unwrap()
        .contains("target@example.com"));
    assert!(entries.iter().any(|e| e["action"] == "LOGIN"));
}

#[tokio::test]
async fn test_users_export_csv() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;

    let response = server
        .get("/api/admin/users/export")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();

    let content_type = response.header(header::CONTENT_TYPE);
    assert!(content_type.to_str().unwrap().starts_with("text/csv"));
    let disposition = response.header(header::CONTENT_DISPOSITION);
    assert!(disposition.to_str().unwrap().contains("attachment"));

    let body = response.text();
    assert!(body.starts_with("Name,Email,Role,Status,Saved Cities,Last Login,Created At"));
    assert!(body.contains("admin@example.com"));
}

#[tokio::test]
async fn test_backup_export() {
    let (server, pool) = test_server().await;
    let token = admin_token(&server, &pool, "admin@example.com").await;

    server
        .post("/api/contact")
        .json(&json!({ "name": "V", "email": "v@example.com", "message": "Hi" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post("/api/admin/backup")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["format_version"], 1);
    assert!(body["exported_at"].is_string());
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert_eq!(body["contact_messages"].as_array().unwrap().len(), 1);
    // Hashes never leave the store
    assert!(!response.text().contains("password_hash"));
}
