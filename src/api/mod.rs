//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for the Skycast service:
//! - Auth endpoints (register, login, logout, me)
//! - Weather proxy endpoints
//! - Favorites endpoints
//! - Contact-form intake
//! - Public notifications and settings reads
//! - Admin back-office endpoints (users, messages, notifications,
//!   featured cities, settings, stats, monitoring, logs, backup)
//!
//! Routes are grouped by authorization level: public, anonymous-tolerant
//! (optional_auth), session-required (require_auth) and admin
//! (require_auth + require_admin).

pub mod admin;
pub mod auth;
pub mod favorites;
pub mod locations;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod profile;
pub mod settings;
pub mod users;
pub mod weather;

#[cfg(test)]
mod tests;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role, re-checked from the store)
    let admin_routes = Router::new()
        .nest("/users", users::router())
        .nest("/messages", messages::admin_router())
        .nest("/notifications", notifications::admin_router())
        .nest("/locations", locations::admin_router())
        .nest("/settings", settings::admin_router())
        .merge(admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/user", profile::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Anonymous-tolerant routes (session attached when present)
    let optional_routes = Router::new()
        .nest("/auth", auth::optional_router())
        .nest("/favorites", favorites::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/contact", messages::public_router())
        .nest("/notifications", notifications::public_router())
        .nest("/settings", settings::public_router())
        .merge(weather::router())
        .nest("/admin", admin_routes)
        .merge(protected_routes)
        .merge(optional_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // CORS configuration with credentials for cookie-based auth
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
