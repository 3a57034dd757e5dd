//! Skycast - weather dashboard backend with a companion admin back office

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skycast::{
    api::{self, middleware::RequestStats, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxActivityLogRepository, SqlxFeaturedCityRepository, SqlxMessageRepository,
            SqlxNotificationRepository, SqlxSettingsRepository, SqlxUserRepository,
        },
    },
    services::{
        settings::SettingsService, stats::StatsService, token::TokenKeys, user::UserService,
        weather::WeatherService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skycast=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Skycast backend...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    if config.auth.jwt_secret == "change-this-secret" {
        tracing::warn!("Using the default JWT secret; set SKYCAST_JWT_SECRET in production");
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let activity_repo = SqlxActivityLogRepository::boxed(pool.clone());
    let message_repo = SqlxMessageRepository::boxed(pool.clone());
    let notification_repo = SqlxNotificationRepository::boxed(pool.clone());
    let featured_repo = SqlxFeaturedCityRepository::boxed(pool.clone());
    let settings_repo = SqlxSettingsRepository::new(pool.clone());

    // Initialize services
    let keys = Arc::new(TokenKeys::new(&config.auth.jwt_secret));
    let user_service = Arc::new(UserService::new(
        user_repo.clone(),
        activity_repo.clone(),
        keys,
    ));
    let settings_service = Arc::new(SettingsService::from_sqlx(settings_repo));
    let stats_service = Arc::new(StatsService::new(
        user_repo.clone(),
        message_repo.clone(),
        activity_repo.clone(),
    ));
    let weather_service = Arc::new(WeatherService::new(config.weather.clone())?);
    tracing::info!("Services initialized");

    // Build application state
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
        secure_cookies: config.server.secure_cookies,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
