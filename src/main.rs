use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod models;
mod services;

use config::AppConfig;
use services::anilist::AniListClient;
use services::auth::UpstreamCredentials;
use services::backlog::BacklogClient;
use services::media_resolver::MediaResolver;
use services::rate_limiter::RateLimiter;
use services::schedule::ScheduleBuilder;
use services::schedule_cache::ScheduleCache;

/// Process-wide services shared by every request.
/// Created once at startup; caches and the rate limiter live until exit.
pub struct AppState {
    pub schedule: ScheduleCache,
    pub anilist: Arc<AniListClient>,
}

fn app(state: Arc<AppState>) -> Router {
    // Root handler
    async fn root_handler() -> &'static str {
        "AniList schedule proxy"
    }

    Router::new()
        .route("/", get(root_handler).head(root_handler))
        .route("/health", get(|| async { "OK" }))
        .merge(api::routes())
        .layer(api::cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anilist_schedule_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load();
    config.log_config();

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let limiter = RateLimiter::new(config.rate_limit.policy());
    let credentials = UpstreamCredentials::from_config(http.clone(), &config.upstream);
    tracing::info!("AniList credentials: {}", credentials.describe());

    let anilist = Arc::new(AniListClient::new(
        http.clone(),
        config.upstream.api_url.clone(),
        limiter,
        credentials,
    ));

    let resolver = Arc::new(MediaResolver::new(anilist.clone(), config.cache_ttl()));
    let backlog = Arc::new(BacklogClient::new(
        http,
        config.backlog.url.clone(),
        config.backlog_timeout(),
    ));
    let builder = Arc::new(ScheduleBuilder::new(
        backlog,
        resolver,
        config.schedule.concurrency,
    ));

    let state = Arc::new(AppState {
        schedule: ScheduleCache::new(builder, config.cache_ttl()),
        anilist,
    });

    let app = app(state);

    // Create shutdown signal listener
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
            _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
        }
    };

    let listener = tokio::net::TcpListener::bind((config.bind_address.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.bind_address, config.port))?;
    tracing::info!("AniList proxy listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Full router over a caller-supplied schedule builder and AniList endpoint
#[cfg(test)]
pub(crate) fn test_app(
    builder: Arc<dyn services::schedule::BuildSchedule>,
    anilist_url: &str,
    ttl: std::time::Duration,
) -> Router {
    use services::rate_limiter::RateLimitPolicy;

    let limiter = RateLimiter::new(RateLimitPolicy {
        min_spacing: std::time::Duration::ZERO,
        ..Default::default()
    });
    let anilist = Arc::new(AniListClient::new(
        reqwest::Client::new(),
        anilist_url.to_string(),
        limiter,
        UpstreamCredentials::Anonymous,
    ));

    app(Arc::new(AppState {
        schedule: ScheduleCache::new(builder, ttl),
        anilist,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::send;
    use axum::{body::Body, http::Request, http::StatusCode};

    struct Unused;

    #[async_trait::async_trait]
    impl services::schedule::BuildSchedule for Unused {
        async fn build(&self) -> Result<models::Schedule, services::schedule::ScheduleError> {
            Err(services::schedule::ScheduleError::Aborted)
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(Arc::new(Unused), "http://127.0.0.1:9/", std::time::Duration::ZERO);
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = test_app(Arc::new(Unused), "http://127.0.0.1:9/", std::time::Duration::ZERO);
        let request = Request::get("/nope").body(Body::empty()).unwrap();
        let (response, _) = send(app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
