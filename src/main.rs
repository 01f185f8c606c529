use std::net::SocketAddr;
use std::sync::Arc;

use lol_leaderboard::client::build_http_client;
use lol_leaderboard::clock::{Clock, SystemClock};
use lol_leaderboard::config::{load_app_config, load_roster};
use lol_leaderboard::server::{build_app, build_cors, AppState, RateLimiter};
use lol_leaderboard::OpggClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let roster = load_roster(config.roster_path.as_deref())?;
    let client = OpggClient::with_client(build_http_client(config.request_timeout)?, config.region)
        .base_url(config.base_url.clone())
        .request_delay(config.request_delay);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let rate_limit = RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window,
        Arc::clone(&clock),
    );
    let cors_origins = config.cors_origins();
    let state = AppState::new(client, roster, clock, config.cache_ttl);
    let player_count = state.roster.len();
    let app = build_app(state, rate_limit, build_cors(&cors_origins));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        players = player_count,
        region = %config.region,
        cache_minutes = config.cache_ttl.as_secs() / 60,
        cors = ?cors_origins,
        "leaderboard server listening"
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
