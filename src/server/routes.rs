use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use super::payload::{StatsPayload, SOURCE};
use super::{ApiError, AppState, Served};
use crate::model::{PlayerIdentity, PlayerRecord};

#[derive(Debug, Serialize)]
pub(super) struct Banner {
    message: &'static str,
    version: &'static str,
    status: &'static str,
    endpoints: BTreeMap<&'static str, &'static str>,
}

pub(super) async fn root() -> Json<Banner> {
    Json(Banner {
        message: "🎮 League of Legends Friend Group Leaderboard API",
        version: env!("CARGO_PKG_VERSION"),
        status: "Ready to roast your friends!",
        endpoints: BTreeMap::from([
            ("/api/stats", "Get leaderboard stats (cached)"),
            ("/api/scrape-fresh", "Force fresh scrape (rate limited)"),
            ("/api/players", "Get player list"),
            ("/api/player/{summoner_name}", "Scrape one player (rate limited)"),
            ("/health", "Health check"),
        ]),
    })
}

fn cache_status(last_update: Option<DateTime<Utc>>) -> &'static str {
    if last_update.is_some() {
        "Available"
    } else {
        "Empty"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TestReport {
    message: &'static str,
    timestamp: DateTime<Utc>,
    mode: &'static str,
    friend_count: usize,
    cache_status: &'static str,
}

pub(super) async fn api_test(State(state): State<AppState>) -> Json<TestReport> {
    Json(TestReport {
        message: "🚀 Backend is working!",
        timestamp: state.clock.now(),
        mode: SOURCE,
        friend_count: state.roster.len(),
        cache_status: cache_status(state.cache.last_update().await),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PlayerList {
    players: Vec<PlayerIdentity>,
    total_players: usize,
    last_update: Option<DateTime<Utc>>,
}

pub(super) async fn list_players(State(state): State<AppState>) -> Json<PlayerList> {
    Json(PlayerList {
        players: state.roster.to_vec(),
        total_players: state.roster.len(),
        last_update: state.cache.last_update().await,
    })
}

pub(super) async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<StatsPayload>, ApiError> {
    match state.fresh_or_refresh().await {
        Ok(Served::Cached(cached)) => {
            info!(age_minutes = cached.age_minutes(), "serving cached stats");
            Ok(Json(
                StatsPayload::fresh(&cached.snapshot).cached(cached.age_minutes()),
            ))
        }
        Ok(Served::Refreshed(snapshot)) => {
            let mut payload = StatsPayload::fresh(&snapshot);
            payload.cache_age = Some(0);
            Ok(Json(payload))
        }
        Err(e) => {
            error!(error = %e, "stats refresh failed");
            match state.cache.latest().await {
                Some(stale) => Ok(Json(StatsPayload::fresh(&stale.snapshot).stale(e.to_string()))),
                None => Err(ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to fetch stats",
                )
                .details(e)
                .suggestion("Try again in a few minutes")),
            }
        }
    }
}

pub(super) async fn scrape_fresh(
    State(state): State<AppState>,
) -> Result<Json<StatsPayload>, ApiError> {
    info!("forcing fresh scrape");
    let snapshot = state.refresh().await.map_err(|e| {
        error!(error = %e, "forced scrape failed");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to scrape fresh data",
        )
        .details(e)
    })?;

    Ok(Json(
        StatsPayload::fresh(&snapshot).with_message("Fresh data scraped successfully!"),
    ))
}

/// Scrape a single summoner on demand, bypassing the cache. Roster members
/// keep their display name; anyone else is looked up by summoner name alone.
pub(super) async fn get_player(
    State(state): State<AppState>,
    Path(summoner_name): Path<String>,
) -> Json<PlayerRecord> {
    let identity = state
        .find_player(&summoner_name)
        .cloned()
        .unwrap_or_else(|| PlayerIdentity::new(summoner_name));
    info!(summoner = %identity.summoner_name, "fetching single player");
    Json(state.client.scrape_player(&identity).await)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Health {
    status: &'static str,
    timestamp: DateTime<Utc>,
    /// Seconds since the server started.
    uptime: i64,
    cache_status: &'static str,
    last_update: String,
    player_count: usize,
}

pub(super) async fn health(State(state): State<AppState>) -> Json<Health> {
    let now = state.clock.now();
    let last_update = state.cache.last_update().await;
    Json(Health {
        status: "OK",
        timestamp: now,
        uptime: (now - state.started_at).num_seconds(),
        cache_status: cache_status(last_update),
        last_update: last_update.map_or_else(|| "Never".to_string(), |at| at.to_rfc3339()),
        player_count: state.roster.len(),
    })
}
