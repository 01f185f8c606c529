pub mod cache;
mod payload;
pub mod rate_limit;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::client::OpggClient;
use crate::clock::Clock;
use crate::model::{AggregateSnapshot, PlayerIdentity};
use crate::stats;

pub use cache::{CachedSnapshot, SnapshotCache};
pub use payload::{PlayerSummary, StatsPayload, StatsTable};
pub use rate_limit::RateLimiter;

/// A refresh that produced nothing worth caching.
#[derive(thiserror::Error, Debug)]
pub enum RefreshError {
    #[error("all {failed} player fetches failed")]
    AllPlayersFailed { failed: usize },
}

/// JSON error body with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details: None,
                suggestion: None,
                retry_after: None,
            },
        }
    }

    pub fn details(mut self, details: impl ToString) -> Self {
        self.body.details = Some(details.to_string());
        self
    }

    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.body.suggestion = Some(suggestion.into());
        self
    }

    pub fn retry_after(mut self, seconds: u64) -> Self {
        self.body.retry_after = Some(seconds);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// What [`AppState::fresh_or_refresh`] handed back.
#[derive(Debug)]
pub enum Served {
    Cached(CachedSnapshot),
    Refreshed(Arc<AggregateSnapshot>),
}

#[derive(Clone)]
pub struct AppState {
    pub client: OpggClient,
    pub roster: Arc<[PlayerIdentity]>,
    pub cache: SnapshotCache,
    pub clock: Arc<dyn Clock>,
    pub cache_ttl: Duration,
    pub started_at: DateTime<Utc>,
    refresh_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        client: OpggClient,
        roster: Vec<PlayerIdentity>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            client,
            roster: roster.into(),
            cache: SnapshotCache::new(Arc::clone(&clock)),
            started_at: clock.now(),
            clock,
            cache_ttl,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Scrape the whole roster and replace the cached snapshot.
    ///
    /// Only one refresh runs at a time; later callers wait for the lock.
    pub async fn refresh(&self) -> Result<Arc<AggregateSnapshot>, RefreshError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// The cached snapshot if it is younger than the TTL, otherwise a new one.
    ///
    /// A caller that waited on an in-flight refresh gets that refresh's
    /// snapshot instead of scraping again.
    pub async fn fresh_or_refresh(&self) -> Result<Served, RefreshError> {
        if let Some(cached) = self.cache.get_if_fresh(self.cache_ttl).await {
            return Ok(Served::Cached(cached));
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(cached) = self.cache.get_if_fresh(self.cache_ttl).await {
            return Ok(Served::Cached(cached));
        }
        self.refresh_locked().await.map(Served::Refreshed)
    }

    #[instrument(skip(self), fields(players = self.roster.len()))]
    async fn refresh_locked(&self) -> Result<Arc<AggregateSnapshot>, RefreshError> {
        info!("refreshing leaderboard");
        let records = self.client.scrape_players(&self.roster).await;

        let failed = records.iter().filter(|r| r.is_failed()).count();
        if !records.is_empty() && failed == records.len() {
            warn!(failed, "every player fetch failed, keeping previous snapshot");
            return Err(RefreshError::AllPlayersFailed { failed });
        }

        let snapshot = stats::aggregate(&records, self.clock.now());
        info!(
            scraped = snapshot.scraped_count(),
            failed, "leaderboard refreshed"
        );
        Ok(self.cache.set(snapshot).await)
    }

    pub fn find_player(&self, summoner_name: &str) -> Option<&PlayerIdentity> {
        self.roster
            .iter()
            .find(|p| p.summoner_name.eq_ignore_ascii_case(summoner_name))
    }
}

pub fn build_cors(origins: &[String]) -> CorsLayer {
    let origins = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

fn protected_router(rate_limit: RateLimiter) -> Router<AppState> {
    Router::new()
        .route("/api/scrape-fresh", post(routes::scrape_fresh))
        .route("/api/player/{summoner_name}", get(routes::get_player))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            rate_limit::enforce_rate_limit,
        ))
}

pub fn build_app(state: AppState, rate_limit: RateLimiter, cors: CorsLayer) -> Router {
    let public_routes = Router::new()
        .route("/", get(routes::root))
        .route("/api/test", get(routes::api_test))
        .route("/api/players", get(routes::list_players))
        .route("/api/stats", get(routes::get_stats))
        .route("/health", get(routes::health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{TimeDelta, TimeZone};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::clock::ManualClock;
    use crate::model::Region;

    const PROFILE_PAGE: &str = r#"
        <html><body>
          <div class="summoner-level">412</div>
          <div class="tier">Gold 2</div>
          <div class="winrate">54%</div>
          <div class="game-item win">
            <span class="champion-name">Ahri</span>
            <span class="kda">8/3/11</span>
          </div>
          <div class="game-item lose">
            <span class="champion-name">Zed</span>
            <span class="kda">2/9/4</span>
          </div>
        </body></html>
    "#;

    struct Harness {
        server: MockServer,
        clock: Arc<ManualClock>,
        state: AppState,
    }

    async fn harness() -> Harness {
        let server = MockServer::start().await;
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let client = OpggClient::new(Region::Na)
            .unwrap()
            .base_url(format!("{}/lol/summoners", server.uri()))
            .request_delay(Duration::ZERO);
        let roster = vec![
            PlayerIdentity::new("Pablo-CEO").with_display_name("Raptors for Breakfast"),
            PlayerIdentity::new("Salverz-NA1"),
        ];
        let state = AppState::new(client, roster, clock.clone(), Duration::from_secs(15 * 60));
        Harness {
            server,
            clock,
            state,
        }
    }

    async fn serve_profiles(server: &MockServer, status: u16) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_string(PROFILE_PAGE))
            .mount(server)
            .await;
    }

    fn app(h: &Harness, max_requests: usize) -> Router {
        let limiter = RateLimiter::new(max_requests, Duration::from_secs(60), h.clock.clone());
        build_app(h.state.clone(), limiter, build_cors(&[]))
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&body).expect("json body"))
    }

    #[test]
    fn api_error_serializes_retry_after_in_camel_case() {
        let error = ApiError::new(StatusCode::TOO_MANY_REQUESTS, "slow down").retry_after(60);
        let json = serde_json::to_value(&error.body).unwrap();
        assert_eq!(json["error"], "slow down");
        assert_eq!(json["retryAfter"], 60);
        assert!(json.get("details").is_none());
        assert_eq!(error.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn stats_refreshes_then_serves_cache() {
        let h = harness().await;
        serve_profiles(&h.server, 200).await;

        let (status, json) = call(app(&h, 10), "GET", "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["cached"], false);
        assert_eq!(json["playerCount"], 2);
        assert_eq!(json["players"]["Pablo-CEO"]["display_name"], "Raptors for Breakfast");
        assert_eq!(json["players"]["Pablo-CEO"]["rank"], "Gold 2");
        assert_eq!(json["stats"]["winrate"]["Salverz-NA1"], 50.0);

        h.clock.advance(TimeDelta::minutes(5));
        let (status, json) = call(app(&h, 10), "GET", "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["cached"], true);
        assert_eq!(json["cacheAge"], 5);
        assert_eq!(h.server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stats_fails_when_every_fetch_fails_and_nothing_is_cached() {
        let h = harness().await;
        serve_profiles(&h.server, 500).await;

        let (status, json) = call(app(&h, 10), "GET", "/api/stats").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to fetch stats");
        assert!(json["details"].as_str().unwrap().contains("all 2 player fetches failed"));
    }

    #[tokio::test]
    async fn stats_serves_stale_snapshot_when_refresh_fails() {
        let h = harness().await;
        serve_profiles(&h.server, 200).await;
        call(app(&h, 10), "GET", "/api/stats").await;

        h.server.reset().await;
        serve_profiles(&h.server, 500).await;
        h.clock.advance(TimeDelta::minutes(16));

        let (status, json) = call(app(&h, 10), "GET", "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["cached"], true);
        assert_eq!(json["warning"], "Using stale data due to scraping error");
        assert_eq!(json["players"]["Pablo-CEO"]["level"], "412");
    }

    #[tokio::test]
    async fn partial_failure_still_refreshes() {
        let h = harness().await;
        Mock::given(method("GET"))
            .and(path("/lol/summoners/na/Salverz-NA1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&h.server)
            .await;
        serve_profiles(&h.server, 200).await;

        let snapshot = h.state.refresh().await.unwrap();
        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.scraped_count(), 1);
        assert!(snapshot.stats.contains_key("Pablo-CEO"));
        assert!(!snapshot.stats.contains_key("Salverz-NA1"));
    }

    #[tokio::test]
    async fn scrape_fresh_is_rate_limited() {
        let h = harness().await;
        serve_profiles(&h.server, 200).await;
        let app = app(&h, 1);

        let (status, json) = call(app.clone(), "POST", "/api/scrape-fresh").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Fresh data scraped successfully!");

        let (status, json) = call(app, "POST", "/api/scrape-fresh").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["retryAfter"], 60);
    }

    #[tokio::test]
    async fn player_route_returns_record() {
        let h = harness().await;
        serve_profiles(&h.server, 200).await;

        let (status, json) = call(app(&h, 10), "GET", "/api/player/Pablo-CEO").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["identity"]["display_name"], "Raptors for Breakfast");
        assert_eq!(json["outcome"]["status"], "scraped");
        assert_eq!(json["outcome"]["recent_matches"][0]["champion"], "Ahri");
    }

    #[tokio::test]
    async fn player_route_returns_failed_record_for_unknown_summoner() {
        let h = harness().await;
        serve_profiles(&h.server, 404).await;

        let (status, json) = call(app(&h, 10), "GET", "/api/player/Nobody-NA1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["identity"]["summoner_name"], "Nobody-NA1");
        assert_eq!(json["outcome"]["status"], "failed");
        assert!(json["outcome"]["reason"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn health_and_players_describe_roster() {
        let h = harness().await;
        h.clock.advance(TimeDelta::seconds(90));

        let (status, json) = call(app(&h, 10), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "OK");
        assert_eq!(json["uptime"], 90);
        assert_eq!(json["cacheStatus"], "Empty");
        assert_eq!(json["lastUpdate"], "Never");
        assert_eq!(json["playerCount"], 2);

        let (_, json) = call(app(&h, 10), "GET", "/api/players").await;
        assert_eq!(json["totalPlayers"], 2);
        assert_eq!(json["players"][1]["summoner_name"], "Salverz-NA1");
        assert!(json["lastUpdate"].is_null());
    }
}
