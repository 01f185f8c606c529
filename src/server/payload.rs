use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{AggregateSnapshot, DeathTier, DerivedStats, KdaTier, PlayerRecord};
use crate::stats::parse_winrate_percent;

pub const SOURCE: &str = "OP.GG Scraping";

/// Leaderboard row shown for each successfully scraped player.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    pub display_name: String,
    pub summoner_name: String,
    pub rank: String,
    pub level: String,
    pub winrate: u32,
}

/// One identity→value map per metric, the layout the dashboard sorts on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsTable {
    pub average_deaths: BTreeMap<String, f64>,
    pub average_kills: BTreeMap<String, f64>,
    pub average_assists: BTreeMap<String, f64>,
    pub kda_ratio: BTreeMap<String, f64>,
    pub winrate: BTreeMap<String, f64>,
    pub champion_variety: BTreeMap<String, usize>,
    pub total_games: BTreeMap<String, usize>,
    pub death_rate_category: BTreeMap<String, DeathTier>,
    pub kda_category: BTreeMap<String, KdaTier>,
}

impl StatsTable {
    fn from_snapshot(snapshot: &AggregateSnapshot) -> Self {
        let column = |pick: fn(&DerivedStats) -> f64| {
            snapshot
                .stats
                .iter()
                .map(|(name, stats)| (name.clone(), pick(stats)))
                .collect()
        };
        let count = |pick: fn(&DerivedStats) -> usize| {
            snapshot
                .stats
                .iter()
                .map(|(name, stats)| (name.clone(), pick(stats)))
                .collect()
        };

        Self {
            average_deaths: column(|s| s.average_deaths),
            average_kills: column(|s| s.average_kills),
            average_assists: column(|s| s.average_assists),
            kda_ratio: column(|s| s.kda_ratio),
            winrate: column(|s| s.winrate),
            champion_variety: count(|s| s.champion_variety),
            total_games: count(|s| s.total_games),
            death_rate_category: snapshot.death_rate_category.clone(),
            kda_category: snapshot.kda_category.clone(),
        }
    }
}

/// Body of `/api/stats` and `/api/scrape-fresh`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPayload {
    pub players: BTreeMap<String, PlayerSummary>,
    pub stats: StatsTable,
    pub raw_data: Vec<PlayerRecord>,
    pub last_update: DateTime<Utc>,
    pub source: &'static str,
    pub player_count: usize,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatsPayload {
    /// A payload for a snapshot that was just scraped.
    pub fn fresh(snapshot: &AggregateSnapshot) -> Self {
        let players: BTreeMap<_, _> = snapshot
            .players
            .iter()
            .filter(|(_, record)| !record.is_failed())
            .map(|(name, record)| (name.clone(), summarize(record)))
            .collect();

        Self {
            player_count: players.len(),
            players,
            stats: StatsTable::from_snapshot(snapshot),
            raw_data: snapshot.players.values().cloned().collect(),
            last_update: snapshot.generated_at,
            source: SOURCE,
            cached: false,
            cache_age: None,
            warning: None,
            error: None,
            message: None,
        }
    }

    /// Mark as served from the cache, `age_minutes` old.
    pub fn cached(mut self, age_minutes: i64) -> Self {
        self.cached = true;
        self.cache_age = Some(age_minutes);
        self
    }

    /// Mark as an old snapshot served because a refresh failed.
    pub fn stale(mut self, error: impl Into<String>) -> Self {
        self.cached = true;
        self.warning = Some("Using stale data due to scraping error".to_string());
        self.error = Some(error.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

fn summarize(record: &PlayerRecord) -> PlayerSummary {
    PlayerSummary {
        display_name: record.identity.label().to_string(),
        summoner_name: record.identity.summoner_name.clone(),
        rank: record.rank().to_string(),
        level: record.level().to_string(),
        winrate: parse_winrate_percent(Some(record.winrate())),
    }
}
