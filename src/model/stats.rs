use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::PlayerRecord;

/// Per-player aggregate computed from recent matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedStats {
    pub average_deaths: f64,
    pub average_kills: f64,
    pub average_assists: f64,
    pub kda_ratio: f64,
    pub winrate: f64,
    pub total_games: usize,
    pub champion_variety: usize,
    pub recent_matches: usize,
}

/// Death-rate bucket, ordered from most to fewest average deaths.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum_macros::Display,
)]
pub enum DeathTier {
    #[strum(serialize = "Professional Feeder 💀")]
    #[serde(rename = "Professional Feeder 💀")]
    ProfessionalFeeder,
    #[strum(serialize = "Casual Inter 😵")]
    #[serde(rename = "Casual Inter 😵")]
    CasualInter,
    #[strum(serialize = "Risky Player ⚡")]
    #[serde(rename = "Risky Player ⚡")]
    RiskyPlayer,
    #[strum(serialize = "Decent Human 😐")]
    #[serde(rename = "Decent Human 😐")]
    DecentHuman,
    #[strum(serialize = "KDA Player 😎")]
    #[serde(rename = "KDA Player 😎")]
    KdaPlayer,
}

/// KDA-ratio bucket, ordered from best to worst.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum_macros::Display,
)]
pub enum KdaTier {
    #[strum(serialize = "Smurf Alert 🚨")]
    #[serde(rename = "Smurf Alert 🚨")]
    SmurfAlert,
    #[strum(serialize = "Actually Good 👍")]
    #[serde(rename = "Actually Good 👍")]
    ActuallyGood,
    #[strum(serialize = "Decent Player 👌")]
    #[serde(rename = "Decent Player 👌")]
    DecentPlayer,
    #[strum(serialize = "Needs Improvement 📈")]
    #[serde(rename = "Needs Improvement 📈")]
    NeedsImprovement,
    #[strum(serialize = "Questionable Choices 🤔")]
    #[serde(rename = "Questionable Choices 🤔")]
    QuestionableChoices,
}

/// Everything known about the roster at one point in time.
///
/// Keys are summoner names. Every key of `stats`, `death_rate_category` and
/// `kda_category` is also a key of `players`; players whose fetch failed
/// appear only in `players`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub players: BTreeMap<String, PlayerRecord>,
    pub stats: BTreeMap<String, DerivedStats>,
    pub death_rate_category: BTreeMap<String, DeathTier>,
    pub kda_category: BTreeMap<String, KdaTier>,
    pub generated_at: DateTime<Utc>,
}

impl AggregateSnapshot {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            players: BTreeMap::new(),
            stats: BTreeMap::new(),
            death_rate_category: BTreeMap::new(),
            kda_category: BTreeMap::new(),
            generated_at,
        }
    }

    /// Number of players whose fetch succeeded.
    pub fn scraped_count(&self) -> usize {
        self.players.values().filter(|r| !r.is_failed()).count()
    }
}
