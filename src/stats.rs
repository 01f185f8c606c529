//! Meme stat derivation for a scraped roster.
//!
//! Everything here is a pure function of its input: every call rebuilds the
//! snapshot from scratch, so aggregating the same records twice gives the
//! same result.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::model::{
    AggregateSnapshot, DeathTier, DerivedStats, Kda, KdaTier, PlayerProfile, PlayerRecord,
    UNKNOWN_CHAMPION,
};

/// Average-deaths cut-offs for [`DeathTier`], highest first. A value must be
/// strictly greater than a cut-off to land in its tier.
pub const DEATH_TIER_THRESHOLDS: [f64; 4] = [8.0, 6.0, 4.0, 2.0];
/// KDA-ratio cut-offs for [`KdaTier`], highest first, strict like the above.
pub const KDA_TIER_THRESHOLDS: [f64; 4] = [3.0, 2.0, 1.5, 1.0];
/// Floor applied to average deaths when computing the KDA ratio.
pub const MIN_DEATHS_FOR_RATIO: f64 = 0.1;

static WINRATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)%").expect("valid regex"));

/// Build a snapshot from one batch of records.
///
/// Failed records are listed under `players` but get no stats or tiers.
#[instrument(skip_all, fields(records = records.len()))]
pub fn aggregate(records: &[PlayerRecord], generated_at: DateTime<Utc>) -> AggregateSnapshot {
    let mut snapshot = AggregateSnapshot::empty(generated_at);

    for record in records {
        let key = record.identity.summoner_name.clone();
        snapshot.players.insert(key.clone(), record.clone());

        let Some(profile) = record.profile() else {
            warn!(
                summoner = %key,
                error = record.error().unwrap_or_default(),
                "skipping failed player"
            );
            continue;
        };

        let stats = derive_stats(profile);
        debug!(summoner = %key, matches = stats.recent_matches, "derived stats");
        snapshot
            .death_rate_category
            .insert(key.clone(), DeathTier::from_average_deaths(stats.average_deaths));
        snapshot
            .kda_category
            .insert(key.clone(), KdaTier::from_kda_ratio(stats.kda_ratio));
        snapshot.stats.insert(key, stats);
    }

    snapshot
}

/// Compute per-player averages, ratio, winrate and champion variety.
pub fn derive_stats(profile: &PlayerProfile) -> DerivedStats {
    let matches = &profile.recent_matches;
    let textual_winrate = f64::from(parse_winrate_percent(profile.winrate.as_deref()));

    let parsed = matches
        .iter()
        .filter_map(|m| m.parsed_kda().map(|kda| (m, kda)))
        .collect_vec();

    if parsed.is_empty() {
        return DerivedStats {
            winrate: textual_winrate,
            recent_matches: matches.len(),
            ..DerivedStats::default()
        };
    }

    let count = parsed.len() as f64;
    let average = |field: fn(&Kda) -> u32| {
        parsed
            .iter()
            .map(|(_, kda)| f64::from(field(kda)))
            .sum::<f64>()
            / count
    };
    let avg_kills = average(|kda| kda.kills);
    let avg_deaths = average(|kda| kda.deaths);
    let avg_assists = average(|kda| kda.assists);

    let wins = parsed.iter().filter(|(m, _)| m.result.is_win()).count();
    let winrate = if wins > 0 {
        wins as f64 / count * 100.0
    } else {
        textual_winrate
    };

    let champion_variety = matches
        .iter()
        .map(|m| m.champion.as_str())
        .filter(|champion| *champion != UNKNOWN_CHAMPION)
        .unique()
        .count();

    DerivedStats {
        average_deaths: round2(avg_deaths),
        average_kills: round2(avg_kills),
        average_assists: round2(avg_assists),
        kda_ratio: round2((avg_kills + avg_assists) / avg_deaths.max(MIN_DEATHS_FOR_RATIO)),
        winrate: round2(winrate),
        total_games: matches.len(),
        champion_variety,
        recent_matches: matches.len(),
    }
}

/// The digits right before the first `%` in a winrate label, or 0.
pub fn parse_winrate_percent(text: Option<&str>) -> u32 {
    text.and_then(|t| WINRATE_PATTERN.captures(t))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl DeathTier {
    pub fn from_average_deaths(average_deaths: f64) -> DeathTier {
        let [feeder, inter, risky, decent] = DEATH_TIER_THRESHOLDS;
        if average_deaths > feeder {
            DeathTier::ProfessionalFeeder
        } else if average_deaths > inter {
            DeathTier::CasualInter
        } else if average_deaths > risky {
            DeathTier::RiskyPlayer
        } else if average_deaths > decent {
            DeathTier::DecentHuman
        } else {
            DeathTier::KdaPlayer
        }
    }
}

impl KdaTier {
    pub fn from_kda_ratio(kda_ratio: f64) -> KdaTier {
        let [smurf, good, decent, needs_work] = KDA_TIER_THRESHOLDS;
        if kda_ratio > smurf {
            KdaTier::SmurfAlert
        } else if kda_ratio > good {
            KdaTier::ActuallyGood
        } else if kda_ratio > decent {
            KdaTier::DecentPlayer
        } else if kda_ratio > needs_work {
            KdaTier::NeedsImprovement
        } else {
            KdaTier::QuestionableChoices
        }
    }
}
