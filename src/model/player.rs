use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Champion name used when a match was recovered without one.
pub const UNKNOWN_CHAMPION: &str = "Unknown";
/// Displayed when no level could be located on the page.
pub const UNKNOWN_LEVEL: &str = "Unknown";
/// Displayed when no rank could be located on the page.
pub const UNRANKED: &str = "Unranked";
/// Displayed when no winrate could be located on the page.
pub const NO_WINRATE: &str = "0%";
/// Displayed in place of level and rank when the fetch failed.
pub const ERROR_FIELD: &str = "Error";

static KDA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)/([0-9]+)/([0-9]+)").expect("valid regex"));

/// A tracked summoner, as listed in the roster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub summoner_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl PlayerIdentity {
    pub fn new(summoner_name: impl Into<String>) -> Self {
        Self {
            summoner_name: summoner_name.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// The display name, or the summoner name when none was configured.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.summoner_name)
    }
}

/// Kills, deaths and assists for a single match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Kda {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
}

impl Kda {
    /// Parse the first `kills/deaths/assists` triple found in `text`.
    pub fn parse(text: &str) -> Option<Kda> {
        Self::scan(text).next().map(|(kda, _)| kda)
    }

    /// Iterate every non-overlapping `kills/deaths/assists` triple in `text`,
    /// yielding the parsed value together with the matched slice.
    pub fn scan(text: &str) -> impl Iterator<Item = (Kda, &str)> + '_ {
        KDA_PATTERN.captures_iter(text).filter_map(|caps| {
            let kda = Kda {
                kills: caps[1].parse().ok()?,
                deaths: caps[2].parse().ok()?,
                assists: caps[3].parse().ok()?,
            };
            Some((kda, caps.get(0)?.as_str()))
        })
    }
}

impl fmt::Display for Kda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kills, self.deaths, self.assists)
    }
}

/// Result of a single match as shown on the profile page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum MatchOutcome {
    Victory,
    Defeat,
    #[default]
    Unknown,
}

impl MatchOutcome {
    /// Classify a free-form result label such as `"Victory"`, `"WIN"` or `"Lose"`.
    pub fn from_label(label: &str) -> MatchOutcome {
        let label = label.to_lowercase();
        if label.contains("victory") || label.contains("win") {
            MatchOutcome::Victory
        } else if label.contains("defeat") || label.contains("lose") || label.contains("loss") {
            MatchOutcome::Defeat
        } else {
            MatchOutcome::Unknown
        }
    }

    pub fn is_win(self) -> bool {
        self == MatchOutcome::Victory
    }
}

/// One parsed entry from a player's match history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub champion: String,
    pub kda: String,
    pub result: MatchOutcome,
    /// Approximate only: derived from the capture time and the item position.
    pub timestamp: DateTime<Utc>,
}

impl MatchRecord {
    pub fn parsed_kda(&self) -> Option<Kda> {
        Kda::parse(&self.kda)
    }
}

/// Fields extracted from a profile page that was fetched successfully.
///
/// `None` means no locator produced a value; the `*_or_default` accessors
/// substitute the display placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerProfile {
    pub level: Option<String>,
    pub rank: Option<String>,
    pub winrate: Option<String>,
    pub recent_matches: Vec<MatchRecord>,
}

impl PlayerProfile {
    pub fn level_or_default(&self) -> &str {
        self.level.as_deref().unwrap_or(UNKNOWN_LEVEL)
    }

    pub fn rank_or_default(&self) -> &str {
        self.rank.as_deref().unwrap_or(UNRANKED)
    }

    pub fn winrate_or_default(&self) -> &str {
        self.winrate.as_deref().unwrap_or(NO_WINRATE)
    }
}

/// Whether a profile fetch produced data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScrapeOutcome {
    Scraped(PlayerProfile),
    Failed { reason: String },
}

/// The result of one fetch attempt for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRecord {
    pub identity: PlayerIdentity,
    pub source_url: String,
    pub captured_at: DateTime<Utc>,
    pub outcome: ScrapeOutcome,
}

impl PlayerRecord {
    pub fn scraped(
        identity: PlayerIdentity,
        source_url: String,
        captured_at: DateTime<Utc>,
        profile: PlayerProfile,
    ) -> Self {
        Self {
            identity,
            source_url,
            captured_at,
            outcome: ScrapeOutcome::Scraped(profile),
        }
    }

    pub fn failed(
        identity: PlayerIdentity,
        source_url: String,
        captured_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            source_url,
            captured_at,
            outcome: ScrapeOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn profile(&self) -> Option<&PlayerProfile> {
        match &self.outcome {
            ScrapeOutcome::Scraped(profile) => Some(profile),
            ScrapeOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ScrapeOutcome::Scraped(_) => None,
            ScrapeOutcome::Failed { reason } => Some(reason),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error().is_some()
    }

    pub fn level(&self) -> &str {
        self.profile()
            .map_or(ERROR_FIELD, PlayerProfile::level_or_default)
    }

    pub fn rank(&self) -> &str {
        self.profile().map_or(ERROR_FIELD, PlayerProfile::rank_or_default)
    }

    pub fn winrate(&self) -> &str {
        self.profile()
            .map_or(NO_WINRATE, PlayerProfile::winrate_or_default)
    }

    pub fn recent_matches(&self) -> &[MatchRecord] {
        self.profile()
            .map(|profile| profile.recent_matches.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kda_parse_finds_first_triple() {
        assert_eq!(
            Kda::parse("KDA 12/1/8 (20.00:1)"),
            Some(Kda {
                kills: 12,
                deaths: 1,
                assists: 8
            })
        );
        assert_eq!(Kda::parse("Perfect"), None);
    }

    #[test]
    fn kda_digits_are_ascii_only() {
        let text = "\u{0661}2/3/4";
        assert_eq!(
            Kda::parse(text),
            Some(Kda {
                kills: 2,
                deaths: 3,
                assists: 4
            })
        );
        assert_eq!(Kda::scan(text).map(|(_, raw)| raw).collect::<Vec<_>>(), vec!["2/3/4"]);
    }

    #[test]
    fn kda_scan_yields_every_triple() {
        let found: Vec<_> = Kda::scan("5/3/7 then 0/10/2").map(|(_, raw)| raw).collect();
        assert_eq!(found, vec!["5/3/7", "0/10/2"]);
    }

    #[test]
    fn outcome_labels_are_case_insensitive() {
        assert_eq!(MatchOutcome::from_label("VICTORY"), MatchOutcome::Victory);
        assert_eq!(MatchOutcome::from_label("Win"), MatchOutcome::Victory);
        assert_eq!(MatchOutcome::from_label("Defeat"), MatchOutcome::Defeat);
        assert_eq!(MatchOutcome::from_label("lose"), MatchOutcome::Defeat);
        assert_eq!(MatchOutcome::from_label("Remake"), MatchOutcome::Unknown);
    }

    #[test]
    fn failed_record_shows_error_placeholders() {
        let record = PlayerRecord::failed(
            PlayerIdentity::new("Someone-NA1"),
            "https://example.com".to_string(),
            Utc::now(),
            "timed out",
        );
        assert!(record.is_failed());
        assert_eq!(record.level(), ERROR_FIELD);
        assert_eq!(record.rank(), ERROR_FIELD);
        assert_eq!(record.winrate(), NO_WINRATE);
        assert!(record.recent_matches().is_empty());
    }

    #[test]
    fn missing_profile_fields_fall_back_to_placeholders() {
        let profile = PlayerProfile::default();
        assert_eq!(profile.level_or_default(), UNKNOWN_LEVEL);
        assert_eq!(profile.rank_or_default(), UNRANKED);
        assert_eq!(profile.winrate_or_default(), NO_WINRATE);
    }

    #[test]
    fn label_prefers_display_name() {
        let identity = PlayerIdentity::new("Pablo-CEO");
        assert_eq!(identity.label(), "Pablo-CEO");
        let identity = identity.with_display_name("Raptors for Breakfast");
        assert_eq!(identity.label(), "Raptors for Breakfast");
    }
}
