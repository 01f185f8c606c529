use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::model::{Kda, MatchOutcome, MatchRecord, PlayerProfile, UNKNOWN_CHAMPION};
use crate::scraper::{has_class, locate_first, Locator};

/// Match items examined per locator.
pub(crate) const MAX_MATCHES: usize = 20;
/// Records synthesized by the plain-text KDA scan.
pub(crate) const MAX_FALLBACK_MATCHES: usize = 10;
/// Assumed spacing between consecutive games when stamping match records.
const MATCH_SPACING_MINUTES: i64 = 30;

const LEVEL_LOCATORS: &[Locator] = &[
    Locator::Css("[data-testid=\"summoner-level\"]"),
    Locator::Css(".summoner-level"),
    Locator::NextSibling("Level"),
];

const RANK_LOCATORS: &[Locator] = &[
    Locator::Css("[data-testid=\"tier\"]"),
    Locator::Css(".tier"),
    Locator::ParentLastDiv("Rank"),
];

const WINRATE_LOCATORS: &[Locator] = &[
    Locator::Css("[data-testid=\"winrate\"]"),
    Locator::Css(".winrate"),
    Locator::Anchored("%"),
];

const MATCH_ITEM_SELECTORS: &[&str] = &[
    ".game-item",
    "[data-testid=\"game-item\"]",
    ".GameItemWrap",
    ".match-item",
];

const CHAMPION_LOCATORS: &[Locator] = &[
    Locator::Css(".champion-name"),
    Locator::Css("[data-testid=\"champion-name\"]"),
    Locator::Attr("img", "alt"),
];

const KDA_LOCATORS: &[Locator] = &[
    Locator::Css(".kda"),
    Locator::Css("[data-testid=\"kda\"]"),
    Locator::Anchored("/"),
];

const RESULT_LOCATORS: &[Locator] = &[
    Locator::Css(".result"),
    Locator::Css("[data-testid=\"result\"]"),
];

/// Extract the summary fields and recent matches from a profile page.
///
/// Match timestamps are approximated backwards from `captured_at`.
pub(crate) fn extract_profile(html: &str, captured_at: DateTime<Utc>) -> PlayerProfile {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let level = locate_first(&root, LEVEL_LOCATORS);
    let rank = locate_first(&root, RANK_LOCATORS);
    let winrate = locate_first(&root, WINRATE_LOCATORS);

    let mut recent_matches = parse_match_items(&root, captured_at);
    if recent_matches.is_empty() {
        warn!("no match items recognized, scanning page text for KDA values");
        recent_matches = scan_kda_text(&root, captured_at);
    }

    debug!(
        level = level.as_deref(),
        rank = rank.as_deref(),
        matches = recent_matches.len(),
        "extracted profile"
    );

    PlayerProfile {
        level,
        rank,
        winrate,
        recent_matches,
    }
}

/// Try each match item selector in turn; the first one that yields any
/// accepted match wins and the rest are not consulted.
fn parse_match_items(root: &ElementRef, captured_at: DateTime<Utc>) -> Vec<MatchRecord> {
    MATCH_ITEM_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .map(|selector| {
            root.select(&selector)
                .take(MAX_MATCHES)
                .enumerate()
                .filter_map(|(index, item)| parse_match_item(&item, approximate_time(captured_at, index)))
                .collect_vec()
        })
        .find(|matches| !matches.is_empty())
        .unwrap_or_default()
}

fn parse_match_item(item: &ElementRef, timestamp: DateTime<Utc>) -> Option<MatchRecord> {
    let champion = locate_first(item, CHAMPION_LOCATORS)?;
    let kda = locate_first(item, KDA_LOCATORS)?;

    let result = match locate_first(item, RESULT_LOCATORS) {
        Some(label) => MatchOutcome::from_label(&label),
        None if has_class(item, "win") => MatchOutcome::Victory,
        None if has_class(item, "lose") => MatchOutcome::Defeat,
        None => MatchOutcome::Unknown,
    };

    Some(MatchRecord {
        champion,
        kda,
        result,
        timestamp,
    })
}

/// Last resort when the page structure is unrecognized: every `k/d/a` in the
/// page text becomes a match with an unknown champion and outcome.
fn scan_kda_text(root: &ElementRef, captured_at: DateTime<Utc>) -> Vec<MatchRecord> {
    let text = root.text().collect::<String>();
    Kda::scan(&text)
        .take(MAX_FALLBACK_MATCHES)
        .enumerate()
        .map(|(index, (_, raw))| MatchRecord {
            champion: UNKNOWN_CHAMPION.to_string(),
            kda: raw.to_string(),
            result: MatchOutcome::Unknown,
            timestamp: approximate_time(captured_at, index),
        })
        .collect()
}

fn approximate_time(captured_at: DateTime<Utc>, index: usize) -> DateTime<Utc> {
    let index = i64::try_from(index).unwrap_or(i64::MAX / MATCH_SPACING_MINUTES);
    captured_at - Duration::minutes(MATCH_SPACING_MINUTES * index)
}
