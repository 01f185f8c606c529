pub(crate) mod profile;

use ::scraper::{CaseSensitivity, ElementRef, Selector};
use tracing::debug;

use crate::error::{Result, ScrapeError};

/// Fetch a URL and return the response body.
///
/// The body is returned as text rather than a parsed document so callers can
/// parse it synchronously; `scraper::Html` must not be held across an await.
pub(crate) async fn get_page(client: &reqwest::Client, url: &str) -> Result<String> {
    debug!(url, "fetching page");

    let response = client.get(url).send().await.map_err(|e| ScrapeError::Http {
        url: url.to_owned(),
        source: e,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::UnexpectedStatus {
            url: url.to_owned(),
            status,
        });
    }

    response.text().await.map_err(|e| ScrapeError::ResponseBody {
        url: url.to_owned(),
        source: e,
    })
}

/// All text inside `element`, concatenated as it appears in the markup, with
/// runs of whitespace collapsed to a single space and the ends trimmed.
pub(crate) fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text nodes that are direct children of `element`, ignoring descendants.
fn own_text(element: &ElementRef) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn has_class(element: &ElementRef, class: &str) -> bool {
    element
        .value()
        .has_class(class, CaseSensitivity::AsciiCaseInsensitive)
}

/// First `div` under `scope` whose own text mentions `anchor`.
fn anchored_div<'a>(scope: &ElementRef<'a>, anchor: &str) -> Option<ElementRef<'a>> {
    let div_selector = Selector::parse("div").ok()?;
    scope
        .select(&div_selector)
        .find(|div| own_text(div).contains(anchor))
}

/// One way of finding a text field inside an element.
///
/// Locators never fail: an unparsable selector or a missing node is simply a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Locator {
    /// Text of the first element matching a CSS selector.
    Css(&'static str),
    /// An attribute of the first element matching a CSS selector.
    Attr(&'static str, &'static str),
    /// Text of the element right after the `div` mentioning the anchor.
    NextSibling(&'static str),
    /// Text of the last `div` under the parent of the `div` mentioning the anchor.
    ParentLastDiv(&'static str),
    /// Text of the `div` mentioning the anchor.
    Anchored(&'static str),
}

impl Locator {
    pub(crate) fn locate(self, scope: &ElementRef) -> Option<String> {
        let found = match self {
            Locator::Css(css) => {
                let selector = Selector::parse(css).ok()?;
                scope.select(&selector).next().map(|e| element_text(&e))
            }
            Locator::Attr(css, attr) => {
                let selector = Selector::parse(css).ok()?;
                scope
                    .select(&selector)
                    .next()
                    .and_then(|e| e.value().attr(attr))
                    .map(|value| value.trim().to_string())
            }
            Locator::NextSibling(anchor) => anchored_div(scope, anchor)?
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .next()
                .map(|e| element_text(&e)),
            Locator::ParentLastDiv(anchor) => {
                let parent = anchored_div(scope, anchor)?
                    .parent()
                    .and_then(ElementRef::wrap)?;
                let div_selector = Selector::parse("div").ok()?;
                parent.select(&div_selector).last().map(|e| element_text(&e))
            }
            Locator::Anchored(anchor) => anchored_div(scope, anchor).map(|e| element_text(&e)),
        };
        found.filter(|text| !text.is_empty())
    }
}

/// Evaluate `locators` in order and return the first non-empty result.
pub(crate) fn locate_first(scope: &ElementRef, locators: &[Locator]) -> Option<String> {
    locators.iter().find_map(|locator| locator.locate(scope))
}

#[cfg(test)]
mod tests {
    use ::scraper::Html;

    use super::*;

    #[test]
    fn css_locator_trims_text() {
        let html = Html::parse_fragment(r#"<div class="tier">  Gold 2  </div>"#);
        let root = html.root_element();
        assert_eq!(
            Locator::Css(".tier").locate(&root),
            Some("Gold 2".to_string())
        );
    }

    #[test]
    fn empty_match_is_a_miss() {
        let html = Html::parse_fragment(r#"<div class="tier">   </div>"#);
        let root = html.root_element();
        assert_eq!(Locator::Css(".tier").locate(&root), None);
    }

    #[test]
    fn invalid_selector_is_a_miss() {
        let html = Html::parse_fragment("<div>x</div>");
        let root = html.root_element();
        assert_eq!(Locator::Css("div[").locate(&root), None);
    }

    #[test]
    fn attr_locator_reads_attribute() {
        let html = Html::parse_fragment(r#"<span><img alt="Ahri" src="/a.png"></span>"#);
        let root = html.root_element();
        assert_eq!(
            Locator::Attr("img", "alt").locate(&root),
            Some("Ahri".to_string())
        );
    }

    #[test]
    fn attr_locator_only_reads_first_match() {
        let html = Html::parse_fragment(
            r#"<span><img src="/rank.png"><img alt="Ahri" src="/a.png"></span>"#,
        );
        let root = html.root_element();
        assert_eq!(Locator::Attr("img", "alt").locate(&root), None);
    }

    #[test]
    fn text_split_across_children_is_concatenated() {
        let html = Html::parse_fragment(
            r#"<div class="kda"><span>8</span>/<span>2</span>/<span>11</span></div>"#,
        );
        let root = html.root_element();
        assert_eq!(
            Locator::Css(".kda").locate(&root),
            Some("8/2/11".to_string())
        );
    }

    #[test]
    fn inner_whitespace_is_collapsed() {
        let html = Html::parse_fragment("<div class=\"tier\">\n  Gold\n   <b>2</b>\n</div>");
        let root = html.root_element();
        assert_eq!(
            Locator::Css(".tier").locate(&root),
            Some("Gold 2".to_string())
        );
    }

    #[test]
    fn next_sibling_follows_anchor() {
        let html = Html::parse_fragment("<section><div>Level</div><div> 342 </div></section>");
        let root = html.root_element();
        assert_eq!(
            Locator::NextSibling("Level").locate(&root),
            Some("342".to_string())
        );
    }

    #[test]
    fn parent_last_div_reads_final_child() {
        let html = Html::parse_fragment(
            "<div><div>Rank</div><div>ignored</div><div>Platinum 4</div></div>",
        );
        let root = html.root_element();
        assert_eq!(
            Locator::ParentLastDiv("Rank").locate(&root),
            Some("Platinum 4".to_string())
        );
    }

    #[test]
    fn locate_first_respects_priority() {
        let html = Html::parse_fragment(
            r#"<div><span class="summoner-level">100</span><span data-testid="summoner-level">200</span></div>"#,
        );
        let root = html.root_element();
        let locators = [
            Locator::Css("[data-testid=\"summoner-level\"]"),
            Locator::Css(".summoner-level"),
        ];
        assert_eq!(locate_first(&root, &locators), Some("200".to_string()));
    }

    #[test]
    fn locate_first_skips_empty_candidates() {
        let html = Html::parse_fragment(
            r#"<div><span data-testid="tier"></span><span class="tier">Silver 1</span></div>"#,
        );
        let root = html.root_element();
        let locators = [Locator::Css("[data-testid=\"tier\"]"), Locator::Css(".tier")];
        assert_eq!(locate_first(&root, &locators), Some("Silver 1".to_string()));
    }
}
