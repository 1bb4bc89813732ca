pub mod anchors;
pub mod detail;
pub mod embedded;
pub mod listing;

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::links::{path_segments, Site, LISTING_SEGMENT};
use crate::types::{AirportContext, AirportPage, AirportSummary, ExperienceRecord, ExperienceType};

static TITLE_IATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{3})\s+LOUNGES\b").unwrap());
static BARE_IATA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([A-Z]{3})\b").unwrap());

/// A candidate experience before it is bound to its airport context.
#[derive(Debug, Clone, PartialEq)]
pub struct Outlet {
    pub kind: ExperienceType,
    pub name: String,
    pub detail_url: String,
    pub slug: String,
    pub iata_from_code: Option<String>,
}

/// Two extraction passes over one airport page (anchors, then embedded
/// payload), merged and deduplicated on (category, slug).
pub fn extract_airport_page(site: &Site, airport_url: &str, html: &str) -> AirportPage {
    let document = Html::parse_document(html);
    let ctx = airport_context(airport_url, &document);

    let mut outlets = anchors::extract(site, &document, &ctx.country_slug);
    outlets.extend(embedded::extract(site, &document, html, &ctx));
    let outlets = dedupe(outlets);

    let (lounges, others): (Vec<Outlet>, Vec<Outlet>) = outlets
        .into_iter()
        .partition(|o| o.kind == ExperienceType::Lounge);

    let airport_iata = lounges
        .iter()
        .find_map(|o| o.iata_from_code.clone())
        .or_else(|| ctx.iata_from_title.clone())
        .or_else(|| bare_iata_token(&ctx.airport_title));

    let to_records = |items: Vec<Outlet>| -> Vec<ExperienceRecord> {
        items
            .into_iter()
            .map(|o| ExperienceRecord::new(&ctx, o.kind, &o.name, o.detail_url, o.slug, o.iata_from_code))
            .collect()
    };
    let lounges = to_records(lounges);
    let others = to_records(others);

    let summary = AirportSummary {
        airport_url: ctx.airport_url.clone(),
        airport_slug: ctx.airport_slug.clone(),
        country_slug: ctx.country_slug.clone(),
        airport_name: ctx.airport_name.clone(),
        airport_title: ctx.airport_title.clone(),
        airport_iata,
        lounge_count: lounges.len(),
        non_lounge_count: others.len(),
        total: lounges.len() + others.len(),
        error: None,
    };

    AirportPage {
        summary,
        lounges,
        others,
    }
}

fn airport_context(airport_url: &str, document: &Html) -> AirportContext {
    let parts = path_segments(airport_url);
    let (country_slug, airport_slug) = match parts.iter().position(|p| p == LISTING_SEGMENT) {
        Some(i) if parts.len() > i + 2 => (parts[i + 1].clone(), parts[i + 2].clone()),
        _ => (String::new(), String::new()),
    };

    let airport_title = first_text(document, "title").unwrap_or_default();
    let airport_name = first_text(document, "h1").unwrap_or_default();
    let iata_from_title = TITLE_IATA_RE
        .captures(&airport_title.to_uppercase())
        .map(|c| c[1].to_string());

    AirportContext {
        airport_url: airport_url.to_string(),
        airport_slug,
        country_slug,
        airport_name,
        airport_title,
        iata_from_title,
    }
}

/// Keep the first record per (category, slug).
pub fn dedupe(outlets: Vec<Outlet>) -> Vec<Outlet> {
    let mut seen = HashSet::new();
    outlets
        .into_iter()
        .filter(|o| seen.insert((o.kind, o.slug.to_ascii_lowercase())))
        .collect()
}

/// Three leading ASCII letters, uppercased. `ATL10` and `atl10-the-club`
/// both give `ATL`.
pub fn iata_prefix(value: &str) -> Option<String> {
    let head: String = value.trim().chars().take(3).collect();
    (head.chars().count() == 3 && head.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| head.to_ascii_uppercase())
}

fn bare_iata_token(title: &str) -> Option<String> {
    BARE_IATA_RE.captures(title).map(|c| c[1].to_string())
}

/// Whitespace-joined text of an element, like a browser's innerText on one line.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATL_URL: &str =
        "https://www.prioritypass.com/lounges/united-states-of-america/hartsfield-jackson-atlanta-international";

    fn atl_fixture() -> String {
        std::fs::read_to_string("tests/fixtures/airport_atl.html").unwrap()
    }

    #[test]
    fn anchors_and_payload_merge_into_three_lounges() {
        let page = extract_airport_page(&Site::default(), ATL_URL, &atl_fixture());
        let slugs: Vec<&str> = page
            .lounges
            .iter()
            .map(|r| r.experience_detail_slug.as_str())
            .collect();
        assert_eq!(
            slugs,
            vec!["atl10-the-club-atl", "atl12-delta-sky-club", "atl15-escape-lounge"]
        );
        assert_eq!(page.others.len(), 2);
        assert_eq!(page.summary.lounge_count, 3);
        assert_eq!(page.summary.non_lounge_count, 2);
        assert_eq!(page.summary.total, 5);
    }

    #[test]
    fn payload_only_lounge_uses_path_found_in_page() {
        let page = extract_airport_page(&Site::default(), ATL_URL, &atl_fixture());
        let escape = page
            .lounges
            .iter()
            .find(|r| r.experience_detail_slug == "atl15-escape-lounge")
            .unwrap();
        assert_eq!(escape.experience_name, "Escape Lounge");
        assert_eq!(
            escape.experience_detail_url,
            "https://my.prioritypass.com/en-GB/lounges/united-states-of-america/hartsfield-jackson-atlanta-international/atl15-escape-lounge"
        );
        assert_eq!(escape.iata_code.as_deref(), Some("ATL"));
    }

    #[test]
    fn context_comes_from_url_and_markup() {
        let page = extract_airport_page(&Site::default(), ATL_URL, &atl_fixture());
        let s = &page.summary;
        assert_eq!(s.country_slug, "united-states-of-america");
        assert_eq!(s.airport_slug, "hartsfield-jackson-atlanta-international");
        assert_eq!(s.airport_name, "Hartsfield-Jackson Atlanta International");
        assert_eq!(s.airport_iata.as_deref(), Some("ATL"));
        assert!(page.lounges.iter().all(|r| r.airport_url == ATL_URL));
    }

    #[test]
    fn extraction_is_stable_under_repetition() {
        let html = atl_fixture();
        let once = extract_airport_page(&Site::default(), ATL_URL, &html);
        let again = extract_airport_page(&Site::default(), ATL_URL, &html);
        let doubled = extract_airport_page(&Site::default(), ATL_URL, &format!("{html}{html}"));
        assert_eq!(once.lounges, again.lounges);
        assert_eq!(once.lounges.len(), doubled.lounges.len());
        assert_eq!(once.others.len(), doubled.others.len());
    }

    #[test]
    fn airport_iata_falls_back_to_title() {
        let html = r#"<html><head><title>London Heathrow LHR Lounges</title></head>
            <body><a href="heathrow/1-plaza-premium">LOUNGE Plaza Premium</a></body></html>"#;
        let page = extract_airport_page(
            &Site::default(),
            "https://www.prioritypass.com/lounges/united-kingdom/heathrow",
            html,
        );
        assert_eq!(page.lounges.len(), 1);
        assert_eq!(page.lounges[0].iata_code.as_deref(), Some("LHR"));
        assert_eq!(page.summary.airport_iata.as_deref(), Some("LHR"));

        let html = r#"<html><head><title>Airport Lounges in Reykjavik KEF | PP</title></head>
            <body><a href="keflavik/1-saga">LOUNGE Saga</a></body></html>"#;
        let page = extract_airport_page(
            &Site::default(),
            "https://www.prioritypass.com/lounges/iceland/keflavik",
            html,
        );
        assert_eq!(page.lounges[0].iata_code, None);
        assert_eq!(page.summary.airport_iata.as_deref(), Some("KEF"));
    }

    #[test]
    fn page_without_keywords_yields_nothing() {
        let html = "<html><head><title>Maintenance</title></head><body><a href=\"/x\">Home</a></body></html>";
        let page = extract_airport_page(&Site::default(), "https://www.prioritypass.com/lounges/a/b", html);
        assert!(page.lounges.is_empty());
        assert!(page.others.is_empty());
        assert_eq!(page.summary.airport_iata, None);
    }

    #[test]
    fn iata_prefix_needs_three_letters() {
        assert_eq!(iata_prefix("ATL10").as_deref(), Some("ATL"));
        assert_eq!(iata_prefix("jfk-terminal-4").as_deref(), Some("JFK"));
        assert_eq!(iata_prefix("1-saga"), None);
        assert_eq!(iata_prefix("ab"), None);
        assert_eq!(iata_prefix("a1b"), None);
    }

    #[test]
    fn dedupe_keeps_first_per_kind_and_slug() {
        let outlet = |kind, name: &str, slug: &str| Outlet {
            kind,
            name: name.into(),
            detail_url: format!("u/{slug}"),
            slug: slug.into(),
            iata_from_code: None,
        };
        let merged = dedupe(vec![
            outlet(ExperienceType::Lounge, "first", "a"),
            outlet(ExperienceType::Lounge, "second", "a"),
            outlet(ExperienceType::Dining, "dining", "a"),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "first");
    }

    #[test]
    fn dedupe_ignores_slug_case() {
        let outlet = |slug: &str| Outlet {
            kind: ExperienceType::Lounge,
            name: slug.into(),
            detail_url: format!("u/{slug}"),
            slug: slug.into(),
            iata_from_code: None,
        };
        let merged = dedupe(vec![outlet("ATL10-The-Club"), outlet("atl10-the-club")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].slug, "ATL10-The-Club");
    }
}
