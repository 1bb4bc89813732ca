use scraper::{Html, Selector};

use super::{element_text, iata_prefix, Outlet};
use crate::links::{last_segment, Site};
use crate::types::ExperienceType;

/// Card links whose text starts with a category keyword, e.g.
/// `<a href="atlanta/atl10-the-club"><span>LOUNGE</span><h3>The Club</h3></a>`.
pub fn extract(site: &Site, document: &Html, country_slug: &str) -> Vec<Outlet> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut outlets = Vec::new();
    for anchor in document.select(&selector) {
        let href = anchor.value().attr("href").unwrap_or("").trim();
        let text = element_text(&anchor);
        if href.is_empty() || text.is_empty() {
            continue;
        }

        let (keyword, rest) = match text.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (text.as_str(), ""),
        };
        let Some(kind) = ExperienceType::from_keyword(keyword) else {
            continue;
        };
        let name = if rest.is_empty() { keyword } else { rest };

        let Some(detail_url) = site.resolve_detail_href(country_slug, href) else {
            continue;
        };
        let Some(slug) = last_segment(&detail_url) else {
            continue;
        };
        let iata_from_code = slug.split('-').next().and_then(iata_prefix);

        outlets.push(Outlet {
            kind,
            name: name.to_string(),
            detail_url,
            slug,
            iata_from_code,
        });
    }
    outlets
}
