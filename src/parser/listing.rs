use std::collections::BTreeSet;

use scraper::{Html, Selector};

use crate::links::{Site, LISTING_SEGMENT};

/// Airport page URLs on the listing page: `/lounges/<country>/<airport>`
/// hrefs, joined on the listing host, sorted and unique.
pub fn parse_airport_links(site: &Site, html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let prefix = format!("/{LISTING_SEGMENT}/");
    let links: BTreeSet<String> = document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| href.starts_with(&prefix) && href.matches('/').count() == 3 && !href.ends_with('/'))
        .filter_map(|href| site.listing_base.join(href).ok())
        .map(|url| url.to_string())
        .collect();
    links.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_airport_pages_only() {
        let html = std::fs::read_to_string("tests/fixtures/listing.html").unwrap();
        let links = parse_airport_links(&Site::default(), &html);
        assert_eq!(
            links,
            vec![
                "https://www.prioritypass.com/lounges/iceland/keflavik-international",
                "https://www.prioritypass.com/lounges/united-kingdom/london-heathrow",
                "https://www.prioritypass.com/lounges/united-states-of-america/hartsfield-jackson-atlanta-international",
            ]
        );
    }

    #[test]
    fn joins_on_configured_listing_host() {
        let site = Site::single_origin("http://127.0.0.1:9000").unwrap();
        let links = parse_airport_links(&site, r#"<a href="/lounges/france/paris-cdg">Paris</a>"#);
        assert_eq!(links, vec!["http://127.0.0.1:9000/lounges/france/paris-cdg"]);
    }

    #[test]
    fn empty_page_has_no_links() {
        assert!(parse_airport_links(&Site::default(), "<html></html>").is_empty());
    }
}
