use url::Url;

use super::{path_segments, Site, LISTING_SEGMENT};

impl Site {
    /// Fix the site bug where the airport segment is emitted twice:
    /// `/lounges/<country>/<wrong-airport>/<correct-airport>/<slug>` becomes
    /// `/lounges/<country>/<correct-airport>/<slug>`. Anything that does not
    /// have the extra segment is returned unchanged.
    pub fn repair_duplicated_segment(&self, url: &str) -> String {
        let parts = path_segments(url);
        let drop_at = if parts.len() >= 6
            && self.is_lang_segment(&parts[0])
            && parts[1] == LISTING_SEGMENT
        {
            3
        } else if parts.len() >= 5 && parts[0] == LISTING_SEGMENT {
            2
        } else {
            return url.to_string();
        };

        let fixed: Vec<&str> = parts
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != drop_at)
            .map(|(_, s)| s.as_str())
            .collect();

        let mut repaired = match Url::parse(url.trim()) {
            Ok(parsed) if parsed.has_host() => parsed,
            _ => self.canonical_base.clone(),
        };
        repaired.set_path(&format!("/{}", fixed.join("/")));
        repaired.set_query(None);
        repaired.set_fragment(None);
        repaired.to_string()
    }

    /// Rebuild the intended detail URL after a detail request was redirected
    /// to a coarser page. The slug always comes from `original`; an airport
    /// landing page supplies country and airport, a country landing page
    /// supplies only the country. Returns `None` for any other landing.
    pub fn recover_from_redirect(&self, original: &str, redirected: &str) -> Option<String> {
        let orig = path_segments(&self.canonicalize(original));
        if orig.len() < 5 {
            return None;
        }
        let slug = &orig[orig.len() - 1];
        let original_airport = &orig[orig.len() - 2];

        let landing = path_segments(&self.canonicalize(redirected));
        let on_listing = landing.len() >= 3
            && self.is_lang_segment(&landing[0])
            && landing[1] == LISTING_SEGMENT;
        if !on_listing {
            return None;
        }

        let country = &landing[2];
        let airport = landing.get(3).unwrap_or(original_airport);
        let rebuilt = self.canonicalize(&format!(
            "/{}/{LISTING_SEGMENT}/{country}/{airport}/{slug}",
            self.lang
        ));
        self.is_detail_url(&rebuilt).then_some(rebuilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_removes_wrong_airport_segment() {
        let site = Site::default();
        assert_eq!(
            site.repair_duplicated_segment("/lounges/usa/wrong-airport/correct-airport/club-atl"),
            "https://my.prioritypass.com/lounges/usa/correct-airport/club-atl"
        );
        assert_eq!(
            site.repair_duplicated_segment(
                "https://my.prioritypass.com/en-GB/lounges/usa/wrong-airport/correct-airport/club-atl?x=1"
            ),
            "https://my.prioritypass.com/en-GB/lounges/usa/correct-airport/club-atl"
        );
    }

    #[test]
    fn repair_keeps_origin_of_absolute_input() {
        let site = Site::default();
        assert_eq!(
            site.repair_duplicated_segment("http://127.0.0.1:8080/lounges/usa/a/b/c"),
            "http://127.0.0.1:8080/lounges/usa/b/c"
        );
    }

    #[test]
    fn repair_is_noop_below_trigger_count() {
        let site = Site::default();
        for url in [
            "/lounges/usa/atlanta/club-atl",
            "https://my.prioritypass.com/en-GB/lounges/usa/atlanta/club-atl",
            "/lounges/usa",
            "",
            "not a url at all",
            "/other/a/b/c/d/e",
        ] {
            assert_eq!(site.repair_duplicated_segment(url), url);
        }
    }

    #[test]
    fn recover_from_airport_landing_page() {
        let site = Site::default();
        let recovered = site.recover_from_redirect(
            "/en-GB/lounges/usa/atl10/the-club-atl",
            "/en-GB/lounges/united-states-of-america/hartsfield-jackson-atlanta-international?fromLounge=1",
        );
        assert_eq!(
            recovered.as_deref(),
            Some("https://my.prioritypass.com/en-GB/lounges/united-states-of-america/hartsfield-jackson-atlanta-international/the-club-atl")
        );
    }

    #[test]
    fn recover_from_country_landing_page_reuses_airport() {
        let site = Site::default();
        let recovered = site.recover_from_redirect(
            "https://my.prioritypass.com/en-GB/lounges/usa/atlanta/the-club-atl",
            "https://my.prioritypass.com/en-GB/lounges/united-states-of-america",
        );
        assert_eq!(
            recovered.as_deref(),
            Some("https://my.prioritypass.com/en-GB/lounges/united-states-of-america/atlanta/the-club-atl")
        );
    }

    #[test]
    fn recover_handles_unprefixed_landing() {
        let site = Site::default();
        let recovered = site.recover_from_redirect(
            "/en-GB/lounges/usa/atl10/the-club-atl",
            "https://www.prioritypass.com/lounges/united-states-of-america/atlanta",
        );
        assert_eq!(
            recovered.as_deref(),
            Some("https://my.prioritypass.com/en-GB/lounges/united-states-of-america/atlanta/the-club-atl")
        );
    }

    #[test]
    fn recover_gives_up_on_unrelated_landing() {
        let site = Site::default();
        assert_eq!(
            site.recover_from_redirect("/en-GB/lounges/usa/atl/club", "/en-GB/lounges"),
            None
        );
        assert_eq!(
            site.recover_from_redirect("/en-GB/lounges/usa/atl/club", "/airport-lounges"),
            None
        );
        assert_eq!(
            site.recover_from_redirect("/en-GB/lounges/usa", "/en-GB/lounges/usa/atl"),
            None
        );
    }
}
