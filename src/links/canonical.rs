use super::{path_only, path_segments, Site, LISTING_SEGMENT};

impl Site {
    /// Rewrite any URL, path or slug into the canonical detail-URL form on
    /// the canonical host. Bare `/lounges/...` paths gain the language prefix.
    /// Idempotent.
    pub fn canonicalize(&self, raw: &str) -> String {
        let mut path = path_only(raw);
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        if path.starts_with(&format!("/{LISTING_SEGMENT}/")) {
            path = format!("/{}{}", self.lang, path);
        }

        let mut url = self.canonical_base.clone();
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }

    /// True for lounge detail pages, i.e. `/<lang>/lounges/<country>/<airport>/<slug>`
    /// or the unprefixed `/lounges/<country>/<airport>/<slug>`. Country and
    /// airport index pages have one segment fewer.
    pub fn is_detail_url(&self, url: &str) -> bool {
        let parts = path_segments(url);
        let prefixed =
            parts.len() >= 5 && self.is_lang_segment(&parts[0]) && parts[1] == LISTING_SEGMENT;
        let unprefixed = parts.len() >= 4 && parts[0] == LISTING_SEGMENT;
        prefixed || unprefixed
    }

    /// Resolve an anchor href found on an airport page into a canonical
    /// detail URL. Card links are often relative (`<airport>/<slug>`) and are
    /// placed under the page's country.
    pub fn resolve_detail_href(&self, country_slug: &str, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let candidate = if href.starts_with("http://")
            || href.starts_with("https://")
            || href.starts_with('/')
        {
            self.canonicalize(href)
        } else if country_slug.is_empty() {
            return None;
        } else {
            self.canonicalize(&format!(
                "/{LISTING_SEGMENT}/{country_slug}/{}",
                href.trim_start_matches('/')
            ))
        };

        self.is_detail_url(&candidate).then_some(candidate)
    }
}
