pub mod canonical;
pub mod repair;

use url::Url;

pub const DEFAULT_CANONICAL_BASE: &str = "https://my.prioritypass.com";
pub const DEFAULT_LISTING_BASE: &str = "https://www.prioritypass.com";
pub const DEFAULT_LANG_PREFIX: &str = "en-GB";
pub const LISTING_SEGMENT: &str = "lounges";

/// Read-only description of the site shared by every task: where canonical
/// detail URLs live, which host serves the airport pages, and the language
/// prefix the canonical form carries.
#[derive(Debug, Clone)]
pub struct Site {
    pub canonical_base: Url,
    pub listing_base: Url,
    pub lang: String,
}

impl Site {
    pub fn new(canonical_base: &str, listing_base: &str, lang: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            canonical_base: Url::parse(canonical_base)?,
            listing_base: Url::parse(listing_base)?,
            lang: lang.trim_matches('/').to_string(),
        })
    }

    /// Site pointing both hosts at a single origin. Used by tests that stand
    /// up one mock server for listing, airport and detail pages.
    pub fn single_origin(base: &str) -> Result<Self, url::ParseError> {
        Self::new(base, base, DEFAULT_LANG_PREFIX)
    }

    fn is_lang_segment(&self, segment: &str) -> bool {
        segment.eq_ignore_ascii_case(&self.lang)
    }
}

impl Default for Site {
    fn default() -> Self {
        Self {
            canonical_base: Url::parse(DEFAULT_CANONICAL_BASE).expect("static base url"),
            listing_base: Url::parse(DEFAULT_LISTING_BASE).expect("static base url"),
            lang: DEFAULT_LANG_PREFIX.to_string(),
        }
    }
}

/// Path component of an absolute URL, site-relative path or bare slug, with
/// query and fragment removed.
pub fn path_only(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => {
            let end = raw.find(['?', '#']).unwrap_or(raw.len());
            raw[..end].to_string()
        }
    }
}

/// Non-empty path segments, so leading, trailing and doubled slashes are ignored.
pub fn path_segments(raw: &str) -> Vec<String> {
    path_only(raw)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Last path segment of a URL, which is the detail slug for detail pages.
pub fn last_segment(raw: &str) -> Option<String> {
    path_segments(raw).pop()
}
