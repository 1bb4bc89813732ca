//! Outlets that only exist in serialized page data.
//!
//! Airports with several terminals render the first tab as anchor cards and
//! ship the rest as JSON inside `<script>` blocks, often as a JSON document
//! escaped inside a JS string. Each block is first decoded strictly; only a
//! block that yields nothing that way is scanned field by field.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use super::{iata_prefix, Outlet};
use crate::links::{Site, LISTING_SEGMENT};
use crate::types::{AirportContext, ExperienceType};

const OUTLET_MARKER: &str = "outletCategory";
const MAX_DEPTH: usize = 64;

static FIELD_SCAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)(?:\\?"code\\?"\s*:\s*\\?"(?P<code>[A-Z0-9]{3,6})\\?"\s*,\s*)?\\?"name\\?"\s*:\s*\\?"(?P<name>[^"\\]+)\\?"\s*,\s*\\?"outletCategory\\?"\s*:\s*\\?"(?P<category>LOUNGE|DINING|RELAX)\\?"\s*,\s*\\?"slug\\?"\s*:\s*\\?"(?P<slug>[a-z0-9-]+)\\?""#,
    )
    .unwrap()
});

/// Category, name and slug as they appear in the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutlet {
    pub kind: ExperienceType,
    pub name: String,
    pub slug: String,
    pub code: Option<String>,
}

pub fn extract(site: &Site, document: &Html, html: &str, ctx: &AirportContext) -> Vec<Outlet> {
    if !html.contains(OUTLET_MARKER) {
        return Vec::new();
    }

    let mut raw = Vec::new();
    let mut saw_marker_in_script = false;
    if let Ok(selector) = Selector::parse("script") {
        for script in document.select(&selector) {
            let body: String = script.text().collect();
            if !body.contains(OUTLET_MARKER) {
                continue;
            }
            saw_marker_in_script = true;
            raw.extend(outlets_in_block(&body));
        }
    }
    if !saw_marker_in_script {
        raw.extend(scan_fields(html));
    }

    let page = html.replace("\\/", "/");
    raw.into_iter()
        .filter_map(|o| bind_outlet(site, &page, ctx, o))
        .collect()
}

/// Strict decode first, field scan only when the block is too broken to parse.
pub fn outlets_in_block(block: &str) -> Vec<RawOutlet> {
    let decoded = decode_outlets(block);
    if decoded.is_empty() {
        scan_fields(block)
    } else {
        decoded
    }
}

/// Outlet objects found in every JSON value that can be cut out of `text`.
pub fn decode_outlets(text: &str) -> Vec<RawOutlet> {
    let mut found = Vec::new();
    for value in json_values(text) {
        collect_outlets(&value, &mut found, 0);
    }
    found
}

/// Lenient pass over fragmentary payloads: matches the
/// `code?, name, outletCategory, slug` field run in plain or `\"`-escaped form.
pub fn scan_fields(text: &str) -> Vec<RawOutlet> {
    let text = text.replace("\\/", "/");
    FIELD_SCAN_RE
        .captures_iter(&text)
        .filter_map(|caps| {
            let kind = ExperienceType::from_keyword(&caps["category"])?;
            let name = caps["name"].trim().to_string();
            let slug = caps["slug"].trim().to_ascii_lowercase();
            if name.is_empty() || slug.is_empty() {
                return None;
            }
            Some(RawOutlet {
                kind,
                name,
                slug,
                code: caps.name("code").map(|m| m.as_str().to_uppercase()),
            })
        })
        .collect()
}

/// Whole text as JSON if it parses, else the outermost closed `{...}` /
/// `[...]` spans that mention outlets and parse on their own. A span that
/// fails to parse gives way to the spans nested inside it.
fn json_values(text: &str) -> Vec<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return vec![value];
    }

    let mut values = Vec::new();
    let mut covered_until = 0;
    for (start, end) in closed_spans(text) {
        if start < covered_until {
            continue;
        }
        let block = &text[start..end];
        if !block.contains(OUTLET_MARKER) {
            covered_until = end;
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(block) {
            values.push(value);
            covered_until = end;
        }
    }
    values
}

/// Shortest prefix of `s` that closes the bracket `s` opens, skipping
/// brackets inside string literals.
pub fn balanced_block(s: &str) -> Option<&str> {
    if !s.starts_with(['{', '[']) {
        return None;
    }
    closed_spans(s)
        .into_iter()
        .find(|&(start, _)| start == 0)
        .map(|(_, end)| &s[..end])
}

/// Byte ranges of every bracket pair that closes, in one pass over `text`,
/// sorted by start so outer spans come before the ones they contain.
/// Brackets inside string literals and after a backslash are ignored, a
/// mismatched closer resets the nesting, and spans nested deeper than
/// `MAX_DEPTH` are not recorded.
fn closed_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Vec<(usize, char)> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in text.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match c {
            '\\' => escape = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' | '[' => open.push((i, c)),
            '}' | ']' => match open.pop() {
                Some((start, opener)) if (opener == '{') == (c == '}') => {
                    if open.len() < MAX_DEPTH {
                        spans.push((start, i + 1));
                    }
                }
                Some(_) => open.clear(),
                None => {}
            },
            _ => {}
        }
    }
    spans.sort_unstable();
    spans
}

fn collect_outlets(value: &Value, found: &mut Vec<RawOutlet>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            if let Some(outlet) = outlet_from_object(map) {
                found.push(outlet);
            }
            for child in map.values() {
                collect_outlets(child, found, depth + 1);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_outlets(child, found, depth + 1);
            }
        }
        // JSON serialized inside a string, e.g. streamed page data chunks
        Value::String(s) if s.contains(OUTLET_MARKER) => {
            for inner in json_values(s) {
                collect_outlets(&inner, found, depth + 1);
            }
        }
        _ => {}
    }
}

fn outlet_from_object(map: &Map<String, Value>) -> Option<RawOutlet> {
    let kind = ExperienceType::from_keyword(map.get(OUTLET_MARKER)?.as_str()?)?;
    let name = map.get("name")?.as_str()?.trim();
    let slug = map.get("slug")?.as_str()?.trim();
    let slug_ok = slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if name.is_empty() || slug.is_empty() || !slug_ok {
        return None;
    }
    Some(RawOutlet {
        kind,
        name: name.to_string(),
        slug: slug.to_ascii_lowercase(),
        code: map
            .get("code")
            .and_then(Value::as_str)
            .map(|c| c.trim().to_uppercase()),
    })
}

/// Attach a canonical detail URL: the full path if the page mentions one for
/// this slug, else one built from the airport context.
fn bind_outlet(site: &Site, page: &str, ctx: &AirportContext, raw: RawOutlet) -> Option<Outlet> {
    let path = find_detail_path(site, page, &ctx.country_slug, &raw.slug).unwrap_or_else(|| {
        format!(
            "/{LISTING_SEGMENT}/{}/{}/{}",
            ctx.country_slug, ctx.airport_slug, raw.slug
        )
    });
    let detail_url = site.canonicalize(&path);
    if !site.is_detail_url(&detail_url) {
        return None;
    }

    let iata_from_code = raw
        .code
        .as_deref()
        .and_then(iata_prefix)
        .or_else(|| iata_prefix(&raw.slug));

    Some(Outlet {
        kind: raw.kind,
        name: raw.name,
        detail_url,
        slug: raw.slug,
        iata_from_code,
    })
}

fn find_detail_path(site: &Site, page: &str, country_slug: &str, slug: &str) -> Option<String> {
    if country_slug.is_empty() {
        return None;
    }
    let pattern = format!(
        r"(?i)(/(?:{}/)?{LISTING_SEGMENT}/{}/[a-z0-9-]+/{})(?:[^a-z0-9-]|$)",
        regex::escape(&site.lang),
        regex::escape(country_slug),
        regex::escape(slug),
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(page).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AirportContext {
        AirportContext {
            airport_url: "https://www.prioritypass.com/lounges/united-kingdom/heathrow".into(),
            airport_slug: "heathrow".into(),
            country_slug: "united-kingdom".into(),
            ..AirportContext::default()
        }
    }

    fn run(html: &str) -> Vec<Outlet> {
        let document = Html::parse_document(html);
        extract(&Site::default(), &document, html, &ctx())
    }

    #[test]
    fn decodes_plain_json_script() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">
            {"props":{"outlets":[
              {"code":"LHR7","name":"Plaza Premium","outletCategory":"LOUNGE","slug":"lhr7-plaza-premium","terminal":"T2"},
              {"name":"Wagamama","outletCategory":"DINING","slug":"lhr9-wagamama"}
            ]}}</script>"#;
        let outlets = run(html);
        assert_eq!(outlets.len(), 2);
        assert_eq!(outlets[0].kind, ExperienceType::Lounge);
        assert_eq!(outlets[0].iata_from_code.as_deref(), Some("LHR"));
        assert_eq!(
            outlets[0].detail_url,
            "https://my.prioritypass.com/en-GB/lounges/united-kingdom/heathrow/lhr7-plaza-premium"
        );
        assert_eq!(outlets[1].kind, ExperienceType::Dining);
        assert_eq!(outlets[1].iata_from_code.as_deref(), Some("LHR"));
    }

    #[test]
    fn decodes_json_escaped_inside_js_string() {
        let html = r#"<script>self.__next_f.push([1,"7:[\"$\",\"section\",null,{\"items\":[{\"code\":\"LHR11\",\"name\":\"No1 Lounge\",\"outletCategory\":\"LOUNGE\",\"slug\":\"lhr11-no1-lounge\"}]}]\n"])</script>"#;
        let outlets = run(html);
        assert_eq!(outlets.len(), 1);
        assert_eq!(outlets[0].name, "No1 Lounge");
        assert_eq!(outlets[0].slug, "lhr11-no1-lounge");
    }

    #[test]
    fn falls_back_to_field_scan_for_truncated_blocks() {
        // the push call is cut off, so no block is balanced
        let html = r#"<script>self.__next_f.push([1,"8:{\"outlets\":[{\"code\":\"LHR12\",\"name\":\"Club Aspire\",\"outletCategory\":\"LOUNGE\",\"slug\":\"lhr12-club-aspire\",\"terminal\":\"T5</script>"#;
        let outlets = run(html);
        assert_eq!(outlets.len(), 1);
        assert_eq!(outlets[0].name, "Club Aspire");
        assert_eq!(outlets[0].iata_from_code.as_deref(), Some("LHR"));
    }

    #[test]
    fn prefers_detail_path_present_in_page() {
        let html = r#"<script type="application/json">{"name":"Aspire","outletCategory":"LOUNGE","slug":"lhr3-aspire"}</script>
            <script type="application/json">{"href":"\/en-GB\/lounges\/united-kingdom\/london-heathrow\/lhr3-aspire"}</script>"#;
        let outlets = run(html);
        assert_eq!(outlets.len(), 1);
        assert_eq!(
            outlets[0].detail_url,
            "https://my.prioritypass.com/en-GB/lounges/united-kingdom/london-heathrow/lhr3-aspire"
        );
    }

    #[test]
    fn detail_path_must_end_at_the_slug() {
        let html = r#"<script type="application/json">{"name":"Aspire","outletCategory":"LOUNGE","slug":"lhr3-aspire"}</script>
            <a href="/lounges/united-kingdom/other/lhr3-aspire-spa">x</a>"#;
        let outlets = run(html);
        assert_eq!(
            outlets[0].detail_url,
            "https://my.prioritypass.com/en-GB/lounges/united-kingdom/heathrow/lhr3-aspire"
        );
    }

    #[test]
    fn ignores_objects_missing_fields() {
        let html = r#"<script type="application/json">[
            {"name":"No slug","outletCategory":"LOUNGE"},
            {"outletCategory":"LOUNGE","slug":"x-no-name"},
            {"name":"Spa","outletCategory":"MASSAGE","slug":"spa"}
        ]</script>"#;
        assert!(run(html).is_empty());
    }

    #[test]
    fn balanced_block_skips_brackets_in_strings() {
        assert_eq!(balanced_block(r#"{"a":"}"}tail"#), Some(r#"{"a":"}"}"#));
        assert_eq!(balanced_block(r#"[1,[2,"]"]],"#), Some(r#"[1,[2,"]"]]"#));
        assert_eq!(balanced_block(r#"{"open":"#), None);
        assert_eq!(balanced_block("x{}"), None);
    }

    #[test]
    fn broken_outer_block_falls_back_to_nested_blocks() {
        // outer object never parses (bare word), the inner arrays do
        let text = r#"{"bad": oops, "a": [{"name":"Aspire","outletCategory":"LOUNGE","slug":"lhr3-aspire"}], "b": [{"name":"Plaza","outletCategory":"LOUNGE","slug":"lhr7-plaza"}]}"#;
        let raw = decode_outlets(text);
        let slugs: Vec<&str> = raw.iter().map(|o| o.slug.as_str()).collect();
        assert_eq!(slugs, ["lhr3-aspire", "lhr7-plaza"]);
    }

    #[test]
    fn large_truncated_chunk_is_scanned_in_linear_time() {
        let mut chunk = String::from(r#"self.__next_f.push([1,"9:{\"outlets\":["#);
        for i in 0..4000 {
            chunk.push_str(&format!(
                r#"{{\"code\":\"LHR{i}\",\"name\":\"Lounge {i}\",\"outletCategory\":\"LOUNGE\",\"slug\":\"lhr{i}-lounge\",\"terminal\":[\"T{i}\"]}},"#
            ));
            // unbalanced openers outside any string literal
            chunk.push_str("{[");
        }
        assert!(chunk.len() > 400_000);

        let started = std::time::Instant::now();
        let raw = outlets_in_block(&chunk);
        assert_eq!(raw.len(), 4000);
        assert_eq!(raw[3999].slug, "lhr3999-lounge");
        assert!(started.elapsed() < std::time::Duration::from_secs(5), "took {:?}", started.elapsed());
    }

    #[test]
    fn scanned_slugs_are_lowercased() {
        let raw = scan_fields(r#""name":"Club","outletCategory":"LOUNGE","slug":"ATL10-The-Club""#);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].slug, "atl10-the-club");

        let decoded = decode_outlets(r#"{"name":"Club","outletCategory":"LOUNGE","slug":"ATL10-The-Club"}"#);
        assert_eq!(decoded[0].slug, raw[0].slug);
    }

    #[test]
    fn field_scan_reads_escaped_fragments() {
        let raw = scan_fields(r#"\"code\":\"SIN4\",\"name\":\"SATS Premier\",\"outletCategory\":\"LOUNGE\",\"slug\":\"sin4-sats-premier\""#);
        assert_eq!(
            raw,
            vec![RawOutlet {
                kind: ExperienceType::Lounge,
                name: "SATS Premier".into(),
                slug: "sin4-sats-premier".into(),
                code: Some("SIN4".into()),
            }]
        );
    }
}
