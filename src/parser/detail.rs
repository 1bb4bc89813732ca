use scraper::{Html, Selector};
use url::Url;

use super::first_text;
use crate::types::DetailMeta;

/// Title and hero image of a lounge detail page. The image is the
/// `og:image` meta tag, else the first `<img src>` resolved against `page_url`.
pub fn parse_detail_page(html: &str, page_url: &str) -> DetailMeta {
    let document = Html::parse_document(html);
    let title = first_text(&document, "title");
    let image_url = og_image(&document).or_else(|| first_img(&document, page_url));
    DetailMeta { title, image_url }
}

fn og_image(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[property="og:image"]"#).ok()?;
    document
        .select(&selector)
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

fn first_img(document: &Html, page_url: &str) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    let src = document
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|s| !s.is_empty())?;
    match Url::parse(page_url).and_then(|base| base.join(src)) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Some(src.to_string()),
    }
}
