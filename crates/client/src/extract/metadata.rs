//! Page metadata scraped from HTML head tags.

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use url::Url;

use urlcache_core::FetchedPage;

/// Structured metadata for a fetched page.
///
/// HTML pages yield `title`, `description`, `keywords`, `locale`, `url`,
/// `images` and `videos` when present. Image responses yield a single
/// `body_image`. Every result carries `status_code`.
pub fn page_metadata(page: &FetchedPage) -> Value {
    let mut meta = Map::new();

    let is_image = page.content_type.as_deref().is_some_and(|ct| ct.starts_with("image/"));
    if is_image {
        meta.insert("images".into(), json!([{"src": page.final_url, "type": "body_image"}]));
    } else if page.is_html() || page.content_type.is_none() {
        let base = Url::parse(&page.final_url).ok();
        meta = html_metadata(&page.body, base.as_ref());
    }

    if !meta.contains_key("url") {
        meta.insert("url".into(), Value::String(page.final_url.clone()));
    }
    meta.insert("status_code".into(), json!(page.status));
    Value::Object(meta)
}

/// Metadata from an HTML document, resolving relative URLs against `base`.
pub fn html_metadata(html: &str, base: Option<&Url>) -> Map<String, Value> {
    let document = Html::parse_document(html);
    let mut meta = Map::new();

    let title = meta_content(&document, "og:title").or_else(|| {
        let selector = Selector::parse("title").expect("invalid selector");
        document.select(&selector).next().map(element_text).filter(|t| !t.is_empty())
    });
    insert_str(&mut meta, "title", title);

    let description = meta_content(&document, "description").or_else(|| meta_content(&document, "og:description"));
    insert_str(&mut meta, "description", description);

    if let Some(keywords) = meta_content(&document, "keywords") {
        let keywords: Vec<Value> = keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Value::String(k.to_string()))
            .collect();
        if !keywords.is_empty() {
            meta.insert("keywords".into(), Value::Array(keywords));
        }
    }

    let locale = meta_content(&document, "og:locale").or_else(|| {
        let selector = Selector::parse("html[lang]").expect("invalid selector");
        document
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("lang"))
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
    });
    insert_str(&mut meta, "locale", locale);

    let canonical = {
        let selector = Selector::parse("link[rel=canonical][href]").expect("invalid selector");
        document
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("href"))
            .map(str::to_string)
    }
    .or_else(|| meta_content(&document, "og:url"))
    .and_then(|href| resolve(base, &href));
    insert_str(&mut meta, "url", canonical);

    let mut seen = HashSet::new();
    let mut images = Vec::new();
    for (property, kind) in [("og:image", "og"), ("twitter:image", "twitter")] {
        if let Some(src) = meta_content(&document, property).and_then(|s| resolve(base, &s))
            && seen.insert(src.clone())
        {
            images.push(json!({"src": src, "type": kind}));
        }
    }
    let img = Selector::parse("img[src]").expect("invalid selector");
    for element in document.select(&img) {
        if let Some(src) = element.value().attr("src").and_then(|s| resolve(base, s))
            && seen.insert(src.clone())
        {
            images.push(json!({"src": src, "type": "body_image"}));
        }
    }
    if !images.is_empty() {
        meta.insert("images".into(), Value::Array(images));
    }

    let mut videos = Vec::new();
    for property in ["og:video", "og:video:url", "og:video:secure_url"] {
        if let Some(src) = meta_content(&document, property).and_then(|s| resolve(base, &s))
            && seen.insert(src.clone())
        {
            videos.push(json!({"src": src, "type": "og"}));
        }
    }
    if !videos.is_empty() {
        meta.insert("videos".into(), Value::Array(videos));
    }

    meta
}

/// `content` of the first `<meta>` whose `property` or `name` equals `key`.
fn meta_content(document: &Html, key: &str) -> Option<String> {
    let selector = Selector::parse("meta[content]").expect("invalid selector");
    document
        .select(&selector)
        .find(|e| {
            let el = e.value();
            el.attr("property").or_else(|| el.attr("name")).is_some_and(|k| k.eq_ignore_ascii_case(key))
        })
        .and_then(|e| e.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}

fn insert_str(meta: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        meta.insert(key.into(), Value::String(value));
    }
}
