//! MyAnimeList pages, enriched through the Jikan v4 API.
//!
//! Only stable entity pages are handled (anime, manga, characters, people,
//! clubs and user profiles). Lists, searches and other pages that change
//! constantly pass through untouched.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use urlcache_core::cache::{FieldCodec, FieldValue};
use urlcache_core::{Error, Extractor, ExtractorContext, Record};

use crate::fetch::{bare_host, parse_lenient};

/// Public Jikan v4 endpoint.
pub const JIKAN_BASE: &str = "https://api.jikan.moe/v4";

/// Field holding Jikan responses keyed by API URL.
pub const JIKAN_FIELD: &str = "jikan";

static REST_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(anime|manga|character|people|clubs)/(\d+)").expect("invalid regex"));
static PHP_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(anime|manga|character|people|clubs)\.php").expect("invalid regex"));
static PROFILE_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/profile/([^/]+)/?").expect("invalid regex"));

// Sub-resources requested per entity; "" is the entity itself.
const ANIME_ENDPOINTS: &[&str] =
    &["", "characters", "staff", "pictures", "statistics", "relations", "themes", "moreinfo", "recommendations"];
const MANGA_ENDPOINTS: &[&str] =
    &["", "characters", "relations", "moreinfo", "recommendations", "pictures", "statistics"];
const CHARACTER_ENDPOINTS: &[&str] = &["", "voices", "pictures"];
const PEOPLE_ENDPOINTS: &[&str] = &["", "anime", "manga", "voices", "pictures"];
const CLUB_ENDPOINTS: &[&str] = &[""];
const USER_ENDPOINTS: &[&str] = &["", "statistics", "favorites", "about"];

/// Canonical page URL plus the API URLs that describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalPage {
    pub canonical: String,
    pub jikan_urls: Vec<String>,
}

/// MyAnimeList extractor.
#[derive(Debug, Clone)]
pub struct MyAnimeList {
    base: String,
}

impl Default for MyAnimeList {
    fn default() -> Self {
        Self::new(JIKAN_BASE)
    }
}

impl MyAnimeList {
    pub fn new(base: &str) -> Self {
        Self { base: base.trim_end_matches('/').to_string() }
    }

    /// Classify `url`; `None` for pages not worth enriching.
    pub fn parse(&self, url: &str) -> Option<MalPage> {
        let parsed = parse_lenient(url).ok()?;
        if bare_host(&parsed)? != "myanimelist.net" {
            return None;
        }
        let path = parsed.path();
        if path.trim_matches('/').is_empty() {
            return None;
        }

        if let Some(caps) = REST_PATH.captures(path) {
            return self.entity(&caps[1], caps[2].parse().ok()?);
        }

        if let Some(caps) = PHP_PATH.captures(path) {
            let id = parsed
                .query_pairs()
                .find(|(k, _)| k == "id")
                .or_else(|| parsed.query_pairs().find(|(k, _)| k == "cid"))
                .and_then(|(_, v)| v.parse().ok())?;
            return self.entity(&caps[1], id);
        }

        if let Some(caps) = PROFILE_PATH.captures(path) {
            return Some(self.user(&caps[1]));
        }

        None
    }

    fn entity(&self, kind: &str, id: u64) -> Option<MalPage> {
        let (canonical, api, endpoints) = match kind {
            "anime" => (format!("https://myanimelist.net/anime/{id}"), "anime", ANIME_ENDPOINTS),
            "manga" => (format!("https://myanimelist.net/manga/{id}"), "manga", MANGA_ENDPOINTS),
            "character" => (format!("https://myanimelist.net/character/{id}"), "characters", CHARACTER_ENDPOINTS),
            "people" => (format!("https://myanimelist.net/people/{id}"), "people", PEOPLE_ENDPOINTS),
            "clubs" => (format!("https://myanimelist.net/clubs.php?cid={id}"), "clubs", CLUB_ENDPOINTS),
            _ => return None,
        };
        let root = format!("{}/{api}/{id}", self.base);
        Some(MalPage { canonical, jikan_urls: endpoints.iter().map(|e| join_endpoint(&root, e)).collect() })
    }

    fn user(&self, name: &str) -> MalPage {
        let root = format!("{}/users/{name}", self.base);
        MalPage {
            canonical: format!("https://myanimelist.net/profile/{name}"),
            jikan_urls: USER_ENDPOINTS
                .iter()
                .map(|e| join_endpoint(&root, e))
                .collect(),
        }
    }
}

fn join_endpoint(root: &str, endpoint: &str) -> String {
    if endpoint.is_empty() { root.to_string() } else { format!("{root}/{endpoint}") }
}

impl Extractor for MyAnimeList {
    fn name(&self) -> &str {
        "myanimelist"
    }

    fn recognizes(&self, url: &str) -> bool {
        self.parse(url).is_some()
    }

    fn normalize(&self, url: &str) -> String {
        self.parse(url).map_or_else(|| url.to_string(), |page| page.canonical)
    }

    fn postprocess(&self, url: &str, record: Record, ctx: &ExtractorContext<'_>) -> Result<Record, Error> {
        let page = self
            .parse(url)
            .ok_or_else(|| Error::ExtractFailed(format!("not a MyAnimeList entity page: {url}")))?;

        let mut responses = Map::new();
        for api_url in &page.jikan_urls {
            tracing::debug!("requesting {}", api_url);
            let result = ctx.fetcher.get(api_url).and_then(|resp| {
                serde_json::from_str::<Value>(&resp.body)
                    .map_err(|e| Error::ExtractFailed(format!("invalid JSON from {api_url}: {e}")))
            });
            ctx.pause();
            match result {
                Ok(body) => {
                    responses.insert(api_url.clone(), body);
                }
                Err(e) => tracing::warn!("skipping {}: {}", api_url, e),
            }
        }

        if responses.is_empty() {
            return Ok(record);
        }
        Ok(record.with_field(JIKAN_FIELD, FieldValue::Json(Value::Object(responses))))
    }

    fn codecs(&self) -> Vec<FieldCodec> {
        vec![FieldCodec::json(JIKAN_FIELD)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::fake::FakeFetcher;
    use serde_json::json;
    use urlcache_core::CacheOptions;

    #[test]
    fn test_parse_anime() {
        let mal = MyAnimeList::default();
        let page = mal.parse("https://myanimelist.net/anime/1/Cowboy_Bebop").unwrap();
        assert_eq!(page.canonical, "https://myanimelist.net/anime/1");
        assert_eq!(page.jikan_urls.len(), 9);
        assert_eq!(page.jikan_urls[0], "https://api.jikan.moe/v4/anime/1");
        assert!(page.jikan_urls.contains(&"https://api.jikan.moe/v4/anime/1/characters".to_string()));
        assert_eq!(mal.parse("https://myanimelist.net/anime/1"), Some(page));
    }

    #[test]
    fn test_parse_php_forms() {
        let mal = MyAnimeList::default();
        let manga = mal.parse("https://myanimelist.net/manga.php?id=1").unwrap();
        assert_eq!(manga.canonical, "https://myanimelist.net/manga/1");
        assert!(manga.jikan_urls.contains(&"https://api.jikan.moe/v4/manga/1".to_string()));

        let club = mal.parse("https://myanimelist.net/clubs.php?cid=57607").unwrap();
        assert_eq!(club.canonical, "https://myanimelist.net/clubs.php?cid=57607");
        assert_eq!(club.jikan_urls, vec!["https://api.jikan.moe/v4/clubs/57607"]);

        let person = mal.parse("https://myanimelist.net/people.php?id=1").unwrap();
        assert!(person.jikan_urls.contains(&"https://api.jikan.moe/v4/people/1".to_string()));
    }

    #[test]
    fn test_parse_character_and_profile() {
        let mal = MyAnimeList::default();
        let character = mal.parse("https://myanimelist.net/character/1").unwrap();
        assert!(character.jikan_urls.contains(&"https://api.jikan.moe/v4/characters/1".to_string()));

        let user = mal.parse("https://myanimelist.net/profile/Xinil/").unwrap();
        assert_eq!(user.canonical, "https://myanimelist.net/profile/Xinil");
        assert!(user.jikan_urls.contains(&"https://api.jikan.moe/v4/users/Xinil".to_string()));
    }

    #[test]
    fn test_parse_ignored() {
        let mal = MyAnimeList::default();
        assert_eq!(mal.parse("https://myanimelist.net/"), None);
        assert_eq!(mal.parse("https://myanimelist.net/topanime.php"), None);
        assert_eq!(mal.parse("https://myanimelist.net/animelist/Xinil"), None);
        assert_eq!(mal.parse("https://myanimelist.net/anime.php"), None);
        assert_eq!(mal.parse("https://example.com/anime/1"), None);
    }

    #[test]
    fn test_custom_base() {
        let mal = MyAnimeList::new("http://localhost:8080/v4/");
        let page = mal.parse("https://myanimelist.net/clubs.php?cid=1").unwrap();
        assert_eq!(page.jikan_urls, vec!["http://localhost:8080/v4/clubs/1"]);
    }

    #[test]
    fn test_postprocess_collects_responses() {
        let mal = MyAnimeList::default();
        let fetcher =
            FakeFetcher::default().with_page("https://api.jikan.moe/v4/clubs/5", r#"{"data": {"mal_id": 5}}"#);
        let options = CacheOptions { sleep_time: std::time::Duration::ZERO, ..Default::default() };
        let ctx = ExtractorContext { fetcher: &fetcher, options: &options };

        let url = "https://myanimelist.net/clubs.php?cid=5";
        let record = mal.postprocess(url, Record::new(url), &ctx).unwrap();
        assert_eq!(
            record.data[JIKAN_FIELD],
            FieldValue::Json(json!({"https://api.jikan.moe/v4/clubs/5": {"data": {"mal_id": 5}}}))
        );
    }

    #[test]
    fn test_postprocess_skips_failed_requests() {
        let mal = MyAnimeList::default();
        let fetcher = FakeFetcher::default().with_page("https://api.jikan.moe/v4/characters/1", r#"{"data": {}}"#);
        let options = CacheOptions { sleep_time: std::time::Duration::ZERO, ..Default::default() };
        let ctx = ExtractorContext { fetcher: &fetcher, options: &options };

        let url = "https://myanimelist.net/character/1";
        let record = mal.postprocess(url, Record::new(url), &ctx).unwrap();
        assert_eq!(fetcher.requests.borrow().len(), 3);
        let jikan = record.data[JIKAN_FIELD].as_json().unwrap();
        assert_eq!(jikan.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_postprocess_all_failed_leaves_field_absent() {
        let mal = MyAnimeList::default();
        let fetcher = FakeFetcher::default();
        let options = CacheOptions { sleep_time: std::time::Duration::ZERO, ..Default::default() };
        let ctx = ExtractorContext { fetcher: &fetcher, options: &options };

        let url = "https://myanimelist.net/anime/1";
        let record = mal.postprocess(url, Record::new(url), &ctx).unwrap();
        assert!(!record.data.contains_key(JIKAN_FIELD));
    }
}
