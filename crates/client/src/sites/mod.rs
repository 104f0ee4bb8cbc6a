//! Built-in site extractors.
//!
//! Each site normalizes its URLs to one canonical form and may enrich the
//! fetched record with data from follow-up requests.

pub mod myanimelist;
pub mod stackoverflow;
pub mod youtube;

pub use myanimelist::MyAnimeList;
pub use stackoverflow::StackOverflow;
pub use youtube::YouTube;

use urlcache_core::Extractor;

/// Every built-in extractor, in the order they are consulted.
pub fn default_extractors() -> Vec<Box<dyn Extractor>> {
    vec![Box::new(YouTube), Box::new(StackOverflow), Box::new(MyAnimeList::default())]
}


#[cfg(test)]
mod tests {
    use super::*;
    use urlcache_core::ExtractorPipeline;

    #[test]
    fn test_default_extractors_normalize_together() {
        let pipeline = ExtractorPipeline::new(default_extractors());
        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.normalize("youtu.be/_lOT2p_FCvA"), "https://www.youtube.com/watch?v=_lOT2p_FCvA");
        assert_eq!(
            pipeline.normalize("https://stackoverflow.com/q/12345/678"),
            "https://stackoverflow.com/questions/12345"
        );
        assert_eq!(pipeline.normalize("https://myanimelist.net/anime.php?id=1"), "https://myanimelist.net/anime/1");
        assert_eq!(pipeline.normalize("https://example.com/%7Euser "), "https://example.com/~user");
    }

    #[test]
    fn test_default_extractor_codecs() {
        let pipeline = ExtractorPipeline::new(default_extractors());
        let names: Vec<String> = pipeline.codecs().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["subtitles", "jikan"]);
    }
}
