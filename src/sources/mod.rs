//! # Sources Module
//!
//! Turns what a user typed (or uploaded) into a playable [`Track`].
//!
//! - [`Query::classify`] decides whether the input is a direct link to one of
//!   the supported site families (YouTube, Facebook) or free text to search.
//! - [`TrackResolver`] hands the resulting target to a [`MediaExtractor`]
//!   (yt-dlp in production, see [`ytdlp`]) and builds the track.
//! - [`attachment`] validates and downloads uploaded audio files.

pub mod attachment;
pub mod ytdlp;

use async_trait::async_trait;
use regex::Regex;
use std::{sync::Arc, sync::LazyLock, time::Duration};
use tempfile::TempPath;
use tracing::{debug, info};

use crate::error::BotError;

pub use attachment::AttachmentFetcher;
pub use ytdlp::YtDlpExtractor;

/// Prefix understood by the extractor as "search and take the first result".
pub const SEARCH_PREFIX: &str = "ytsearch:";

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.)?(youtube|youtu|youtube-nocookie)\.(com|be)/(watch\?v=|embed/|v/|.+\?v=)?([^&=%\?]{11})",
    )
    .expect("static YouTube pattern")
});

static FACEBOOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(facebook|fb)\.(com|watch)/.*/(videos?/|watch/|v/)")
        .expect("static Facebook pattern")
});

/// How a track entered the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Resolved,
    UploadedFile,
}

/// Where the audio for a track is read from.
#[derive(Debug, Clone)]
pub enum StreamLocator {
    /// Direct media stream URL returned by the extractor.
    Remote(String),
    /// Uploaded file on local disk; deleted once the last clone is dropped.
    Local(Arc<TempPath>),
}

/// A resolved, playable audio reference plus its display title.
#[derive(Debug, Clone)]
pub struct Track {
    title: String,
    locator: StreamLocator,
    kind: SourceKind,
    duration: Option<Duration>,
    page_url: Option<String>,
}

impl Track {
    pub fn resolved(title: impl Into<String>, stream_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            locator: StreamLocator::Remote(stream_url.into()),
            kind: SourceKind::Resolved,
            duration: None,
            page_url: None,
        }
    }

    pub fn uploaded(filename: impl Into<String>, path: TempPath) -> Self {
        Self {
            title: filename.into(),
            locator: StreamLocator::Local(Arc::new(path)),
            kind: SourceKind::UploadedFile,
            duration: None,
            page_url: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn locator(&self) -> &StreamLocator {
        &self.locator
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn page_url(&self) -> Option<&str> {
        self.page_url.as_deref()
    }
}

/// What the extractor returned for a target.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMedia {
    pub title: String,
    pub stream_url: String,
    pub page_url: Option<String>,
    pub duration: Option<Duration>,
}

/// External collaborator that performs the actual network extraction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// `target` is either a direct URL or a [`SEARCH_PREFIX`]ed query.
    async fn extract(&self, target: &str) -> Result<ExtractedMedia, BotError>;
}

/// Classification of raw user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Direct(String),
    Search(String),
}

impl Query {
    pub fn classify(input: &str) -> Self {
        let input = input.trim();
        if is_youtube_url(input) || is_facebook_url(input) {
            Query::Direct(input.to_string())
        } else {
            Query::Search(input.to_string())
        }
    }

    /// The string handed to the extractor.
    pub fn target(&self) -> String {
        match self {
            Query::Direct(url) => url.clone(),
            Query::Search(text) => format!("{SEARCH_PREFIX}{text}"),
        }
    }
}

pub fn is_youtube_url(input: &str) -> bool {
    YOUTUBE_URL.is_match(input)
}

pub fn is_facebook_url(input: &str) -> bool {
    FACEBOOK_URL.is_match(input)
}

/// Resolves user input into a [`Track`] through a [`MediaExtractor`].
#[derive(Clone)]
pub struct TrackResolver {
    extractor: Arc<dyn MediaExtractor>,
}

impl TrackResolver {
    pub fn new(extractor: Arc<dyn MediaExtractor>) -> Self {
        Self { extractor }
    }

    /// Resolves a URL or search text. No retry: the caller reports failures.
    pub async fn resolve(&self, input: &str) -> Result<Track, BotError> {
        if input.trim().is_empty() {
            return Err(BotError::resolution("nothing to search for"));
        }

        let query = Query::classify(input);
        match &query {
            Query::Direct(url) => info!("🔗 Resolving direct URL: {}", url),
            Query::Search(text) => info!("🔍 Searching for: {}", text),
        }

        let media = self.extractor.extract(&query.target()).await?;
        match media.duration {
            Some(duration) => debug!(
                "Resolved '{}' -> {} ({})",
                input,
                media.title,
                humantime::format_duration(duration)
            ),
            None => debug!("Resolved '{}' -> {}", input, media.title),
        }

        let mut track = Track::resolved(media.title, media.stream_url);
        if let Some(duration) = media.duration {
            track = track.with_duration(duration);
        }
        if let Some(page_url) = media.page_url {
            track = track.with_page_url(page_url);
        }
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_youtube_url_detection() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("youtube.com/embed/dQw4w9WgXcQ"));
        assert!(is_youtube_url(
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ"
        ));
        assert!(!is_youtube_url("https://example.com/video"));
        assert!(!is_youtube_url("never gonna give you up"));
    }

    #[test]
    fn test_facebook_url_detection() {
        assert!(is_facebook_url(
            "https://www.facebook.com/somepage/videos/1234567890"
        ));
        assert!(is_facebook_url("https://fb.watch/somepage/v/abc"));
        assert!(!is_facebook_url("https://www.facebook.com/somepage"));
    }

    #[test]
    fn test_classify_and_target() {
        let direct = Query::classify(" https://youtu.be/dQw4w9WgXcQ ");
        assert_eq!(
            direct,
            Query::Direct("https://youtu.be/dQw4w9WgXcQ".to_string())
        );
        assert_eq!(direct.target(), "https://youtu.be/dQw4w9WgXcQ");

        let search = Query::classify("lofi beats");
        assert_eq!(search, Query::Search("lofi beats".to_string()));
        assert_eq!(search.target(), "ytsearch:lofi beats");

        // Other sites are searched, not passed through
        assert!(matches!(
            Query::classify("https://soundcloud.com/artist/song"),
            Query::Search(_)
        ));
    }

    #[tokio::test]
    async fn test_resolve_search_takes_extractor_result() {
        let mut extractor = MockMediaExtractor::new();
        extractor
            .expect_extract()
            .withf(|target: &str| target == "ytsearch:lofi beats")
            .times(1)
            .returning(|_| {
                Ok(ExtractedMedia {
                    title: "Lofi Beats".to_string(),
                    stream_url: "https://cdn.example/audio".to_string(),
                    page_url: Some("https://youtube.com/watch?v=aaaaaaaaaaa".to_string()),
                    duration: Some(Duration::from_secs(125)),
                })
            });

        let resolver = TrackResolver::new(Arc::new(extractor));
        let track = resolver.resolve("lofi beats").await.unwrap();

        assert_eq!(track.title(), "Lofi Beats");
        assert_eq!(track.kind(), SourceKind::Resolved);
        assert_eq!(track.duration(), Some(Duration::from_secs(125)));
        assert_eq!(
            track.page_url(),
            Some("https://youtube.com/watch?v=aaaaaaaaaaa")
        );
        assert!(matches!(
            track.locator(),
            StreamLocator::Remote(url) if url == "https://cdn.example/audio"
        ));
    }

    #[tokio::test]
    async fn test_resolve_surfaces_extractor_error() {
        let mut extractor = MockMediaExtractor::new();
        extractor
            .expect_extract()
            .times(1)
            .returning(|_| Err(BotError::resolution("no results")));

        let resolver = TrackResolver::new(Arc::new(extractor));
        let err = resolver.resolve("does not exist").await.unwrap_err();
        assert_eq!(err, BotError::resolution("no results"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_blank_input_without_extracting() {
        let mut extractor = MockMediaExtractor::new();
        extractor.expect_extract().never();

        let resolver = TrackResolver::new(Arc::new(extractor));
        assert!(matches!(
            resolver.resolve("   ").await,
            Err(BotError::Resolution(_))
        ));
    }
}
