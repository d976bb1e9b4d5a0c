use bytes::Bytes;
use std::path::PathBuf;
use tracing::info;
use url::Url;

use super::Track;
use crate::error::BotError;

/// File extensions accepted by the `file` command.
pub const AUDIO_EXTENSIONS: [&str; 5] = [".mp3", ".wav", ".ogg", ".m4a", ".flac"];

pub fn is_audio_filename(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Downloads chat attachments into temporary files.
#[derive(Clone)]
pub struct AttachmentFetcher {
    http: reqwest::Client,
    dir: PathBuf,
}

impl AttachmentFetcher {
    pub fn new(http: reqwest::Client, dir: PathBuf) -> Self {
        Self { http, dir }
    }

    /// Validates and downloads an uploaded audio file.
    pub async fn fetch(&self, filename: &str, url: &str) -> Result<Track, BotError> {
        if !is_audio_filename(filename) {
            return Err(BotError::validation("Please upload a valid audio file!"));
        }

        let url = Url::parse(url)
            .map_err(|e| BotError::upload(format!("invalid attachment URL: {e}")))?;
        let bytes = self.download(url).await?;
        self.store(filename, &bytes).await
    }

    async fn download(&self, url: Url) -> Result<Bytes, BotError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BotError::upload(format!("download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(BotError::upload(format!(
                "download failed with status {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| BotError::upload(format!("download failed: {e}")))
    }

    /// Writes the bytes to a temporary file that lives as long as the track.
    async fn store(&self, filename: &str, bytes: &[u8]) -> Result<Track, BotError> {
        let suffix = filename
            .rfind('.')
            .map(|idx| filename[idx..].to_lowercase())
            .unwrap_or_default();

        let path = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)
            .map_err(|e| BotError::upload(format!("could not create temp file: {e}")))?
            .into_temp_path();

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| BotError::upload(format!("could not store upload: {e}")))?;

        info!("📎 Stored upload {} at {}", filename, path.display());
        Ok(Track::uploaded(filename, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{SourceKind, StreamLocator};

    #[test]
    fn test_audio_extension_check() {
        assert!(is_audio_filename("song.mp3"));
        assert!(is_audio_filename("SONG.FLAC"));
        assert!(is_audio_filename("mix.final.m4a"));
        assert!(!is_audio_filename("cover.png"));
        assert!(!is_audio_filename("mp3"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_audio_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AttachmentFetcher::new(reqwest::Client::new(), dir.path().to_path_buf());

        let err = fetcher
            .fetch("notes.txt", "https://cdn.example/notes.txt")
            .await
            .unwrap_err();
        assert_eq!(err, BotError::validation("Please upload a valid audio file!"));
    }

    #[tokio::test]
    async fn test_bad_attachment_url_reports_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AttachmentFetcher::new(reqwest::Client::new(), dir.path().to_path_buf());

        let err = fetcher.fetch("song.mp3", "not a url").await.unwrap_err();
        assert!(matches!(err, BotError::Upload(_)));
        assert!(err.to_string().starts_with("Error playing file: invalid attachment URL"));
    }

    #[tokio::test]
    async fn test_stored_upload_is_removed_with_last_track() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AttachmentFetcher::new(reqwest::Client::new(), dir.path().to_path_buf());

        let track = fetcher.store("Clip.OGG", b"OggS").await.unwrap();
        assert_eq!(track.title(), "Clip.OGG");
        assert_eq!(track.kind(), SourceKind::UploadedFile);

        let StreamLocator::Local(stored) = track.locator() else {
            panic!("expected a local file, got {:?}", track.locator());
        };
        let path = stored.to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("ogg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"OggS");

        let queued_copy = track.clone();
        drop(track);
        assert!(path.exists());
        drop(queued_copy);
        assert!(!path.exists());
    }
}
