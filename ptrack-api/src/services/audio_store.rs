//! Audio payload storage
//!
//! Uploaded audio lands in the root folder's `uploads/` directory under a
//! server-chosen name `voice-journal-{owner}-{millis}{ext}` and is served at
//! `/uploads/{name}`. Client file names only contribute a sanitized
//! extension, and URL → path resolution accepts bare file names only.

use chrono::Utc;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::collaborators::AudioPayload;

/// URL prefix under which stored audio is served
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Extension used when the client gave none (or an unusable one)
pub const DEFAULT_EXTENSION: &str = ".webm";

const MAX_EXTENSION_LEN: usize = 8;
const MAX_NAME_ATTEMPTS: i64 = 1000;

/// A persisted audio payload
#[derive(Debug, Clone)]
pub struct StoredAudio {
    pub file_name: String,
    pub url: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

/// Extension (with leading dot) taken from a client file name, or the default
pub fn safe_extension(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Write `bytes` under a fresh collision-free name for `owner_id`
    pub async fn persist(
        &self,
        owner_id: i64,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> io::Result<StoredAudio> {
        let ext = safe_extension(original_name);
        let base_millis = Utc::now().timestamp_millis();

        for offset in 0..MAX_NAME_ATTEMPTS {
            let file_name = format!("voice-journal-{}-{}{}", owner_id, base_millis + offset, ext);
            let path = self.dir.join(&file_name);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };

            if let Err(e) = write_all(&mut file, bytes).await {
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(e);
            }

            tracing::debug!(
                owner_id,
                file = %file_name,
                bytes = bytes.len(),
                "Stored audio payload"
            );

            return Ok(StoredAudio {
                url: format!("{}/{}", UPLOADS_URL_PREFIX, file_name),
                file_name,
                path,
            });
        }

        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("No free audio file name for owner {}", owner_id),
        ))
    }

    /// Resolve a stored `/uploads/{name}` URL to its file path
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let name = url
            .strip_prefix(UPLOADS_URL_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))?;
        is_plain_file_name(name).then(|| self.dir.join(name))
    }

    fn resolve(&self, url: &str) -> io::Result<(String, PathBuf)> {
        let path = self.path_for_url(url).ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("Not a stored audio URL: {}", url),
            )
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok((file_name, path))
    }

    /// Load a stored payload for transcription
    pub async fn read(&self, url: &str) -> io::Result<AudioPayload> {
        let (file_name, path) = self.resolve(url)?;
        let bytes = fs::read(&path).await?;
        Ok(AudioPayload { file_name, bytes })
    }

    /// Remove a stored payload; `Ok(false)` when it was already gone
    pub async fn delete(&self, url: &str) -> io::Result<bool> {
        let (_, path) = self.resolve(url)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

async fn write_all(file: &mut fs::File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_safe_extension() {
        assert_eq!(safe_extension(Some("memo.MP3")), ".mp3");
        assert_eq!(safe_extension(Some("recording.webm")), ".webm");
        assert_eq!(safe_extension(Some("blob")), ".webm");
        assert_eq!(safe_extension(None), ".webm");
        assert_eq!(safe_extension(Some("x.we/bm")), ".webm");
        assert_eq!(safe_extension(Some("x.averyverylongext")), ".webm");
        assert_eq!(safe_extension(Some("../../etc/passwd")), ".webm");
    }

    #[test]
    fn test_path_for_url_rejects_traversal() {
        let store = AudioStore::new("/data/uploads");
        assert_eq!(
            store.path_for_url("/uploads/voice-journal-1-5.webm"),
            Some(PathBuf::from("/data/uploads/voice-journal-1-5.webm"))
        );
        assert_eq!(store.path_for_url("/uploads/../ptrack.db"), None);
        assert_eq!(store.path_for_url("/uploads/.."), None);
        assert_eq!(store.path_for_url("/uploads/"), None);
        assert_eq!(store.path_for_url("/elsewhere/a.webm"), None);
        assert_eq!(store.path_for_url("/uploadsx/a.webm"), None);
    }

    #[tokio::test]
    async fn test_persist_read_delete() {
        let dir = TempDir::new().unwrap();
        let store = AudioStore::new(dir.path());

        let stored = store
            .persist(7, Some("../sneaky name.Ogg"), b"OggS-bytes")
            .await
            .unwrap();
        assert!(stored.file_name.starts_with("voice-journal-7-"));
        assert!(stored.file_name.ends_with(".ogg"));
        assert_eq!(stored.url, format!("/uploads/{}", stored.file_name));
        assert_eq!(stored.path.parent(), Some(dir.path()));

        let payload = store.read(&stored.url).await.unwrap();
        assert_eq!(payload.bytes, b"OggS-bytes");
        assert_eq!(payload.file_name, stored.file_name);

        assert!(store.delete(&stored.url).await.unwrap());
        assert!(!store.delete(&stored.url).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_millisecond_uploads_get_distinct_names() {
        let dir = TempDir::new().unwrap();
        let store = AudioStore::new(dir.path());

        let mut names = std::collections::HashSet::new();
        for _ in 0..5 {
            let stored = store.persist(1, None, b"x").await.unwrap();
            assert!(names.insert(stored.file_name));
        }
    }
}
