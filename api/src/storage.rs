use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Artifact directories under the storage root, served as static files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Audio,
    Scenario,
    Avatar,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Audio,
        ArtifactKind::Scenario,
        ArtifactKind::Avatar,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Audio => "audio",
            ArtifactKind::Scenario => "scenarios",
            ArtifactKind::Avatar => "avatars",
        }
    }
}

/// A file newly claimed in the store.
#[derive(Debug)]
pub struct NewArtifact {
    pub file: fs::File,
    pub path: PathBuf,
}

/// Filesystem store for generated audio, scenario and avatar files.
///
/// File names are derived from content hash and timestamp, so a file that
/// already exists is treated as produced and left untouched.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn path(&self, kind: ArtifactKind, filename: &str) -> PathBuf {
        self.dir(kind).join(filename)
    }

    /// Public URL under which the static file router serves an artifact.
    pub fn url(kind: ArtifactKind, filename: &str) -> String {
        format!("/{}/{filename}", kind.dir_name())
    }

    pub async fn ensure_layout(&self) -> io::Result<()> {
        for kind in ArtifactKind::ALL {
            fs::create_dir_all(self.dir(kind)).await?;
        }
        Ok(())
    }

    /// Claim `filename` for writing. `None` if the file already exists.
    pub async fn create_new(
        &self,
        kind: ArtifactKind,
        filename: &str,
    ) -> io::Result<Option<NewArtifact>> {
        fs::create_dir_all(self.dir(kind)).await?;
        let path = self.path(kind, filename);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => Ok(Some(NewArtifact { file, path })),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Write `bytes` unless the file already exists. Returns the file size.
    pub async fn write_new(
        &self,
        kind: ArtifactKind,
        filename: &str,
        bytes: &[u8],
    ) -> io::Result<u64> {
        match self.create_new(kind, filename).await? {
            Some(NewArtifact { mut file, .. }) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                Ok(bytes.len() as u64)
            }
            None => self.size_of(kind, filename).await,
        }
    }

    pub async fn size_of(&self, kind: ArtifactKind, filename: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.path(kind, filename)).await?.len())
    }

    /// Remove a partially written file; missing files are fine.
    pub async fn discard(&self, kind: ArtifactKind, filename: &str) {
        if let Err(err) = fs::remove_file(self.path(kind, filename)).await {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    file = filename,
                    error = %err,
                    "Could not remove partial artifact"
                );
            }
        }
    }
}

/// `{prefix}_{label}_{YYYYmmdd_HHMMSS}_{hash8}.{extension}`, where `hash8` is
/// the first eight hex digits of the SHA-256 of `content`.
pub fn artifact_name(
    prefix: &str,
    label: &str,
    content: &str,
    extension: &str,
    at: DateTime<Utc>,
) -> String {
    let digest = hex::encode(Sha256::digest(content.as_bytes()));
    format!(
        "{prefix}_{label}_{}_{}.{extension}",
        at.format("%Y%m%d_%H%M%S"),
        &digest[..8]
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn artifact_name_combines_timestamp_and_content_hash() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let a = artifact_name("speech", "calm", "move forward", "mp3", at);
        let b = artifact_name("speech", "calm", "turn left", "mp3", at);
        assert!(a.starts_with("speech_calm_20260314_092653_"));
        assert!(a.ends_with(".mp3"));
        assert_eq!(a.len(), "speech_calm_20260314_092653_".len() + 8 + 4);
        assert_ne!(a, b);
        assert_eq!(a, artifact_name("speech", "calm", "move forward", "mp3", at));
    }

    #[tokio::test]
    async fn existing_file_is_treated_as_produced() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.ensure_layout().await.unwrap();

        let size = store
            .write_new(ArtifactKind::Audio, "a.txt", b"first")
            .await
            .unwrap();
        assert_eq!(size, 5);

        let size = store
            .write_new(ArtifactKind::Audio, "a.txt", b"second write")
            .await
            .unwrap();
        assert_eq!(size, 5);
        let on_disk = std::fs::read(store.path(ArtifactKind::Audio, "a.txt")).unwrap();
        assert_eq!(on_disk, b"first");
        assert!(store.create_new(ArtifactKind::Audio, "a.txt").await.unwrap().is_none());
    }

    #[test]
    fn urls_follow_the_static_mounts() {
        assert_eq!(
            ArtifactStore::url(ArtifactKind::Scenario, "s.json"),
            "/scenarios/s.json"
        );
    }
}
