use std::path::PathBuf;

use crate::IngestError;

/// Keeps the original photograph behind each accepted recognition.
#[async_trait::async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Stores `bytes` and returns an opaque reference to them.
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<String, IngestError>;
}

/// URL path segment evidence files are served under. References handed to
/// callers start with it, wherever the files live on disk.
pub const PUBLIC_PREFIX: &str = "uploads";

/// Content-addressed evidence files under one directory.
///
/// The reference is `uploads/meter-<hash>.<ext>`, so the same photograph
/// uploaded twice maps to the same file.
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    dir: PathBuf,
}

impl FsEvidenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name(bytes: &[u8], extension: &str) -> String {
        let hash = blake3::hash(bytes).to_hex();
        let ext: String = extension
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(5)
            .collect::<String>()
            .to_ascii_lowercase();
        let ext = if ext.is_empty() { "img".to_string() } else { ext };
        format!("meter-{}.{ext}", &hash.as_str()[..16])
    }
}

#[async_trait::async_trait]
impl EvidenceStore for FsEvidenceStore {
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<String, IngestError> {
        let name = Self::file_name(bytes, extension);
        let path = self.dir.join(&name);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| IngestError::StoreUnavailable(format!("cannot create evidence dir: {e}")))?;

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|e| IngestError::StoreUnavailable(format!("cannot write evidence {name}: {e}")))?;
        }

        let reference = format!("{PUBLIC_PREFIX}/{name}");
        tracing::debug!(evidence = %reference, bytes = bytes.len(), "stored evidence image");
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_content_addressed_and_sanitized() {
        let a = FsEvidenceStore::file_name(b"photo-a", "JPG");
        let b = FsEvidenceStore::file_name(b"photo-a", "jpg");
        let c = FsEvidenceStore::file_name(b"photo-b", "jpg");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("meter-") && a.ends_with(".jpg"));
        assert!(FsEvidenceStore::file_name(b"x", "../..").ends_with(".img"));
    }

    #[tokio::test]
    async fn put_writes_once_and_returns_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path().join("uploads"));

        let first = store.put(b"meter photo", "png").await.unwrap();
        let second = store.put(b"meter photo", "png").await.unwrap();

        assert_eq!(first, second);
        let name = first.strip_prefix("uploads/").unwrap();
        assert_eq!(std::fs::read(dir.path().join("uploads").join(name)).unwrap(), b"meter photo");
    }

    #[tokio::test]
    async fn reference_does_not_leak_the_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path().join("evidence"));

        let reference = store.put(b"meter photo", "jpg").await.unwrap();

        assert!(reference.starts_with("uploads/meter-"), "{reference}");
        assert!(!reference.contains(&*dir.path().to_string_lossy()));
        let name = reference.trim_start_matches("uploads/");
        assert!(dir.path().join("evidence").join(name).exists());
    }
}
