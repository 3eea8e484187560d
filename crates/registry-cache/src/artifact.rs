use crate::error::CacheError;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

const MAX_ARTIFACT_BYTES: usize = 50 * 1024 * 1024;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/zip",
    "application/pdf",
    "application/xml",
    "text/xml",
    "application/json",
];

/// Binary-artifact store contract: a blob store, writable
/// by the core, referenced by path, private, 50 MiB max, archive/structured
/// -markup MIME types only.
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, path: &str, mime_type: &str, bytes: &[u8]) -> Result<(), CacheError>;
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CacheError>;
}

/// Default filesystem-backed implementation. Objects live under a root
/// directory, addressed by the `/<identifier>/annual-reports/<year>/<filename>`
/// path convention.
pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn put(&self, path: &str, mime_type: &str, bytes: &[u8]) -> Result<(), CacheError> {
        if bytes.len() > MAX_ARTIFACT_BYTES {
            return Err(CacheError::ArtifactTooLarge);
        }
        if !ALLOWED_MIME_TYPES.contains(&mime_type) {
            return Err(CacheError::ArtifactTypeRejected(mime_type.to_string()));
        }

        let full_path = self.resolve(path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::ArtifactIo(e.to_string()))?;
        }

        let mut file = tokio::fs::File::create(&full_path)
            .await
            .map_err(|e| CacheError::ArtifactIo(e.to_string()))?;
        file.write_all(bytes)
            .await
            .map_err(|e| CacheError::ArtifactIo(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let full_path = self.resolve(path);
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::ArtifactIo(e.to_string())),
        }
    }
}

/// Builds the conventional artifact path for an annual report document.
pub fn annual_report_path(identifier: &str, year: i32, filename: &str) -> String {
    format!("/{identifier}/annual-reports/{year}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_small_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(dir.path());
        let path = annual_report_path("5560001712", 2023, "report.zip");

        store.put(&path, "application/zip", b"zip-bytes").await.unwrap();
        let bytes = store.get(&path).await.unwrap().unwrap();
        assert_eq!(bytes, b"zip-bytes");
    }

    #[tokio::test]
    async fn rejects_oversized_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(dir.path());
        let oversized = vec![0u8; MAX_ARTIFACT_BYTES + 1];
        let result = store.put("/x/annual-reports/2023/r.zip", "application/zip", &oversized).await;
        assert!(matches!(result, Err(CacheError::ArtifactTooLarge)));
    }

    #[tokio::test]
    async fn rejects_disallowed_mime_types() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(dir.path());
        let result = store.put("/x/annual-reports/2023/r.exe", "application/x-msdownload", b"x").await;
        assert!(matches!(result, Err(CacheError::ArtifactTypeRejected(_))));
    }

    #[tokio::test]
    async fn missing_artifact_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemArtifactStore::new(dir.path());
        assert!(store.get("/nope").await.unwrap().is_none());
    }
}
