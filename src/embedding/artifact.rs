//! Fetching the embedding artifact at startup.
//!
//! The artifact is either already on disk or published at a URL. Remote
//! artifacts are downloaded to a local path first and then loaded from
//! there, so a restart can reuse the cached copy.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{EmbeddingError, EmbeddingResult, EmbeddingTable};

/// Where the embedding artifact comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// A JSON file already on disk
    Local(PathBuf),

    /// A URL to download into `cache_path` before loading
    Remote { url: String, cache_path: PathBuf },
}

impl ArtifactSource {
    /// Resolve the artifact into a loaded table.
    ///
    /// # Errors
    /// Returns `EmbeddingError::ArtifactUnavailable` when the download or
    /// read fails, or a validation error when the content is malformed.
    pub async fn load(&self) -> EmbeddingResult<EmbeddingTable> {
        match self {
            ArtifactSource::Local(path) => EmbeddingTable::load(path),
            ArtifactSource::Remote { url, cache_path } => {
                download_artifact(url, cache_path).await?;
                EmbeddingTable::load(cache_path)
            }
        }
    }
}

/// Download an artifact over HTTP and write it to `dest`.
///
/// # Errors
/// Returns `EmbeddingError::ArtifactUnavailable` on network errors,
/// non-success status codes or write failures.
pub async fn download_artifact(url: &str, dest: &Path) -> EmbeddingResult<()> {
    info!("Downloading embedding artifact from {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| EmbeddingError::ArtifactUnavailable(format!("{}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EmbeddingError::ArtifactUnavailable(format!(
            "{} returned HTTP {}",
            url, status
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| EmbeddingError::ArtifactUnavailable(format!("{}: {}", url, e)))?;
    debug!("Fetched {} bytes", bytes.len());

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                EmbeddingError::ArtifactUnavailable(format!("{}: {}", parent.display(), e))
            })?;
        }
    }

    tokio::fs::write(dest, &bytes)
        .await
        .map_err(|e| EmbeddingError::ArtifactUnavailable(format!("{}: {}", dest.display(), e)))?;

    info!("Embedding artifact saved to {}", dest.display());
    Ok(())
}
