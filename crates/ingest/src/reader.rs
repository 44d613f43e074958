use std::path::{Path, PathBuf};
use tokio::fs;

use crate::image::{ImageInput, is_supported_image};

#[derive(Debug, thiserror::Error)]
pub enum BatchInputError {
    #[error("Failed to read image source {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image source is not a directory: {0:?}")]
    NotADirectory(PathBuf),

    #[error("No images found in batch input")]
    Empty,
}

pub struct FileReader;

impl FileReader {
    pub async fn read_file(path: &Path) -> Result<ImageInput, BatchInputError> {
        let bytes = fs::read(path)
            .await
            .map_err(|source| BatchInputError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;

        let source_id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        let image = ImageInput::new(source_id, bytes);
        tracing::debug!(
            source_id = %image.source_id,
            bytes = image.len(),
            digest = %image.content_digest(),
            "Read image"
        );
        Ok(image)
    }

    /// Read every supported image directly inside `dir`, ordered by file name.
    ///
    /// A file that disappears or cannot be read mid-listing is skipped with a
    /// warning; only an unreadable directory or an empty result fails the batch.
    pub async fn read_directory(dir: &Path) -> Result<Vec<ImageInput>, BatchInputError> {
        let unreadable = |source| BatchInputError::Unreadable {
            path: dir.to_path_buf(),
            source,
        };

        let meta = fs::metadata(dir).await.map_err(unreadable)?;
        if !meta.is_dir() {
            return Err(BatchInputError::NotADirectory(dir.to_path_buf()));
        }

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(dir).await.map_err(unreadable)?;

        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_supported_image(&name) {
                paths.push(path);
            }
        }

        paths.sort();

        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::read_file(&path).await {
                Ok(image) => images.push(image),
                Err(e) => tracing::warn!(path = ?path, error = %e, "Skipping unreadable image"),
            }
        }

        if images.is_empty() {
            return Err(BatchInputError::Empty);
        }

        Ok(images)
    }
}
