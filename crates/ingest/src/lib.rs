pub mod image;
pub mod reader;

pub use image::{ImageInput, content_digest};
pub use reader::{BatchInputError, FileReader};

use std::path::Path;

/// Load every image of a folder as one batch
pub async fn ingest_directory(dir_path: &Path) -> Result<Vec<ImageInput>, BatchInputError> {
    let images = FileReader::read_directory(dir_path).await?;
    tracing::info!(dir = ?dir_path, images = images.len(), "Loaded image batch");
    Ok(images)
}

/// Build a batch from in-memory uploads (name, bytes).
///
/// Uploads whose name is not a supported image are ignored, the same as in a folder.
pub fn ingest_uploads<I>(uploads: I) -> Result<Vec<ImageInput>, BatchInputError>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let images: Vec<ImageInput> = uploads
        .into_iter()
        .filter(|(name, _)| image::is_supported_image(name))
        .map(|(name, bytes)| ImageInput::new(name, bytes))
        .collect();

    if images.is_empty() {
        return Err(BatchInputError::Empty);
    }

    Ok(images)
}
