use async_trait::async_trait;
use chrono::Local;
use image::{DynamicImage, ImageFormat};
use std::fs::OpenOptions;
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error writing {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to encode {path}: {source}")]
    Encode { path: PathBuf, source: image::ImageError },
    #[error("persist task failed: {0}")]
    Task(String),
}

/// Durable storage for successful items.
#[async_trait]
pub trait ImagePersister: Send + Sync {
    /// `index` is the zero-based loop position of the item.
    async fn persist(&self, image: &DynamicImage, index: usize) -> Result<PathBuf, PersistError>;
}

/// Writes `poster_{timestamp}_{n}.png` files into a directory created on demand.
#[derive(Debug, Clone)]
pub struct FsImagePersister {
    output_dir: PathBuf,
}

impl FsImagePersister {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }
}

pub fn poster_file_name(timestamp: &str, index: usize) -> String {
    format!("poster_{}_{}.png", timestamp, index + 1)
}

/// Encodes `image` as PNG and writes it under `dir` without ever replacing an existing file.
///
/// A name already taken gets a short random suffix.
fn write_poster(dir: &Path, timestamp: &str, image: &DynamicImage, index: usize) -> Result<PathBuf, PersistError> {
    std::fs::create_dir_all(dir).map_err(|source| PersistError::Io { path: dir.to_path_buf(), source })?;

    let mut path = dir.join(poster_file_name(timestamp, index));
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|source| PersistError::Encode { path: path.clone(), source })?;

    let first_try = OpenOptions::new().write(true).create_new(true).open(&path);
    let file = match first_try {
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let suffix = Uuid::new_v4().simple().to_string();
            let taken = path;
            path = dir.join(format!("poster_{}_{}_{}.png", timestamp, index + 1, &suffix[..8]));
            warn!("⚠️ {} already exists, writing {}", taken.display(), path.display());
            OpenOptions::new().write(true).create_new(true).open(&path)
        }
        other => other,
    };
    file.and_then(|mut f| f.write_all(&png))
        .map_err(|source| PersistError::Io { path: path.clone(), source })?;
    Ok(path)
}

#[async_trait]
impl ImagePersister for FsImagePersister {
    async fn persist(&self, image: &DynamicImage, index: usize) -> Result<PathBuf, PersistError> {
        let dir = self.output_dir.clone();
        let image = image.clone();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S%3f").to_string();

        let path = tokio::task::spawn_blocking(move || write_poster(&dir, &timestamp, &image, index))
            .await
            .map_err(|e| PersistError::Task(e.to_string()))??;

        info!("💾 Saved poster: {}", path.display());
        Ok(path)
    }
}
