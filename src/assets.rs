use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::info;

use crate::{error::{validate_name, StoreError}, models::AssetListing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[serde(alias = "logos")]
    Logo,
    #[serde(alias = "qrcodes")]
    QrCode,
}

impl AssetKind {
    fn dir_name(&self) -> &'static str {
        match self {
            AssetKind::Logo => "logos",
            AssetKind::QrCode => "qrcodes",
        }
    }
}

/// Saved brand assets, stored as PNG under `{root}/logos` and `{root}/qrcodes`.
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    root: PathBuf,
}

impl AssetLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, kind: AssetKind, name: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(kind.dir_name()).join(format!("{}.png", validate_name(name)?)))
    }

    pub fn save(&self, kind: AssetKind, name: &str, image: &DynamicImage) -> Result<(), StoreError> {
        let path = self.path_for(kind, name)?;
        fs::create_dir_all(self.root.join(kind.dir_name()))?;
        image.save_with_format(&path, ImageFormat::Png)?;
        info!("🏷️ Saved {:?} asset: {}", kind, name);
        Ok(())
    }

    pub fn load(&self, kind: AssetKind, name: &str) -> Result<Option<DynamicImage>, StoreError> {
        let path = self.path_for(kind, name)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(image::open(&path)?))
    }

    /// Asset names of one kind, sorted.
    pub fn list(&self, kind: AssetKind) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(kind.dir_name());
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("png") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// The first saved asset of a kind, used when a request opts into saved assets.
    pub fn first(&self, kind: AssetKind) -> Result<Option<DynamicImage>, StoreError> {
        match self.list(kind)?.first() {
            Some(name) => self.load(kind, name),
            None => Ok(None),
        }
    }

    pub fn delete(&self, kind: AssetKind, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(kind, name)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        info!("🗑️ Deleted {:?} asset: {}", kind, name);
        Ok(true)
    }

    pub fn listing(&self) -> Result<AssetListing, StoreError> {
        Ok(AssetListing { logos: self.list(AssetKind::Logo)?, qrcodes: self.list(AssetKind::QrCode)? })
    }
}
