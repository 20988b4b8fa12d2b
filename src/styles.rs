use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::{info, warn};

use crate::error::{validate_name, StoreError};

/// A prompt preset saved from an earlier generation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SavedStyle {
    pub name: String,
    pub user_prompt: String,
    pub aspect_ratio: String,
    pub thinking_mode: bool,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// One JSON file per style under a single directory.
#[derive(Debug, Clone)]
pub struct StyleLibrary {
    dir: PathBuf,
}

impl StyleLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        Ok(self.dir.join(format!("{}.json", validate_name(name)?)))
    }

    pub fn save(
        &self,
        name: &str,
        user_prompt: &str,
        aspect_ratio: &str,
        thinking_mode: bool,
        description: &str,
    ) -> Result<SavedStyle, StoreError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)?;
        let style = SavedStyle {
            name: validate_name(name)?.to_string(),
            user_prompt: user_prompt.to_string(),
            aspect_ratio: aspect_ratio.to_string(),
            thinking_mode,
            description: description.to_string(),
            created_at: Utc::now(),
        };
        fs::write(&path, serde_json::to_vec_pretty(&style)?)?;
        info!("🎨 Style saved: {}", style.name);
        Ok(style)
    }

    pub fn load(&self, name: &str) -> Result<Option<SavedStyle>, StoreError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&fs::read(&path)?)?))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.exists()).unwrap_or(false)
    }

    /// Newest first.
    pub fn list(&self) -> Result<Vec<SavedStyle>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut styles = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read(&path).map_err(StoreError::from).and_then(|b| Ok(serde_json::from_slice::<SavedStyle>(&b)?)) {
                Ok(style) => styles.push(style),
                Err(e) => warn!("⚠️ Skipping unreadable style {}: {}", path.display(), e),
            }
        }
        styles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(styles)
    }

    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        info!("🗑️ Style deleted: {}", name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn save_load_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let lib = StyleLibrary::new(dir.path().join("styles"));

        assert!(lib.list().unwrap().is_empty());
        assert_eq!(lib.load("neon").unwrap(), None);

        let first = lib.save("neon", "neon city night", "9:16", true, "bright").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        lib.save("calm", "pastel morning", "1:1", false, "").unwrap();

        assert!(lib.exists("neon"));
        assert_eq!(lib.load("neon").unwrap(), Some(first));

        let names: Vec<String> = lib.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["calm", "neon"]);

        assert!(lib.delete("neon").unwrap());
        assert!(!lib.delete("neon").unwrap());
        assert!(!lib.exists("neon"));
    }

    #[test]
    fn list_skips_garbage_files() {
        let dir = tempfile::tempdir().unwrap();
        let lib = StyleLibrary::new(dir.path());
        lib.save("ok", "p", "9:16", true, "").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        assert_eq!(lib.list().unwrap().len(), 1);
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let lib = StyleLibrary::new(dir.path());
        assert!(matches!(lib.save("../x", "p", "9:16", true, ""), Err(StoreError::InvalidName(_))));
        assert!(!lib.exists("../x"));
    }
}
