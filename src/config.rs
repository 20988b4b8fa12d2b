use std::{env, path::PathBuf, time::Duration};

use crate::orchestrator::GenerationSettings;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_IMAGE_SIZE: &str = "2K";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model_id: String,
    pub resolution_tier: String,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
    pub styles_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub max_images: usize,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model_id: DEFAULT_MODEL.to_string(),
            resolution_tier: DEFAULT_IMAGE_SIZE.to_string(),
            request_timeout: Duration::from_secs(120),
            output_dir: PathBuf::from("generated_posters"),
            styles_dir: PathBuf::from("styles"),
            assets_dir: PathBuf::from("assets"),
            sessions_dir: PathBuf::from("sessions"),
            max_images: 8,
            port: 8000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable values keep their defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            api_key: non_empty("GOOGLE_API_KEY").or_else(|| non_empty("GEMINI_API_KEY")),
            api_base: non_empty("GEMINI_API_BASE").unwrap_or(d.api_base),
            model_id: non_empty("POSTER_MODEL").unwrap_or(d.model_id),
            resolution_tier: non_empty("POSTER_IMAGE_SIZE").unwrap_or(d.resolution_tier),
            request_timeout: non_empty("POSTER_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(d.request_timeout),
            output_dir: non_empty("POSTER_OUTPUT_DIR").map(PathBuf::from).unwrap_or(d.output_dir),
            styles_dir: non_empty("POSTER_STYLES_DIR").map(PathBuf::from).unwrap_or(d.styles_dir),
            assets_dir: non_empty("POSTER_ASSETS_DIR").map(PathBuf::from).unwrap_or(d.assets_dir),
            sessions_dir: non_empty("POSTER_SESSIONS_DIR").map(PathBuf::from).unwrap_or(d.sessions_dir),
            max_images: non_empty("POSTER_MAX_IMAGES")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(d.max_images),
            port: non_empty("PORT").and_then(|v| v.parse().ok()).unwrap_or(d.port),
        }
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            api_key: self.api_key.clone(),
            model_id: self.model_id.clone(),
            resolution_tier: self.resolution_tier.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.api_key, None);
        assert_eq!(cfg.model_id, DEFAULT_MODEL);
        assert_eq!(cfg.resolution_tier, "2K");
        assert_eq!(cfg.max_images, 8);
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.output_dir, PathBuf::from("generated_posters"));
    }

    #[test]
    fn reads_overrides_and_falls_back_on_bad_values() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "gem"),
            ("POSTER_IMAGE_SIZE", "4K"),
            ("POSTER_MAX_IMAGES", "0"),
            ("POSTER_REQUEST_TIMEOUT_SECS", "30"),
            ("PORT", "not-a-port"),
        ]));
        assert_eq!(cfg.api_key.as_deref(), Some("gem"));
        assert_eq!(cfg.resolution_tier, "4K");
        assert_eq!(cfg.max_images, 8);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.port, 8000);
    }

    #[test]
    fn google_key_takes_precedence() {
        let cfg = AppConfig::from_lookup(lookup(&[("GOOGLE_API_KEY", "g"), ("GEMINI_API_KEY", "x")]));
        assert_eq!(cfg.generation_settings().api_key.as_deref(), Some("g"));
    }
}
