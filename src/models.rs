use serde::{Serialize, Deserialize};
use image::DynamicImage;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{classify::FailureCategory, error::GenerationError, prompt::PresetStyle};

/// Everything one batch needs. Built once per call and never mutated by the pipeline.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub user_prompt: String,
    pub aspect_ratio: String,
    pub count: usize,
    pub thinking_mode: bool,
    pub reference_image: Option<DynamicImage>,
    pub style_prompt: Option<String>,
    pub logo_image: Option<DynamicImage>,
    pub qrcode_image: Option<DynamicImage>,
    pub slogan: Option<String>,
    pub combo_images: Vec<DynamicImage>,
}

impl GenerationRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            aspect_ratio: default_aspect_ratio(),
            count: 1,
            thinking_mode: true,
            reference_image: None,
            style_prompt: None,
            logo_image: None,
            qrcode_image: None,
            slogan: None,
            combo_images: Vec::new(),
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = aspect_ratio.into();
        self
    }

    pub fn with_thinking_mode(mut self, on: bool) -> Self {
        self.thinking_mode = on;
        self
    }

    pub fn with_reference_image(mut self, image: DynamicImage) -> Self {
        self.reference_image = Some(image);
        self
    }

    pub fn with_style_prompt(mut self, style: impl Into<String>) -> Self {
        self.style_prompt = Some(style.into());
        self
    }

    pub fn with_logo(mut self, image: DynamicImage) -> Self {
        self.logo_image = Some(image);
        self
    }

    pub fn with_qrcode(mut self, image: DynamicImage) -> Self {
        self.qrcode_image = Some(image);
        self
    }

    pub fn with_slogan(mut self, slogan: impl Into<String>) -> Self {
        self.slogan = Some(slogan.into());
        self
    }

    pub fn with_combo_images(mut self, images: Vec<DynamicImage>) -> Self {
        self.combo_images = images;
        self
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.user_prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("prompt must not be empty".into()));
        }
        if self.count == 0 {
            return Err(GenerationError::InvalidRequest("count must be at least 1".into()));
        }
        Ok(())
    }
}

/// A generated image and where it was written.
#[derive(Debug, Clone)]
pub struct Poster {
    pub image: DynamicImage,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Successful posters in completion order.
    pub posters: Vec<Poster>,
    pub attempted: usize,
    pub primary_error: Option<FailureCategory>,
}

impl GenerationResult {
    pub fn is_partial(&self) -> bool {
        self.posters.len() < self.attempted
    }

    pub fn message(&self) -> String {
        let ok = self.posters.len();
        match self.primary_error {
            Some(category) if self.is_partial() => format!(
                "Generated {ok} of {} posters; {} failed, mostly because {}",
                self.attempted,
                self.attempted - ok,
                category.describe()
            ),
            _ => format!("Generated {ok} posters"),
        }
    }
}

// --- HTTP payloads ---

pub fn default_aspect_ratio() -> String { "9:16".to_string() }
fn default_count() -> usize { 1 }
fn default_intensity() -> f32 { 0.5 }
fn default_true() -> bool { true }

/// Styling and brand-asset options shared by generation and refinement.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PosterOptions {
    #[serde(default)]
    pub preset_style: PresetStyle,
    #[serde(default = "default_intensity")]
    pub style_intensity: f32,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub style_name: Option<String>, // saved style from the style library
    #[serde(default)]
    pub logo_image: Option<String>, // base64, data URL prefix allowed
    #[serde(default)]
    pub qrcode_image: Option<String>,
    #[serde(default)]
    pub use_saved_logo: bool,
    #[serde(default)]
    pub use_saved_qrcode: bool,
    #[serde(default)]
    pub slogan: Option<String>,
    #[serde(default)]
    pub combo_images: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_true")]
    pub thinking_mode: bool,
    #[serde(default)]
    pub reference_image: Option<String>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(flatten)]
    pub options: PosterOptions,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateResponse {
    pub success: bool,
    pub images: Vec<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<FailureCategory>,
    pub session_id: Uuid,
}

/// Builds on the session's last turn.
///
/// `adjustments` are fine-tune picks (colour, style, text); `image_index` selects
/// one of the last turn's posters as the reference image.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefineRequest {
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub adjustments: Vec<String>,
    #[serde(default)]
    pub image_index: Option<usize>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub thinking_mode: Option<bool>,
    #[serde(flatten)]
    pub options: PosterOptions,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SaveStyleRequest {
    pub name: String,
    pub user_prompt: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_true")]
    pub thinking_mode: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AssetUpload {
    pub image: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AssetListing {
    pub logos: Vec<String>,
    pub qrcodes: Vec<String>,
}
