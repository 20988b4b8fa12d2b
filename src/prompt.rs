use serde::{Deserialize, Serialize};

use crate::models::GenerationRequest;

const THINKING_PREFIX: &str = "First, analyze the design requirements and plan the visual strategy. \
Then generate the poster based on your analysis.";
const REFERENCE_CLAUSE: &str = "Use the provided reference image as inspiration for style, \
composition, or color palette.";
const CLOSING_CLAUSE: &str = "high quality poster design, professional typography";

/// Builds the instruction text sent with every item of a batch.
///
/// Segments are joined with `". "` in a fixed order: thinking prefix, user prompt,
/// style reference, reference-image hint, asset requirements, closing clause.
/// Empty optional text counts as absent.
pub fn compose_prompt(req: &GenerationRequest) -> String {
    let mut parts: Vec<String> = Vec::new();

    if req.thinking_mode {
        parts.push(THINKING_PREFIX.to_string());
    }

    parts.push(req.user_prompt.clone());

    if let Some(style) = non_empty(&req.style_prompt) {
        parts.push(format!("Style reference: {style}"));
    }

    if req.reference_image.is_some() {
        parts.push(REFERENCE_CLAUSE.to_string());
    }

    let mut assets = Vec::new();
    if req.logo_image.is_some() {
        assets.push("include a logo in appropriate position".to_string());
    }
    if req.qrcode_image.is_some() {
        assets.push("include a QR code (typically bottom corner)".to_string());
    }
    if let Some(slogan) = non_empty(&req.slogan) {
        assets.push(format!("include slogan text: '{slogan}'"));
    }
    if !req.combo_images.is_empty() {
        assets.push(format!(
            "include all {} provided brand assets in appropriate positions",
            req.combo_images.len()
        ));
    }
    if !assets.is_empty() {
        parts.push(format!("Asset requirements: {}", assets.join(", ")));
    }

    parts.push(CLOSING_CLAUSE.to_string());
    parts.join(". ")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Built-in style presets offered by the poster UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PresetStyle {
    #[default]
    Auto,
    Minimalist,
    Cyberpunk,
    #[serde(rename = "Tech Corporate", alias = "Tech")]
    TechCorporate,
    #[serde(rename = "Warm Illustration", alias = "Hand-drawn")]
    WarmIllustration,
}

impl PresetStyle {
    pub fn keywords(&self) -> Option<&'static str> {
        match self {
            PresetStyle::Auto => None,
            PresetStyle::Minimalist => Some("minimalist design, clean layout, simple geometric shapes, plenty of white space"),
            PresetStyle::Cyberpunk => Some("cyberpunk style, neon colors, futuristic elements, tech-inspired, dark background with bright accents"),
            PresetStyle::TechCorporate => Some("professional business style, modern tech aesthetic, corporate colors, clean and sophisticated"),
            PresetStyle::WarmIllustration => Some("warm hand-drawn illustration style, friendly and approachable, soft colors, artistic touch"),
        }
    }
}

/// Folds the preset style and negative prompt into the user's own text.
pub fn build_user_prompt(prompt: &str, preset: PresetStyle, intensity: f32, negative: Option<&str>) -> String {
    let mut out = prompt.trim().to_string();
    if let Some(keywords) = preset.keywords() {
        out = format!("{out}. Style: {keywords}. Style strength: {intensity}");
    }
    if let Some(neg) = negative.map(str::trim).filter(|s| !s.is_empty()) {
        out = format!("{out}. Avoid: {neg}");
    }
    out
}

/// Text for a follow-up turn built on the previous prompt.
///
/// Fine-tune adjustments use the "Apply these adjustments" form; a lone
/// instruction is appended as is. `None` when there is nothing to apply.
pub fn refine_prompt(previous: &str, instruction: &str, adjustments: &[String]) -> Option<String> {
    let instruction = instruction.trim();
    let mut tune: Vec<&str> = adjustments.iter().map(|a| a.trim()).filter(|a| !a.is_empty()).collect();
    if !tune.is_empty() {
        if !instruction.is_empty() {
            tune.push(instruction);
        }
        return Some(format!("{}. Apply these adjustments: {}", previous.trim(), tune.join(", ")));
    }
    (!instruction.is_empty()).then(|| format!("{}. {}", previous.trim(), instruction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use pretty_assertions::assert_eq;

    fn img() -> DynamicImage {
        DynamicImage::new_rgb8(2, 2)
    }

    #[test]
    fn minimal_prompt_without_thinking() {
        let req = GenerationRequest::new("Coffee shop opening").with_thinking_mode(false);
        assert_eq!(
            compose_prompt(&req),
            "Coffee shop opening. high quality poster design, professional typography"
        );
    }

    #[test]
    fn full_prompt_has_fixed_clause_order() {
        let req = GenerationRequest::new("Summer sale")
            .with_style_prompt("retro palette")
            .with_reference_image(img())
            .with_logo(img())
            .with_qrcode(img())
            .with_slogan("Hot deals")
            .with_combo_images(vec![img(), img()]);

        let expected = format!(
            "{THINKING_PREFIX}. Summer sale. Style reference: retro palette. {REFERENCE_CLAUSE}. \
Asset requirements: include a logo in appropriate position, include a QR code (typically bottom corner), \
include slogan text: 'Hot deals', include all 2 provided brand assets in appropriate positions. {CLOSING_CLAUSE}"
        );
        assert_eq!(compose_prompt(&req), expected);
    }

    #[test]
    fn asset_clause_only_lists_present_assets() {
        let req = GenerationRequest::new("Launch")
            .with_thinking_mode(false)
            .with_qrcode(img())
            .with_slogan("  ");
        assert_eq!(
            compose_prompt(&req),
            "Launch. Asset requirements: include a QR code (typically bottom corner). high quality poster design, professional typography"
        );
    }

    #[test]
    fn composing_twice_is_identical() {
        let req = GenerationRequest::new("Tea festival").with_slogan("Sip slow").with_logo(img());
        assert_eq!(compose_prompt(&req), compose_prompt(&req.clone()));
    }

    #[test]
    fn user_prompt_folds_preset_and_negative() {
        assert_eq!(build_user_prompt("Bakery", PresetStyle::Auto, 0.5, None), "Bakery");
        assert_eq!(
            build_user_prompt("Bakery", PresetStyle::Minimalist, 0.8, Some("blurry text")),
            "Bakery. Style: minimalist design, clean layout, simple geometric shapes, plenty of white space. Style strength: 0.8. Avoid: blurry text"
        );
    }

    #[test]
    fn preset_accepts_short_aliases() {
        let p: PresetStyle = serde_json::from_str("\"Tech\"").unwrap();
        assert_eq!(p, PresetStyle::TechCorporate);
        let p: PresetStyle = serde_json::from_str("\"Hand-drawn\"").unwrap();
        assert_eq!(p, PresetStyle::WarmIllustration);
    }

    #[test]
    fn refine_prompt_forms() {
        assert_eq!(refine_prompt("Tea fair", "make it blue", &[]).as_deref(), Some("Tea fair. make it blue"));
        assert_eq!(
            refine_prompt("Tea fair", "bigger title", &["warmer colours".into(), " ".into(), "more playful".into()]).as_deref(),
            Some("Tea fair. Apply these adjustments: warmer colours, more playful, bigger title")
        );
        assert_eq!(refine_prompt("Tea fair", "  ", &[]), None);
    }
}
