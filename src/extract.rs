use image::DynamicImage;
use tracing::{info, warn};

use crate::gemini::ModelResponse;

/// First part that decodes to an image, or `None` if nothing does.
///
/// A part whose bytes fail to decode is logged and skipped. An empty result is
/// not an error here; the orchestrator treats it as a filtered response.
pub fn extract_first_image(response: &ModelResponse) -> Option<DynamicImage> {
    for (idx, part) in response.parts.iter().enumerate() {
        let Some(inline) = &part.inline_data else { continue };
        match image::load_from_memory(&inline.data) {
            Ok(img) => {
                info!("🖼️ Extracted {} image {}x{} from part {}", inline.mime_type, img.width(), img.height(), idx);
                return Some(img);
            }
            Err(e) => {
                warn!("⚠️ Part {} ({}) did not decode as an image: {}", idx, inline.mime_type, e);
            }
        }
    }
    info!("⚠️ No image data found in model response");
    None
}

#[cfg(test)]
pub(crate) fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::ResponsePart;

    #[test]
    fn skips_text_and_broken_parts() {
        let good = DynamicImage::new_rgb8(4, 2);
        let response = ModelResponse {
            parts: vec![
                ResponsePart::text("thinking..."),
                ResponsePart::image("image/png", b"not an image".to_vec()),
                ResponsePart::image("image/png", png_bytes(&good)),
                ResponsePart::image("image/png", png_bytes(&DynamicImage::new_rgb8(9, 9))),
            ],
        };
        let img = extract_first_image(&response).unwrap();
        assert_eq!((img.width(), img.height()), (4, 2));
    }

    #[test]
    fn none_when_no_image_parts() {
        let response = ModelResponse { parts: vec![ResponsePart::text("I can't draw that")] };
        assert!(extract_first_image(&response).is_none());
        assert!(extract_first_image(&ModelResponse::default()).is_none());
    }
}
