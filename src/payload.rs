use image::DynamicImage;

use crate::models::GenerationRequest;

/// One element of a multi-part payload.
#[derive(Debug, Clone, Copy)]
pub enum ContentPart<'a> {
    Text(&'a str),
    Image(&'a DynamicImage),
}

/// What gets sent to the model for one item: bare text, or text followed by images.
#[derive(Debug, Clone)]
pub enum ModelPayload<'a> {
    Text(&'a str),
    Sequence(Vec<ContentPart<'a>>),
}

impl<'a> ModelPayload<'a> {
    pub fn parts(&self) -> Vec<ContentPart<'a>> {
        match self {
            ModelPayload::Text(t) => vec![ContentPart::Text(*t)],
            ModelPayload::Sequence(parts) => parts.clone(),
        }
    }

    pub fn image_count(&self) -> usize {
        match self {
            ModelPayload::Text(_) => 0,
            ModelPayload::Sequence(parts) => parts.iter().filter(|p| matches!(p, ContentPart::Image(_))).count(),
        }
    }
}

/// Orders the prompt and attached images: reference, logo, QR code, then combo images.
pub fn assemble_payload<'a>(prompt: &'a str, req: &'a GenerationRequest) -> ModelPayload<'a> {
    let images: Vec<&DynamicImage> = req
        .reference_image
        .iter()
        .chain(req.logo_image.iter())
        .chain(req.qrcode_image.iter())
        .chain(req.combo_images.iter())
        .collect();

    if images.is_empty() {
        return ModelPayload::Text(prompt);
    }

    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(ContentPart::Text(prompt));
    parts.extend(images.into_iter().map(ContentPart::Image));
    ModelPayload::Sequence(parts)
}
