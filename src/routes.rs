use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::Engine;
use chrono::Utc;
use image::{DynamicImage, ImageFormat};
use serde_json::json;
use std::{io::Cursor, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn, error};
use uuid::Uuid;

use crate::{
    assets::{AssetKind, AssetLibrary},
    error::{GenerationError, StoreError},
    gemini::{preview, ModelInvoker},
    models::{AssetListing, AssetUpload, GenerateRequest, GenerateResponse, GenerationRequest, PosterOptions, RefineRequest, SaveStyleRequest},
    orchestrator::BatchOrchestrator,
    persist::FsImagePersister,
    prompt::{build_user_prompt, refine_prompt},
    sessions::{Session, SessionStore, Turn},
    styles::{SavedStyle, StyleLibrary},
};

pub type SharedInvoker = Arc<dyn ModelInvoker>;
pub type PosterOrchestrator = BatchOrchestrator<SharedInvoker, FsImagePersister>;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PosterOrchestrator>,
    pub styles: Arc<StyleLibrary>,
    pub assets: Arc<AssetLibrary>,
    pub sessions: Arc<SessionStore>,
    pub max_images: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/api/generate", post(generate))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/refine", post(refine))
        .route("/api/styles", get(list_styles).post(save_style))
        .route("/api/styles/:name", get(get_style).delete(delete_style))
        .route("/api/assets", get(list_assets))
        .route("/api/assets/:kind/:name", put(upload_asset).delete(delete_asset))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

// --- Errors ---

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, detail: detail.into() }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, detail: detail.into() }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, detail: detail.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        let status = match &e {
            GenerationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GenerationError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            GenerationError::BatchExhausted { .. } => StatusCode::BAD_GATEWAY,
            GenerationError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, detail: e.to_string() }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::not_found(e.to_string()),
            StoreError::InvalidName(_) => Self::bad_request(e.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

// --- Image encoding helpers ---

/// Accepts raw base64 or a `data:<mime>;base64,` URL.
pub fn decode_image(data: &str) -> Result<DynamicImage, String> {
    let raw = match data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| format!("invalid base64: {e}"))?;
    image::load_from_memory(&bytes).map_err(|e| format!("invalid image: {e}"))
}

pub fn encode_data_url(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(format!("data:image/png;base64,{}", base64::engine::general_purpose::STANDARD.encode(&buf)))
}

fn decode_asset(field: &str, data: &str) -> Result<DynamicImage, ApiError> {
    decode_image(data).map_err(|e| ApiError::bad_request(format!("{field}: {e}")))
}

// --- Handlers ---

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "service": "Poster Studio API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn check_count(state: &AppState, count: usize) -> Result<(), ApiError> {
    if count > state.max_images {
        return Err(ApiError::bad_request(format!("count must be at most {}", state.max_images)));
    }
    Ok(())
}

/// Applies preset style, negative prompt, saved style and brand assets to `prompt`.
fn build_generation_request(state: &AppState, prompt: &str, options: &PosterOptions) -> Result<GenerationRequest, ApiError> {
    let user_prompt = build_user_prompt(prompt, options.preset_style, options.style_intensity, options.negative_prompt.as_deref());
    let mut req = GenerationRequest::new(user_prompt);

    if let Some(name) = &options.style_name {
        let style = state.styles.load(name)?.ok_or_else(|| StoreError::NotFound(format!("style {name}")))?;
        req = req.with_style_prompt(style.user_prompt);
    }

    match &options.logo_image {
        Some(data) => req = req.with_logo(decode_asset("logo_image", data)?),
        None if options.use_saved_logo => {
            if let Some(img) = state.assets.first(AssetKind::Logo)? {
                req = req.with_logo(img);
            }
        }
        None => {}
    }

    match &options.qrcode_image {
        Some(data) => req = req.with_qrcode(decode_asset("qrcode_image", data)?),
        None if options.use_saved_qrcode => {
            if let Some(img) = state.assets.first(AssetKind::QrCode)? {
                req = req.with_qrcode(img);
            }
        }
        None => {}
    }

    if let Some(slogan) = &options.slogan {
        req = req.with_slogan(slogan.clone());
    }

    let combos = options
        .combo_images
        .iter()
        .enumerate()
        .map(|(i, data)| decode_asset(&format!("combo_images[{i}]"), data))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(req.with_combo_images(combos))
}

/// Runs the batch and records it as a new turn of the session under `prompt`.
async fn run_and_record(state: &AppState, req: GenerationRequest, prompt: String, session_id: Uuid) -> Result<GenerateResponse, ApiError> {
    let result = state.orchestrator.generate(&req).await?;
    let message = result.message();
    let error_reason = result.primary_error;

    let posters = result.posters;
    let images = tokio::task::spawn_blocking(move || {
        posters.iter().map(|p| encode_data_url(&p.image)).collect::<Result<Vec<_>, _>>()
    })
    .await
    .map_err(|e| ApiError::internal(format!("encode task failed: {e}")))?
    .map_err(|e| ApiError::internal(format!("failed to encode poster: {e}")))?;

    let turn = Turn {
        prompt,
        aspect_ratio: req.aspect_ratio.clone(),
        images: images.clone(),
        error_reason,
        created_at: Utc::now(),
    };
    if let Err(e) = state.sessions.append_turn(session_id, turn) {
        error!("❌ Failed to record session {}: {}", session_id, e);
    }

    info!("✅ {} (session {})", message, session_id);
    Ok(GenerateResponse {
        success: true,
        images,
        message,
        error_reason,
        session_id,
    })
}

#[axum::debug_handler]
pub async fn generate(State(state): State<AppState>, Json(body): Json<GenerateRequest>) -> Result<Json<GenerateResponse>, ApiError> {
    info!(
        "🚀 Generate request: count={} ratio={} style={:?} thinking={} combos={}",
        body.count, body.aspect_ratio, body.options.preset_style, body.thinking_mode, body.options.combo_images.len()
    );
    check_count(&state, body.count)?;
    let mut req = build_generation_request(&state, &body.prompt, &body.options)?
        .with_count(body.count)
        .with_aspect_ratio(body.aspect_ratio.clone())
        .with_thinking_mode(body.thinking_mode);

    if let Some(reference) = &body.reference_image {
        match decode_image(reference) {
            Ok(img) => {
                info!("🖼️ Reference image received ({}x{})", img.width(), img.height());
                req = req.with_reference_image(img);
            }
            Err(e) => warn!("⚠️ Ignoring undecodable reference image {}: {}", preview(reference), e),
        }
    }

    let session_id = match body.session_id {
        Some(id) => id,
        None => state.sessions.create()?.id,
    };
    Ok(Json(run_and_record(&state, req, body.prompt.trim().to_string(), session_id).await?))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Session>, ApiError> {
    state.sessions.get(&id).map(Json).ok_or_else(|| ApiError::not_found(format!("session {id}")))
}

/// Regenerates from the session's last prompt plus an instruction or fine-tune adjustments.
///
/// With `image_index`, that poster of the last turn becomes the reference image.
pub async fn refine(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<RefineRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let last = {
        let session = state.sessions.get(&id).ok_or_else(|| ApiError::not_found(format!("session {id}")))?;
        session.last_turn().cloned().ok_or_else(|| ApiError::bad_request("session has no turns to refine"))?
    };
    let prompt = refine_prompt(&last.prompt, &body.instruction, &body.adjustments)
        .ok_or_else(|| ApiError::bad_request("instruction or adjustments must not be empty"))?;
    let count = body.count.unwrap_or(1);
    check_count(&state, count)?;

    let mut req = build_generation_request(&state, &prompt, &body.options)?
        .with_count(count)
        .with_aspect_ratio(body.aspect_ratio.clone().unwrap_or_else(|| last.aspect_ratio.clone()))
        .with_thinking_mode(body.thinking_mode.unwrap_or(true));

    if let Some(index) = body.image_index {
        let data = last
            .images
            .get(index)
            .ok_or_else(|| ApiError::bad_request(format!("image_index {index} is out of range ({} posters)", last.images.len())))?;
        let reference = decode_image(data).map_err(|e| ApiError::internal(format!("stored poster {index}: {e}")))?;
        info!("🖼️ Fine-tuning poster {} of session {}", index + 1, id);
        req = req.with_reference_image(reference);
    }

    info!("🔁 Refining session {} with: {}", id, prompt);
    Ok(Json(run_and_record(&state, req, prompt, id).await?))
}

pub async fn list_styles(State(state): State<AppState>) -> Result<Json<Vec<SavedStyle>>, ApiError> {
    Ok(Json(state.styles.list()?))
}

pub async fn save_style(State(state): State<AppState>, Json(body): Json<SaveStyleRequest>) -> Result<Json<SavedStyle>, ApiError> {
    if state.styles.exists(&body.name) {
        info!("♻️ Overwriting saved style: {}", body.name);
    }
    let style = state.styles.save(&body.name, &body.user_prompt, &body.aspect_ratio, body.thinking_mode, &body.description)?;
    Ok(Json(style))
}

pub async fn get_style(Path(name): Path<String>, State(state): State<AppState>) -> Result<Json<SavedStyle>, ApiError> {
    state.styles.load(&name)?.map(Json).ok_or_else(|| ApiError::not_found(format!("style {name}")))
}

pub async fn delete_style(Path(name): Path<String>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    if state.styles.delete(&name)? { Ok(StatusCode::NO_CONTENT) } else { Err(ApiError::not_found(format!("style {name}"))) }
}

pub async fn list_assets(State(state): State<AppState>) -> Result<Json<AssetListing>, ApiError> {
    Ok(Json(state.assets.listing()?))
}

pub async fn upload_asset(
    Path((kind, name)): Path<(AssetKind, String)>,
    State(state): State<AppState>,
    Json(body): Json<AssetUpload>,
) -> Result<StatusCode, ApiError> {
    let img = decode_asset("image", &body.image)?;
    state.assets.save(kind, &name, &img)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_asset(Path((kind, name)): Path<(AssetKind, String)>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    if state.assets.delete(kind, &name)? { Ok(StatusCode::NO_CONTENT) } else { Err(ApiError::not_found(format!("{kind:?} {name}"))) }
}
