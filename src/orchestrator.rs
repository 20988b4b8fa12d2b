use tracing::{debug, info, warn, error};

use crate::{
    classify::{classify, FailureCategory, FailureSignal},
    error::GenerationError,
    extract::extract_first_image,
    gemini::{ImageGenerationConfig, ModelCall, ModelInvoker},
    models::{GenerationRequest, GenerationResult, Poster},
    payload::assemble_payload,
    persist::ImagePersister,
    prompt::compose_prompt,
};

/// Credential and model selection, fixed for the lifetime of an orchestrator.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub api_key: Option<String>,
    pub model_id: String,
    pub resolution_tier: String,
}

/// Result of one loop iteration.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Success(Poster),
    Failure(FailureCategory),
}

pub struct BatchOrchestrator<M, P> {
    settings: GenerationSettings,
    invoker: M,
    persister: P,
}

impl<M: ModelInvoker, P: ImagePersister> BatchOrchestrator<M, P> {
    pub fn new(settings: GenerationSettings, invoker: M, persister: P) -> Self {
        Self { settings, invoker, persister }
    }

    /// Runs `req.count` sequential model calls and reduces them to one result.
    ///
    /// Per-item failures are classified and tallied; only a batch with zero
    /// successes is an error. Persistence failures abort immediately.
    pub async fn generate(&self, req: &GenerationRequest) -> Result<GenerationResult, GenerationError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenerationError::Configuration("GOOGLE_API_KEY is not set".into()))?;
        req.validate()?;

        let prompt = compose_prompt(req);
        let config = ImageGenerationConfig {
            aspect_ratio: req.aspect_ratio.clone(),
            resolution_tier: self.settings.resolution_tier.clone(),
        };
        info!(
            "🚀 Generating {} posters ({}, thinking={}) with prompt (truncated): {}",
            req.count,
            req.aspect_ratio,
            req.thinking_mode,
            &prompt[..prompt.char_indices().nth(120).map(|(i, _)| i).unwrap_or(prompt.len())]
        );

        let mut outcomes = Vec::with_capacity(req.count);
        for index in 0..req.count {
            info!("🎨 Generating poster {}/{}", index + 1, req.count);
            outcomes.push(self.run_item(api_key, &prompt, req, &config, index).await?);
        }

        aggregate(outcomes)
    }

    async fn run_item(
        &self,
        api_key: &str,
        prompt: &str,
        req: &GenerationRequest,
        config: &ImageGenerationConfig,
        index: usize,
    ) -> Result<ItemOutcome, GenerationError> {
        let payload = assemble_payload(prompt, req);
        debug!("📦 Poster {} payload carries {} images", index + 1, payload.image_count());
        let call = ModelCall { api_key, model_id: &self.settings.model_id, payload: &payload, config };

        let response = match self.invoker.invoke(call).await {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                let category = classify(FailureSignal::Message(&message));
                error!("❌ Poster {} failed [{}]: {}", index + 1, category, message);
                return Ok(ItemOutcome::Failure(category));
            }
        };

        match extract_first_image(&response) {
            Some(image) => {
                let path = self.persister.persist(&image, index).await?;
                info!("✅ Poster {} ready: {}", index + 1, path.display());
                Ok(ItemOutcome::Success(Poster { image, path }))
            }
            None => {
                let category = classify(FailureSignal::NoImage);
                warn!("⚠️ Poster {} returned no image [{}]", index + 1, category);
                Ok(ItemOutcome::Failure(category))
            }
        }
    }
}

/// Reduces per-item outcomes into the batch result.
pub fn aggregate(outcomes: Vec<ItemOutcome>) -> Result<GenerationResult, GenerationError> {
    let attempted = outcomes.len();
    let mut posters = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            ItemOutcome::Success(poster) => posters.push(poster),
            ItemOutcome::Failure(category) => failures.push(category),
        }
    }

    let primary_error = primary_failure(&failures);
    if posters.is_empty() {
        error!("❌ All {} posters failed (primary: {:?})", attempted, primary_error);
        return Err(GenerationError::BatchExhausted { attempted, primary: primary_error });
    }

    info!("✅ Generated {}/{} posters (primary failure: {:?})", posters.len(), attempted, primary_error);
    Ok(GenerationResult { posters, attempted, primary_error })
}

/// Most frequent category; ties go to the one seen first.
pub fn primary_failure(failures: &[FailureCategory]) -> Option<FailureCategory> {
    let mut tally: Vec<(FailureCategory, usize)> = Vec::new();
    for category in failures {
        match tally.iter_mut().find(|(c, _)| c == category) {
            Some((_, n)) => *n += 1,
            None => tally.push((*category, 1)),
        }
    }

    let mut best: Option<(FailureCategory, usize)> = None;
    for (category, n) in tally {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((category, n));
        }
    }
    best.map(|(category, _)| category)
}
