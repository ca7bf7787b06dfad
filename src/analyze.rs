use crate::inference::{InferenceClient, InferenceError, InferenceRequest};
use crate::models::{AnalysisResult, ImageInput, Limits};
use crate::prompt::{build_prompt, max_output_tokens, TEMPERATURE};
use crate::shaping::{fallback_result, shape_completion, ShapingError};

/// Why a request ended up with the fallback result.
#[derive(Debug, thiserror::Error)]
pub enum FallbackReason {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Shaping(#[from] ShapingError),
}

impl FallbackReason {
    pub fn kind(&self) -> &'static str {
        match self {
            FallbackReason::Inference(e) => e.kind(),
            FallbackReason::Shaping(e) => e.kind(),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Analyzed(AnalysisResult),
    Fallback(AnalysisResult, FallbackReason),
}

impl Outcome {
    pub fn into_result(self) -> AnalysisResult {
        match self {
            Outcome::Analyzed(result) | Outcome::Fallback(result, _) => result,
        }
    }
}

/// Run one image through prompt, inference and shaping. Never fails: any
/// inference or shaping error yields the fallback result instead.
pub async fn analyze(client: &dyn InferenceClient, image: &ImageInput, limits: &Limits) -> Outcome {
    match try_analyze(client, image, limits).await {
        Ok(result) => {
            tracing::info!(tags = result.tags.len(), "image analyzed");
            Outcome::Analyzed(result)
        }
        Err(reason) => {
            tracing::warn!(kind = reason.kind(), error = %reason, "analysis failed, returning fallback");
            Outcome::Fallback(fallback_result(limits), reason)
        }
    }
}

async fn try_analyze(
    client: &dyn InferenceClient,
    image: &ImageInput,
    limits: &Limits,
) -> Result<AnalysisResult, FallbackReason> {
    let request = InferenceRequest {
        prompt: build_prompt(limits),
        image_base64: image.data.clone(),
        mime_type: image.mime_type.clone(),
        temperature: TEMPERATURE,
        max_output_tokens: max_output_tokens(limits),
    };
    tracing::debug!(
        mime_type = %request.mime_type,
        image_chars = request.image_base64.len(),
        max_output_tokens = request.max_output_tokens,
        "calling inference service"
    );

    let completion = client.complete(request).await?;
    tracing::debug!(completion_chars = completion.len(), "completion received");

    Ok(shape_completion(&completion, limits)?)
}
