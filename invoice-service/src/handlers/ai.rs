use crate::dtos::{
    GenerateDescriptionRequest, GenerateDescriptionResponse, SuggestItemsRequest,
    SuggestItemsResponse,
};
use crate::middleware::UserId;
use crate::services::ai::{description_prompt, parse_suggestions, suggestions_prompt};
use crate::services::{GenerationError, TextGenerator};
use crate::startup::AppState;
use axum::{extract::State, Json};
use metrics::counter;
use service_core::error::AppError;
use std::sync::Arc;

fn generator(state: &AppState) -> Result<Arc<dyn TextGenerator>, GenerationError> {
    state.text_generator.clone().ok_or_else(|| {
        GenerationError::NotConfigured("no AI provider is configured".to_string())
    })
}

async fn run(state: &AppState, operation: &'static str, prompt: &str) -> Result<String, AppError> {
    let result = match generator(state) {
        Ok(generator) => generator.generate(prompt).await,
        Err(e) => Err(e),
    };

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.outcome(),
    };
    counter!("ai_requests_total", "operation" => operation, "outcome" => outcome).increment(1);

    result.map_err(|e| {
        tracing::warn!(operation, error = %e, "AI generation failed");
        AppError::from(e)
    })
}

fn required(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!(message.to_string())))
}

pub async fn generate_description(
    State(state): State<AppState>,
    _user_id: UserId,
    Json(request): Json<GenerateDescriptionRequest>,
) -> Result<Json<GenerateDescriptionResponse>, AppError> {
    let item_name = required(request.item_name, "Please provide item name")?;

    let description = run(&state, "generate_description", &description_prompt(&item_name)).await?;

    Ok(Json(GenerateDescriptionResponse {
        item_name,
        description: description.trim().to_string(),
    }))
}

pub async fn suggest_items(
    State(state): State<AppState>,
    _user_id: UserId,
    Json(request): Json<SuggestItemsRequest>,
) -> Result<Json<SuggestItemsResponse>, AppError> {
    let business_type = required(request.business_type, "Please provide business type")?;

    let reply = run(&state, "suggest_items", &suggestions_prompt(&business_type)).await?;

    Ok(Json(SuggestItemsResponse {
        business_type,
        suggestions: parse_suggestions(&reply),
    }))
}
