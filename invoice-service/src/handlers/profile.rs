use crate::dtos::{ProfileResponse, UpdateProfileRequest};
use crate::middleware::UserId;
use crate::models::{ProfileChanges, UserProfile};
use crate::startup::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

/// The caller's business profile. Users who never saved one get blank fields.
pub async fn get_profile(
    State(state): State<AppState>,
    user_id: UserId,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state
        .profiles
        .find_profile(&user_id.0)
        .await?
        .unwrap_or_else(|| UserProfile::blank(&user_id.0));

    Ok(Json(ProfileResponse::from(profile)))
}

#[tracing::instrument(skip(state, user_id, request), fields(user_id = %user_id.0))]
pub async fn update_profile(
    State(state): State<AppState>,
    user_id: UserId,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    request.validate()?;
    let changes = ProfileChanges::from(request);

    let profile = state
        .profiles
        .update_profile(&user_id.0, &changes, Utc::now())
        .await?;

    tracing::info!(
        changed = ?changes.fields().map(|(field, _)| field).collect::<Vec<_>>(),
        "Profile updated"
    );

    Ok(Json(ProfileResponse::from(profile)))
}
