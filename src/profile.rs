// ABOUTME: Profile data endpoints: own principal, public profiles, partial profile updates
// ABOUTME: Private profiles and unknown ids are both reported as not found

use axum::{
    extract::{Path, State},
    response::Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{AppError, Result};
use crate::session::current_principal;
use crate::types::{UpdateProfileRequest, Visibility};

/// The caller's own record plus derived admin/tag flags, for the page shells.
pub async fn me(State(state): State<AppState>, jar: CookieJar) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;
    Ok(Json(json!({"success": true, "user": principal})))
}

/// Public profile lookup by Discord id, falling back to the internal id for
/// legacy links.
pub async fn public_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    let user = match state.storage.find_user_by_discord_id(&user_id).await? {
        Some(user) => Some(user),
        None => state.storage.find_user_by_id(&user_id).await?,
    };

    let user = user
        .filter(|u| u.profile_visibility == Visibility::Public)
        .ok_or_else(|| AppError::NotFound("Profile not found or private".to_string()))?;

    let portfolios = state
        .storage
        .list_portfolios_by_owner(&user.discord_id)
        .await?;

    // Public view only; email and the restriction overlay stay private.
    Ok(Json(json!({
        "success": true,
        "user": {
            "discord_id": user.discord_id,
            "username": user.username,
            "avatar": user.avatar,
            "description": user.description,
            "tag": state.config.tag_for(&user.discord_id),
            "created_at": user.created_at,
        },
        "portfolios": portfolios,
    })))
}

/// Partial update: only the supplied fields change.
pub async fn update_profile(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;

    if req.description.is_none() && req.profile_visibility.is_none() {
        return Err(AppError::Validation("No data to update".to_string()));
    }

    let visibility = req
        .profile_visibility
        .as_deref()
        .map(Visibility::parse)
        .transpose()?;

    state
        .storage
        .update_profile(
            &principal.user.discord_id,
            req.description.as_deref(),
            visibility,
        )
        .await?;

    Ok(Json(json!({"success": true})))
}
