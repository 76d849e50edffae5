// ABOUTME: Review submission with one-review-per-user-per-portfolio enforcement
// ABOUTME: Ratings are bounded to 1..=5; the listing is newest-first

use axum::{
    extract::{Path, State},
    response::Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{AppError, Result};
use crate::session::current_principal;
use crate::types::SubmitReviewRequest;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

pub async fn submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SubmitReviewRequest>,
) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;
    principal.ensure_can_review()?;

    if !(MIN_RATING..=MAX_RATING).contains(&req.rating) {
        return Err(AppError::Validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }

    // Existence check, not a storage-level uniqueness constraint.
    if state
        .storage
        .find_review(&req.portfolio_id, &principal.user.discord_id)
        .await?
        .is_some()
    {
        return Err(AppError::DuplicateReview);
    }

    state
        .storage
        .insert_review(
            &req.portfolio_id,
            &principal.user.discord_id,
            &principal.user.username,
            req.rating,
            req.comment.as_deref().unwrap_or(""),
        )
        .await?;

    Ok(Json(json!({"success": true})))
}

pub async fn list_for_portfolio(
    State(state): State<AppState>,
    Path(portfolio_id): Path<String>,
) -> Result<Json<Value>> {
    let reviews = state.storage.list_reviews(&portfolio_id).await?;
    Ok(Json(json!({"success": true, "reviews": reviews})))
}
