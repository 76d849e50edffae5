// ABOUTME: Admin-only operations: user search, restriction overlay management, cascade delete
// ABOUTME: Every handler re-checks the derived admin capability before touching the store

use axum::{extract::State, response::Json};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{AppError, Result};
use crate::session::current_principal;
use crate::types::{
    AdminDeletePortfolioRequest, RemoveRestrictionsRequest, RestrictUserRequest, Restrictions,
    SearchUsersRequest,
};

pub async fn search_users(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SearchUsersRequest>,
) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;
    principal.ensure_admin()?;

    let query = req.query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Search query required".to_string()));
    }

    let users = state.storage.search_users(query).await?;
    Ok(Json(json!({"success": true, "users": users})))
}

/// Always a full replace of the overlay, never a partial merge.
pub async fn restrict_user(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RestrictUserRequest>,
) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;
    principal.ensure_admin()?;

    if req.user_id.is_empty() {
        return Err(AppError::Validation("User ID required".to_string()));
    }

    let restrictions = Restrictions {
        reason: req.restrictions.reason,
        block_reviews: req.restrictions.block_reviews,
        block_portfolios: req.restrictions.block_portfolios,
        block_site: req.restrictions.block_site,
        permanent: req.restrictions.permanent,
        applied_at: chrono::Utc::now().timestamp(),
        applied_by: principal.user.username.clone(),
    };

    let matched = state
        .storage
        .set_restrictions(&req.user_id, &restrictions)
        .await?;
    if !matched {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(
        "Admin {} restricted user {}",
        principal.user.discord_id,
        req.user_id
    );

    Ok(Json(json!({"success": true})))
}

pub async fn remove_restrictions(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RemoveRestrictionsRequest>,
) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;
    principal.ensure_admin()?;

    if req.user_id.is_empty() {
        return Err(AppError::Validation("User ID required".to_string()));
    }

    let matched = state.storage.clear_restrictions(&req.user_id).await?;
    if !matched {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({"success": true})))
}

/// Accepts a raw portfolio id, or a portfolio URL with the id as its final
/// path segment.
pub fn extract_portfolio_id(input: &str) -> &str {
    match input.rsplit_once("/portfolio/") {
        Some((_, id)) => id,
        None => input,
    }
}

pub async fn delete_portfolio(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<AdminDeletePortfolioRequest>,
) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;
    principal.ensure_admin()?;

    if req.portfolio_id.is_empty() {
        return Err(AppError::Validation(
            "Portfolio ID or URL required".to_string(),
        ));
    }

    let portfolio_id = extract_portfolio_id(&req.portfolio_id);

    let removed_reviews = state
        .storage
        .delete_portfolio_cascade(portfolio_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Portfolio not found".to_string()))?;

    tracing::info!(
        "Admin {} deleted portfolio {} and {} reviews",
        principal.user.discord_id,
        portfolio_id,
        removed_reviews
    );

    Ok(Json(json!({
        "success": true,
        "message": format!(
            "Portfolio deleted. Also removed {} associated reviews.",
            removed_reviews
        ),
    })))
}
