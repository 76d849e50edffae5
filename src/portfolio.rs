// ABOUTME: Portfolio CRUD handlers plus the ranked public listing
// ABOUTME: Ownership is enforced inside the write filters, never as a separate read

use axum::{
    extract::{Path, State},
    response::Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{AppError, Result};
use crate::session::current_principal;
use crate::types::{DeletePortfolioRequest, SavePortfolioRequest};

/// Create or update, depending on whether `portfolio_id` is supplied.
/// An update that matches nothing is reported as not-found-or-forbidden
/// without revealing which.
pub async fn save(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SavePortfolioRequest>,
) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;
    principal.ensure_can_edit_portfolios()?;

    let owner_id = principal.user.discord_id;
    let owner_name = principal.user.username;

    let portfolio_id = match &req.portfolio_id {
        Some(id) => {
            let updated = state
                .storage
                .update_portfolio(id, &owner_id, &owner_name, &req)
                .await?;
            if !updated {
                return Err(AppError::NotFound(
                    "Portfolio not found or access denied".to_string(),
                ));
            }
            id.clone()
        }
        None => {
            state
                .storage
                .create_portfolio(&owner_id, &owner_name, &req)
                .await?
        }
    };

    Ok(Json(json!({"success": true, "portfolio_id": portfolio_id})))
}

/// Owner-only fetch backing the edit page.
pub async fn fetch_for_edit(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(portfolio_id): Path<String>,
) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;
    principal.ensure_can_edit_portfolios()?;

    let portfolio = state
        .storage
        .get_portfolio_for_owner(&portfolio_id, &principal.user.discord_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Portfolio not found or access denied".to_string())
        })?;

    Ok(Json(json!({"success": true, "portfolio": portfolio})))
}

/// Public fetch for the view page, any caller.
pub async fn fetch_public(
    State(state): State<AppState>,
    Path(portfolio_id): Path<String>,
) -> Result<Json<Value>> {
    let portfolio = state
        .storage
        .get_portfolio(&portfolio_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Portfolio not found".to_string()))?;

    Ok(Json(json!({"success": true, "portfolio": portfolio})))
}

pub async fn list_ranked(State(state): State<AppState>) -> Result<Json<Value>> {
    let portfolios = state.storage.list_ranked().await?;
    Ok(Json(json!({"success": true, "portfolios": portfolios})))
}

pub async fn list_mine(State(state): State<AppState>, jar: CookieJar) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;
    let portfolios = state
        .storage
        .list_portfolios_by_owner(&principal.user.discord_id)
        .await?;

    Ok(Json(json!({"success": true, "portfolios": portfolios})))
}

/// Owner delete. Reviews are intentionally left behind; only the admin
/// delete cascades.
pub async fn delete(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<DeletePortfolioRequest>,
) -> Result<Json<Value>> {
    let principal = current_principal(&jar, &state).await?;

    let deleted = state
        .storage
        .delete_portfolio(&req.portfolio_id, &principal.user.discord_id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound(
            "Portfolio not found or unauthorized".to_string(),
        ));
    }

    Ok(Json(json!({"success": true})))
}
