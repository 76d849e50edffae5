// ABOUTME: Type definitions for API requests, responses, and stored records
// ABOUTME: Includes the user/portfolio/review models and the restriction overlay

use serde::{Deserialize, Serialize};

use crate::config::{Config, UserTag};
use crate::error::{AppError, Result};

// Stored records

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(AppError::Validation(format!(
                "Invalid profile visibility: {}",
                other
            ))),
        }
    }
}

/// Admin-imposed limitations, stored as a JSON column on the user row.
/// A missing overlay means unrestricted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Restrictions {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub block_reviews: bool,
    #[serde(default)]
    pub block_portfolios: bool,
    #[serde(default)]
    pub block_site: bool,
    #[serde(default)]
    pub permanent: bool,
    pub applied_at: i64,
    pub applied_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub discord_id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub description: String,
    pub profile_visibility: Visibility,
    pub restrictions: Option<Restrictions>,
    pub created_at: i64,
    pub last_login: i64,
}

impl User {
    pub fn is_restricted(&self, check: impl Fn(&Restrictions) -> bool) -> bool {
        self.restrictions.as_ref().is_some_and(check)
    }
}

/// The authenticated caller: the stored user plus capability flags derived
/// from configuration at load time, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    #[serde(flatten)]
    pub user: User,
    pub is_admin: bool,
    pub tag: Option<UserTag>,
}

impl Principal {
    pub fn from_user(user: User, config: &Config) -> Self {
        let is_admin = config.is_admin(&user.discord_id);
        let tag = config.tag_for(&user.discord_id);
        Self {
            user,
            is_admin,
            tag,
        }
    }

    pub fn ensure_can_edit_portfolios(&self) -> Result<()> {
        if self
            .user
            .is_restricted(|r| r.block_portfolios || r.block_site)
        {
            return Err(AppError::Restricted(
                "You are restricted from creating or editing portfolios".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ensure_can_review(&self) -> Result<()> {
        if self.user.is_restricted(|r| r.block_reviews || r.block_site) {
            return Err(AppError::Restricted(
                "You are restricted from submitting reviews".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ensure_admin(&self) -> Result<()> {
        if !self.is_admin {
            return Err(AppError::Forbidden(
                "Admin privileges required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: String,
    /// Owner's Discord id.
    pub user_id: String,
    /// Owner's name as it was at the last save.
    pub username: String,
    pub title: String,
    pub template: String,
    pub background_color: String,
    /// Opaque element tree, never interpreted server-side.
    pub elements: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A portfolio joined with its review aggregate for the ranked listing.
#[derive(Debug, Clone, Serialize)]
pub struct RankedPortfolio {
    #[serde(flatten)]
    pub portfolio: Portfolio,
    pub avg_rating: f64,
    pub review_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub portfolio_id: String,
    /// Reviewer's Discord id.
    pub user_id: String,
    pub username: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: i64,
}

// Identity provider types

/// Profile fields fetched from Discord after the code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordProfile {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub email: Option<String>,
}

// API request types

#[derive(Debug, Deserialize)]
pub struct SavePortfolioRequest {
    pub portfolio_id: Option<String>,
    pub title: Option<String>,
    pub template: Option<String>,
    pub background_color: Option<String>,
    pub elements: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePortfolioRequest {
    pub portfolio_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub portfolio_id: String,
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub description: Option<String>,
    pub profile_visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchUsersRequest {
    pub query: String,
}

/// Restriction fields as submitted by an admin. Timestamps and the acting
/// admin's name are stamped server-side.
#[derive(Debug, Default, Deserialize)]
pub struct RestrictionInput {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub block_reviews: bool,
    #[serde(default)]
    pub block_portfolios: bool,
    #[serde(default)]
    pub block_site: bool,
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Deserialize)]
pub struct RestrictUserRequest {
    pub user_id: String,
    #[serde(default)]
    pub restrictions: RestrictionInput,
}

#[derive(Debug, Deserialize)]
pub struct RemoveRestrictionsRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminDeletePortfolioRequest {
    /// Raw portfolio id, or a URL whose final `/portfolio/` segment is the id.
    pub portfolio_id: String,
}

// API response types

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub portfolios: i64,
    pub users: i64,
    pub reviews: i64,
}
