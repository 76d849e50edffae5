// ABOUTME: Session management with HttpOnly cookies for the logged-in Discord identity
// ABOUTME: Sessions are server-side random tokens, so no signing secret is involved

use crate::AppState;
use crate::error::{AppError, Result};
use crate::types::Principal;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Discord id of the logged-in user.
    pub discord_id: String,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn create_session(&self, discord_id: String) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session_data = SessionData {
            discord_id,
            created_at: chrono::Utc::now().timestamp(),
        };

        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(session_id.clone(), session_data);
        }

        session_id
    }

    pub fn get_session(&self, session_id: &str) -> Option<SessionData> {
        if let Ok(sessions) = self.sessions.read() {
            sessions.get(session_id).cloned()
        } else {
            None
        }
    }

    pub fn remove_session(&self, session_id: &str) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(session_id);
        }
    }

    pub fn cleanup_expired_sessions(&self, max_age_seconds: i64) {
        let cutoff = chrono::Utc::now().timestamp() - max_age_seconds;

        if let Ok(mut sessions) = self.sessions.write() {
            sessions.retain(|_, session| session.created_at > cutoff);
        }
    }
}

pub const SESSION_COOKIE_NAME: &str = "showfolio_session";
pub const SESSION_MAX_AGE: i64 = 24 * 60 * 60; // 24 hours

pub fn create_session_cookie(session_id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, session_id))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_MAX_AGE))
        .path("/")
        .build()
}

pub fn create_logout_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, ""))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(0))
        .path("/")
        .build()
}

pub fn extract_session_from_jar(
    jar: &CookieJar,
    session_store: &SessionStore,
) -> Result<SessionData> {
    let session_cookie = jar
        .get(SESSION_COOKIE_NAME)
        .ok_or_else(|| AppError::Unauthorized("No session cookie found".to_string()))?;

    let session_data = session_store
        .get_session(session_cookie.value())
        .ok_or_else(|| AppError::Unauthorized("Invalid session".to_string()))?;

    Ok(session_data)
}

/// Loads the caller's stored user and overlays the derived admin/tag flags.
pub async fn current_principal(jar: &CookieJar, state: &AppState) -> Result<Principal> {
    let session = extract_session_from_jar(jar, &state.sessions)?;

    let user = state
        .storage
        .find_user_by_discord_id(&session.discord_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Session user no longer exists".to_string()))?;

    Ok(Principal::from_user(user, &state.config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_sessions_are_dropped_and_fresh_ones_kept() {
        let store = SessionStore::new();
        let fresh = store.create_session("1".to_string());
        let stale = store.create_session("2".to_string());

        if let Ok(mut sessions) = store.sessions.write() {
            sessions.get_mut(&stale).unwrap().created_at -= SESSION_MAX_AGE + 10;
        }

        store.cleanup_expired_sessions(SESSION_MAX_AGE);

        assert!(store.get_session(&fresh).is_some());
        assert!(store.get_session(&stale).is_none());
    }
}
