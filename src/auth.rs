// ABOUTME: Discord OAuth2 authorization-code exchange and login/logout handlers
// ABOUTME: Any transport error or missing token surfaces as an authentication failure

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::AppState;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::session;
use crate::types::DiscordProfile;

pub const DISCORD_API_BASE: &str = "https://discord.com/api";

#[derive(Clone)]
pub struct DiscordClient {
    client: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

impl DiscordClient {
    pub fn new(config: &Config) -> Self {
        Self::with_api_base(config, DISCORD_API_BASE)
    }

    pub fn with_api_base(config: &Config, api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            client_id: config.discord_client_id.clone(),
            client_secret: config.discord_client_secret.clone(),
            redirect_uri: config.discord_redirect_uri.clone(),
        }
    }

    /// URL the browser is sent to for consent.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/oauth2/authorize?client_id={}&redirect_uri={}&response_type=code&scope=identify%20email",
            self.api_base,
            self.client_id,
            urlencoding::encode(&self.redirect_uri),
        )
    }

    /// Trades the authorization code for a bearer token, then fetches the
    /// provider profile for the authenticated principal. No retry.
    pub async fn exchange_and_fetch_profile(&self, code: &str) -> Result<DiscordProfile> {
        let token: TokenResponse = self
            .client
            .post(format!("{}/oauth2/token", self.api_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        let access_token = token.access_token.ok_or_else(|| {
            AppError::AuthExchange("token response had no access_token".to_string())
        })?;

        let profile: DiscordProfile = self
            .client
            .get(format!("{}/users/@me", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await?
            .json()
            .await?;

        Ok(profile)
    }
}

// Handlers

pub async fn discord_auth(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.discord.authorize_url())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

pub async fn discord_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackQuery>,
) -> Response {
    let Some(code) = params.code else {
        return Redirect::to("/login?error=auth_failed").into_response();
    };

    let profile = match state.discord.exchange_and_fetch_profile(&code).await {
        Ok(profile) => profile,
        Err(err) => {
            tracing::warn!("Discord auth failed: {err}");
            return Redirect::to("/login?error=auth_failed").into_response();
        }
    };

    let user = match state.storage.upsert_login(&profile).await {
        Ok(user) => user,
        Err(err) => {
            tracing::error!("Login upsert failed: {err}");
            return Redirect::to("/login?error=auth_failed").into_response();
        }
    };

    tracing::info!("User {} logged in", user.discord_id);

    let session_id = state.sessions.create_session(user.discord_id);
    let jar = jar.add(session::create_session_cookie(session_id, false));

    (jar, Redirect::to("/")).into_response()
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(session_cookie) = jar.get(session::SESSION_COOKIE_NAME) {
        state.sessions.remove_session(session_cookie.value());
    }

    let jar = jar.add(session::create_logout_cookie());
    (jar, Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::load();
        config.discord_client_id = "client123".to_string();
        config.discord_redirect_uri = "http://localhost:5000/auth/discord/callback".to_string();
        config
    }

    #[test]
    fn authorize_url_encodes_redirect_uri() {
        let client = DiscordClient::new(&test_config());
        let url = client.authorize_url();

        assert!(url.starts_with("https://discord.com/api/oauth2/authorize?client_id=client123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fauth%2Fdiscord%2Fcallback"));
        assert!(url.contains("scope=identify%20email"));
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let client = DiscordClient::with_api_base(&test_config(), "http://127.0.0.1:9/api/");
        assert!(client.authorize_url().starts_with("http://127.0.0.1:9/api/oauth2/authorize"));
    }
}
