// ABOUTME: Environment-driven configuration resolved once at process start
// ABOUTME: Admin allow-list and user tag map are injected here, never read as globals

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, collections::HashSet, env, fmt::Display, str::FromStr};
use tracing::{info, warn};

/// Display tag shown next to a configured user's name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserTag {
    pub name: String,
    pub color: String,
}

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub discord_client_id: String,
    pub discord_client_secret: String,
    pub discord_redirect_uri: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    /// Discord ids granted the admin capability. Derived, never stored per-user.
    pub admin_user_ids: HashSet<String>,
    /// Discord id -> display tag.
    pub user_tags: HashMap<String, UserTag>,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("PORT", "5000"),
            database_url: try_load("DATABASE_URL", "sqlite:showfolio.db?mode=rwc"),
            discord_client_id: try_load("DISCORD_CLIENT_ID", ""),
            discord_client_secret: try_load("DISCORD_CLIENT_SECRET", ""),
            discord_redirect_uri: try_load(
                "DISCORD_REDIRECT_URI",
                "http://localhost:5000/auth/discord/callback",
            ),
            upload_dir: try_load("UPLOAD_DIR", "static/uploads"),
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", "16777216"),
            admin_user_ids: load_admin_ids(),
            user_tags: load_user_tags(),
        }
    }

    pub fn is_admin(&self, discord_id: &str) -> bool {
        self.admin_user_ids.contains(discord_id)
    }

    pub fn tag_for(&self, discord_id: &str) -> Option<UserTag> {
        self.user_tags.get(discord_id).cloned()
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default:?}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Comma-separated list of Discord ids, e.g. `ADMIN_USER_IDS=1317342800941023242`.
fn load_admin_ids() -> HashSet<String> {
    var("ADMIN_USER_IDS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// JSON map of Discord id to tag, e.g.
/// `USER_TAGS={"1317342800941023242":{"name":"Founder","color":"#415C92"}}`.
fn load_user_tags() -> HashMap<String, UserTag> {
    let raw = match var("USER_TAGS") {
        Ok(raw) if !raw.trim().is_empty() => raw,
        _ => return HashMap::new(),
    };

    serde_json::from_str(&raw)
        .map_err(|e| {
            warn!("Invalid USER_TAGS value, ignoring: {e}");
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_map_parses_from_json() {
        let tags: HashMap<String, UserTag> =
            serde_json::from_str(r##"{"42":{"name":"Founder","color":"#415C92"}}"##).unwrap();
        assert_eq!(
            tags.get("42"),
            Some(&UserTag {
                name: "Founder".to_string(),
                color: "#415C92".to_string()
            })
        );
    }
}
