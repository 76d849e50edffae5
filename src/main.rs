// ABOUTME: Main entry point for the showfolio webapp with Discord login and portfolio reviews
// ABOUTME: Sets up configuration, storage, routes, and the restriction gate

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir};

mod admin;
mod auth;
mod config;
mod error;
mod middleware;
mod portfolio;
mod profile;
mod review;
mod session;
mod storage;
mod types;
mod upload;

#[cfg(test)]
mod storage_tests;

use auth::DiscordClient;
use config::Config;
use session::SessionStore;
use storage::Storage;
use types::StatsResponse;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<Storage>,
    pub sessions: SessionStore,
    pub discord: Arc<DiscordClient>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Arc::new(Config::load());
    let storage = Arc::new(Storage::new(&config.database_url).await?);
    let discord = Arc::new(DiscordClient::new(&config));
    let sessions = SessionStore::new();

    let port = config.port;
    let max_upload_bytes = config.max_upload_bytes;

    let app_state = AppState {
        config,
        storage,
        sessions,
        discord,
    };

    // The cookie's max-age only expires sessions client-side; sweep the
    // server-side map on the same schedule.
    let session_sweeper = app_state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            session_sweeper.cleanup_expired_sessions(session::SESSION_MAX_AGE);
        }
    });

    let app = build_router(app_state).layer(DefaultBodyLimit::max(max_upload_bytes));

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Server running on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        // Page shells; data comes from the JSON API below
        .route("/", get(index_page))
        .route("/portfolios", get(portfolios_page))
        .route("/create", get(create_page))
        .route("/edit/:portfolio_id", get(edit_page))
        .route("/portfolio/:portfolio_id", get(view_portfolio_page))
        .route("/login", get(login_page))
        .route("/profile", get(profile_page))
        .route("/profile/:user_id", get(public_profile_page))
        .route("/admin", get(admin_page))
        // Auth
        .route("/auth/discord", get(auth::discord_auth))
        .route("/auth/discord/callback", get(auth::discord_callback))
        .route("/logout", get(auth::logout))
        // JSON API
        .route("/api/save_portfolio", post(portfolio::save))
        .route("/api/delete_portfolio", post(portfolio::delete))
        .route("/api/portfolios", get(portfolio::list_ranked))
        .route("/api/portfolio/:portfolio_id", get(portfolio::fetch_public))
        .route(
            "/api/portfolio/:portfolio_id/edit",
            get(portfolio::fetch_for_edit),
        )
        .route("/api/my_portfolios", get(portfolio::list_mine))
        .route("/api/submit_review", post(review::submit))
        .route("/api/reviews/:portfolio_id", get(review::list_for_portfolio))
        .route("/api/upload_image", post(upload::upload_image))
        .route("/api/me", get(profile::me))
        .route("/api/profile/:user_id", get(profile::public_profile))
        .route("/api/update_profile", post(profile::update_profile))
        .route("/api/stats", get(get_stats))
        // Admin API
        .route("/api/admin/search_users", post(admin::search_users))
        .route("/api/admin/restrict_user", post(admin::restrict_user))
        .route(
            "/api/admin/remove_restrictions",
            post(admin::remove_restrictions),
        )
        .route("/api/admin/delete_portfolio", post(admin::delete_portfolio))
        .nest_service("/static", ServeDir::new("static"))
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::restriction_gate,
        ))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

// Page handlers

async fn index_page() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn portfolios_page() -> Html<&'static str> {
    Html(include_str!("../static/portfolios.html"))
}

async fn login_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    if session::current_principal(&jar, &state).await.is_ok() {
        return Redirect::to("/").into_response();
    }
    Html(include_str!("../static/login.html")).into_response()
}

async fn view_portfolio_page() -> Html<&'static str> {
    Html(include_str!("../static/view_portfolio.html"))
}

async fn public_profile_page() -> Html<&'static str> {
    Html(include_str!("../static/public_profile.html"))
}

async fn create_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Ok(principal) = session::current_principal(&jar, &state).await else {
        return Redirect::to("/login").into_response();
    };
    if principal.ensure_can_edit_portfolios().is_err() {
        return Redirect::to("/?error=restricted").into_response();
    }
    Html(include_str!("../static/create.html")).into_response()
}

async fn edit_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Ok(principal) = session::current_principal(&jar, &state).await else {
        return Redirect::to("/login").into_response();
    };
    if principal.ensure_can_edit_portfolios().is_err() {
        return Redirect::to("/?error=restricted").into_response();
    }
    Html(include_str!("../static/edit.html")).into_response()
}

async fn profile_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    if session::current_principal(&jar, &state).await.is_err() {
        return Redirect::to("/login").into_response();
    }
    Html(include_str!("../static/profile.html")).into_response()
}

async fn admin_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Ok(principal) = session::current_principal(&jar, &state).await else {
        return Redirect::to("/login").into_response();
    };
    if !principal.is_admin {
        return Redirect::to("/?error=access_denied").into_response();
    }
    Html(include_str!("../static/admin.html")).into_response()
}

/// Collection counts. A broken store yields all zeroes, never a 5xx.
async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    match state.storage.counts().await {
        Ok(stats) => Json(stats),
        Err(err) => {
            tracing::error!("Stats query failed: {err}");
            Json(StatsResponse {
                portfolios: 0,
                users: 0,
                reviews: 0,
            })
        }
    }
}
