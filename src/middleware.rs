// ABOUTME: Restriction gate evaluated before every request outside the auth and static paths
// ABOUTME: A site-blocked caller has their session terminated and lands back on the home page

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;
use crate::session::{self, SESSION_COOKIE_NAME};

fn exempt(path: &str) -> bool {
    path.starts_with("/auth/") || path == "/logout" || path.starts_with("/static/")
}

pub async fn restriction_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    if exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let Some(session_cookie) = jar.get(SESSION_COOKIE_NAME) else {
        return next.run(request).await;
    };

    let Some(session_data) = state.sessions.get_session(session_cookie.value()) else {
        return next.run(request).await;
    };

    let blocked = match state
        .storage
        .find_user_by_discord_id(&session_data.discord_id)
        .await
    {
        Ok(Some(user)) => user.is_restricted(|r| r.block_site),
        // A broken store lookup must not lock every caller out.
        Ok(None) | Err(_) => false,
    };

    if blocked {
        tracing::info!("Terminating session of site-blocked user {}", session_data.discord_id);
        state.sessions.remove_session(session_cookie.value());
        let jar = jar.add(session::create_logout_cookie());
        return (jar, Redirect::to("/?error=restricted")).into_response();
    }

    next.run(request).await
}
