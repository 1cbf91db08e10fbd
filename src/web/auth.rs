use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use tracing::{info, warn};

use super::api::ApiError;
use super::pages;
use super::AppState;

pub const SESSION_COOKIE: &str = "f2b_session";

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

fn session_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

pub async fn login_page(State(state): State<AppState>, cookies: Cookies) -> Response {
    match session_token(&cookies) {
        Some(token) if state.sessions.contains(&token) => Redirect::to("/").into_response(),
        _ => Html(pages::login_html(None)).into_response(),
    }
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Response {
    if !state.check_credentials(&form.username, &form.password) {
        warn!(username = %form.username, "rejected dashboard login");
        return (
            StatusCode::UNAUTHORIZED,
            Html(pages::login_html(Some("Invalid username or password"))),
        )
            .into_response();
    }

    let token = state.sessions.issue();
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookies.add(cookie);

    info!(username = %form.username, "dashboard login");
    Redirect::to("/").into_response()
}

pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Redirect {
    if let Some(token) = session_token(&cookies) {
        state.sessions.revoke(&token);
        let mut expired = Cookie::new(SESSION_COOKIE, "");
        expired.set_path("/");
        cookies.remove(expired);
        info!("dashboard logout");
    }
    Redirect::to("/login")
}

/// Lets requests with a live session through. API callers get a JSON 401,
/// browsers are sent to the login page.
pub async fn require_session(
    State(state): State<AppState>,
    cookies: Cookies,
    req: Request,
    next: Next,
) -> Response {
    let authenticated = session_token(&cookies)
        .map(|token| state.sessions.contains(&token))
        .unwrap_or(false);

    if authenticated {
        return next.run(req).await;
    }

    if req.uri().path().starts_with("/api/") {
        ApiError::Unauthorized.into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}
