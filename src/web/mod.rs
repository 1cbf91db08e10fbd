//! HTTP surface: session login, dashboard pages and the JSON API.

mod api;
mod auth;
mod pages;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use parking_lot::Mutex;
use tower_cookies::CookieManagerLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::fail2ban::Fail2banClient;
use crate::geoip::{GeoCache, GeoIpService};
use crate::log_reader::LogReader;
use crate::runner::CommandRunner;

pub use api::ApiError;
pub use auth::SESSION_COOKIE;

/// How long a login stays valid.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 3);

/// Tokens of logged-in browsers with their expiry. Expired tokens are
/// dropped whenever a new session is issued.
#[derive(Clone)]
pub struct Sessions {
    tokens: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl Sessions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Start a session and return its token.
    pub fn issue(&self) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Instant::now();
        let mut tokens = self.tokens.lock();
        tokens.retain(|_, expiry| *expiry > now);
        tokens.insert(token.clone(), now + self.ttl);
        token
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens
            .lock()
            .get(token)
            .map_or(false, |expiry| *expiry > Instant::now())
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.lock().remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Clone)]
pub struct AppState {
    pub fail2ban: Fail2banClient,
    pub logs: LogReader,
    pub geoip: GeoIpService,
    pub sessions: Sessions,
    credentials: Arc<Credentials>,
}

impl AppState {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &Config) -> anyhow::Result<Self> {
        let geoip = GeoIpService::new(
            config.geoip_url.clone(),
            GeoCache::new(config.geoip_cache_size),
        )?;

        Ok(Self {
            fail2ban: Fail2banClient::with_activity_log(runner.clone(), config.fail2ban_log.clone()),
            logs: LogReader::new(runner),
            geoip,
            sessions: Sessions::default(),
            credentials: Arc::new(Credentials {
                username: config.admin_username.clone(),
                password: config.admin_password.clone(),
            }),
        })
    }

    fn check_credentials(&self, username: &str, password: &str) -> bool {
        username == self.credentials.username && password == self.credentials.password
    }
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new().route("/login", get(auth::login_page).post(auth::login));

    let protected = Router::new()
        // pages
        .route("/", get(pages::index))
        .route("/detail/:name", get(pages::detail))
        .route("/logout", get(auth::logout))
        // API
        .route("/api/jails", get(api::jails))
        .route("/api/jail/:name", get(api::jail_detail))
        .route("/api/jail/:name/histogram", get(api::histogram))
        .route("/api/jail/:name/ban", post(api::ban))
        .route("/api/jail/:name/unban", post(api::unban))
        .route("/api/logs/:name", get(api::logs))
        .route("/api/logs/:name/summary", get(api::summary))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(CookieManagerLayer::new())
        .layer(CatchPanicLayer::custom(api::panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
