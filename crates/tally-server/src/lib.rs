//! Tally Web Server
//!
//! Axum-based REST API for the Tally monthly budget tracker.
//!
//! Security features:
//! - Session gate in front of the API and the budget pages (secure by default,
//!   use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Audit logging for all budget access (reads and writes)
//! - Sanitized error responses

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use tally_core::{BudgetConfig, Database, IdGenerator, UuidGenerator};

mod handlers;

/// Maximum request body size for budget writes (256 KB)
pub const MAX_BODY_SIZE: usize = 256 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Header set by the identity-aware proxy for the signed-in user
const PROXY_USER_HEADER: &str = "x-auth-request-email";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Where signed-in visitors to `/` are sent
const DASHBOARD_PATH: &str = "/dashboard";

/// Page routes that need a session
const PROTECTED_PAGE_PREFIXES: [&str; 2] = ["/dashboard", "/budget"];

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether a session is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys for scripted access
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<String>,
    /// Networks whose requests count as signed in (e.g., "192.168.1.0/24")
    pub trusted_networks: Vec<ipnet::IpNet>,
    /// Proxies whose X-Forwarded-For headers are trusted
    pub trusted_proxies: Vec<ipnet::IpNet>,
    /// Where visitors without a session are redirected from protected pages
    pub sign_in_path: String,
    /// Budget settings shared by every handler
    pub budget: BudgetConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
            trusted_networks: vec![],
            trusted_proxies: vec![],
            sign_in_path: "/".to_string(),
            budget: BudgetConfig::default(),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Source of ids for new events and repayments
    pub ids: Arc<dyn IdGenerator>,
}

// ============================================================================
// Session gate
// ============================================================================

/// How a request's session was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ProxyHeader,
    ApiKey,
    TrustedNetwork,
    /// Authentication disabled
    None,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProxyHeader => "proxy_header",
            Self::ApiKey => "api_key",
            Self::TrustedNetwork => "trusted_network",
            Self::None => "none",
        }
    }
}

/// The signed-in identity, inserted into request extensions by the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: String,
    pub method: AuthMethod,
}

impl Session {
    fn local_dev() -> Self {
        Self {
            user: "local-dev".to_string(),
            method: AuthMethod::None,
        }
    }
}

/// What the gate does with a request
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum GateDecision {
    Continue,
    Unauthorized,
    Redirect(String),
}

/// Route a request given its path and whether it carries a session
pub(crate) fn gate_decision(path: &str, has_session: bool, sign_in_path: &str) -> GateDecision {
    if has_session {
        if path == "/" {
            return GateDecision::Redirect(DASHBOARD_PATH.to_string());
        }
        return GateDecision::Continue;
    }

    if path.starts_with("/api/auth") {
        return GateDecision::Continue;
    }
    if path == "/api" || path.starts_with("/api/") {
        return GateDecision::Unauthorized;
    }
    if PROTECTED_PAGE_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return GateDecision::Redirect(sign_in_path.to_string());
    }
    GateDecision::Continue
}

/// Work out who is making the request, if anyone
///
/// # Security Notes
///
/// **Trusted networks**: Requests from IPs in `trusted_networks` count as
/// signed in. The client IP comes from the TCP peer unless the peer is a
/// trusted proxy.
///
/// **Proxy header**: `X-Auth-Request-Email` is set by the identity-aware proxy
/// in front of the server. It can be spoofed if the server is exposed directly.
///
/// **API keys**: Compared using constant-time comparison.
pub(crate) fn resolve_session(
    request: &Request,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    config: &ServerConfig,
) -> Option<Session> {
    if !config.trusted_networks.is_empty() {
        let client_ip = get_client_ip(request, connect_info, &config.trusted_proxies);
        debug!(
            ?client_ip,
            trusted_networks = ?config.trusted_networks,
            path = %request.uri().path(),
            "Checking trusted network auth"
        );
        if let Some(ip) = client_ip.filter(|ip| is_ip_trusted(ip, &config.trusted_networks)) {
            return Some(Session {
                user: ip.to_string(),
                method: AuthMethod::TrustedNetwork,
            });
        }
    }

    let proxy_user = request
        .headers()
        .get(PROXY_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());
    if let Some(email) = proxy_user {
        return Some(Session {
            user: email.to_string(),
            method: AuthMethod::ProxyHeader,
        });
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &config.api_keys))
        .unwrap_or(false);
    if api_key_valid {
        return Some(Session {
            user: "api-key".to_string(),
            method: AuthMethod::ApiKey,
        });
    }

    None
}

/// Session gate middleware
///
/// Resolves the session, stores it in request extensions for handlers, and
/// answers 401 or a redirect when the path needs a session it does not have.
async fn session_middleware(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = if state.config.require_auth {
        resolve_session(&request, connect_info.as_ref(), &state.config)
    } else {
        Some(Session::local_dev())
    };

    let path = request.uri().path().to_string();
    match gate_decision(&path, session.is_some(), &state.config.sign_in_path) {
        GateDecision::Continue => {
            if let Some(session) = session {
                debug!(user = %session.user, method = session.method.as_str(), path = %path, "Session");
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        GateDecision::Redirect(to) => {
            debug!(from = %path, to = %to, "Redirecting");
            Redirect::to(&to).into_response()
        }
        GateDecision::Unauthorized => {
            warn!(path = %path, "Unauthorized request - no valid session");
            AppError::unauthorized("Authentication required").into_response()
        }
    }
}

/// Validate an API key against the configured keys using constant-time comparison
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Extract client IP address, respecting trusted proxies
///
/// SECURITY: X-Forwarded-For headers are ONLY trusted when the TCP connection
/// comes from a configured trusted proxy. Otherwise the TCP peer address is used.
pub(crate) fn get_client_ip(
    request: &Request,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trusted_proxies: &[ipnet::IpNet],
) -> Option<IpAddr> {
    let peer_ip = connect_info.map(|ci| ci.0.ip())?;

    if !trusted_proxies.iter().any(|net| net.contains(&peer_ip)) {
        return Some(peer_ip);
    }

    // X-Forwarded-For format: "client, proxy1, proxy2" - take the first (original client)
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    if forwarded.is_some() {
        return forwarded;
    }

    let real_ip = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

    real_ip.or(Some(peer_ip))
}

fn is_ip_trusted(ip: &IpAddr, trusted_networks: &[ipnet::IpNet]) -> bool {
    trusted_networks.iter().any(|network| network.contains(ip))
}

/// Parse a comma-separated list of IP addresses and CIDR networks
///
/// Examples:
/// - "192.168.1.0/24" - entire subnet
/// - "10.0.0.5" - single IP (parsed as /32 for IPv4 or /128 for IPv6)
/// - "192.168.1.0/24,10.0.0.0/8" - multiple networks
pub fn parse_trusted_networks(input: &str) -> Vec<ipnet::IpNet> {
    input
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(net) = s.parse::<ipnet::IpNet>() {
                return Some(net);
            }
            if let Ok(ip) = s.parse::<IpAddr>() {
                return Some(ipnet::IpNet::from(ip));
            }
            warn!(input = s, "Failed to parse trusted network entry");
            None
        })
        .collect()
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    create_router_with_ids(db, static_dir, config, Arc::new(UuidGenerator))
}

/// Create the application router with a specific id source (for testing)
pub fn create_router_with_ids(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    ids: Arc<dyn IdGenerator>,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        ids,
    });

    let api_routes = Router::new()
        // Auth
        .route("/auth/session", get(handlers::get_session))
        // Budgets
        .route(
            "/budget",
            get(handlers::list_budgets)
                .post(handlers::create_budget)
                .put(handlers::update_budget)
                .delete(handlers::delete_budget),
        )
        .route("/budget/preview", post(handlers::preview_budget))
        .route("/budget/:id", get(handlers::get_budget))
        .route("/budget/:id/summary", get(handlers::get_budget_summary))
        .route(
            "/budget/:id/transfers/:item",
            patch(handlers::set_transfer_completed),
        )
        // Audit
        .route("/audit", get(handlers::list_audit_log));

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // CSP: restrict scripts to same-origin, allow inline styles for the UI bundle
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new().nest("/api", api_routes);

    // The fallback sits inside the session layer so page routes are gated too
    app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.fallback(not_found_fallback),
    };

    app.layer(middleware::from_fn_with_state(
        state.clone(),
        session_middleware,
    ))
    .with_state(state)
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    // Security headers
    .layer(SetResponseHeaderLayer::overriding(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
        header::CONTENT_SECURITY_POLICY,
        csp_value,
    ))
}

async fn not_found_fallback() -> AppError {
    AppError::not_found("Not found")
}

/// Start the server with the given configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    }

    match db.count_budgets() {
        Ok(count) => info!(budgets = count, path = db.path(), "Database ready"),
        Err(e) => warn!(error = %e, "Failed to count budgets"),
    }

    let app = create_router(db, static_dir, config)
        .into_make_service_with_connect_info::<SocketAddr>();
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map a core error, keeping client-visible statuses for bad input and missing rows
    pub fn from_core(err: tally_core::Error) -> Self {
        match err {
            tally_core::Error::NotFound(msg) => Self::not_found(&msg),
            tally_core::Error::InvalidData(msg) => Self::bad_request(&msg),
            other => other.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
