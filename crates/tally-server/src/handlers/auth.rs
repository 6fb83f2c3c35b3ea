//! Authentication-related handlers

use axum::{Extension, Json};
use serde::Serialize;

use crate::Session;

/// Response for the /api/auth/session endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub authenticated: bool,
    /// The signed-in user's email or identifier
    pub user: Option<String>,
    /// How the user was authenticated
    pub auth_method: Option<String>,
}

/// GET /api/auth/session - Report the current session, if any
///
/// Reachable without a session so the sign-in page can ask.
pub async fn get_session(session: Option<Extension<Session>>) -> Json<SessionResponse> {
    let response = match session {
        Some(Extension(session)) => SessionResponse {
            authenticated: true,
            user: Some(session.user),
            auth_method: Some(session.method.as_str().to_string()),
        },
        None => SessionResponse {
            authenticated: false,
            user: None,
            auth_method: None,
        },
    };
    Json(response)
}
