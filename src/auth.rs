// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Bearer-session verification for the management surface.
//!
//! Sessions are issued elsewhere; this module only verifies a presented
//! token against the session store and resolves the account behind it.

use crate::{error::AppError, handlers::AppState};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// The authenticated caller on a management route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

/// Pull a bearer token out of the `Authorization` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;

    let raw = raw.trim();
    let (scheme, rest) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = rest.trim();
    if token.is_empty() {
        return None;
    }

    Some(token.to_string())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;

        let session = state
            .db
            .get_session(&token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if session.expires_at <= Utc::now() {
            debug!("expired session token presented");
            return Err(AppError::Unauthorized);
        }

        let user = state
            .db
            .get_user(&session.user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            user_id: user.user_id,
            email: user.email,
        })
    }
}
