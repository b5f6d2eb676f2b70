// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the FormGate relay.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthorized,

    /// A missing, inactive, or not-owned form. The public route reports
    /// inactive and absent forms identically so they cannot be probed apart.
    #[error("form not found")]
    NotFound,

    #[error("origin not allowed")]
    OriginRejected,

    #[error("too many requests")]
    RateLimited { retry_after: Duration },

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::OriginRejected => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "FORM_NOT_FOUND",
            Self::OriginRejected => "ORIGIN_NOT_ALLOWED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short, uniform message for callers. Unexpected failures are collapsed
    /// to an opaque message; the diagnostic goes to the log instead.
    fn public_message(&self) -> String {
        match self {
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::NotFound => "Form not found or inactive".to_string(),
            Self::OriginRejected => "Origin not allowed".to_string(),
            Self::RateLimited { .. } => "Too many requests. Try again later.".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Something went wrong".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Database(_) | Self::Internal(_) = self {
            tracing::error!(error = %self, "request failed");
        }

        let status = self.status();
        let retry_after_secs = match &self {
            Self::RateLimited { retry_after } => Some(retry_after.as_secs()),
            _ => None,
        };
        let body = ErrorResponse {
            message: self.public_message(),
            code: self.code(),
            retry_after_secs,
        };

        match retry_after_secs {
            Some(secs) => (
                status,
                [(header::RETRY_AFTER, secs.to_string())],
                Json(body),
            )
                .into_response(),
            None => (status, Json(body)).into_response(),
        }
    }
}
