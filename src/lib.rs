// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! FormGate
//!
//! A form-submission relay for static sites: users create forms, embed the
//! resulting endpoint URL, and the service accepts cross-origin POSTs,
//! persists them, and emails the owner.
//!
//! The intake pipeline runs each payload through, in order:
//!
//! - Per-IP fixed-window rate limiting (5 requests / 60 s default)
//! - Body parsing (JSON, URL-encoded, multipart; unknown types record an
//!   empty payload)
//! - Form lookup (missing and inactive forms are indistinguishable)
//! - Origin resolution against the form's allow-list
//! - Persistence, then fire-and-forget email notification

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod limiter;
pub mod manage;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod origin;

pub use config::Config;
pub use db::Database;
pub use error::{AppError, Result};
pub use intake::SubmissionPipeline;
pub use limiter::{MemoryStore, RateLimitDecision, RateLimiter, RateLimitStore};
pub use origin::{OriginDecision, OriginPolicy};
