// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Cross-origin resolution for form endpoints.
//!
//! A form with an empty allow-list accepts any origin and echoes the
//! wildcard. A non-empty allow-list accepts an origin only on exact match
//! after normalization, or when the origin's host carries one of the
//! configured trusted platform suffixes (the hosted preview domains).

use tracing::debug;
use url::Url;

/// Outcome of resolving a request origin against a form's allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// Open policy: no allow-list configured, any origin accepted
    Any,
    /// Origin matched the allow-list (or a trusted suffix); echo it back
    Allowed(String),
    /// Origin did not match a non-empty allow-list
    Rejected,
}

impl OriginDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Rejected)
    }

    /// Value for the `Access-Control-Allow-Origin` response header.
    /// Rejections have no origin to echo.
    pub fn header_value(&self) -> Option<&str> {
        match self {
            Self::Any => Some("*"),
            Self::Allowed(origin) => Some(origin),
            Self::Rejected => None,
        }
    }
}

/// Normalize an origin for comparison: trim whitespace, strip trailing
/// slashes, lowercase. Applied identically to the request header and to
/// every allow-list entry, and idempotent.
pub fn normalize_origin(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_lowercase()
}

/// Origin resolution policy shared by every form.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    trusted_suffixes: Vec<String>,
}

impl OriginPolicy {
    /// Build a policy from configured trusted host suffixes. Suffixes are
    /// anchored at a label boundary (a leading dot is added when missing)
    /// so `formgate.app` can never match `evil-formgate.app`.
    pub fn new(trusted_suffixes: Vec<String>) -> Self {
        let trusted_suffixes = trusted_suffixes
            .into_iter()
            .map(|s| {
                let s = s.trim().to_lowercase();
                if s.starts_with('.') {
                    s
                } else {
                    format!(".{s}")
                }
            })
            .filter(|s| s.len() > 1)
            .collect();
        Self { trusted_suffixes }
    }

    /// Resolve a request origin against a form's allow-list.
    pub fn resolve(&self, request_origin: Option<&str>, allow_list: &[String]) -> OriginDecision {
        if allow_list.is_empty() {
            return OriginDecision::Any;
        }

        let Some(raw) = request_origin else {
            debug!("origin header absent for allow-listed form");
            return OriginDecision::Rejected;
        };
        let origin = normalize_origin(raw);

        if allow_list
            .iter()
            .any(|entry| normalize_origin(entry) == origin)
        {
            return OriginDecision::Allowed(origin);
        }

        if self.has_trusted_suffix(&origin) {
            debug!(%origin, "origin accepted via trusted platform suffix");
            return OriginDecision::Allowed(origin);
        }

        debug!(%origin, "origin not in allow-list");
        OriginDecision::Rejected
    }

    fn has_trusted_suffix(&self, origin: &str) -> bool {
        let Ok(url) = Url::parse(origin) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        self.trusted_suffixes
            .iter()
            .any(|suffix| host.ends_with(suffix.as_str()))
    }
}
