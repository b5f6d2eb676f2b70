// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the intake pipeline.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Intake outcome labels.
pub mod outcome {
    pub const ACCEPTED: &str = "accepted";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const ORIGIN_REJECTED: &str = "origin_rejected";
    pub const FORM_NOT_FOUND: &str = "form_not_found";
    pub const ERROR: &str = "error";
}

/// Metrics registry and counters shared across handlers.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub submissions: IntCounterVec,
    pub notifications: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new("formgate_submissions_total", "Intake requests by outcome"),
            &["outcome"],
        )
        .expect("valid metric definition");
        let notifications = IntCounterVec::new(
            Opts::new(
                "formgate_notifications_total",
                "Notification sends by outcome",
            ),
            &["outcome"],
        )
        .expect("valid metric definition");

        registry
            .register(Box::new(submissions.clone()))
            .expect("register submissions counter");
        registry
            .register(Box::new(notifications.clone()))
            .expect("register notifications counter");

        Self {
            registry,
            submissions,
            notifications,
        }
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "metrics encoding failed");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
