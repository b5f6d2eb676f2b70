// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! The submission intake pipeline.
//!
//! One inbound payload runs the gates in order: rate limit on the source
//! key, body parse, form lookup, origin resolution, persistence, and then
//! notification hand-off. Notification is fire-and-forget: the send runs
//! in a spawned task and can neither delay nor fail the response, and the
//! submission is already committed by the time it starts.

use crate::{
    db::Database,
    error::{AppError, Result},
    limiter::{RateLimitDecision, RateLimiter},
    metrics::{outcome, Metrics},
    models::Submission,
    notify::{notification_recipients, Mailer},
    origin::{OriginDecision, OriginPolicy},
};
use axum::body::Bytes;
use futures::stream;
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Acknowledgement for an accepted submission.
#[derive(Debug)]
pub struct SubmissionAck {
    pub submission_id: String,
    /// Origin to reflect in the response CORS header
    pub origin: OriginDecision,
}

/// Orchestrates validation, persistence, and notification for one payload.
#[derive(Clone)]
pub struct SubmissionPipeline {
    db: Database,
    limiter: RateLimiter,
    origins: OriginPolicy,
    mailer: Option<Arc<Mailer>>,
    metrics: Metrics,
}

impl SubmissionPipeline {
    pub fn new(
        db: Database,
        limiter: RateLimiter,
        origins: OriginPolicy,
        mailer: Option<Arc<Mailer>>,
        metrics: Metrics,
    ) -> Self {
        Self {
            db,
            limiter,
            origins,
            mailer,
            metrics,
        }
    }

    /// Run one payload through the pipeline.
    pub async fn submit(
        &self,
        form_id: &str,
        content_type: Option<&str>,
        request_origin: Option<&str>,
        source_key: &str,
        body: Bytes,
    ) -> Result<SubmissionAck> {
        if let RateLimitDecision::Limited { retry_after } = self.limiter.check(source_key).await {
            info!(key = source_key, retry_after_secs = retry_after.as_secs(), "submission rate limited");
            self.metrics
                .submissions
                .with_label_values(&[outcome::RATE_LIMITED])
                .inc();
            return Err(AppError::RateLimited { retry_after });
        }

        let payload = match parse_payload(content_type, body).await {
            Ok(payload) => payload,
            Err(e) => {
                self.metrics
                    .submissions
                    .with_label_values(&[outcome::ERROR])
                    .inc();
                return Err(e);
            }
        };

        // absent and inactive forms are deliberately indistinguishable here
        let form = match self.db.get_form(form_id).await? {
            Some(form) if form.is_active => form,
            _ => {
                debug!(form_id, "submission to missing or inactive form");
                self.metrics
                    .submissions
                    .with_label_values(&[outcome::FORM_NOT_FOUND])
                    .inc();
                return Err(AppError::NotFound);
            }
        };

        let origin = self
            .origins
            .resolve(request_origin, &form.allowed_origins);
        if !origin.is_allowed() {
            info!(form_id, origin = ?request_origin, "submission origin rejected");
            self.metrics
                .submissions
                .with_label_values(&[outcome::ORIGIN_REJECTED])
                .inc();
            return Err(AppError::OriginRejected);
        }

        let submission = Submission::new(form.form_id.clone(), payload);
        self.db.create_submission(&submission).await?;
        debug!(form_id, submission_id = %submission.submission_id, "submission recorded");

        if form.settings.email_notifications {
            if let Some(mailer) = self.mailer.clone() {
                let db = self.db.clone();
                let metrics = self.metrics.clone();
                let payload = submission.payload.clone();
                tokio::spawn(async move {
                    let owner = match db.get_user(&form.owner_id).await {
                        Ok(owner) => owner,
                        Err(e) => {
                            warn!(error = %e, "owner lookup for notification failed");
                            None
                        }
                    };
                    let recipients = notification_recipients(&form.settings, owner.as_ref());
                    if recipients.is_empty() {
                        debug!(form_id = %form.form_id, "no notification recipients");
                        return;
                    }
                    match mailer
                        .send_submission_notice(&recipients, &form.name, &form.form_id, &payload)
                        .await
                    {
                        Ok(()) => {
                            metrics.notifications.with_label_values(&["sent"]).inc();
                        }
                        Err(e) => {
                            warn!(form_id = %form.form_id, error = %e, "notification send failed");
                            metrics.notifications.with_label_values(&["failed"]).inc();
                        }
                    }
                });
            }
        }

        self.metrics
            .submissions
            .with_label_values(&[outcome::ACCEPTED])
            .inc();
        Ok(SubmissionAck {
            submission_id: submission.submission_id,
            origin,
        })
    }
}

/// Parse a request body into a flat payload map by declared content type.
///
/// JSON objects pass through; URL-encoded and multipart fields collapse
/// into string values. Unrecognized content types yield an empty payload
/// so the submission is still recorded as an empty record.
pub async fn parse_payload(
    content_type: Option<&str>,
    body: Bytes,
) -> Result<Map<String, Value>> {
    let media_type = content_type
        .map(|s| s.split(';').next().unwrap_or(s).trim().to_lowercase())
        .unwrap_or_default();

    match media_type.as_str() {
        "application/json" => {
            let value: Value = serde_json::from_slice(&body)
                .map_err(|e| AppError::Internal(format!("malformed JSON body: {e}")))?;
            match value {
                Value::Object(map) => Ok(map),
                _ => Err(AppError::Internal(
                    "JSON submission body must be an object".to_string(),
                )),
            }
        }
        "application/x-www-form-urlencoded" => {
            let mut map = Map::new();
            for (key, value) in url::form_urlencoded::parse(&body) {
                map.insert(key.into_owned(), Value::String(value.into_owned()));
            }
            Ok(map)
        }
        "multipart/form-data" => parse_multipart(content_type.unwrap_or_default(), body).await,
        other => {
            debug!(content_type = other, "unrecognized content type, recording empty payload");
            Ok(Map::new())
        }
    }
}

async fn parse_multipart(content_type: &str, body: Bytes) -> Result<Map<String, Value>> {
    let boundary = match multer::parse_boundary(content_type) {
        Ok(boundary) => boundary,
        Err(_) => {
            debug!("multipart body without boundary, recording empty payload");
            return Ok(Map::new());
        }
    };

    let stream = stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut map = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Internal(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(|n| n.to_string()) else {
            continue;
        };
        let text = field
            .text()
            .await
            .map_err(|e| AppError::Internal(format!("malformed multipart field: {e}")))?;
        map.insert(name, Value::String(text));
    }
    Ok(map)
}
