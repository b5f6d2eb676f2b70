// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Data models for forms, submissions, users, and sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Per-form notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSettings {
    /// Send an email for each accepted submission
    #[serde(default = "default_true")]
    pub email_notifications: bool,
    /// Recipient addresses; the owner's address is used when empty
    #[serde(default)]
    pub notification_emails: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for FormSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            notification_emails: Vec::new(),
        }
    }
}

/// A configured submission endpoint owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    /// Unique form identifier, part of the public endpoint URL
    pub form_id: String,
    /// Owning user
    pub owner_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Inactive forms reject submissions exactly like missing ones
    pub is_active: bool,
    #[serde(default)]
    pub settings: FormSettings,
    /// Origins permitted to submit cross-origin; empty accepts any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Form {
    pub fn new(owner_id: String, name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            form_id: Uuid::new_v4().to_string(),
            owner_id,
            name,
            description,
            is_active: true,
            settings: FormSettings::default(),
            allowed_origins: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One accepted payload recorded against a form. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: String,
    pub form_id: String,
    /// Open-ended string-keyed payload, shape unconstrained
    pub payload: Map<String, Value>,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(form_id: String, payload: Map<String, Value>) -> Self {
        Self {
            submission_id: Uuid::new_v4().to_string(),
            form_id,
            payload,
            submitted_at: Utc::now(),
        }
    }
}

/// An account record. Accounts are provisioned outside this service;
/// FormGate only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A bearer session. Issued outside this service; FormGate only verifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Partial update for a form. Absent fields are left untouched;
/// `settings` merges field-wise, `allowed_origins` replaces the list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub settings: Option<SettingsPatch>,
    pub allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub email_notifications: Option<bool>,
    pub notification_emails: Option<Vec<String>>,
}

impl Form {
    /// Apply a partial update. Empty names are ignored, matching the
    /// dashboard's behavior of never clearing a name.
    pub fn apply_patch(&mut self, patch: FormPatch) {
        if let Some(name) = patch.name {
            if !name.trim().is_empty() {
                self.name = name;
            }
        }
        if let Some(description) = patch.description {
            self.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(settings) = patch.settings {
            if let Some(v) = settings.email_notifications {
                self.settings.email_notifications = v;
            }
            if let Some(v) = settings.notification_emails {
                self.settings.notification_emails = v;
            }
        }
        if let Some(origins) = patch.allowed_origins {
            self.allowed_origins = origins;
        }
        self.updated_at = Utc::now();
    }
}

/// Render a payload value the way a person wrote it: strings bare,
/// everything else as compact JSON.
pub fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
