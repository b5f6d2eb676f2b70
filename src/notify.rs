// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission notification emails.
//!
//! Renders a fixed HTML template and hands it to an external transactional
//! mail API in a single send. Best-effort only: no retry, and failures
//! never surface to the submitter.

use crate::config::MailConfig;
use crate::models::{field_text, FormSettings, User};
use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    html_content: String,
}

/// Mail API client
pub struct Mailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: EmailAddress,
    dashboard_url: String,
}

impl Mailer {
    /// Build a mailer when the transport is configured; `None` disables
    /// notifications entirely.
    pub fn from_config(config: &MailConfig, dashboard_url: &str) -> Option<Self> {
        if config.api_key.trim().is_empty() || config.sender.trim().is_empty() {
            return None;
        }
        Some(Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.trim().to_string(),
            sender: EmailAddress {
                email: config.sender.trim().to_string(),
                name: config.sender_name.clone(),
            },
            dashboard_url: dashboard_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send one submission notice to the given recipients.
    pub async fn send_submission_notice(
        &self,
        recipients: &[String],
        form_name: &str,
        form_id: &str,
        payload: &Map<String, Value>,
    ) -> Result<()> {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: self.sender.email.clone(),
                name: self.sender.name.clone(),
            },
            to: recipients
                .iter()
                .map(|email| EmailAddress {
                    email: email.clone(),
                    name: None,
                })
                .collect(),
            subject: format!("New submission for {form_name}"),
            html_content: render_submission_email(
                form_name,
                form_id,
                &self.dashboard_url,
                payload,
            ),
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("mail API send failed (status={status}): {detail}"));
        }

        Ok(())
    }
}

/// Resolve the notification recipients for a form: the configured list,
/// or the owner's address when the list is empty.
pub fn notification_recipients(settings: &FormSettings, owner: Option<&User>) -> Vec<String> {
    if !settings.notification_emails.is_empty() {
        return settings.notification_emails.clone();
    }
    owner
        .map(|user| vec![user.email.clone()])
        .unwrap_or_default()
}

/// Render the notification email body. Submitted values pass through
/// [`escape_html`] before templating.
pub fn render_submission_email(
    form_name: &str,
    form_id: &str,
    dashboard_url: &str,
    payload: &Map<String, Value>,
) -> String {
    let fields_html = if payload.is_empty() {
        "<em>No fields submitted</em>".to_string()
    } else {
        payload
            .iter()
            .map(|(key, value)| {
                format!(
                    "<strong>{}:</strong> {}",
                    escape_html(key),
                    escape_html(&field_text(value))
                )
            })
            .collect::<Vec<_>>()
            .join("<br>")
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>New Submission</title>
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f9fafb;">
  <table width="100%" cellpadding="0" cellspacing="0" style="background-color: #f9fafb; padding: 40px 20px;">
    <tr>
      <td align="center">
        <table width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; border-radius: 8px; overflow: hidden;">
          <tr>
            <td style="padding: 32px 40px; text-align: center; background-color: #000000;">
              <span style="color: #ffffff; font-size: 20px; font-weight: bold;">FormGate</span>
            </td>
          </tr>
          <tr>
            <td style="padding: 40px;">
              <h1 style="margin: 0 0 16px 0; font-size: 24px; color: #111827;">New Form Submission</h1>
              <p style="margin: 0 0 24px 0; font-size: 16px; line-height: 24px; color: #6b7280;">
                You have received a new submission for your form <strong>{form_name}</strong>.
              </p>
              <div style="background: #f9fafb; padding: 24px; border-radius: 8px; border: 1px solid #e5e7eb;">
                {fields_html}
              </div>
              <table width="100%" cellpadding="0" cellspacing="0">
                <tr>
                  <td align="center" style="padding: 24px 0;">
                    <a href="{dashboard_url}/dashboard/forms/{form_id}" style="display: inline-block; padding: 14px 32px; background-color: #000000; color: #ffffff; text-decoration: none; border-radius: 6px; font-size: 14px;">
                      View in Dashboard
                    </a>
                  </td>
                </tr>
              </table>
            </td>
          </tr>
          <tr>
            <td style="padding: 24px 40px; background-color: #f9fafb; text-align: center; border-top: 1px solid #e5e7eb;">
              <p style="margin: 0; font-size: 12px; color: #9ca3af;">FormGate — form endpoints for static sites.</p>
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#,
        form_name = escape_html(form_name),
        form_id = form_id,
        dashboard_url = dashboard_url,
        fields_html = fields_html,
    )
}

/// Escape text for interpolation into HTML.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
