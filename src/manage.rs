// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Authenticated form management: CRUD, ownership transfer, submission
//! listing, and CSV export.
//!
//! Every lookup is filtered by owner + id in the query; a form that exists
//! but belongs to someone else reads as not found.

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    handlers::AppState,
    models::{field_text, Form, FormPatch},
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Upper bound on rows pulled into one CSV export.
const EXPORT_MAX_ROWS: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct CreateFormRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Create a form for the calling user.
pub async fn create_form(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateFormRequest>,
) -> Result<impl IntoResponse> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Form name is required".to_string()));
    }

    let form = Form::new(
        user.user_id,
        request.name.trim().to_string(),
        request.description.filter(|d| !d.trim().is_empty()),
    );
    let created = state.db.create_form(&form).await?;
    info!(form_id = %created.form_id, "form created");

    Ok((StatusCode::CREATED, Json(created)))
}

/// List the calling user's forms.
pub async fn list_forms(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Form>>> {
    let forms = state.db.list_forms(&user.user_id).await?;
    Ok(Json(forms))
}

/// Read one owned form.
pub async fn get_form(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<Form>> {
    let form = state
        .db
        .get_form_for_owner(&form_id, &user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(form))
}

/// Partially update one owned form.
pub async fn update_form(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(form_id): Path<String>,
    Json(patch): Json<FormPatch>,
) -> Result<Json<Form>> {
    let mut form = state
        .db
        .get_form_for_owner(&form_id, &user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    form.apply_patch(patch);
    let updated = state.db.update_form(&form).await?;
    Ok(Json(updated))
}

/// Delete one owned form and all of its submissions.
pub async fn delete_form(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(form_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state
        .db
        .get_form_for_owner(&form_id, &user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    state.db.delete_form_cascade(&form_id).await?;
    info!(form_id = %form_id, "form deleted with submissions");

    Ok(Json(json!({ "message": "Form deleted successfully" })))
}

/// Reassign one owned form to another existing user by email.
pub async fn transfer_form(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(form_id): Path<String>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<serde_json::Value>> {
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("Target email is required".to_string()))?;

    let mut form = state
        .db
        .get_form_for_owner(&form_id, &user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let target = state
        .db
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| AppError::Validation("User with this email does not exist".to_string()))?;

    if target.user_id == user.user_id {
        return Err(AppError::Validation("You already own this form".to_string()));
    }

    form.owner_id = target.user_id;
    form.updated_at = chrono::Utc::now();
    state.db.update_form(&form).await?;
    info!(form_id = %form_id, new_owner = %target.email, "form ownership transferred");

    Ok(Json(json!({
        "message": "Form transferred successfully",
        "new_owner": target.email,
    })))
}

/// List one owned form's submissions, newest first.
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(form_id): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<serde_json::Value>> {
    state
        .db
        .get_form_for_owner(&form_id, &user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let limit = page.limit.clamp(1, 500);
    let submissions = state.db.list_submissions(&form_id, limit, page.offset).await?;
    let total = state.db.count_submissions(&form_id).await?;

    Ok(Json(json!({
        "submissions": submissions,
        "total": total,
    })))
}

/// Export one owned form's submissions as CSV. Columns are the submission
/// timestamp plus the union of payload keys across the exported rows.
pub async fn export_submissions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(form_id): Path<String>,
) -> Result<Response> {
    state
        .db
        .get_form_for_owner(&form_id, &user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let submissions = state
        .db
        .list_submissions(&form_id, EXPORT_MAX_ROWS, 0)
        .await?;
    if submissions.len() == EXPORT_MAX_ROWS {
        tracing::warn!(form_id = %form_id, max = EXPORT_MAX_ROWS, "export truncated at row cap");
    }

    let mut columns: BTreeSet<String> = BTreeSet::new();
    for submission in &submissions {
        columns.extend(submission.payload.keys().cloned());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut head = vec!["submitted_at".to_string()];
    head.extend(columns.iter().cloned());
    writer
        .write_record(&head)
        .map_err(|e| AppError::Internal(format!("csv write failed: {e}")))?;

    for submission in &submissions {
        let mut row = vec![submission.submitted_at.to_rfc3339()];
        for column in &columns {
            row.push(
                submission
                    .payload
                    .get(column)
                    .map(field_text)
                    .unwrap_or_default(),
            );
        }
        writer
            .write_record(&row)
            .map_err(|e| AppError::Internal(format!("csv write failed: {e}")))?;
    }

    let data = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("csv write failed: {e}")))?;

    let disposition = format!("attachment; filename=\"form-{form_id}-submissions.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or(HeaderValue::from_static("attachment")),
            ),
        ],
        data,
    )
        .into_response())
}
