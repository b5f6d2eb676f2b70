// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! SurrealDB integration for forms, submissions, users, and sessions.
//!
//! All lookups go through domain identifier fields (`form_id`, `user_id`,
//! `token`), never raw record ids. Management reads are filtered by
//! owner + id in the query itself; there is no separate authorization layer.

use crate::{
    error::{AppError, Result},
    models::{Form, Session, Submission, User},
};
use surrealdb::{
    engine::local::{Db, Mem},
    Surreal,
};

#[cfg(feature = "rocksdb")]
use surrealdb::engine::local::RocksDb;

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    db: Surreal<Db>,
}

impl Database {
    /// Connect to the embedded store. `"memory"` selects the in-memory
    /// engine; any other value is treated as a RocksDB path.
    pub async fn connect(path: &str) -> Result<Self> {
        let db = match path {
            "memory" => Surreal::new::<Mem>(()).await?,
            #[cfg(feature = "rocksdb")]
            path => Surreal::new::<RocksDb>(path).await?,
            #[cfg(not(feature = "rocksdb"))]
            other => {
                return Err(AppError::Internal(format!(
                    "storage path {other:?} requires the rocksdb feature"
                )))
            }
        };

        db.use_ns("formgate").use_db("relay").await?;

        Self::init_schema(&db).await?;

        Ok(Self { db })
    }

    /// Initialize database schema
    async fn init_schema(db: &Surreal<Db>) -> Result<()> {
        // Forms table
        db.query(
            r#"
            DEFINE TABLE forms SCHEMAFULL;
            DEFINE FIELD form_id ON forms TYPE string;
            DEFINE FIELD owner_id ON forms TYPE string;
            DEFINE FIELD name ON forms TYPE string;
            DEFINE FIELD description ON forms TYPE option<string>;
            DEFINE FIELD is_active ON forms TYPE bool;
            DEFINE FIELD settings ON forms TYPE object;
            DEFINE FIELD settings.email_notifications ON forms TYPE bool;
            DEFINE FIELD settings.notification_emails ON forms TYPE array<string>;
            DEFINE FIELD allowed_origins ON forms TYPE array<string>;
            DEFINE FIELD created_at ON forms TYPE datetime;
            DEFINE FIELD updated_at ON forms TYPE datetime;

            DEFINE INDEX form_id_idx ON forms COLUMNS form_id UNIQUE;
            DEFINE INDEX owner_idx ON forms COLUMNS owner_id;
        "#,
        )
        .await?;

        // Submissions table; payload shape is unconstrained
        db.query(
            r#"
            DEFINE TABLE submissions SCHEMALESS;
            DEFINE FIELD submitted_at ON submissions TYPE datetime;

            DEFINE INDEX submission_id_idx ON submissions COLUMNS submission_id UNIQUE;
            DEFINE INDEX submission_form_idx ON submissions COLUMNS form_id;
        "#,
        )
        .await?;

        // Users table (accounts are provisioned externally)
        db.query(
            r#"
            DEFINE TABLE users SCHEMAFULL;
            DEFINE FIELD user_id ON users TYPE string;
            DEFINE FIELD email ON users TYPE string;
            DEFINE FIELD name ON users TYPE option<string>;

            DEFINE INDEX user_id_idx ON users COLUMNS user_id UNIQUE;
            DEFINE INDEX user_email_idx ON users COLUMNS email UNIQUE;
        "#,
        )
        .await?;

        // Sessions table (issued externally, verified here)
        db.query(
            r#"
            DEFINE TABLE sessions SCHEMAFULL;
            DEFINE FIELD token ON sessions TYPE string;
            DEFINE FIELD user_id ON sessions TYPE string;
            DEFINE FIELD expires_at ON sessions TYPE datetime;

            DEFINE INDEX session_token_idx ON sessions COLUMNS token UNIQUE;
        "#,
        )
        .await?;

        Ok(())
    }

    /// Create a new form
    pub async fn create_form(&self, form: &Form) -> Result<Form> {
        let created: Vec<Form> = self.db.create("forms").content(form).await?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("failed to create form".to_string()))
    }

    /// Get a form by public id, regardless of owner. Used by the intake path.
    pub async fn get_form(&self, form_id: &str) -> Result<Option<Form>> {
        let mut result = self
            .db
            .query("SELECT * FROM forms WHERE form_id = $form_id")
            .bind(("form_id", form_id))
            .await?;

        let forms: Vec<Form> = result.take(0)?;
        Ok(forms.into_iter().next())
    }

    /// Get a form by id, filtered to its owner. Used by the management path.
    pub async fn get_form_for_owner(&self, form_id: &str, owner_id: &str) -> Result<Option<Form>> {
        let mut result = self
            .db
            .query("SELECT * FROM forms WHERE form_id = $form_id AND owner_id = $owner_id")
            .bind(("form_id", form_id))
            .bind(("owner_id", owner_id))
            .await?;

        let forms: Vec<Form> = result.take(0)?;
        Ok(forms.into_iter().next())
    }

    /// List a user's forms, newest first
    pub async fn list_forms(&self, owner_id: &str) -> Result<Vec<Form>> {
        let mut result = self
            .db
            .query("SELECT * FROM forms WHERE owner_id = $owner_id ORDER BY created_at DESC")
            .bind(("owner_id", owner_id))
            .await?;

        let forms: Vec<Form> = result.take(0)?;
        Ok(forms)
    }

    /// Replace a form's content. The caller is expected to have loaded the
    /// form through an owner-filtered read first.
    pub async fn update_form(&self, form: &Form) -> Result<Form> {
        let mut result = self
            .db
            .query("UPDATE forms CONTENT $form WHERE form_id = $form_id")
            .bind(("form", form))
            .bind(("form_id", &form.form_id))
            .await?;

        let updated: Vec<Form> = result.take(0)?;
        updated.into_iter().next().ok_or(AppError::NotFound)
    }

    /// Delete a form and every submission referencing it. No orphan
    /// submission survives its form's deletion.
    pub async fn delete_form_cascade(&self, form_id: &str) -> Result<()> {
        self.db
            .query("DELETE submissions WHERE form_id = $form_id")
            .bind(("form_id", form_id))
            .await?;
        self.db
            .query("DELETE forms WHERE form_id = $form_id")
            .bind(("form_id", form_id))
            .await?;
        Ok(())
    }

    /// Persist a submission
    pub async fn create_submission(&self, submission: &Submission) -> Result<Submission> {
        let created: Vec<Submission> = self.db.create("submissions").content(submission).await?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("failed to record submission".to_string()))
    }

    /// List a form's submissions, newest first
    pub async fn list_submissions(
        &self,
        form_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Submission>> {
        let query = format!(
            "SELECT * FROM submissions WHERE form_id = $form_id \
             ORDER BY submitted_at DESC LIMIT {} START {}",
            limit, offset
        );
        let mut result = self.db.query(&query).bind(("form_id", form_id)).await?;

        let submissions: Vec<Submission> = result.take(0)?;
        Ok(submissions)
    }

    /// Count a form's submissions
    pub async fn count_submissions(&self, form_id: &str) -> Result<usize> {
        let mut result = self
            .db
            .query("SELECT count() FROM submissions WHERE form_id = $form_id GROUP ALL")
            .bind(("form_id", form_id))
            .await?;

        let count: Option<i32> = result.take("count")?;
        Ok(count.unwrap_or(0) as usize)
    }

    /// Get a user by id
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let mut result = self
            .db
            .query("SELECT * FROM users WHERE user_id = $user_id")
            .bind(("user_id", user_id))
            .await?;

        let users: Vec<User> = result.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Get a user by email, for ownership transfer targets
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut result = self
            .db
            .query("SELECT * FROM users WHERE email = $email")
            .bind(("email", email.trim()))
            .await?;

        let users: Vec<User> = result.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Get a session by bearer token
    pub async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let mut result = self
            .db
            .query("SELECT * FROM sessions WHERE token = $token")
            .bind(("token", token))
            .await?;

        let sessions: Vec<Session> = result.take(0)?;
        Ok(sessions.into_iter().next())
    }

    /// Insert a user record. Account provisioning lives outside this
    /// service; this exists for seeding and tests.
    pub async fn insert_user(&self, user: &User) -> Result<User> {
        let created: Vec<User> = self.db.create("users").content(user).await?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("failed to insert user".to_string()))
    }

    /// Insert a session record. Session issuance lives outside this
    /// service; this exists for seeding and tests.
    pub async fn insert_session(&self, session: &Session) -> Result<Session> {
        let created: Vec<Session> = self.db.create("sessions").content(session).await?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("failed to insert session".to_string()))
    }
}
