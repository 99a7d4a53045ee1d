use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::api::page::{notice_for, render_page};
use crate::api::server::AppState;
use crate::auth::{CredentialStore, StoreError};

/// Fields posted by either form on the page.
///
/// The registration form sends `reg_username`/`reg_password` with the
/// `register_submit` marker; the login form sends `username`/`password` with
/// `login_submit`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FormPayload {
    pub register_submit: Option<String>,
    pub login_submit: Option<String>,
    pub reg_username: String,
    pub reg_password: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("username is empty")]
    EmptyUsername,
    #[error("password is empty")]
    EmptyPassword,
}

/// A username (trimmed) and password (verbatim), both non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Result<Self, ValidationError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ValidationError::EmptyUsername);
        }
        if password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Register { username: String, password: String },
    Login { username: String, password: String },
}

impl FormPayload {
    /// Picks the submitted flow from the marker fields.
    ///
    /// Registration wins when both markers are present.
    pub fn into_submission(self) -> Option<Submission> {
        if self.register_submit.is_some() {
            Some(Submission::Register {
                username: self.reg_username,
                password: self.reg_password,
            })
        } else if self.login_submit.is_some() {
            Some(Submission::Login {
                username: self.username,
                password: self.password,
            })
        } else {
            None
        }
    }
}

/// Result of one submission, independent of how it is presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Registered,
    DuplicateUsername,
    LoggedIn { username: String },
    InvalidCredentials,
    MissingFields,
    StorageFailure,
}

impl Outcome {
    /// The authenticated username, only after a successful login.
    pub fn current_user(&self) -> Option<&str> {
        match self {
            Outcome::LoggedIn { username } => Some(username),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Registered | Outcome::LoggedIn { .. } => StatusCode::OK,
            Outcome::DuplicateUsername => StatusCode::CONFLICT,
            Outcome::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Outcome::MissingFields => StatusCode::BAD_REQUEST,
            Outcome::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub async fn register(store: &CredentialStore, username: &str, password: &str) -> Outcome {
    let credentials = match Credentials::new(username, password) {
        Ok(credentials) => credentials,
        Err(err) => {
            debug!("registration rejected: {err}");
            return Outcome::MissingFields;
        }
    };

    match store
        .register(credentials.username(), credentials.password())
        .await
    {
        Ok(()) => Outcome::Registered,
        Err(StoreError::DuplicateUsername) => Outcome::DuplicateUsername,
        Err(err) => {
            error!("registration failed: {err}");
            Outcome::StorageFailure
        }
    }
}

pub async fn login(store: &CredentialStore, username: &str, password: &str) -> Outcome {
    let credentials = match Credentials::new(username, password) {
        Ok(credentials) => credentials,
        Err(err) => {
            debug!("login rejected: {err}");
            return Outcome::MissingFields;
        }
    };

    match store
        .verify(credentials.username(), credentials.password())
        .await
    {
        Ok(true) => {
            info!(username = credentials.username(), "login succeeded");
            Outcome::LoggedIn {
                username: credentials.username,
            }
        }
        Ok(false) => Outcome::InvalidCredentials,
        Err(err) => {
            error!("login failed: {err}");
            Outcome::StorageFailure
        }
    }
}

pub async fn handle_submission(store: &CredentialStore, submission: Submission) -> Outcome {
    match submission {
        Submission::Register { username, password } => register(store, &username, &password).await,
        Submission::Login { username, password } => login(store, &username, &password).await,
    }
}

pub async fn show_page() -> Html<String> {
    Html(render_page(None, None))
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Form(payload): Form<FormPayload>,
) -> impl IntoResponse {
    let Some(submission) = payload.into_submission() else {
        return (StatusCode::OK, Html(render_page(None, None)));
    };

    let outcome = handle_submission(&state.store, submission).await;
    let notice = notice_for(&outcome);

    (
        outcome.status(),
        Html(render_page(Some(&notice), outcome.current_user())),
    )
}
