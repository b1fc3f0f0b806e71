//! Shared error types for the services crate.

use thiserror::Error;

use api::{ApiError, ConfigError};
use lms_core::flow::FlowError;
use lms_core::model::LessonId;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `SessionContext`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("signed-in user could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why a lesson view could not be opened. The display text is shown to the
/// viewer as is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoadError {
    #[error("Lesson with ID {0} not found. Please check the lesson URL.")]
    NotFound(LessonId),
    #[error("Please login to access this lesson.")]
    LoginRequired,
    #[error("Lesson data is incomplete. Missing course information.")]
    Incomplete,
    #[error("Failed to load lesson details. Please try again.")]
    Failed,
}

impl LoadError {
    /// Classify a failed lesson fetch.
    #[must_use]
    pub fn from_api(lesson: LessonId, err: &ApiError) -> Self {
        if err.is_not_found() {
            Self::NotFound(lesson)
        } else if err.is_unauthorized() {
            Self::LoginRequired
        } else if matches!(err, ApiError::MissingField { .. }) {
            Self::Incomplete
        } else {
            Self::Failed
        }
    }
}

/// Errors emitted by `CertificateService::issue`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IssueError {
    #[error("Please login to claim your certificate")]
    NotLoggedIn,
    #[error("Only students can claim certificates")]
    WrongRole,
    /// Reason supplied by the backend.
    #[error("{0}")]
    Rejected(String),
    #[error("Failed to issue certificate. Please try again.")]
    Failed,
    #[error(transparent)]
    Flow(#[from] FlowError),
}

impl From<&ApiError> for IssueError {
    fn from(err: &ApiError) -> Self {
        if err.is_unauthorized() {
            return Self::NotLoggedIn;
        }
        if err.is_forbidden() {
            return Self::WrongRole;
        }
        err.server_message().map_or(Self::Failed, Self::Rejected)
    }
}

/// Errors emitted by `EnrollmentService::enroll`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnrollError {
    #[error("Please login to enroll in courses")]
    NotLoggedIn,
    #[error("Only students can enroll in courses")]
    WrongRole,
    #[error("Enrollment failed. Please try again.")]
    Failed(#[source] ApiError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_load_errors_carry_viewer_text() {
        let id = LessonId::new(12);
        assert_eq!(
            LoadError::from_api(id, &ApiError::status(404, "")).to_string(),
            "Lesson with ID 12 not found. Please check the lesson URL."
        );
        assert_eq!(
            LoadError::from_api(id, &ApiError::status(401, "")),
            LoadError::LoginRequired
        );
        assert_eq!(
            LoadError::from_api(id, &ApiError::Transport("reset".into())),
            LoadError::Failed
        );
    }

    #[test]
    fn issue_error_prefers_server_reason() {
        let plain = IssueError::from(&ApiError::status(400, "Course not completed"));
        assert_eq!(plain.to_string(), "Course not completed");

        let json = IssueError::from(&ApiError::status(400, r#"{"error":"Already issued"}"#));
        assert_eq!(json, IssueError::Rejected("Already issued".into()));

        let bare = IssueError::from(&ApiError::status(500, ""));
        assert_eq!(
            bare.to_string(),
            "Failed to issue certificate. Please try again."
        );
        assert_eq!(
            IssueError::from(&ApiError::status(403, "")),
            IssueError::WrongRole
        );
    }
}
