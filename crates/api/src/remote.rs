//! Backend collaborator contracts.
//!
//! Every call takes the bearer token to send, or `None` for an
//! unauthenticated request. Which of the two to try first is the caller's
//! decision.

use std::sync::Arc;

use async_trait::async_trait;

use lms_core::model::{
    Certificate, CertificateEligibility, Course, CourseId, Lesson, LessonId, LessonProgress,
    Percent, ProgressReport,
};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::http::HttpApi;

#[async_trait]
pub trait LessonApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError::MissingField` if the lesson has no course id.
    async fn lesson(&self, id: LessonId, auth: Option<&str>) -> Result<Lesson, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport or status failures.
    async fn course(&self, id: CourseId, auth: Option<&str>) -> Result<Course, ApiError>;

    /// Lessons of a course in backend order (not necessarily by ordinal).
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or status failures.
    async fn course_lessons(
        &self,
        course: CourseId,
        auth: Option<&str>,
    ) -> Result<Vec<Lesson>, ApiError>;

    /// Server-side gate answer for the signed-in viewer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or status failures.
    async fn accessibility(&self, lesson: LessonId, auth: Option<&str>)
    -> Result<bool, ApiError>;
}

#[async_trait]
pub trait ProgressApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` on transport or status failures.
    async fn progress(
        &self,
        lesson: LessonId,
        auth: Option<&str>,
    ) -> Result<LessonProgress, ApiError>;

    /// Overwrite the viewer's progress record for a lesson.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or status failures.
    async fn save_progress(
        &self,
        report: &ProgressReport,
        auth: Option<&str>,
    ) -> Result<(), ApiError>;

    /// Idempotent forced completion.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or status failures.
    async fn mark_complete(&self, lesson: LessonId, auth: Option<&str>) -> Result<(), ApiError>;
}

#[async_trait]
pub trait CertificateApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` on transport or status failures.
    async fn eligibility(
        &self,
        course: CourseId,
        auth: Option<&str>,
    ) -> Result<CertificateEligibility, ApiError>;

    /// Server-computed course completion, already clamped.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or status failures.
    async fn completion(&self, course: CourseId, auth: Option<&str>) -> Result<Percent, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError::Status` with the backend's reason when issuance is
    /// refused.
    async fn issue(&self, course: CourseId, auth: Option<&str>) -> Result<Certificate, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport or status failures.
    async fn my_certificates(&self, auth: Option<&str>) -> Result<Vec<Certificate>, ApiError>;
}

#[async_trait]
pub trait EnrollmentApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError::Status` with 400 when already enrolled.
    async fn enroll(&self, course: CourseId, auth: Option<&str>) -> Result<(), ApiError>;
}

/// Backend contracts behind trait objects, so HTTP and in-memory backends
/// are interchangeable.
#[derive(Clone)]
pub struct Remote {
    pub lessons: Arc<dyn LessonApi>,
    pub progress: Arc<dyn ProgressApi>,
    pub certificates: Arc<dyn CertificateApi>,
    pub enrollments: Arc<dyn EnrollmentApi>,
}

impl Remote {
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn http(config: ApiConfig) -> Result<Self, ApiError> {
        Ok(Self::from_backend(HttpApi::new(config)?))
    }

    /// Serve every contract from the same backend value.
    #[must_use]
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: LessonApi + ProgressApi + CertificateApi + EnrollmentApi + Clone + 'static,
    {
        Self {
            lessons: Arc::new(backend.clone()),
            progress: Arc::new(backend.clone()),
            certificates: Arc::new(backend.clone()),
            enrollments: Arc::new(backend),
        }
    }
}
