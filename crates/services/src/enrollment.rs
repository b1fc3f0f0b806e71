use std::sync::Arc;

use lms_core::model::{Capability, Course};

use api::EnrollmentApi;

use crate::error::EnrollError;
use crate::notify::{Level, Notice, Notifier};
use crate::session::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollOutcome {
    Enrolled,
    /// The backend reported an existing enrollment (HTTP 400).
    AlreadyEnrolled,
}

#[derive(Clone)]
pub struct EnrollmentService {
    enrollments: Arc<dyn EnrollmentApi>,
    session: SessionContext,
    notifier: Arc<dyn Notifier>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        enrollments: Arc<dyn EnrollmentApi>,
        session: SessionContext,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            enrollments,
            session,
            notifier,
        }
    }

    /// Enroll the signed-in student in `course`.
    ///
    /// Every outcome is also reported through the notifier. An existing
    /// enrollment is a warning, not an error.
    ///
    /// # Errors
    ///
    /// Returns `EnrollError` when nobody is signed in, the viewer is not a
    /// student, or the backend call fails.
    pub async fn enroll(&self, course: &Course) -> Result<EnrollOutcome, EnrollError> {
        let Some(token) = self.session.token() else {
            return Err(self.login_required());
        };
        if !self.session.viewer().can(Capability::EnrollInCourse) {
            self.warn("Access Denied", EnrollError::WrongRole.to_string());
            return Err(EnrollError::WrongRole);
        }

        match self.enrollments.enroll(course.id, Some(&token)).await {
            Ok(()) => {
                tracing::info!(course_id = %course.id, "enrolled");
                self.notifier.notify(Notice::new(
                    Level::Success,
                    "Enrollment Successful",
                    format!("Successfully enrolled in \"{}\"!", course.title),
                ));
                Ok(EnrollOutcome::Enrolled)
            }
            Err(error) if error.is_rejected() => {
                self.warn("Already Enrolled", "You are already enrolled in this course!");
                Ok(EnrollOutcome::AlreadyEnrolled)
            }
            Err(error) if error.is_unauthorized() => Err(self.login_required()),
            Err(error) => {
                tracing::warn!(course_id = %course.id, %error, "enrollment failed");
                let failure = EnrollError::Failed(error);
                self.notifier
                    .notify(Notice::new(Level::Error, "Enrollment Failed", failure.to_string()));
                Err(failure)
            }
        }
    }

    fn login_required(&self) -> EnrollError {
        self.warn("Authentication Required", EnrollError::NotLoggedIn.to_string());
        EnrollError::NotLoggedIn
    }

    fn warn(&self, title: &str, message: impl Into<String>) {
        self.notifier
            .notify(Notice::new(Level::Warning, title, message));
    }
}
