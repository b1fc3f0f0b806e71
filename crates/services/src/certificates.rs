use std::sync::Arc;

use lms_core::flow::{CertificateExposure, CertificateFlow};
use lms_core::model::{Capability, Certificate, Course, latest_per_course};

use api::{ApiError, CertificateApi};

use crate::error::IssueError;
use crate::notify::{Level, Notice, Notifier};
use crate::session::SessionContext;

/// Drives a [`CertificateFlow`] against the backend.
#[derive(Clone)]
pub struct CertificateService {
    certificates: Arc<dyn CertificateApi>,
    session: SessionContext,
    notifier: Arc<dyn Notifier>,
}

impl CertificateService {
    #[must_use]
    pub fn new(
        certificates: Arc<dyn CertificateApi>,
        session: SessionContext,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            certificates,
            session,
            notifier,
        }
    }

    /// Work out whether `course` offers a claim to the viewer.
    ///
    /// A failed eligibility lookup hides the claim. A failed certificate
    /// listing shows it; the backend refuses duplicates anyway.
    pub async fn check(&self, flow: &mut CertificateFlow, course: &Course) {
        flow.begin_check();
        let token = self.session.token();

        let eligibility = match self.certificates.eligibility(course.id, token.as_deref()).await {
            Ok(eligibility) => eligibility,
            Err(error) => {
                tracing::warn!(course_id = %course.id, %error, "eligibility lookup failed");
                flow.check_failed();
                return;
            }
        };

        let existing = if eligibility.eligible {
            match self.certificates.my_certificates(token.as_deref()).await {
                Ok(list) => Some(list),
                Err(error) => {
                    tracing::warn!(%error, "certificate listing failed, exposing claim");
                    None
                }
            }
        } else {
            None
        };

        flow.resolve(CertificateExposure::from_lookup(
            &eligibility,
            existing.as_deref(),
            &course.title,
        ));
    }

    /// Claim the certificate for `course`.
    ///
    /// # Errors
    ///
    /// Returns `IssueError::NotLoggedIn` or `IssueError::WrongRole` before any
    /// request is made, `IssueError::Flow` if no claim is currently offered,
    /// and the backend's reason (or a generic message) if issuance fails.
    pub async fn issue(
        &self,
        flow: &mut CertificateFlow,
        course: &Course,
    ) -> Result<Certificate, IssueError> {
        let Some(token) = self.session.token() else {
            return Err(IssueError::NotLoggedIn);
        };
        if !self.session.viewer().can(Capability::ClaimCertificate) {
            return Err(IssueError::WrongRole);
        }
        flow.begin_issue()?;

        match self.certificates.issue(course.id, Some(&token)).await {
            Ok(certificate) => {
                flow.issue_succeeded()?;
                self.notifier.notify(Notice::new(
                    Level::Success,
                    "Certificate Issued",
                    format!(
                        "Certificate issued! Certificate ID: {}",
                        certificate.certificate_number
                    ),
                ));
                Ok(certificate)
            }
            Err(error) => {
                tracing::warn!(course_id = %course.id, %error, "certificate issue failed");
                let failure = IssueError::from(&error);
                flow.issue_failed(failure.to_string())?;
                self.notifier.notify(Notice::new(
                    Level::Error,
                    "Certificate Error",
                    failure.to_string(),
                ));
                Err(failure)
            }
        }
    }

    /// The viewer's certificates, one per course (the most recently issued).
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the listing cannot be fetched.
    pub async fn my_certificates(&self) -> Result<Vec<Certificate>, ApiError> {
        let token = self.session.token();
        let all = self.certificates.my_certificates(token.as_deref()).await?;
        Ok(latest_per_course(all))
    }
}
