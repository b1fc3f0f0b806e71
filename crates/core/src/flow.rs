//! Certificate claim state machine.

use thiserror::Error;

use crate::model::{Certificate, CertificateEligibility, has_certificate_titled};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FlowError {
    #[error("certificate cannot be issued while {0:?}")]
    IssueUnavailable(CertificateState),
    #[error("no issuance is in flight")]
    NotIssuing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateState {
    #[default]
    Unknown,
    Checking,
    /// Eligible and nothing issued yet: the claim action is exposed.
    EligibleUnclaimed,
    /// A claim request is in flight; a second one is refused.
    Issuing,
    EligibleClaimed,
    Ineligible,
}

/// What the eligibility lookups concluded for a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateExposure {
    Ineligible,
    Claimable,
    AlreadyClaimed,
}

impl CertificateExposure {
    /// Combine the eligibility answer with the viewer's certificates.
    ///
    /// `existing` is `None` when the certificate listing could not be loaded;
    /// the claim is then exposed and the backend rejects a duplicate.
    #[must_use]
    pub fn from_lookup(
        eligibility: &CertificateEligibility,
        existing: Option<&[Certificate]>,
        course_title: &str,
    ) -> Self {
        if !eligibility.eligible {
            return Self::Ineligible;
        }
        match existing {
            Some(certificates) if has_certificate_titled(certificates, course_title) => {
                Self::AlreadyClaimed
            }
            _ => Self::Claimable,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CertificateFlow {
    state: CertificateState,
    last_error: Option<String>,
}

impl CertificateFlow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> CertificateState {
        self.state
    }

    /// Message from the most recent failed claim, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn can_issue(&self) -> bool {
        self.state == CertificateState::EligibleUnclaimed
    }

    #[must_use]
    pub fn has_certificate(&self) -> bool {
        self.state == CertificateState::EligibleClaimed
    }

    /// Start an eligibility check. Ignored while a claim is in flight.
    pub fn begin_check(&mut self) {
        if self.state != CertificateState::Issuing {
            self.state = CertificateState::Checking;
        }
    }

    pub fn resolve(&mut self, exposure: CertificateExposure) {
        if self.state == CertificateState::Issuing {
            return;
        }
        self.state = match exposure {
            CertificateExposure::Ineligible => CertificateState::Ineligible,
            CertificateExposure::Claimable => CertificateState::EligibleUnclaimed,
            CertificateExposure::AlreadyClaimed => CertificateState::EligibleClaimed,
        };
    }

    /// The eligibility lookup itself failed: keep the claim hidden.
    pub fn check_failed(&mut self) {
        if self.state != CertificateState::Issuing {
            self.state = CertificateState::Ineligible;
        }
    }

    /// # Errors
    ///
    /// Returns `FlowError::IssueUnavailable` unless the flow is in
    /// `EligibleUnclaimed`.
    pub fn begin_issue(&mut self) -> Result<(), FlowError> {
        if !self.can_issue() {
            return Err(FlowError::IssueUnavailable(self.state));
        }
        self.state = CertificateState::Issuing;
        self.last_error = None;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `FlowError::NotIssuing` if no claim was started.
    pub fn issue_succeeded(&mut self) -> Result<(), FlowError> {
        if self.state != CertificateState::Issuing {
            return Err(FlowError::NotIssuing);
        }
        self.state = CertificateState::EligibleClaimed;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `FlowError::NotIssuing` if no claim was started.
    pub fn issue_failed(&mut self, message: impl Into<String>) -> Result<(), FlowError> {
        if self.state != CertificateState::Issuing {
            return Err(FlowError::NotIssuing);
        }
        self.state = CertificateState::EligibleUnclaimed;
        self.last_error = Some(message.into());
        Ok(())
    }
}
