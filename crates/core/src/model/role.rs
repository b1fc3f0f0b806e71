use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRoleError(pub String);

/// Account role as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

/// Things a viewer may do that differ by role.
///
/// Every role-dependent branch in the workspace goes through [`Role::can`] or
/// [`Viewer::can`] so the policy lives in one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Enter any lesson regardless of completion.
    BypassLessonGate,
    /// Produce durable progress reports and completion calls.
    TrackProgress,
    EnrollInCourse,
    ClaimCertificate,
}

impl Role {
    #[must_use]
    pub fn can(self, capability: Capability) -> bool {
        match capability {
            Capability::BypassLessonGate => matches!(self, Role::Instructor | Role::Admin),
            Capability::TrackProgress
            | Capability::EnrollInCourse
            | Capability::ClaimCertificate => matches!(self, Role::Student),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Instructor => "INSTRUCTOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "INSTRUCTOR" => Ok(Role::Instructor),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRoleError(s.to_owned())),
        }
    }
}

/// Authenticated user as cached by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Whoever is looking at the content right now.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    Signed(Identity),
}

impl Viewer {
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Signed(identity) => Some(identity.role),
        }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Signed(identity) => Some(identity),
        }
    }

    /// Anonymous viewers are never gated: public content is browsable freely
    /// and nothing is tracked for them.
    #[must_use]
    pub fn can(&self, capability: Capability) -> bool {
        match self.role() {
            Some(role) => role.can(capability),
            None => capability == Capability::BypassLessonGate,
        }
    }

    #[must_use]
    pub fn is_gated(&self) -> bool {
        !self.can(Capability::BypassLessonGate)
    }

    /// Signed in with a role that bypasses the gate by itself. Unlike
    /// [`Viewer::is_gated`], anonymous viewers are not staff.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.role()
            .is_some_and(|role| role.can(Capability::BypassLessonGate))
    }
}
