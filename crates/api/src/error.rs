use thiserror::Error;

/// Failure talking to the backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiError {
    /// The backend answered with a non-success status.
    #[error("request failed with status {status}")]
    Status { status: u16, body: Option<String> },
    /// No usable response: connection refused, timeout, TLS failure...
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    /// The response parsed but lacks a field this client depends on.
    #[error("{entity} is missing {field}")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },
}

impl ApiError {
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::Status {
            status,
            body: (!body.trim().is_empty()).then_some(body),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status_code() == Some(403)
    }

    /// Validation or conflict rejection (HTTP 400).
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.status_code() == Some(400)
    }

    /// Human-readable message supplied by the backend, if any.
    ///
    /// The backend sends either a plain string body or `{"error": "..."}`.
    #[must_use]
    pub fn server_message(&self) -> Option<String> {
        let Self::Status {
            body: Some(body), ..
        } = self
        else {
            return None;
        };

        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::String(text)) => Some(text),
            Ok(serde_json::Value::Object(map)) => map
                .get("error")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned),
            Ok(_) => None,
            Err(_) => Some(body.trim().to_owned()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: None,
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}
