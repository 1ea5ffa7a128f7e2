use thiserror::Error;

#[derive(Error, Debug)]
pub enum DesignError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Image capture failed: {0}")]
    CaptureFailed(String),

    #[error("Analysis backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Analysis backend error: {0}")]
    BackendError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used by the pipeline and for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    PermissionDenied,
    CaptureFailed,
    BackendUnavailable,
    BackendError,
    /// Not a failure: the response fell back to raw-text mode.
    ParseDegraded,
    InvalidRequest,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::PermissionDenied => write!(f, "PermissionDenied"),
            ErrorKind::CaptureFailed => write!(f, "CaptureFailed"),
            ErrorKind::BackendUnavailable => write!(f, "BackendUnavailable"),
            ErrorKind::BackendError => write!(f, "BackendError"),
            ErrorKind::ParseDegraded => write!(f, "ParseDegraded"),
            ErrorKind::InvalidRequest => write!(f, "InvalidRequest"),
            ErrorKind::Internal => write!(f, "Internal"),
        }
    }
}

impl DesignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DesignError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            DesignError::CaptureFailed(_) => ErrorKind::CaptureFailed,
            DesignError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            DesignError::BackendError(_) => ErrorKind::BackendError,
            DesignError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            DesignError::Config(_) | DesignError::Io(_) | DesignError::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// A message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            DesignError::PermissionDenied(_) => {
                "Camera and photo library access is required to capture a room.".to_string()
            }
            DesignError::CaptureFailed(reason) => format!("Could not get a photo: {reason}"),
            DesignError::BackendUnavailable(_) => {
                "The design service is unavailable. Check your API key and connection, then try again."
                    .to_string()
            }
            DesignError::BackendError(_) => {
                "Failed to analyze room. Please try again.".to_string()
            }
            DesignError::InvalidRequest(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DesignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(
            DesignError::PermissionDenied("camera".into()).kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            DesignError::BackendUnavailable("no key".into()).kind(),
            ErrorKind::BackendUnavailable
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(DesignError::from(io).kind(), ErrorKind::Internal);
    }

    #[test]
    fn every_error_has_a_user_message() {
        let errors = [
            DesignError::PermissionDenied("x".into()),
            DesignError::CaptureFailed("lens cap".into()),
            DesignError::BackendUnavailable("x".into()),
            DesignError::BackendError("x".into()),
            DesignError::InvalidRequest("Budget must not be negative".into()),
            DesignError::Config("x".into()),
        ];
        for err in errors {
            assert!(!err.user_message().trim().is_empty(), "{err:?}");
        }
        assert!(DesignError::CaptureFailed("lens cap".into())
            .user_message()
            .contains("lens cap"));
    }
}
