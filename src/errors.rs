//! Error types for the session core.

use crate::session::SessionId;
use std::fmt::{Display, Formatter};

/// Conditions the core can report. None of them is fatal: registry
/// operations surface `NotFound` as `false`/`None`, `OwnerTornDown` is
/// discarded, and `ExternalLaunchFailure` becomes a user notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation named a session the registry does not hold.
    NotFound(SessionId),
    /// Deferred callback fired after its owner was invalidated.
    OwnerTornDown,
    /// Underlying process failed to start.
    ExternalLaunchFailure { message: String },
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "session {} not found", id),
            Self::OwnerTornDown => write!(f, "owner torn down"),
            Self::ExternalLaunchFailure { message } => {
                write!(f, "failed to start session: {}", message)
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            SessionError::NotFound(SessionId(3)).to_string(),
            "session 3 not found"
        );
        assert_eq!(SessionError::OwnerTornDown.to_string(), "owner torn down");
        assert_eq!(
            SessionError::ExternalLaunchFailure {
                message: "no such file".to_string()
            }
            .to_string(),
            "failed to start session: no such file"
        );
    }
}
