//! Verification errors and verdicts

use thiserror::Error;

/// Errors surfaced by the quest checkers.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Missing or malformed address. Not retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The RPC endpoint could not answer (network, rate limit, node error).
    #[error("rpc unavailable: {0:#}")]
    TransientUnavailable(#[source] anyhow::Error),

    /// The scan-state store failed.
    #[error("scan store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// No checker registered under this id.
    #[error("unknown checker: {0}")]
    UnknownChecker(String),
}

impl VerifyError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, VerifyError::TransientUnavailable(_))
    }
}

/// Outcome of a quest check that keeps "failed to check" apart from "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Found,
    NotFound,
    /// The check could not complete; carries the error message.
    Unknown(String),
}

impl Verdict {
    /// Collapse to the boolean used by quest completion, treating unknown as false.
    pub fn is_found(&self) -> bool {
        matches!(self, Verdict::Found)
    }

    /// Short label for output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Found => "found",
            Verdict::NotFound => "not_found",
            Verdict::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_collapse() {
        assert!(Verdict::Found.is_found());
        assert!(!Verdict::NotFound.is_found());
        assert!(!Verdict::Unknown("timeout".to_string()).is_found());
        assert_eq!(Verdict::Unknown(String::new()).as_str(), "unknown");
    }

    #[test]
    fn test_transient_classification() {
        let err = VerifyError::TransientUnavailable(anyhow::anyhow!("connection refused"));
        assert!(err.is_transient());
        assert!(err.to_string().contains("connection refused"));
        assert!(!VerifyError::InvalidInput("bad".to_string()).is_transient());
    }
}
