use thiserror::Error;

/// Loader-level failures. These are the only errors that reach the caller;
/// each one requires user action (different file, supply a password).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("unsupported file format: .{0}")]
    UnsupportedFormat(String),
    #[error("PDF is encrypted and no password was supplied")]
    PasswordRequired,
    #[error("the supplied PDF password is invalid")]
    InvalidPassword,
}

/// Strategy-level failures. Always caught by the orchestrator and converted
/// into a fallback transition plus a diagnostic entry; never surfaced.
#[derive(Debug, Clone, Error)]
pub enum StrategyError {
    #[error("vision API not configured or unreachable: {0}")]
    VisionUnavailable(String),
    #[error("vision response violated the output contract: {0}")]
    VisionParseError(String),
    #[error("model API not configured or unreachable: {0}")]
    ModelUnavailable(String),
    #[error("model response violated the output contract: {0}")]
    ModelParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_messages() {
        assert_eq!(
            LoadError::UnsupportedFormat("docx".into()).to_string(),
            "unsupported file format: .docx"
        );
        assert!(LoadError::PasswordRequired.to_string().contains("password"));
    }

    #[test]
    fn strategy_error_is_cloneable() {
        // Mocks in the extract crate hand out stored errors by clone.
        let e = StrategyError::VisionParseError("not json".into());
        let _ = e.clone();
    }
}
