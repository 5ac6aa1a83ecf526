use thiserror::Error;

/// Per-turn pipeline failures. Only `NotConfigured` ends the session; the
/// rest surface in the turn result and the conversation continues.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("model credential is not configured")]
    NotConfigured,
    #[error("model service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("invalid model output: {0}")]
    InvalidModelOutput(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Whether this error ends the whole session rather than a single turn.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotConfigured)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotConfigured => {
                "The model credential is missing. Configure an API key before starting a session."
            }
            Self::ServiceUnavailable(_) => {
                "The model service is temporarily unavailable. Please retry shortly."
            }
            Self::InvalidModelOutput(_) => {
                "The model reply could not be interpreted. Please rephrase and try again."
            }
            Self::InvalidInput(_) => "The request could not be processed. Check inputs and try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineError;

    #[test]
    fn only_missing_credential_is_fatal() {
        assert!(PipelineError::NotConfigured.is_fatal());
        assert!(!PipelineError::ServiceUnavailable("timeout".to_string()).is_fatal());
        assert!(!PipelineError::InvalidModelOutput("not json".to_string()).is_fatal());
        assert!(!PipelineError::InvalidInput("no specification".to_string()).is_fatal());
    }

    #[test]
    fn user_messages_do_not_leak_detail() {
        let error = PipelineError::ServiceUnavailable("connection refused to 10.0.0.3".to_string());
        assert!(!error.user_message().contains("10.0.0.3"));
    }
}
