// src/infra/errors.rs — Error types for EditArena

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArenaError {
    // Provider errors (retriable flag drives the retry policy)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Caller errors (rejected synchronously, no state touched)
    #[error("Invalid experiment input: {0}")]
    Validation(String),

    #[error("Experiment '{experiment_id}' not found")]
    ExperimentNotFound { experiment_id: String },

    #[error(
        "Decision rejected: experiment '{experiment_id}' is '{status}', expected 'awaiting_decision'"
    )]
    DecisionConflict {
        experiment_id: String,
        status: String,
    },

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ArenaError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ArenaError::Provider {
                retriable: true,
                ..
            } | ArenaError::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_provider_error_is_retriable() {
        let err = ArenaError::Provider {
            provider: "openai".into(),
            message: "HTTP 500".into(),
            retriable: true,
        };
        assert!(err.is_retriable());
    }

    #[test]
    fn rate_limited_is_retriable() {
        let err = ArenaError::RateLimited {
            provider: "anthropic".into(),
            retry_after_ms: 2000,
        };
        assert!(err.is_retriable());
    }

    #[test]
    fn permanent_errors_are_not_retriable() {
        let auth = ArenaError::Provider {
            provider: "openai".into(),
            message: "HTTP 401 unauthorized".into(),
            retriable: false,
        };
        assert!(!auth.is_retriable());
        assert!(!ArenaError::Validation("empty input".into()).is_retriable());
    }
}
