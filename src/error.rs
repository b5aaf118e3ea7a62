use std::time::Duration;

use thiserror::Error;

use crate::analysis::BackendError;
use crate::store::StorageError;

/// Input rejected before it is scheduled
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Text is empty")]
    Empty,

    #[error("Text is too long ({length} characters, limit is {limit})")]
    TooLong { length: usize, limit: usize },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Analysis quota exceeded, try again in {retry_after_secs}s")]
    QuotaExceeded { retry_after_secs: u64 },

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The suggestion's text is no longer in the document
    #[error("Suggestion {suggestion_id} no longer matches the document")]
    AnchorLost { suggestion_id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AnalysisError {
    /// Delay after which retrying may succeed
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AnalysisError::QuotaExceeded { retry_after_secs } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            AnalysisError::Backend(e) => e.retry_after_secs().map(Duration::from_secs),
            _ => None,
        }
    }

    /// Message suitable for showing to the writer
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Validation(ValidationError::Empty) => {
                "There is no text to check yet.".to_string()
            }
            AnalysisError::Validation(ValidationError::TooLong { limit, .. }) => {
                format!("This text is too long to check at once (limit: {limit} characters).")
            }
            AnalysisError::QuotaExceeded { retry_after_secs } => format!(
                "You have reached your checking limit. Try again in {}.",
                humanize_secs(*retry_after_secs)
            ),
            AnalysisError::Backend(BackendError::Auth(_)) => {
                "The analysis service rejected our credentials.".to_string()
            }
            AnalysisError::Backend(BackendError::NotConfigured(_)) => {
                "The analysis service is not configured.".to_string()
            }
            AnalysisError::Backend(BackendError::RateLimited { .. }) => {
                "The analysis service is busy. Please try again shortly.".to_string()
            }
            AnalysisError::Backend(_) => {
                "The analysis service is unavailable right now.".to_string()
            }
            AnalysisError::AnchorLost { .. } => {
                "That suggestion no longer applies to the text.".to_string()
            }
            AnalysisError::Storage(_) => "Local storage is unavailable.".to_string(),
        }
    }
}

fn humanize_secs(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs.div_ceil(60)),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_carries_retry_delay() {
        let error = AnalysisError::QuotaExceeded {
            retry_after_secs: 90,
        };

        assert_eq!(error.retry_after(), Some(Duration::from_secs(90)));
        assert!(error.user_message().contains("2m"));
    }

    #[test]
    fn test_validation_messages() {
        let empty = AnalysisError::from(ValidationError::Empty);
        assert_eq!(empty.to_string(), "Text is empty");
        assert_eq!(empty.retry_after(), None);

        let long = AnalysisError::from(ValidationError::TooLong {
            length: 20,
            limit: 10,
        });
        assert!(long.to_string().contains("20 characters"));
        assert!(long.user_message().contains("10 characters"));
    }

    #[test]
    fn test_backend_retry_hint() {
        let error = AnalysisError::from(BackendError::RateLimited {
            retry_after_secs: Some(3),
        });

        assert_eq!(error.retry_after(), Some(Duration::from_secs(3)));
        assert!(error.user_message().contains("busy"));
    }

    #[test]
    fn test_humanize_secs() {
        assert_eq!(humanize_secs(5), "5s");
        assert_eq!(humanize_secs(61), "2m");
        assert_eq!(humanize_secs(3725), "1h 2m");
    }
}
