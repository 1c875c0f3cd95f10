//! Outcome classification for a finished submission.
//!
//! Turns whatever came back from the network (or did not) into either a
//! [`SelectionResult`] or a user-facing [`ClassifyError`].

use crate::selector::select_best;
use crate::types::{ClassificationResponse, SelectionResult};
use thiserror::Error;

/// Failures the pipeline reports to the user.
///
/// Display strings are the messages shown to the user. Service-reported
/// errors are passed through verbatim; transport failures never leak detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Please upload an image first.")]
    NoFileSelected,
    #[error("A classification is already in progress.")]
    Busy,
    #[error("Unsupported file: {0}. Please upload an image.")]
    UnsupportedFile(String),
    #[error("No faces detected in the image. Please upload an image with a clear face.")]
    NoSubjectDetected,
    #[error("{0}")]
    Service(String),
    #[error("Server error occurred. Please try again later.")]
    Transport,
    #[error("Unable to classify the image. Please try a different image.")]
    Unclassifiable,
}

/// Coarse category of a [`ClassifyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserInput,
    NoSubjectDetected,
    ServiceReported,
    Transport,
    InvariantViolation,
}

impl ClassifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifyError::NoFileSelected
            | ClassifyError::Busy
            | ClassifyError::UnsupportedFile(_) => ErrorKind::UserInput,
            ClassifyError::NoSubjectDetected => ErrorKind::NoSubjectDetected,
            ClassifyError::Service(_) => ErrorKind::ServiceReported,
            ClassifyError::Transport => ErrorKind::Transport,
            ClassifyError::Unclassifiable => ErrorKind::InvariantViolation,
        }
    }
}

/// Why the network call itself failed. Logged, never shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("service returned HTTP {0}")]
    Status(u16),
    #[error("malformed response body: {0}")]
    Decode(String),
}

/// What the network call produced: a response (possibly absent) or a failure.
pub type Response = Result<Option<ClassificationResponse>, TransportFailure>;

/// Final result of one submission.
pub type Outcome = Result<SelectionResult, ClassifyError>;

/// Classify a finished submission. First match wins:
///
/// 1. transport failure
/// 2. absent or empty candidate list (no face detected)
/// 3. explicit error payload, surfaced verbatim
/// 4. best candidate from [`select_best`]
/// 5. no viable candidate despite a non-empty list
pub fn classify_response(response: &Response) -> Outcome {
    let body = match response {
        Err(failure) => {
            tracing::warn!(error = %failure, "classification request failed");
            return Err(ClassifyError::Transport);
        }
        Ok(body) => body,
    };

    match body {
        None => Err(ClassifyError::NoSubjectDetected),
        Some(ClassificationResponse::Candidates(candidates)) if candidates.is_empty() => {
            Err(ClassifyError::NoSubjectDetected)
        }
        Some(ClassificationResponse::Error { error }) => Err(ClassifyError::Service(error.clone())),
        Some(ClassificationResponse::Candidates(candidates)) => match select_best(candidates) {
            Some(result) => Ok(result),
            None => {
                tracing::error!(
                    candidates = candidates.len(),
                    "no viable candidate in a non-empty response"
                );
                Err(ClassifyError::Unclassifiable)
            }
        },
    }
}
