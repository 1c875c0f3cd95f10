//! likeness-core — Single-image identity classification, minus the I/O.
//!
//! Holds the data model of the classification service's responses, the
//! best-candidate selector, outcome classification, and the upload pipeline
//! state machine that ties them together. Network and rendering are seams
//! implemented elsewhere.

pub mod outcome;
pub mod pipeline;
pub mod presenter;
pub mod roster;
pub mod selector;
pub mod types;
pub mod upload;

pub use outcome::{classify_response, ClassifyError, ErrorKind, Outcome, Response, TransportFailure};
pub use pipeline::{Completion, Phase, PipelineState, RequestTag, Submission, UploadPipeline};
pub use presenter::{present, Presenter};
pub use selector::select_best;
pub use types::{ClassificationCandidate, ClassificationResponse, SelectionResult};
pub use upload::{FileId, UploadedFile, DEFAULT_MAX_FILE_BYTES};
