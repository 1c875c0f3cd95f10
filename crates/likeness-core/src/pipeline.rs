//! Upload pipeline state machine.
//!
//! Owns the single held file and the lifecycle state of its classification:
//!
//! ```text
//! Idle ──file──▶ FileReady ──submit──▶ Submitting ──response──▶ Succeeded | Failed
//!  ▲                │  ▲                                          │
//!  └────remove──────┘  └──────────────file / resubmit─────────────┘
//! ```
//!
//! Every request is tagged with the file it was issued for. A response that
//! arrives after its file was replaced or removed is discarded.

use crate::outcome::{classify_response, ClassifyError, Outcome, Response};
use crate::types::SelectionResult;
use crate::upload::{FileId, UploadedFile};

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    FileReady,
    Submitting,
    Succeeded(SelectionResult),
    Failed(ClassifyError),
}

/// Bare state tag, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FileReady,
    Submitting,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn phase(&self) -> Phase {
        match self {
            PipelineState::Idle => Phase::Idle,
            PipelineState::FileReady => Phase::FileReady,
            PipelineState::Submitting => Phase::Submitting,
            PipelineState::Succeeded(_) => Phase::Succeeded,
            PipelineState::Failed(_) => Phase::Failed,
        }
    }
}

/// Identifies one submission: the file it was issued for plus a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTag {
    pub file: FileId,
    pub seq: u64,
}

/// A request the caller must now send to the classification service.
#[derive(Debug, Clone)]
pub struct Submission {
    pub tag: RequestTag,
    /// Encoded image payload, the sole request parameter.
    pub image_data: String,
}

/// What happened to a response handed to [`UploadPipeline::complete`].
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The response belonged to the live request and settled the pipeline.
    Settled(Outcome),
    /// The response belonged to a superseded request and was discarded.
    Stale,
}

/// Single-file upload/submission controller.
#[derive(Debug)]
pub struct UploadPipeline {
    state: PipelineState,
    file: Option<UploadedFile>,
    in_flight: Option<RequestTag>,
    next_seq: u64,
}

impl Default for UploadPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadPipeline {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            file: None,
            in_flight: None,
            next_seq: 0,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// The currently held file, if any.
    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    /// Tag of the request whose response will be applied, if one is live.
    pub fn in_flight(&self) -> Option<RequestTag> {
        self.in_flight
    }

    /// Hold `file`, replacing any previous one, and return to `FileReady`.
    ///
    /// Clears any shown result or error. If a request was in flight it is
    /// superseded and its tag is returned; its response will be discarded.
    pub fn file_added(&mut self, file: UploadedFile) -> Option<RequestTag> {
        if let Some(old) = &self.file {
            tracing::debug!(old = %old.id(), new = %file.id(), "replacing held file");
        }
        self.file = Some(file);
        let superseded = self.in_flight.take();
        self.transition(PipelineState::FileReady);
        superseded
    }

    /// Drop the held file and return to `Idle`.
    ///
    /// Returns the tag of a superseded in-flight request, if any.
    pub fn file_removed(&mut self) -> Option<RequestTag> {
        if self.file.take().is_none() {
            return None;
        }
        let superseded = self.in_flight.take();
        self.transition(PipelineState::Idle);
        superseded
    }

    /// Start a submission of the held file.
    ///
    /// Allowed from `FileReady`, and from `Succeeded`/`Failed` as an explicit
    /// resubmission (passing through `FileReady`). Rejected with
    /// [`ClassifyError::NoFileSelected`] when no file is held and with
    /// [`ClassifyError::Busy`] while a request is in flight; the state is left
    /// unchanged in both cases.
    pub fn submit(&mut self) -> Result<Submission, ClassifyError> {
        let Some(file) = &self.file else {
            return Err(ClassifyError::NoFileSelected);
        };
        let file_id = file.id();
        let image_data = file.data_url().to_string();

        match self.state.phase() {
            Phase::Submitting => return Err(ClassifyError::Busy),
            Phase::Succeeded | Phase::Failed => self.transition(PipelineState::FileReady),
            Phase::FileReady => {}
            Phase::Idle => return Err(ClassifyError::NoFileSelected),
        }

        let tag = RequestTag {
            file: file_id,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.in_flight = Some(tag);
        self.transition(PipelineState::Submitting);

        Ok(Submission { tag, image_data })
    }

    /// Apply the response to the request identified by `tag`.
    pub fn complete(&mut self, tag: RequestTag, response: &Response) -> Completion {
        if self.in_flight != Some(tag) {
            tracing::debug!(file = %tag.file, seq = tag.seq, "discarding response for superseded request");
            return Completion::Stale;
        }
        self.in_flight = None;

        let outcome = classify_response(response);
        let next = match &outcome {
            Ok(result) => PipelineState::Succeeded(result.clone()),
            Err(err) => PipelineState::Failed(err.clone()),
        };
        self.transition(next);
        Completion::Settled(outcome)
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = ?self.state.phase(), to = ?next.phase(), "pipeline transition");
        self.state = next;
    }
}
