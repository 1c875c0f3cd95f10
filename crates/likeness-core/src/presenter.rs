//! Presentation adapter seam.

use crate::pipeline::PipelineState;
use crate::types::SelectionResult;

/// Renders the pipeline's visible panel.
///
/// Exactly one of the loading indicator, the error panel and the result
/// panel is visible at a time, or none of them. Every method must be
/// idempotent.
pub trait Presenter {
    /// Hide the loading, error and result panels.
    fn show_idle(&mut self);
    fn show_loading(&mut self);
    fn show_error(&mut self, message: &str);
    fn show_result(&mut self, result: &SelectionResult);
}

/// Render `state` through `presenter`.
pub fn present(state: &PipelineState, presenter: &mut dyn Presenter) {
    match state {
        PipelineState::Idle | PipelineState::FileReady => presenter.show_idle(),
        PipelineState::Submitting => presenter.show_loading(),
        PipelineState::Succeeded(result) => presenter.show_result(result),
        PipelineState::Failed(err) => presenter.show_error(&err.to_string()),
    }
}
