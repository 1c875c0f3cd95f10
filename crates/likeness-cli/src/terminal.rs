//! Terminal rendering of the pipeline's visible panel.

use likeness_core::{roster, Presenter, SelectionResult};
use std::io::Write;

#[derive(Debug, Clone, PartialEq)]
enum Panel {
    Hidden,
    Loading,
    Error(String),
    Result(String, u32),
}

/// Prints each panel once; repeated calls for the panel already shown are no-ops.
pub struct TerminalPresenter<W: Write> {
    out: W,
    visible: Panel,
    breakdown: bool,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, breakdown: bool) -> Self {
        Self {
            out,
            visible: Panel::Hidden,
            breakdown,
        }
    }

    fn switch(&mut self, panel: Panel) -> bool {
        if self.visible == panel {
            return false;
        }
        self.visible = panel;
        true
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            tracing::warn!(error = %e, "failed to write to terminal");
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn show_idle(&mut self) {
        self.switch(Panel::Hidden);
    }

    fn show_loading(&mut self) {
        if self.switch(Panel::Loading) {
            self.print("Analyzing image...");
        }
    }

    fn show_error(&mut self, message: &str) {
        if self.switch(Panel::Error(message.to_string())) {
            self.print(&format!("error: {message}"));
        }
    }

    fn show_result(&mut self, result: &SelectionResult) {
        let key = Panel::Result(result.label().to_string(), result.confidence.to_bits());
        if !self.switch(key) {
            return;
        }
        let card = render_card(result, self.breakdown);
        self.print(&card);
    }
}

/// Identity card for a classification result.
pub fn render_card(result: &SelectionResult, breakdown: bool) -> String {
    let label = result.label();
    let mut card = String::from("Classification Result\n");
    card.push_str(&format!("  {}\n", roster::display_name(label)));
    if let Some(identity) = roster::lookup(label) {
        card.push_str(&format!("  Sport: {}\n", identity.sport));
    }
    card.push_str(&format!("  Confidence: {:.1}%", result.confidence));

    if breakdown {
        card.push_str("\n  All probabilities:");
        for (class, score) in result.candidate.class_scores() {
            card.push_str(&format!(
                "\n    {:<20} {score:>6.1}",
                roster::display_name(&class)
            ));
        }
    }
    card
}
