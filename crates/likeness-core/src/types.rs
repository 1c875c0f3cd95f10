use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One classification result for a single detected face.
///
/// Field names on the wire follow the classification service: the label is
/// sent as `class` and the score vector as `class_probability`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationCandidate {
    #[serde(rename = "class", alias = "label")]
    pub label: String,
    /// One score per known class, in the service's class order.
    #[serde(rename = "class_probability", alias = "scores")]
    pub scores: Vec<f32>,
    /// Class label → index into `scores`, when the service sends it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_dictionary: Option<BTreeMap<String, usize>>,
}

impl ClassificationCandidate {
    pub fn new(label: impl Into<String>, scores: Vec<f32>) -> Self {
        Self {
            label: label.into(),
            scores,
            class_dictionary: None,
        }
    }

    /// Highest component of the score vector.
    ///
    /// Returns `None` for an empty vector. NaN components never win a
    /// comparison, so a vector holding only NaN also yields `None`.
    pub fn confidence(&self) -> Option<f32> {
        let mut best: Option<f32> = None;
        for &score in &self.scores {
            match best {
                None if !score.is_nan() => best = Some(score),
                Some(current) if score > current => best = Some(score),
                _ => {}
            }
        }
        best
    }

    /// Per-class breakdown of the score vector, in score order.
    ///
    /// Uses `class_dictionary` to name each score when present; scores
    /// without a dictionary entry are named by their index.
    pub fn class_scores(&self) -> Vec<(String, f32)> {
        let mut names: Vec<Option<&str>> = vec![None; self.scores.len()];
        if let Some(dict) = &self.class_dictionary {
            for (name, &idx) in dict {
                if let Some(slot) = names.get_mut(idx) {
                    *slot = Some(name.as_str());
                }
            }
        }

        self.scores
            .iter()
            .zip(names)
            .enumerate()
            .map(|(i, (&score, name))| {
                let name = name.map(str::to_string).unwrap_or_else(|| format!("class_{i}"));
                (name, score)
            })
            .collect()
    }
}

/// Body returned by the classification service.
///
/// Either an ordered list of per-face candidates (empty when no face was
/// found) or an explicit error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassificationResponse {
    Candidates(Vec<ClassificationCandidate>),
    Error { error: String },
}

/// The single best candidate of a response plus its top score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult {
    pub candidate: ClassificationCandidate,
    pub confidence: f32,
}

impl SelectionResult {
    pub fn label(&self) -> &str {
        &self.candidate.label
    }
}
