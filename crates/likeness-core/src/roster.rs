//! Roster of identities the classification service knows.
//!
//! Embedded at compile time from `contrib/roster.toml`.

use serde::Deserialize;
use std::sync::OnceLock;

const ROSTER_TOML: &str = include_str!("../../../contrib/roster.toml");

static ROSTER: OnceLock<Vec<Identity>> = OnceLock::new();

#[derive(Debug, Deserialize)]
struct RosterFile {
    identity: Vec<Identity>,
}

/// One known identity, keyed by the service's class label.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub label: String,
    pub name: String,
    pub sport: String,
}

fn roster() -> &'static Vec<Identity> {
    ROSTER.get_or_init(|| match toml::from_str::<RosterFile>(ROSTER_TOML) {
        Ok(file) => file.identity,
        Err(e) => {
            tracing::error!(error = %e, "bad roster TOML");
            Vec::new()
        }
    })
}

/// Look up an identity by class label.
pub fn lookup(label: &str) -> Option<&'static Identity> {
    roster().iter().find(|i| i.label == label)
}

/// All known identities.
pub fn list() -> &'static [Identity] {
    roster()
}

/// Human-readable name for a class label.
///
/// Unknown labels are title-cased: `"novak_djokovic"` → `"Novak Djokovic"`.
pub fn display_name(label: &str) -> String {
    if let Some(identity) = lookup(label) {
        return identity.name.clone();
    }
    label
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
