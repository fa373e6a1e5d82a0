use serde::{Deserialize, Serialize};

/// Page content extracted for one captured stage, as handed in by the
/// orchestrator.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StageContent {
    /// Visible body text, whitespace-collapsed and capped upstream.
    #[serde(default)]
    pub text: String,
    /// Labels of visible button-like controls.
    #[serde(default)]
    pub buttons: Vec<String>,
    /// Class/id tokens of section-level containers that looked like
    /// merchandising modules (recommendations, badges, protection widgets).
    #[serde(default)]
    pub dom_hints: Vec<String>,
    /// Hosts of embedded iframes.
    #[serde(default)]
    pub iframe_hosts: Vec<String>,
    /// Alt texts of images (badge and payment marks surface here).
    #[serde(default)]
    pub image_alts: Vec<String>,
}

impl StageContent {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}
