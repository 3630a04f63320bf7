//! Human escalation configuration

use serde::{Deserialize, Serialize};

/// Contact surfaced to end users when every provider has failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Phone number or handle of the human team
    pub contact: String,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            contact: "our client services team".to_string(),
        }
    }
}
