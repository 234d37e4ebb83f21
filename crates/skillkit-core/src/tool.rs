use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Description of a tool a skill handler exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Unique name, e.g. "natural_language_to_ics".
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema of the accepted parameters object.
    pub parameters: Value,
    /// Whether the tool result should be shown to the user as-is.
    #[serde(default)]
    pub return_direct: bool,
    /// Whether the tool can emit its text output incrementally.
    #[serde(default)]
    pub streaming: bool,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
            return_direct: false,
            streaming: false,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }
}
