use crate::domain::values::implication::{lenient_implication, Implication};
use serde::{Deserialize, Serialize};

/// Outcome of analyzing one ordered (source, target) market pair.
///
/// Identifier fields are always overwritten with the known pair after
/// parsing; whatever the model echoes back is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(default)]
    pub source_market_id: String,
    #[serde(default)]
    pub source_event_id: String,
    #[serde(default)]
    pub target_market_id: String,
    #[serde(default)]
    pub target_event_id: String,
    #[serde(default)]
    pub reason: String,
    /// Necessary target outcome if the source resolves YES.
    #[serde(default, deserialize_with = "lenient_implication")]
    pub source_yes: Option<Implication>,
    /// Necessary target outcome if the source resolves NO.
    #[serde(default, deserialize_with = "lenient_implication")]
    pub source_no: Option<Implication>,
}

impl ComparisonResult {
    pub fn has_implication(&self) -> bool {
        self.source_yes.is_some() || self.source_no.is_some()
    }

    /// Extracts the outermost `{...}` span from free text and parses it.
    pub fn from_model_output(text: &str) -> Result<Self, String> {
        let start = text
            .find('{')
            .ok_or_else(|| "no JSON object in model output".to_string())?;
        let end = text
            .rfind('}')
            .filter(|end| *end > start)
            .ok_or_else(|| "unterminated JSON object in model output".to_string())?;
        serde_json::from_str(&text[start..=end]).map_err(|e| format!("invalid comparison JSON: {e}"))
    }
}
