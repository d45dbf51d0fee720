use std::time::Duration;

/// Raw text returned by a model call
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    /// Wall-clock time of the call
    pub duration: Duration,
}

impl ModelResponse {
    pub fn new(text: String, duration: Duration) -> Self {
        Self { text, duration }
    }
}

/// Locate the JSON object in a model reply.
///
/// Models often wrap JSON in markdown fences or add prose around it; this
/// returns the slice from the first `{` to the last `}`.
pub fn extract_json_payload(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
