//! Helpers for pulling structured data out of model replies.

/// Slice out the JSON object embedded in a model reply.
///
/// Models frequently wrap JSON in prose or markdown fences; taking the text
/// between the first `{` and the last `}` recovers the object in practice.
/// Returns the input unchanged when no braces are found.
pub fn extract_json(text: &str) -> &str {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return &text[start..=end];
        }
    }
    text
}
