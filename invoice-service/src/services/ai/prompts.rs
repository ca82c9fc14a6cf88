//! Prompt construction and reply post-processing.

use serde_json::Value;

pub fn description_prompt(item_name: &str) -> String {
    format!(
        "Generate a professional and concise description for an invoice item named \"{}\". \
         The description should be suitable for a business invoice and be 1-2 sentences long. \
         Only provide the description, nothing else.",
        item_name
    )
}

pub fn suggestions_prompt(business_type: &str) -> String {
    format!(
        "Suggest 5 common invoice items/services for a {} business. For each item, provide:\n\
         1. Item name\n\
         2. Brief description (1 sentence)\n\
         3. Typical price range (in USD)\n\
         \n\
         Format the response as a JSON array with objects containing: name, description, and \
         priceRange fields. Only return the JSON array, no additional text.",
        business_type
    )
}

/// Remove markdown code fences (```` ```json ```` and ```` ``` ````) a model
/// tends to wrap JSON in.
pub fn strip_code_fences(reply: &str) -> String {
    reply
        .replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse a suggestions reply as JSON, falling back to the fence-stripped text.
pub fn parse_suggestions(reply: &str) -> Value {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(&cleaned).unwrap_or(Value::String(cleaned))
}
