use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct GenerateDescriptionRequest {
    #[serde(default, alias = "itemName")]
    pub item_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateDescriptionResponse {
    pub item_name: String,
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuggestItemsRequest {
    #[serde(default, alias = "businessType")]
    pub business_type: Option<String>,
}

/// `suggestions` is the parsed JSON array when the model reply is valid JSON,
/// otherwise the reply text.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestItemsResponse {
    pub business_type: String,
    pub suggestions: Value,
}
