use crate::dtos::InvoiceResponse;
use crate::models::{ProfileChanges, UserProfile};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Partial update; absent or blank fields keep their stored value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    #[serde(default)]
    pub name: Option<String>,
    #[validate(length(max = 200, message = "Business name must be at most 200 characters"))]
    #[serde(default, alias = "businessName")]
    pub business_name: Option<String>,
    #[validate(length(max = 500, message = "Business address must be at most 500 characters"))]
    #[serde(default, alias = "businessAddress")]
    pub business_address: Option<String>,
    #[validate(length(max = 32, message = "Phone must be at most 32 characters"))]
    #[serde(default)]
    pub phone: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<UpdateProfileRequest> for ProfileChanges {
    fn from(request: UpdateProfileRequest) -> Self {
        Self {
            name: non_blank(request.name),
            business_name: non_blank(request.business_name),
            business_address: non_blank(request.business_address),
            phone: non_blank(request.phone),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub name: String,
    pub business_name: String,
    pub business_address: String,
    pub phone: String,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            user_id: profile.user_id,
            name: profile.name,
            business_name: profile.business_name,
            business_address: profile.business_address,
            phone: profile.phone,
        }
    }
}

/// A single invoice together with its owner's business details, when the
/// owner has saved a profile.
#[derive(Debug, Serialize)]
pub struct InvoiceDetailResponse {
    #[serde(flatten)]
    pub invoice: InvoiceResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<ProfileResponse>,
}
