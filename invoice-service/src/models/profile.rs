//! Business profile of an invoice owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Contact and business details shown on the owner's invoices. Keyed by the
/// caller identity from `X-User-ID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub business_address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Profile for a user who has not saved one yet.
    pub fn blank(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: String::new(),
            business_name: String::new(),
            business_address: String::new(),
            phone: String::new(),
            updated_at: Utc::now(),
        }
    }

    /// Copy the fields present in `changes` onto this profile.
    pub fn apply(&mut self, changes: &ProfileChanges, updated_at: DateTime<Utc>) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(business_name) = &changes.business_name {
            self.business_name = business_name.clone();
        }
        if let Some(business_address) = &changes.business_address {
            self.business_address = business_address.clone();
        }
        if let Some(phone) = &changes.phone {
            self.phone = phone.clone();
        }
        self.updated_at = updated_at;
    }
}

/// Fields to overwrite on a profile; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub business_address: Option<String>,
    pub phone: Option<String>,
}

impl ProfileChanges {
    /// Stored names of the editable profile fields.
    pub const FIELDS: [&'static str; 4] = ["name", "business_name", "business_address", "phone"];

    /// Present fields as `(stored field name, value)` pairs.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        Self::FIELDS
            .into_iter()
            .zip([&self.name, &self.business_name, &self.business_address, &self.phone])
            .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_only_touches_present_fields() {
        let mut profile = UserProfile::blank("user-1");
        profile.name = "Ada".to_string();
        profile.phone = "555-0100".to_string();

        let changes = ProfileChanges {
            business_name: Some("Analytical Engines Ltd".to_string()),
            phone: Some("555-0199".to_string()),
            ..Default::default()
        };
        profile.apply(&changes, Utc::now());

        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.business_name, "Analytical Engines Ltd");
        assert_eq!(profile.business_address, "");
        assert_eq!(profile.phone, "555-0199");
    }

    #[test]
    fn empty_changes_have_no_fields() {
        assert!(ProfileChanges::default().is_empty());
        let changes = ProfileChanges {
            name: Some("Ada".to_string()),
            ..Default::default()
        };
        assert_eq!(changes.fields().collect::<Vec<_>>(), vec![("name", "Ada")]);
    }
}
