//! Viewer and creator profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::City;

/// A user profile as returned by the API. Read-only from the client's
/// perspective except for the viewer's own profile, which is edited through
/// [`ProfileUpdate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub city: City,
    pub country: String,
    pub is_creator: bool,
    /// Lifetime dashes received, in minor units. Creators only.
    pub total_received: Option<i64>,
    pub formatted_total_received: Option<String>,
    pub moment_count: Option<i64>,
    pub dash_count: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial update for the viewer's own profile. Unset fields are left
/// untouched by the server.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<City>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_deserializes_from_api_payload() {
        let json = r#"{
            "id": "cm5creator1",
            "email": "joe@example.com",
            "displayName": "DJ Maphorisa Fan",
            "username": "amapiano_joe",
            "bio": "Soweto sounds",
            "city": "JOBURG",
            "country": "South Africa",
            "isCreator": true,
            "totalReceived": 4500000,
            "formattedTotalReceived": "R45,000",
            "momentCount": 12,
            "dashCount": 340,
            "createdAt": "2025-01-15T09:00:00.000Z"
        }"#;

        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.username, "amapiano_joe");
        assert_eq!(user.city, City::Joburg);
        assert!(user.phone.is_none());
        assert_eq!(user.total_received, Some(4500000));
    }

    #[test]
    fn test_profile_update_serializes_only_set_fields() {
        let update = ProfileUpdate {
            bio: Some("New bio".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "bio": "New bio" }));
    }
}
