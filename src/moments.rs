//! Feed content items ("moments") and their creators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::City;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomentType {
    Clip,
    LiveEvent,
    Audio,
    Image,
}

/// Creator summary embedded in a moment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub id: String,
    pub display_name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_creator: bool,
}

/// A content item in the feed. Created server-side; the client only ever
/// receives and displays it. `total_dashes` is in minor currency units.
///
/// The aggregate counters (`total_dashes`, `dash_count`) are never derived
/// locally from individual dash events; they are only overwritten wholesale
/// by fetch payloads or authoritative push updates, so a replayed event can
/// never double-count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Moment {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub moment_type: MomentType,
    pub media_url: String,
    pub thumbnail_url: Option<String>,
    /// Playback length in seconds, for clips and audio.
    pub duration: Option<u32>,
    pub city: City,
    pub event_name: Option<String>,
    pub venue: Option<String>,
    pub total_dashes: i64,
    pub dash_count: i64,
    pub view_count: i64,
    pub creator_id: String,
    pub creator: Creator,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Display string precomputed by the server, when present.
    pub formatted_total: Option<String>,
}

impl Moment {
    /// Display string for the dash total, preferring the server-provided one.
    pub fn display_total(&self) -> String {
        match &self.formatted_total {
            Some(formatted) => formatted.clone(),
            None => self.city.currency().format_minor(self.total_dashes),
        }
    }

    /// Overwrites both aggregate counters with an authoritative pair.
    pub fn set_totals(&mut self, total_dashes: i64, dash_count: i64) {
        self.total_dashes = total_dashes;
        self.dash_count = dash_count;
    }
}

/// Payload for creating a moment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMoment {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub moment_type: MomentType,
    pub media_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    pub city: City,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Builds a minimal moment for state-machine tests.
    pub(crate) fn moment(id: &str, total_dashes: i64, dash_count: i64) -> Moment {
        Moment {
            id: id.to_string(),
            title: format!("Moment {}", id),
            description: None,
            moment_type: MomentType::Clip,
            media_url: format!("https://cdn.dasham.app/{}.mp4", id),
            thumbnail_url: None,
            duration: Some(30),
            city: City::Lagos,
            event_name: None,
            venue: None,
            total_dashes,
            dash_count,
            view_count: 0,
            creator_id: format!("creator-{}", id),
            creator: Creator {
                id: format!("creator-{}", id),
                display_name: "Test Creator".to_string(),
                username: "testcreator".to_string(),
                avatar_url: None,
                is_creator: true,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
            formatted_total: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_moment_json() -> &'static str {
        r#"{
            "id": "cm5xyz123",
            "title": "Amapiano set at Konka",
            "description": "Friday night heat",
            "type": "CLIP",
            "mediaUrl": "https://cdn.dasham.app/moments/cm5xyz123.mp4",
            "thumbnailUrl": "https://cdn.dasham.app/thumbs/cm5xyz123.jpg",
            "duration": 42,
            "city": "JOBURG",
            "eventName": "Konka Fridays",
            "venue": "Konka, Soweto",
            "totalDashes": 125000,
            "dashCount": 37,
            "viewCount": 1204,
            "creatorId": "cm5creator1",
            "creator": {
                "id": "cm5creator1",
                "displayName": "DJ Maphorisa Fan",
                "username": "amapiano_joe",
                "avatarUrl": null,
                "isCreator": true
            },
            "createdAt": "2025-06-01T18:30:00.000Z",
            "updatedAt": "2025-06-01T19:00:00.000Z",
            "formattedTotal": "R1,250"
        }"#
    }

    #[test]
    fn test_moment_deserializes_from_api_payload() {
        let moment: Moment = serde_json::from_str(get_test_moment_json()).unwrap();

        assert_eq!(moment.id, "cm5xyz123");
        assert_eq!(moment.moment_type, MomentType::Clip);
        assert_eq!(moment.city, City::Joburg);
        assert_eq!(moment.total_dashes, 125000);
        assert_eq!(moment.dash_count, 37);
        assert_eq!(moment.creator.username, "amapiano_joe");
        assert!(moment.creator.avatar_url.is_none());
    }

    #[test]
    fn test_display_total_prefers_server_string() {
        let mut moment: Moment = serde_json::from_str(get_test_moment_json()).unwrap();
        assert_eq!(moment.display_total(), "R1,250");

        moment.formatted_total = None;
        assert_eq!(moment.display_total(), "R1,250");
    }

    #[test]
    fn test_set_totals_overwrites_wholesale() {
        let mut moment = test_support::moment("m1", 1000, 2);
        moment.set_totals(6000, 3);
        assert_eq!(moment.total_dashes, 6000);
        assert_eq!(moment.dash_count, 3);
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let json = r#"{
            "id": "m2",
            "title": "Street art timelapse",
            "type": "IMAGE",
            "mediaUrl": "https://cdn.dasham.app/moments/m2.jpg",
            "city": "NAIROBI",
            "totalDashes": 0,
            "dashCount": 0,
            "viewCount": 5,
            "creatorId": "c2",
            "creator": {
                "id": "c2",
                "displayName": "Wanjiku",
                "username": "wanjiku_art",
                "isCreator": true
            },
            "createdAt": "2025-06-02T08:00:00.000Z",
            "updatedAt": "2025-06-02T08:00:00.000Z"
        }"#;

        let moment: Moment = serde_json::from_str(json).unwrap();
        assert!(moment.description.is_none());
        assert!(moment.formatted_total.is_none());
        assert_eq!(moment.display_total(), "KSh0");
    }
}
