//! Trending leaderboards, per city and timeframe.

use serde::{Deserialize, Serialize};

use crate::moments::Moment;
use crate::types::{City, Currency};

/// A ranked moment on the trending board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendingMoment {
    #[serde(flatten)]
    pub moment: Moment,
    pub rank: u32,
}

/// A ranked creator on the city leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardCreator {
    pub rank: u32,
    pub id: String,
    pub display_name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    /// Dashes received within the timeframe, in minor units.
    pub total_received: i64,
    pub formatted_total: String,
    pub moment_count: i64,
    pub dash_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopMoment {
    pub id: String,
    pub title: String,
    pub formatted_total: String,
}

/// Per-city overview row from the trending stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CityStats {
    pub city: City,
    pub currency: Currency,
    pub moment_count: i64,
    pub top_moment: Option<TopMoment>,
    pub total_dashed: i64,
    pub formatted_total_dashed: String,
}

/// `trending-update` push payload. A signal to refetch, not a data delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrendingUpdate {
    pub moment_id: String,
}
