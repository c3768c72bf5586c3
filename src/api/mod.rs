//! HTTP client for the Dasham API.
//!
//! One method per backend operation. Every request attaches the persisted
//! bearer token when one is present; failures are normalized into
//! [`ApiError`] and left to the caller to retry or surface — the client
//! never retries on its own.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;

use crate::dashes::{Dash, DashPreset};
use crate::moments::{Moment, NewMoment};
use crate::token_store::TokenStore;
use crate::trending::{CityStats, LeaderboardCreator, TrendingMoment};
use crate::types::{City, Currency, Timeframe};
use crate::users::{ProfileUpdate, User};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response. The message is taken from the `error` field of the
    /// JSON body when parseable, else `HTTP <status>`.
    #[error("{message}")]
    Status { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token_store: TokenStore,
}

// ---------------------------------------------------------------------------
// Request payloads and response envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
    pub display_name: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<City>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpRequested {
    pub message: String,
}

/// One page of the moments feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentsPage {
    pub moments: Vec<Moment>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// One page of dashes (per-moment or viewer history).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashesPage {
    pub dashes: Vec<Dash>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Moment detail, which additionally carries its most recent dashes.
#[derive(Debug, Clone, Deserialize)]
pub struct MomentDetail {
    #[serde(flatten)]
    pub moment: Moment,
    #[serde(default)]
    pub dashes: Vec<Dash>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashPresets {
    pub currency: Currency,
    pub presets: Vec<DashPreset>,
}

/// Response of payment initialization: the external page to navigate to,
/// plus the reference the redirect will carry back.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInit {
    pub payment_url: String,
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingBoard {
    pub city: City,
    pub timeframe: Timeframe,
    pub currency: Currency,
    pub moments: Vec<TrendingMoment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Leaderboard {
    pub city: City,
    pub timeframe: Timeframe,
    pub currency: Currency,
    pub creators: Vec<LeaderboardCreator>,
}

#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub city: Option<City>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: User,
}

#[derive(Debug, Deserialize)]
struct MomentEnvelope {
    moment: Moment,
}

#[derive(Debug, Deserialize)]
struct MomentDetailEnvelope {
    moment: MomentDetail,
}

#[derive(Debug, Deserialize)]
struct CitiesEnvelope {
    cities: Vec<CityStats>,
}

#[derive(Debug, Deserialize)]
struct BecomeCreatorEnvelope {
    #[allow(dead_code)]
    message: Option<String>,
    user: User,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token_store: TokenStore) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            token_store,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the bearer token (when present) and normalizes the response.
    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let request = match self.token_store.token() {
            Ok(Some(token)) => request.bearer_auth(token),
            Ok(None) => request,
            Err(e) => {
                tracing::warn!(
                    target: "dasham::api::execute",
                    "Failed to read auth token, sending unauthenticated: {}",
                    e
                );
                request
            }
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .ok()
                .and_then(|body| serde_json::from_str::<ErrorBody>(&body).ok())
                .and_then(|body| body.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }

    // Auth ------------------------------------------------------------------

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.execute(
            self.http
                .post(self.url("/api/auth/register"))
                .json(request),
        )
        .await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        self.execute(self.http.post(self.url("/api/auth/login")).json(request))
            .await
    }

    pub async fn request_otp(&self, phone: &str) -> Result<OtpRequested> {
        self.execute(
            self.http
                .post(self.url("/api/auth/request-otp"))
                .json(&serde_json::json!({ "phone": phone })),
        )
        .await
    }

    pub async fn verify_otp(&self, phone: &str, code: &str) -> Result<AuthResponse> {
        self.execute(
            self.http
                .post(self.url("/api/auth/verify-otp"))
                .json(&serde_json::json!({ "phone": phone, "code": code })),
        )
        .await
    }

    pub async fn google_auth(&self, id_token: &str) -> Result<AuthResponse> {
        self.execute(
            self.http
                .post(self.url("/api/auth/google"))
                .json(&serde_json::json!({ "idToken": id_token })),
        )
        .await
    }

    /// The currently authenticated user.
    pub async fn me(&self) -> Result<User> {
        let envelope: UserEnvelope = self.execute(self.http.get(self.url("/api/auth/me"))).await?;
        Ok(envelope.user)
    }

    // Moments ---------------------------------------------------------------

    /// One page of the feed for an optional city filter.
    pub async fn feed(&self, query: &FeedQuery) -> Result<MomentsPage> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(city) = query.city {
            params.push(("city", city.as_str().to_string()));
        }
        if let Some(cursor) = &query.cursor {
            params.push(("cursor", cursor.clone()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        self.execute(self.http.get(self.url("/api/moments")).query(&params))
            .await
    }

    pub async fn moment(&self, moment_id: &str) -> Result<MomentDetail> {
        let envelope: MomentDetailEnvelope = self
            .execute(self.http.get(self.url(&format!("/api/moments/{}", moment_id))))
            .await?;
        Ok(envelope.moment)
    }

    pub async fn create_moment(&self, moment: &NewMoment) -> Result<Moment> {
        let envelope: MomentEnvelope = self
            .execute(self.http.post(self.url("/api/moments")).json(moment))
            .await?;
        Ok(envelope.moment)
    }

    pub async fn moment_dashes(
        &self,
        moment_id: &str,
        cursor: Option<&str>,
    ) -> Result<DashesPage> {
        let mut request = self
            .http
            .get(self.url(&format!("/api/moments/{}/dashes", moment_id)));
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        self.execute(request).await
    }

    // Dash payments ---------------------------------------------------------

    pub async fn dash_presets(&self) -> Result<DashPresets> {
        self.execute(self.http.get(self.url("/api/dash/presets")))
            .await
    }

    /// Initializes a dash payment. The returned URL is externally hosted;
    /// the outcome comes back out-of-band via the redirect contract.
    pub async fn initialize_dash_payment(
        &self,
        moment_id: &str,
        amount: i64,
        message: Option<&str>,
    ) -> Result<PaymentInit> {
        tracing::debug!(
            target: "dasham::api::initialize_dash_payment",
            "Initializing payment of {} minor units for moment {}",
            amount,
            moment_id
        );

        let mut body = serde_json::json!({
            "momentId": moment_id,
            "amount": amount,
        });
        if let Some(message) = message {
            body["message"] = serde_json::json!(message);
        }

        self.execute(
            self.http
                .post(self.url("/api/dash/initialize-payment"))
                .json(&body),
        )
        .await
    }

    pub async fn dash_history(&self, cursor: Option<&str>) -> Result<DashesPage> {
        let mut request = self.http.get(self.url("/api/dash/history"));
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        self.execute(request).await
    }

    // Trending --------------------------------------------------------------

    pub async fn trending_stats(&self) -> Result<Vec<CityStats>> {
        let envelope: CitiesEnvelope =
            self.execute(self.http.get(self.url("/api/trending"))).await?;
        Ok(envelope.cities)
    }

    pub async fn trending_moments(
        &self,
        city: City,
        timeframe: Timeframe,
    ) -> Result<TrendingBoard> {
        self.execute(
            self.http
                .get(self.url(&format!("/api/trending/{}", city.slug())))
                .query(&[("timeframe", timeframe.as_str())]),
        )
        .await
    }

    pub async fn leaderboard(&self, city: City, timeframe: Timeframe) -> Result<Leaderboard> {
        self.execute(
            self.http
                .get(self.url(&format!("/api/trending/leaderboard/{}", city.slug())))
                .query(&[("timeframe", timeframe.as_str())]),
        )
        .await
    }

    // Users -----------------------------------------------------------------

    /// Profile by id or username; `me` resolves to the viewer.
    pub async fn profile(&self, identifier: &str) -> Result<User> {
        let envelope: UserEnvelope = self
            .execute(self.http.get(self.url(&format!("/api/users/{}", identifier))))
            .await?;
        Ok(envelope.user)
    }

    pub async fn user_moments(
        &self,
        identifier: &str,
        cursor: Option<&str>,
    ) -> Result<MomentsPage> {
        let mut request = self
            .http
            .get(self.url(&format!("/api/users/{}/moments", identifier)));
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        self.execute(request).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let envelope: UserEnvelope = self
            .execute(self.http.put(self.url("/api/users/me")).json(update))
            .await?;
        Ok(envelope.user)
    }

    pub async fn become_creator(&self, bio: &str) -> Result<User> {
        let envelope: BecomeCreatorEnvelope = self
            .execute(
                self.http
                    .post(self.url("/api/users/become-creator"))
                    .json(&serde_json::json!({ "bio": bio })),
            )
            .await?;
        Ok(envelope.user)
    }
}
