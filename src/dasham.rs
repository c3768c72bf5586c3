use anyhow::Context;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::api::{ApiClient, LoginRequest, RegisterRequest};
use crate::config::DashamConfig;
use crate::dash_flow::DashFlow;
use crate::error::{DashamError, Result};
use crate::feed::FeedState;
use crate::init_tracing;
use crate::live::{CityLive, MomentLive};
use crate::realtime::RealtimeManager;
use crate::token_store::TokenStore;
use crate::types::{City, ProcessableEvent};
use crate::users::{ProfileUpdate, User};

/// Application core. Owns the API client, the realtime connection, and the
/// token store; constructed once per process by [`Dasham::initialize_dasham`].
pub struct Dasham {
    pub config: DashamConfig,
    api: ApiClient,
    realtime: RealtimeManager,
    token_store: TokenStore,
    current_user: Option<User>,
    #[allow(dead_code)] // Reserved for Dasham methods that queue synthetic events
    event_sender: Sender<ProcessableEvent>,
    shutdown_sender: Sender<()>,
}

impl Dasham {
    // ============================================================================
    // INITIALIZATION & LIFECYCLE
    // ============================================================================

    /// Initializes the Dasham client core with the provided configuration.
    ///
    /// This method sets up the data and log directories, configures logging,
    /// creates the API client and realtime manager, and starts the event
    /// processing loop. The realtime connection itself stays lazy: it is
    /// only opened on the first [`Dasham::connect_realtime`] call.
    ///
    /// # Errors
    ///
    /// This function will return an error if the data or log directories
    /// cannot be created.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use dasham::{Dasham, DashamConfig};
    /// # use std::path::Path;
    /// # async fn example() -> Result<(), dasham::DashamError> {
    /// let config = DashamConfig::new(Path::new("./data"), Path::new("./logs"));
    /// let dasham = Dasham::initialize_dasham(config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn initialize_dasham(config: DashamConfig) -> Result<Self> {
        let data_dir = &config.data_dir;
        let logs_dir = &config.logs_dir;

        // Setup directories
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))
            .map_err(DashamError::from)?;
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))
            .map_err(DashamError::from)?;

        // Only initialize tracing once
        init_tracing(logs_dir);

        tracing::debug!("Logging initialized in directory: {:?}", logs_dir);

        // Create event processing channels
        let (event_sender, event_receiver) = mpsc::channel(500);
        let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);

        let token_store = TokenStore::new(data_dir);
        let api = ApiClient::new(config.api_url.clone(), token_store.clone());
        let realtime = RealtimeManager::new(config.realtime_url.clone(), event_sender.clone());

        let dasham = Self {
            config,
            api,
            realtime,
            token_store,
            current_user: None,
            event_sender,
            shutdown_sender,
        };

        // Start the event processing loop
        dasham
            .start_event_processing_loop(event_receiver, shutdown_receiver)
            .await;

        // Return fully configured, ready-to-go instance
        Ok(dasham)
    }

    /// Opens the shared realtime connection. Idempotent; safe to call from
    /// every surface that needs live events.
    pub fn connect_realtime(&self) {
        self.realtime.connect();
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn realtime(&self) -> &RealtimeManager {
        &self.realtime
    }

    /// Feed state for an optional city filter.
    pub fn feed(&self, city: Option<City>) -> FeedState {
        FeedState::new(city)
    }

    /// Live counter tracker bound to the shared realtime connection.
    pub fn moment_live(&self) -> MomentLive {
        MomentLive::new(self.realtime.clone())
    }

    /// City-update tracker bound to the shared realtime connection.
    pub fn city_live(&self) -> CityLive {
        CityLive::new(self.realtime.clone())
    }

    pub fn dash_flow(&self) -> DashFlow {
        DashFlow::new()
    }

    /// Deletes all client-side data: the persisted token, everything in the
    /// data directory, and all log files. Also stops the event processing
    /// loop and the realtime connection.
    pub async fn delete_all_data(&mut self) -> Result<()> {
        tracing::debug!(target: "dasham::delete_all_data", "Deleting all data");

        self.realtime.unsubscribe_all();
        self.realtime.shutdown().await;

        // Remove everything under the data directory (token store included)
        if self.config.data_dir.exists() {
            for entry in std::fs::read_dir(&self.config.data_dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_file() {
                    std::fs::remove_file(path)?;
                } else if path.is_dir() {
                    std::fs::remove_dir_all(path)?;
                }
            }
        }

        // Remove logs
        if self.config.logs_dir.exists() {
            for entry in std::fs::read_dir(&self.config.logs_dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_file() {
                    std::fs::remove_file(path)?;
                } else if path.is_dir() {
                    std::fs::remove_dir_all(path)?;
                }
            }
        }

        // Shutdown the event processing loop
        self.shutdown_event_processing().await?;

        self.current_user = None;

        Ok(())
    }

    /// Start the event processing loop in a background task
    async fn start_event_processing_loop(
        &self,
        receiver: Receiver<ProcessableEvent>,
        shutdown_receiver: Receiver<()>,
    ) {
        let realtime = self.realtime.clone();
        tokio::spawn(async move {
            Self::process_events(realtime, receiver, shutdown_receiver).await;
        });
    }

    /// Shutdown event processing gracefully
    pub(crate) async fn shutdown_event_processing(&self) -> Result<()> {
        match self.shutdown_sender.send(()).await {
            Ok(_) => Ok(()),
            Err(_) => Ok(()), // Expected if processor already shut down
        }
    }

    /// Main event processing loop
    async fn process_events(
        realtime: RealtimeManager,
        mut receiver: Receiver<ProcessableEvent>,
        mut shutdown: Receiver<()>,
    ) {
        tracing::debug!(
            target: "dasham::event_processing",
            "Starting event processing loop"
        );

        let mut shutting_down = false;

        loop {
            tokio::select! {
                Some(event) = receiver.recv() => {
                    match event {
                        ProcessableEvent::Push(push) => {
                            tracing::debug!(
                                target: "dasham::event_processing",
                                "Dispatching push event: {:?}",
                                push
                            );
                            realtime.dispatch(&push);
                        }
                        ProcessableEvent::SocketStatus(status) => {
                            tracing::debug!(
                                target: "dasham::event_processing::socket_status",
                                "Realtime connection status: {}",
                                status
                            );
                        }
                    }
                }
                Some(_) = shutdown.recv(), if !shutting_down => {
                    tracing::info!(
                        target: "dasham::event_processing",
                        "Received shutdown signal, finishing current queue..."
                    );
                    shutting_down = true;
                    // Continue processing remaining events in queue, but don't wait for new shutdown signals
                }
                else => {
                    if shutting_down {
                        tracing::debug!(
                            target: "dasham::event_processing",
                            "Queue flushed, shutting down event processor"
                        );
                    } else {
                        tracing::debug!(
                            target: "dasham::event_processing",
                            "All channels closed, exiting event processing loop"
                        );
                    }
                    break;
                }
            }
        }
    }

    // ============================================================================
    // SESSION MANAGEMENT
    // ============================================================================

    /// Logs in with email-or-phone credentials, persists the returned token,
    /// and remembers the viewer.
    pub async fn login(&mut self, request: &LoginRequest) -> Result<User> {
        let auth = self.api.login(request).await?;
        self.token_store.set_token(&auth.token)?;
        self.current_user = Some(auth.user.clone());
        tracing::debug!(target: "dasham::login", "Logged in as {}", auth.user.username);
        Ok(auth.user)
    }

    /// Registers a new account and starts its session.
    pub async fn register(&mut self, request: &RegisterRequest) -> Result<User> {
        let auth = self.api.register(request).await?;
        self.token_store.set_token(&auth.token)?;
        self.current_user = Some(auth.user.clone());
        Ok(auth.user)
    }

    /// Requests a one-time code for phone login.
    pub async fn request_otp(&self, phone: &str) -> Result<()> {
        self.api.request_otp(phone).await?;
        Ok(())
    }

    /// Completes phone login with the received one-time code.
    pub async fn login_with_otp(&mut self, phone: &str, code: &str) -> Result<User> {
        let auth = self.api.verify_otp(phone, code).await?;
        self.token_store.set_token(&auth.token)?;
        self.current_user = Some(auth.user.clone());
        Ok(auth.user)
    }

    /// Restores the session from a persisted token, if any. An invalid or
    /// expired token is cleared and reported as no session.
    pub async fn restore_session(&mut self) -> Result<Option<User>> {
        if self.token_store.token()?.is_none() {
            return Ok(None);
        }

        match self.api.me().await {
            Ok(user) => {
                self.current_user = Some(user.clone());
                Ok(Some(user))
            }
            Err(crate::api::ApiError::Status { status: 401, .. }) => {
                tracing::debug!(
                    target: "dasham::restore_session",
                    "Persisted token rejected, clearing it"
                );
                self.token_store.clear_token()?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drops the persisted token and forgets the viewer.
    pub fn logout(&mut self) -> Result<()> {
        self.token_store.clear_token()?;
        self.current_user = None;
        Ok(())
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current_user.is_some()
    }

    // ============================================================================
    // PROFILES
    // ============================================================================

    /// Profile by id or username; `me` resolves to the viewer.
    pub async fn fetch_profile(&self, identifier: &str) -> Result<User> {
        Ok(self.api.profile(identifier).await?)
    }

    /// Updates the viewer's own profile and keeps the session copy fresh.
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<User> {
        if self.current_user.is_none() {
            return Err(DashamError::NotLoggedIn);
        }
        let user = self.api.update_profile(update).await?;
        self.current_user = Some(user.clone());
        Ok(user)
    }

    /// Upgrades the viewer to a creator account.
    pub async fn become_creator(&mut self, bio: &str) -> Result<User> {
        if self.current_user.is_none() {
            return Err(DashamError::NotLoggedIn);
        }
        let user = self.api.become_creator(bio).await?;
        self.current_user = Some(user.clone());
        Ok(user)
    }
}

impl std::fmt::Debug for Dasham {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dasham")
            .field("config", &self.config)
            .field("current_user", &self.current_user.as_ref().map(|u| &u.username))
            .field("api", &"<REDACTED>")
            .field("token_store", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_config() -> (DashamConfig, TempDir, TempDir) {
        let data_temp_dir = TempDir::new().expect("Failed to create temp data dir");
        let logs_temp_dir = TempDir::new().expect("Failed to create temp logs dir");

        let config = DashamConfig::with_urls(
            "http://localhost:4000",
            "ws://localhost:4000/rt",
            data_temp_dir.path(),
            logs_temp_dir.path(),
        );

        (config, data_temp_dir, logs_temp_dir)
    }

    fn auth_response_body() -> &'static str {
        r#"{
            "user": {
                "id": "u1",
                "displayName": "Chidi",
                "username": "chidi_l",
                "city": "LAGOS",
                "country": "Nigeria",
                "isCreator": false
            },
            "token": "jwt-abc123"
        }"#
    }

    #[tokio::test]
    async fn test_dasham_initialization() {
        let (config, _data_temp, _logs_temp) = create_test_config();

        let result = Dasham::initialize_dasham(config.clone()).await;
        assert!(result.is_ok());

        let dasham = result.unwrap();
        assert_eq!(dasham.config.data_dir, config.data_dir);
        assert_eq!(dasham.config.logs_dir, config.logs_dir);
        assert!(dasham.current_user().is_none());
        assert!(!dasham.is_logged_in());

        // Verify directories were created
        assert!(config.data_dir.exists());
        assert!(config.logs_dir.exists());
    }

    #[tokio::test]
    async fn test_dasham_debug_format() {
        let (config, _data_temp, _logs_temp) = create_test_config();
        let dasham = Dasham::initialize_dasham(config).await.unwrap();

        let debug_str = format!("{:?}", dasham);
        assert!(debug_str.contains("Dasham"));
        assert!(debug_str.contains("config"));
        assert!(debug_str.contains("current_user"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[tokio::test]
    async fn test_shutdown_event_processing() {
        let (config, _data_temp, _logs_temp) = create_test_config();
        let dasham = Dasham::initialize_dasham(config).await.unwrap();

        let result = dasham.shutdown_event_processing().await;
        assert!(result.is_ok());

        // Test that multiple shutdowns don't cause errors
        let result2 = dasham.shutdown_event_processing().await;
        assert!(result2.is_ok());
    }

    #[tokio::test]
    async fn test_login_persists_token_and_user() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/auth/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(auth_response_body())
            .create_async()
            .await;

        let (mut config, _data_temp, _logs_temp) = create_test_config();
        config.api_url = server.url();

        let mut dasham = Dasham::initialize_dasham(config).await.unwrap();
        let user = dasham
            .login(&LoginRequest {
                email: Some("chidi@example.com".to_string()),
                phone: None,
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(user.username, "chidi_l");
        assert!(dasham.is_logged_in());
        assert_eq!(
            dasham.token_store.token().unwrap().as_deref(),
            Some("jwt-abc123")
        );
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_user() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/auth/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(auth_response_body())
            .create_async()
            .await;

        let (mut config, _data_temp, _logs_temp) = create_test_config();
        config.api_url = server.url();

        let mut dasham = Dasham::initialize_dasham(config).await.unwrap();
        dasham
            .login(&LoginRequest {
                email: Some("chidi@example.com".to_string()),
                phone: None,
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();

        dasham.logout().unwrap();
        assert!(!dasham.is_logged_in());
        assert!(dasham.token_store.token().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_session_without_token() {
        let (config, _data_temp, _logs_temp) = create_test_config();
        let mut dasham = Dasham::initialize_dasham(config).await.unwrap();

        let restored = dasham.restore_session().await.unwrap();
        assert!(restored.is_none());
        assert!(!dasham.is_logged_in());
    }

    #[tokio::test]
    async fn test_restore_session_clears_rejected_token() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/auth/me")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Token expired"}"#)
            .create_async()
            .await;

        let (mut config, _data_temp, _logs_temp) = create_test_config();
        config.api_url = server.url();

        let mut dasham = Dasham::initialize_dasham(config).await.unwrap();
        dasham.token_store.set_token("stale-token").unwrap();

        let restored = dasham.restore_session().await.unwrap();
        assert!(restored.is_none());
        assert!(dasham.token_store.token().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_requires_login() {
        let (config, _data_temp, _logs_temp) = create_test_config();
        let mut dasham = Dasham::initialize_dasham(config).await.unwrap();

        let result = dasham.update_profile(&ProfileUpdate::default()).await;
        assert!(matches!(result, Err(DashamError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn test_delete_all_data() {
        let (config, _data_temp, _logs_temp) = create_test_config();
        let mut dasham = Dasham::initialize_dasham(config.clone()).await.unwrap();

        // Create some state to delete
        dasham.token_store.set_token("jwt-abc123").unwrap();
        let test_log_file = config.logs_dir.join("test_log.txt");
        tokio::fs::write(&test_log_file, "test log").await.unwrap();

        let result = dasham.delete_all_data().await;
        assert!(result.is_ok());

        assert!(dasham.token_store.token().unwrap().is_none());
        assert!(!test_log_file.exists());
        assert!(dasham.current_user().is_none());
    }

    #[tokio::test]
    async fn test_queue_operations_after_shutdown() {
        let (config, _data_temp, _logs_temp) = create_test_config();
        let dasham = Dasham::initialize_dasham(config).await.unwrap();

        // Shutdown event processing
        dasham.shutdown_event_processing().await.unwrap();

        // Give a moment for shutdown to complete
        tokio::time::sleep(Duration::from_millis(10)).await;

        // A second shutdown after the loop exited must still be fine
        assert!(dasham.shutdown_event_processing().await.is_ok());
    }

    #[tokio::test]
    async fn test_multiple_initializations_with_same_config() {
        let (config, _data_temp, _logs_temp) = create_test_config();

        // First initialization
        let result1 = Dasham::initialize_dasham(config.clone()).await;
        assert!(result1.is_ok());

        // Second initialization with same config should also work
        let result2 = Dasham::initialize_dasham(config).await;
        assert!(result2.is_ok());
    }
}
