use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "http://localhost:4000";
pub const DEFAULT_REALTIME_URL: &str = "ws://localhost:4000/rt";

#[derive(Clone, Debug)]
pub struct DashamConfig {
    /// Base URL of the Dasham HTTP API
    pub api_url: String,

    /// URL of the realtime event stream
    pub realtime_url: String,

    /// Directory for application data
    pub data_dir: PathBuf,

    /// Directory for application logs
    pub logs_dir: PathBuf,
}

impl DashamConfig {
    /// Builds a config with the default service URLs, overridable through the
    /// `DASHAM_API_URL` and `DASHAM_REALTIME_URL` environment variables
    /// (a `.env` file is honoured). Data and log directories get a
    /// `dev`/`release` suffix so debug builds never share state with a
    /// production install.
    pub fn new(data_dir: &Path, logs_dir: &Path) -> Self {
        dotenvy::dotenv().ok();

        let env_suffix = if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        };
        let formatted_data_dir = data_dir.join(env_suffix);
        let formatted_logs_dir = logs_dir.join(env_suffix);

        Self {
            api_url: std::env::var("DASHAM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            realtime_url: std::env::var("DASHAM_REALTIME_URL")
                .unwrap_or_else(|_| DEFAULT_REALTIME_URL.to_string()),
            data_dir: formatted_data_dir,
            logs_dir: formatted_logs_dir,
        }
    }

    /// Same directory handling as [`DashamConfig::new`] but with explicit
    /// service URLs, ignoring the environment.
    pub fn with_urls(
        api_url: impl Into<String>,
        realtime_url: impl Into<String>,
        data_dir: &Path,
        logs_dir: &Path,
    ) -> Self {
        let mut config = Self::new(data_dir, logs_dir);
        config.api_url = api_url.into();
        config.realtime_url = realtime_url.into();
        config
    }
}
