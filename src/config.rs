use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Config, read from the TOML file given as the first CLI argument.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// <address>:<port> to serve the portal-facing API and the admin API
    pub userfacing_listen_address: String,

    /// <address>:<port> to serve metrics on
    pub metrics_address: String,

    /// By default, output JSON logs. Only if this flag is set to true, output colourful human-friendly logs
    pub human_logs: bool,

    /// Max HTTP body size the API accepts
    #[serde(default = "max_body_size")]
    pub max_body_size: usize,

    /// password to connect to database.
    pub db_dsn: String,

    /// maximum number of connections maintained by PostgresStore
    pub db_pool_size: u32,

    /// maximum seconds waiting for a database connection
    pub db_connection_timeout: u64,

    /// Whether to disable the bearer token check on the admin API. This should only be true in
    /// test environments.
    pub disable_auth: bool,

    /// Lowercase hex SHA-256 of the admin bearer token. Without it, and with auth enabled, every
    /// admin request is rejected.
    #[serde(default)]
    pub admin_token_sha256: Option<String>,

    /// Telegram bot settings. The bot doesn't start without them.
    #[serde(default)]
    pub bot: Option<BotConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub token: String,

    /// The web app the welcome message's button opens.
    #[serde(default = "web_app_url")]
    pub web_app_url: Url,

    #[serde(default = "telegram_api_base")]
    pub api_base: Url,

    /// How long each getUpdates long poll may hang.
    #[serde(default = "poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl BotConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

impl Config {
    pub fn from_file(filepath: &str) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(filepath)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, anyhow::Error> {
        Ok(toml::from_str(contents)?)
    }
}

fn max_body_size() -> usize {
    65536
}

fn web_app_url() -> Url {
    Url::parse("https://fsp-link-portal.ru").expect("static URL is valid")
}

fn telegram_api_base() -> Url {
    Url::parse("https://api.telegram.org").expect("static URL is valid")
}

fn poll_timeout_secs() -> u64 {
    30
}
