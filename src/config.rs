use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.citykit.app/api/v2";
const DEFAULT_REQUESTING_APP: &str = "CITYKIT";
const DEFAULT_CREDENTIAL_TIMEOUT_SECS: u64 = 10;

/// Static client configuration, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub requesting_app: String,
    pub app_version: String,
    pub os_name: String,
    /// Negotiated against the allow-list before it goes on the wire.
    pub requested_locale: String,
    pub push_id: Option<String>,
    /// Selects the `PREVIEW`/`LIVE` content mode.
    pub preview_mode: bool,
    /// City used for credential calls before any city was committed.
    pub default_city_id: i64,
    /// Bound on login/refresh/logout round-trips.
    pub credential_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            requesting_app: DEFAULT_REQUESTING_APP.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            os_name: std::env::consts::OS.to_string(),
            requested_locale: "en".to_string(),
            push_id: None,
            preview_mode: false,
            default_city_id: 0,
            credential_timeout: Duration::from_secs(DEFAULT_CREDENTIAL_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Environment overrides, falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("CITYKIT_BASE_URL").unwrap_or(defaults.base_url),
            requesting_app: env::var("CITYKIT_APP_ID").unwrap_or(defaults.requesting_app),
            app_version: env::var("CITYKIT_APP_VERSION").unwrap_or(defaults.app_version),
            os_name: env::var("CITYKIT_OS_NAME").unwrap_or(defaults.os_name),
            requested_locale: env::var("CITYKIT_LOCALE").unwrap_or(defaults.requested_locale),
            push_id: env::var("CITYKIT_PUSH_ID").ok().filter(|v| !v.is_empty()),
            preview_mode: env::var("CITYKIT_PREVIEW")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.preview_mode),
            default_city_id: env::var("CITYKIT_CITY_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_city_id),
            credential_timeout: env::var("CITYKIT_CREDENTIAL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.credential_timeout),
        }
    }
}
