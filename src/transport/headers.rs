use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION};

use crate::config::Config;

pub const HEADER_OS_NAME: HeaderName = HeaderName::from_static("os-name");
pub const HEADER_APP_VERSION: HeaderName = HeaderName::from_static("app-version");
pub const HEADER_REQUESTING_APP: HeaderName = HeaderName::from_static("requesting-app");
pub const HEADER_PUSH_ID: HeaderName = HeaderName::from_static("push-id");
pub const HEADER_USER_ID: HeaderName = HeaderName::from_static("user-id");
pub const HEADER_MODE: HeaderName = HeaderName::from_static("mode");

pub const MODE_PREVIEW: &str = "PREVIEW";
pub const MODE_LIVE: &str = "LIVE";

/// `User-Id` sent while nobody is logged in.
pub const ANONYMOUS_USER_ID: &str = "-1";

/// Locales the backend can answer in.
pub const SUPPORTED_LOCALES: &[&str] = &["en", "de"];
const FALLBACK_LOCALE: &str = "en";

/// Reduce a requested locale (`de-DE`, `en_US`, ...) to a supported one.
pub fn negotiate_locale(requested: &str) -> &'static str {
    let primary = requested
        .split(['-', '_'])
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    SUPPORTED_LOCALES
        .iter()
        .copied()
        .find(|supported| *supported == primary)
        .unwrap_or(FALLBACK_LOCALE)
}

/// Headers attached to every request, authorized or not. Values that do not
/// fit a header are skipped; this stage never fails a request.
pub fn config_headers(config: &Config) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(negotiate_locale(&config.requested_locale)),
    );
    if let Ok(value) = HeaderValue::from_str(&config.os_name) {
        headers.insert(HEADER_OS_NAME, value);
    }
    if let Ok(value) = HeaderValue::from_str(&config.app_version) {
        headers.insert(HEADER_APP_VERSION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&config.requesting_app) {
        headers.insert(HEADER_REQUESTING_APP, value);
    }
    if let Some(push_id) = &config.push_id {
        if let Ok(value) = HeaderValue::from_str(push_id) {
            headers.insert(HEADER_PUSH_ID, value);
        }
    }
    headers
}

/// Headers only authorized requests carry.
pub fn auth_headers(bearer: &str, user_id: &str, preview_mode: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(bearer) {
        headers.insert(AUTHORIZATION, value);
    }
    let user_id = if user_id.trim().is_empty() {
        ANONYMOUS_USER_ID
    } else {
        user_id
    };
    if let Ok(value) = HeaderValue::from_str(user_id) {
        headers.insert(HEADER_USER_ID, value);
    }
    headers.insert(
        HEADER_MODE,
        HeaderValue::from_static(if preview_mode { MODE_PREVIEW } else { MODE_LIVE }),
    );
    headers
}
