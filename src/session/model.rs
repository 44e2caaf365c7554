use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Stored refresh expiry meaning "valid for as long as the token exists".
pub const UNBOUNDED_EXPIRY: i64 = -1;

/// Lifetime value in a credential response that maps to [`UNBOUNDED_EXPIRY`].
pub const UNBOUNDED_LIFETIME: i64 = -1;

pub(crate) fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Why the current session ended. Recorded right before the teardown runs
/// and consumed once by whoever renders it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    #[default]
    None,
    ActiveLogout,
    /// The backend rejected credentials we believed were good.
    TechnicalLogout,
    TokenExpiredLogout,
    /// Silent teardown: first run, or nothing worth announcing.
    NoLogoutReason,
}

impl LogoutReason {
    pub fn is_unexpected(self) -> bool {
        matches!(self, Self::TechnicalLogout | Self::TokenExpiredLogout)
    }
}

/// Classifying never acts; teardown is always the caller's explicit
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Valid,
    InvalidCausing(LogoutReason),
}

/// In-memory credential set; the store persists only the secret fields and
/// the two expiry integers.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_id: String,
    /// Absolute unix seconds; `0` when nothing was ever issued or persisted.
    pub access_expiry: i64,
    /// Absolute unix seconds, or [`UNBOUNDED_EXPIRY`].
    pub refresh_expiry: i64,
    pub keep_logged_in: bool,
}

impl Session {
    pub fn is_access_token_valid_at(&self, now: i64) -> bool {
        now < self.access_expiry
    }

    /// True on a first run or after a completed logout.
    pub fn is_blank(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user_id.is_empty()
    }

    pub fn is_refresh_token_valid_at(&self, now: i64) -> bool {
        let present = self
            .refresh_token
            .as_deref()
            .is_some_and(|t| !t.is_empty());
        present && (self.refresh_expiry == UNBOUNDED_EXPIRY || now < self.refresh_expiry)
    }

    /// Keeping logged in is governed by the refresh token, otherwise by the
    /// access token. `TokenExpiredLogout` arises only when a still-valid
    /// refresh token shows the access token lapsed without the keep flag.
    pub fn evaluate_at(&self, now: i64) -> SessionStatus {
        let refresh_ok = self.is_refresh_token_valid_at(now);
        let valid = if self.keep_logged_in {
            refresh_ok
        } else {
            self.is_access_token_valid_at(now)
        };

        if valid {
            SessionStatus::Valid
        } else if !self.keep_logged_in && refresh_ok {
            SessionStatus::InvalidCausing(LogoutReason::TokenExpiredLogout)
        } else {
            SessionStatus::InvalidCausing(LogoutReason::NoLogoutReason)
        }
    }

    /// Expiries become absolute instants. The user id is only replaced when
    /// the envelope carries one (login does, refresh does not).
    pub fn commit_tokens(&mut self, envelope: &TokenEnvelope, now: i64) {
        self.access_token = Some(envelope.access_token.clone());
        self.refresh_token = Some(envelope.refresh_token.clone());
        self.access_expiry = now + envelope.expires_in;
        self.refresh_expiry = if envelope.refresh_expires_in == UNBOUNDED_LIFETIME {
            UNBOUNDED_EXPIRY
        } else {
            now + envelope.refresh_expires_in
        };
        if let Some(user_id) = envelope.user_id.as_deref() {
            if !user_id.is_empty() {
                self.user_id = user_id.to_string();
            }
        }
    }
}

/// Credential endpoint payload. `userId` only accompanies a fresh login.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEnvelope {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Lifetime in seconds, or [`UNBOUNDED_LIFETIME`].
    pub refresh_expires_in: i64,
    #[serde(default)]
    pub user_id: Option<String>,
}
