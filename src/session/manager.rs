use std::sync::{Arc, PoisonError};

use crate::config::Config;
use crate::context::{ContextBroadcaster, UserState};
use crate::error::ApiError;
use crate::secrets::{
    SecretStore, KEY_ACCESS_TOKEN, KEY_ACCESS_TOKEN_EXPIRATION, KEY_REFRESH_TOKEN,
    KEY_REFRESH_TOKEN_EXPIRATION, KEY_USER_ID, SESSION_KEYS,
};
use crate::session::gateway::{CredentialsGateway, LoginRequest, RefreshRequest};
use crate::session::model::{now_unix, LogoutReason, Session, SessionStatus, TokenEnvelope};

/// Owns the credential lifecycle. Every session mutation and the refresh
/// round-trip run under one async lock, so at most one refresh call is in
/// flight program-wide.
pub struct SessionManager<G> {
    gateway: Arc<G>,
    store: Arc<dyn SecretStore>,
    context: ContextBroadcaster,
    config: Arc<Config>,
    session: tokio::sync::Mutex<Session>,
    /// Last recorded logout cause, surfaced read-once to the UI.
    last_logout: std::sync::Mutex<LogoutReason>,
}

impl<G: CredentialsGateway> SessionManager<G> {
    /// An unreadable store reads as nothing persisted: start logged out.
    pub fn new(
        gateway: Arc<G>,
        store: Arc<dyn SecretStore>,
        context: ContextBroadcaster,
        config: Arc<Config>,
    ) -> Self {
        let session = match read_persisted(store.as_ref()) {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!(%error, "session hydration failed, starting logged out");
                Session::default()
            }
        };
        Self {
            gateway,
            store,
            context,
            config,
            session: tokio::sync::Mutex::new(session),
            last_logout: std::sync::Mutex::new(LogoutReason::None),
        }
    }

    /// A bearer header, refreshing first if the access token has lapsed. No
    /// usable refresh token tears the session down.
    pub async fn fetch_authorization_header(&self) -> Result<String, ApiError> {
        let mut session = self.session.lock().await;
        let now = now_unix();

        if !session.is_refresh_token_valid_at(now) {
            return Err(self.teardown_invalid_refresh(&mut session));
        }
        if !session.is_access_token_valid_at(now) {
            self.refresh_session(&mut session).await?;
        }
        bearer_header(&session)
    }

    /// Unconditional refresh, for after the server rejected a locally-valid
    /// bearer.
    pub async fn force_refresh(&self) -> Result<String, ApiError> {
        let mut session = self.session.lock().await;

        if !session.is_refresh_token_valid_at(now_unix()) {
            return Err(self.teardown_invalid_refresh(&mut session));
        }
        self.refresh_session(&mut session).await?;
        bearer_header(&session)
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        keep_logged_in: bool,
    ) -> Result<(), ApiError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            city_id: self.city_id(),
            keep_logged_in,
        };
        let envelope = self.gateway.login(request).await?;
        self.update_credentials(&envelope, keep_logged_in).await
    }

    /// Refresh token, user id and refresh expiry are always written; the
    /// access token and its expiry only when `persist`.
    pub async fn update_credentials(
        &self,
        envelope: &TokenEnvelope,
        persist: bool,
    ) -> Result<(), ApiError> {
        let mut session = self.session.lock().await;
        session.keep_logged_in = persist;
        session.commit_tokens(envelope, now_unix());
        self.persist_session(&session)?;
        Ok(())
    }

    pub async fn logout(&self, reason: LogoutReason) {
        let mut session = self.session.lock().await;
        self.clear_session(&mut session, reason);
    }

    /// Pure classification of the current session; never mutates.
    pub async fn evaluate_session(&self) -> SessionStatus {
        self.session.lock().await.evaluate_at(now_unix())
    }

    /// Evaluate-then-transition: an invalid session is logged out here,
    /// explicitly. A blank session only reports `false`.
    pub async fn is_logged_in(&self) -> bool {
        let mut session = self.session.lock().await;
        match session.evaluate_at(now_unix()) {
            SessionStatus::Valid => true,
            SessionStatus::InvalidCausing(_) if session.is_blank() => false,
            SessionStatus::InvalidCausing(reason) => {
                self.clear_session(&mut session, reason);
                false
            }
        }
    }

    pub async fn is_access_token_valid(&self) -> bool {
        self.session.lock().await.is_access_token_valid_at(now_unix())
    }

    pub async fn is_refresh_token_valid(&self) -> bool {
        self.session.lock().await.is_refresh_token_valid_at(now_unix())
    }

    pub async fn user_id(&self) -> String {
        self.session.lock().await.user_id.clone()
    }

    /// Hands out the last recorded logout cause exactly once; subsequent
    /// calls return [`LogoutReason::None`] until the next logout.
    pub fn take_logout_reason(&self) -> LogoutReason {
        let mut guard = self
            .last_logout
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, LogoutReason::None)
    }

    /// A server rejection of the refresh token tears the session down as a
    /// `TechnicalLogout`; every other failure leaves the session untouched.
    async fn refresh_session(&self, session: &mut Session) -> Result<(), ApiError> {
        let Some(refresh_token) = session.refresh_token.clone() else {
            return Err(self.teardown_invalid_refresh(session));
        };
        let request = RefreshRequest {
            refresh_token,
            city_id: self.city_id(),
            keep_logged_in: session.keep_logged_in,
        };

        match self.gateway.refresh(request).await {
            Ok(envelope) => {
                session.commit_tokens(&envelope, now_unix());
                self.persist_session(session)?;
                tracing::debug!("access token refreshed");
                Ok(())
            }
            Err(error) if error.is_credential_rejection() => {
                let reason = LogoutReason::TechnicalLogout;
                self.clear_session(session, reason);
                Err(ApiError::InvalidRefreshToken { reason })
            }
            Err(other) => Err(other),
        }
    }

    /// Locally-observed dead refresh token: classify by the keep-logged-in
    /// choice and tear down. A blank session (first run, or a logout that
    /// already ran) has nothing to tear down and no cause to record.
    fn teardown_invalid_refresh(&self, session: &mut Session) -> ApiError {
        if session.is_blank() {
            return ApiError::InvalidRefreshToken {
                reason: LogoutReason::NoLogoutReason,
            };
        }
        let reason = if session.keep_logged_in {
            LogoutReason::TechnicalLogout
        } else {
            LogoutReason::TokenExpiredLogout
        };
        self.clear_session(session, reason);
        ApiError::InvalidRefreshToken { reason }
    }

    /// The logout transition: wipe memory and the persisted keys, record
    /// the cause, publish an absent user, then best-effort notify the
    /// backend. A store failure cannot keep a session alive here.
    fn clear_session(&self, session: &mut Session, reason: LogoutReason) {
        let old_refresh_token = session.refresh_token.take();
        *session = Session::default();

        if let Err(error) = self.store.remove(&SESSION_KEYS) {
            tracing::warn!(%error, "failed to remove persisted session keys");
        }

        *self
            .last_logout
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = reason;
        tracing::info!(?reason, "session cleared");

        self.context.set_user(UserState::Absent);

        if let Some(refresh_token) = old_refresh_token {
            let gateway = Arc::clone(&self.gateway);
            tokio::spawn(async move {
                if let Err(error) = gateway.notify_logout(refresh_token).await {
                    tracing::warn!(%error, "logout notification failed");
                }
            });
        }
    }

    fn persist_session(&self, session: &Session) -> Result<(), ApiError> {
        if let Some(token) = session.refresh_token.as_deref() {
            self.store.put(KEY_REFRESH_TOKEN, token)?;
        }
        self.store.put(KEY_USER_ID, &session.user_id)?;
        self.store
            .put(KEY_REFRESH_TOKEN_EXPIRATION, &session.refresh_expiry.to_string())?;

        if session.keep_logged_in {
            if let Some(token) = session.access_token.as_deref() {
                self.store.put(KEY_ACCESS_TOKEN, token)?;
                self.store
                    .put(KEY_ACCESS_TOKEN_EXPIRATION, &session.access_expiry.to_string())?;
            }
        } else {
            self.store
                .remove(&[KEY_ACCESS_TOKEN, KEY_ACCESS_TOKEN_EXPIRATION])?;
        }
        Ok(())
    }

    fn city_id(&self) -> i64 {
        self.context
            .current_city_id()
            .unwrap_or(self.config.default_city_id)
    }
}

fn bearer_header(session: &Session) -> Result<String, ApiError> {
    session
        .access_token
        .as_deref()
        .map(|token| format!("Bearer {token}"))
        .ok_or_else(|| ApiError::unclassified("access token missing after refresh"))
}

/// The keep-logged-in choice is not stored on its own: only kept sessions
/// persist an access token, so its presence restores the flag.
fn read_persisted(store: &dyn SecretStore) -> Result<Session, crate::secrets::StoreError> {
    let access_token = store.get(KEY_ACCESS_TOKEN)?;
    let refresh_token = store.get(KEY_REFRESH_TOKEN)?;
    let user_id = store.get(KEY_USER_ID)?.unwrap_or_default();
    let access_expiry = parse_expiry(store.get(KEY_ACCESS_TOKEN_EXPIRATION)?);
    let refresh_expiry = parse_expiry(store.get(KEY_REFRESH_TOKEN_EXPIRATION)?);
    let keep_logged_in = access_token.is_some();

    Ok(Session {
        access_token,
        refresh_token,
        user_id,
        access_expiry,
        refresh_expiry,
        keep_logged_in,
    })
}

fn parse_expiry(value: Option<String>) -> i64 {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(0)
}
