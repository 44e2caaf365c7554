use std::future::Future;

use serde::Serialize;

use crate::error::ApiError;
use crate::session::model::TokenEnvelope;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub city_id: i64,
    pub keep_logged_in: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub city_id: i64,
    pub keep_logged_in: bool,
}

/// Credential endpoints the session layer talks to. Calls carry only the
/// config-stage headers and must be bounded by the credential timeout so a
/// hung exchange cannot wedge the auth critical section.
pub trait CredentialsGateway: Send + Sync + 'static {
    fn login(
        &self,
        request: LoginRequest,
    ) -> impl Future<Output = Result<TokenEnvelope, ApiError>> + Send;

    fn refresh(
        &self,
        request: RefreshRequest,
    ) -> impl Future<Output = Result<TokenEnvelope, ApiError>> + Send;

    /// Best-effort server-side invalidation of a refresh token. Local
    /// logout never waits on this.
    fn notify_logout(
        &self,
        refresh_token: String,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
