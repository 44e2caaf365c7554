pub mod headers;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response};

use crate::config::Config;
use crate::error::{is_auth_status, ApiError};
use crate::redact::redact_credentials;
use crate::session::{CredentialsGateway, SessionManager};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP pipeline for feature calls, plain or bearer-authorized.
pub struct ApiClient<G> {
    http: reqwest::Client,
    session: Arc<SessionManager<G>>,
    config: Arc<Config>,
}

impl<G: CredentialsGateway> ApiClient<G> {
    pub fn new(session: Arc<SessionManager<G>>, config: Arc<Config>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|error| ApiError::unclassified(error.to_string()))?;
        Ok(Self {
            http,
            session,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager<G>> {
        &self.session
    }

    /// The closure builds a fresh request from the shared client each time.
    pub async fn send_plain(
        &self,
        build: impl Fn(&reqwest::Client) -> RequestBuilder,
    ) -> Result<Response, ApiError> {
        build(&self.http)
            .headers(headers::config_headers(&self.config))
            .send()
            .await
            .map_err(map_transport_error)
    }

    /// A 401/403 answer triggers exactly one forced refresh and one repeat;
    /// the repeat's outcome is returned as is, success or not.
    pub async fn send_authorized(
        &self,
        build: impl Fn(&reqwest::Client) -> RequestBuilder,
    ) -> Result<Response, ApiError> {
        let bearer = self.session.fetch_authorization_header().await?;
        let response = self.dispatch(&build, &bearer).await?;
        if !is_auth_status(response.status().as_u16()) {
            return Ok(response);
        }

        tracing::debug!(
            status = response.status().as_u16(),
            "bearer rejected, forcing one refresh"
        );
        let bearer = self.session.force_refresh().await?;
        self.dispatch(&build, &bearer).await
    }

    async fn dispatch(
        &self,
        build: &impl Fn(&reqwest::Client) -> RequestBuilder,
        bearer: &str,
    ) -> Result<Response, ApiError> {
        let user_id = self.session.user_id().await;
        build(&self.http)
            .headers(headers::config_headers(&self.config))
            .headers(headers::auth_headers(
                bearer,
                &user_id,
                self.config.preview_mode,
            ))
            .send()
            .await
            .map_err(map_transport_error)
    }
}

/// Collapse low-level send failures into the client taxonomy. Only a
/// connect-class failure counts as "no connection"; timeouts and protocol
/// errors stay unclassified so they never look retryable.
pub(crate) fn map_transport_error(error: reqwest::Error) -> ApiError {
    if error.is_connect() {
        return ApiError::NoConnection;
    }
    ApiError::Unclassified {
        status: error.status().map(|status| status.as_u16()),
        detail: Some(redact_credentials(&error.to_string()).into_owned()),
    }
}
