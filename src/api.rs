use std::sync::Arc;

use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::context::{City, UserProfile};
use crate::error::{is_auth_status, ApiError, ErrorEnvelope};
use crate::features::appointments::{Appointment, AppointmentsGateway};
use crate::features::city::CityDirectory;
use crate::features::defects::{DefectCategory, DefectGateway};
use crate::features::egov::{EgovCategory, EgovGateway, EgovService};
use crate::features::news::{NewsGateway, NewsItem};
use crate::features::profile::ProfileSource;
use crate::features::waste::{WasteGateway, WastePickup};
use crate::redact::redact_credentials;
use crate::session::{CredentialsGateway, LoginRequest, RefreshRequest, TokenEnvelope};
use crate::transport::headers::config_headers;
use crate::transport::{map_transport_error, ApiClient};

/// Credential endpoints over HTTP. Runs its own client so every call is
/// bounded by the credential timeout, and never attaches the auth stage.
pub struct HttpCredentialsGateway {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl HttpCredentialsGateway {
    pub fn new(config: Arc<Config>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.credential_timeout)
            .build()
            .map_err(|error| ApiError::unclassified(error.to_string()))?;
        Ok(Self { http, config })
    }

    async fn post_credentials<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.config.base_url);
        let response = self
            .http
            .post(url)
            .headers(config_headers(&self.config))
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;
        decode(response).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest {
    refresh_token: String,
}

impl CredentialsGateway for HttpCredentialsGateway {
    async fn login(&self, request: LoginRequest) -> Result<TokenEnvelope, ApiError> {
        self.post_credentials("/auth/token", &request).await
    }

    async fn refresh(&self, request: RefreshRequest) -> Result<TokenEnvelope, ApiError> {
        self.post_credentials("/auth/token/refresh", &request).await
    }

    async fn notify_logout(&self, refresh_token: String) -> Result<(), ApiError> {
        let url = format!("{}/auth/logout", self.config.base_url);
        let response = self
            .http
            .post(url)
            .headers(config_headers(&self.config))
            .json(&LogoutRequest { refresh_token })
            .send()
            .await
            .map_err(map_transport_error)?;
        accept(response).await
    }
}

/// Feature endpoints. Public content goes out plain, personal content
/// through the authorized pipeline.
pub struct CityApi<G> {
    client: Arc<ApiClient<G>>,
}

impl<G: CredentialsGateway> CityApi<G> {
    pub fn new(client: Arc<ApiClient<G>>) -> Self {
        Self { client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.client.config().base_url)
    }

    async fn get_plain<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.client.send_plain(|http| http.get(url.as_str())).await?;
        decode(response).await
    }

    async fn get_authorized<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self
            .client
            .send_authorized(|http| http.get(url.as_str()))
            .await?;
        decode(response).await
    }
}

impl<G: CredentialsGateway> CityDirectory for CityApi<G> {
    async fn city(&self, city_id: i64) -> Result<City, ApiError> {
        self.get_plain(&format!("/cities/{city_id}")).await
    }
}

impl<G: CredentialsGateway> ProfileSource for CityApi<G> {
    async fn profile(&self) -> Result<UserProfile, ApiError> {
        self.get_authorized("/users/profile").await
    }
}

impl<G: CredentialsGateway> NewsGateway for CityApi<G> {
    async fn news(&self, city_id: i64) -> Result<Vec<NewsItem>, ApiError> {
        self.get_plain(&format!("/cities/{city_id}/news")).await
    }
}

impl<G: CredentialsGateway> AppointmentsGateway for CityApi<G> {
    async fn appointments(&self, city_id: i64) -> Result<Vec<Appointment>, ApiError> {
        self.get_authorized(&format!("/cities/{city_id}/appointments"))
            .await
    }

    async fn cancel_appointment(
        &self,
        city_id: i64,
        appointment_id: i64,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("/cities/{city_id}/appointments/{appointment_id}"));
        let response = self
            .client
            .send_authorized(|http| http.delete(url.as_str()))
            .await?;
        accept(response).await
    }
}

impl<G: CredentialsGateway> EgovGateway for CityApi<G> {
    async fn categories(&self, city_id: i64) -> Result<Vec<EgovCategory>, ApiError> {
        self.get_plain(&format!("/cities/{city_id}/egov/categories"))
            .await
    }

    async fn search_services(
        &self,
        city_id: i64,
        query: &str,
    ) -> Result<Vec<EgovService>, ApiError> {
        self.get_plain(&egov_search_path(city_id, query)).await
    }
}

impl<G: CredentialsGateway> DefectGateway for CityApi<G> {
    async fn defect_categories(&self, city_id: i64) -> Result<Vec<DefectCategory>, ApiError> {
        self.get_plain(&format!("/cities/{city_id}/defects/categories"))
            .await
    }
}

impl<G: CredentialsGateway> WasteGateway for CityApi<G> {
    async fn pickups(&self, city_id: i64) -> Result<Vec<WastePickup>, ApiError> {
        self.get_plain(&format!("/cities/{city_id}/waste/calendar"))
            .await
    }
}

fn egov_search_path(city_id: i64, query: &str) -> String {
    format!(
        "/cities/{city_id}/egov/services?search={}",
        urlencoding::encode(query)
    )
}

/// Decode a JSON success, or map the failure: 401/403 is `Unauthorized`,
/// a structured envelope is `Domain`, anything else stays unclassified
/// with a redacted, size-capped detail.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|error| ApiError::unclassified(error.to_string()))
}

async fn accept(response: Response) -> Result<(), ApiError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(error_from(response).await)
}

async fn error_from(response: Response) -> ApiError {
    let status = response.status().as_u16();
    if is_auth_status(status) {
        return ApiError::Unauthorized { status };
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => ApiError::Domain {
            code: envelope.error_code,
            messages: envelope.messages,
        },
        Err(_) => {
            let detail: String = redact_credentials(&body).chars().take(300).collect();
            ApiError::Unclassified {
                status: Some(status),
                detail: (!detail.is_empty()).then_some(detail),
            }
        }
    }
}
