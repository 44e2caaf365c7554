use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;
use crate::sync::{FeatureFetch, OperationTag};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
}

pub trait AppointmentsGateway: Send + Sync + 'static {
    fn appointments(
        &self,
        city_id: i64,
    ) -> impl Future<Output = Result<Vec<Appointment>, ApiError>> + Send;

    fn cancel_appointment(
        &self,
        city_id: i64,
        appointment_id: i64,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Personal appointments with the city administration. Requires a login;
/// shows `Unavailable` while logged out and in cities without the service.
pub struct AppointmentsFeed<G> {
    gateway: Arc<G>,
}

impl<G> AppointmentsFeed<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }
}

impl<G: AppointmentsGateway> AppointmentsFeed<G> {
    /// Callers refresh the feed afterwards to pick up the new list.
    pub async fn cancel(&self, city_id: i64, appointment_id: i64) -> Result<(), ApiError> {
        self.gateway.cancel_appointment(city_id, appointment_id).await
    }
}

impl<G: AppointmentsGateway> FeatureFetch for AppointmentsFeed<G> {
    type Payload = Vec<Appointment>;

    const TAG: OperationTag = OperationTag("appointments.list");

    fn requires_login(&self) -> bool {
        true
    }

    fn unavailable_codes(&self) -> &'static [&'static str] {
        &["appointment.service.unavailable"]
    }

    fn is_empty(&self, payload: &Self::Payload) -> bool {
        payload.is_empty()
    }

    async fn fetch(&self, city_id: i64) -> Result<Self::Payload, ApiError> {
        self.gateway.appointments(city_id).await
    }
}
