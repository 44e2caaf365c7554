use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;
use crate::sync::{FeatureFetch, OperationTag};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WastePickup {
    pub waste_type: String,
    pub pickup_at: DateTime<Utc>,
    #[serde(default)]
    pub street: Option<String>,
}

pub trait WasteGateway: Send + Sync + 'static {
    fn pickups(
        &self,
        city_id: i64,
    ) -> impl Future<Output = Result<Vec<WastePickup>, ApiError>> + Send;
}

/// Waste pickup schedule, optionally narrowed to one street. The street
/// filter belongs to the selected city and resets on a city switch.
pub struct WasteCalendar<G> {
    gateway: Arc<G>,
    street_filter: Mutex<Option<String>>,
}

impl<G> WasteCalendar<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            street_filter: Mutex::new(None),
        }
    }

    /// Takes effect on the next fetch; callers trigger a refresh after it.
    pub fn set_street_filter(&self, street: Option<String>) {
        *self
            .street_filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = street;
    }

    fn street_filter(&self) -> Option<String> {
        self.street_filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<G: WasteGateway> FeatureFetch for WasteCalendar<G> {
    type Payload = Vec<WastePickup>;

    const TAG: OperationTag = OperationTag("waste.calendar");

    fn unavailable_codes(&self) -> &'static [&'static str] {
        &["waste.calendar.unavailable"]
    }

    fn is_empty(&self, payload: &Self::Payload) -> bool {
        payload.is_empty()
    }

    async fn fetch(&self, city_id: i64) -> Result<Self::Payload, ApiError> {
        let mut pickups = self.gateway.pickups(city_id).await?;
        if let Some(street) = self.street_filter() {
            pickups.retain(|pickup| {
                pickup
                    .street
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(&street))
            });
        }
        Ok(pickups)
    }

    fn on_city_switched(&self) {
        self.set_street_filter(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedGateway;

    impl WasteGateway for FixedGateway {
        async fn pickups(&self, _city_id: i64) -> Result<Vec<WastePickup>, ApiError> {
            let raw = r#"[
                { "wasteType": "Restmüll", "pickupAt": "2026-08-24T06:00:00Z", "street": "Marktstraße" },
                { "wasteType": "Papier", "pickupAt": "2026-08-25T06:00:00Z", "street": "Ringweg" },
                { "wasteType": "Bio", "pickupAt": "2026-08-26T06:00:00Z", "street": "Marktstraße" }
            ]"#;
            serde_json::from_str(raw).map_err(|e| ApiError::unclassified(e.to_string()))
        }
    }

    #[tokio::test]
    async fn the_street_filter_narrows_the_schedule() {
        let calendar = WasteCalendar::new(Arc::new(FixedGateway));

        let all = calendar.fetch(3).await.unwrap();
        assert_eq!(all.len(), 3);

        calendar.set_street_filter(Some("marktstraße".to_string()));
        let filtered = calendar.fetch(3).await.unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| p.street.as_deref() == Some("Marktstraße")));
    }

    #[tokio::test]
    async fn a_city_switch_resets_the_street_filter() {
        let calendar = WasteCalendar::new(Arc::new(FixedGateway));
        calendar.set_street_filter(Some("Ringweg".to_string()));
        assert_eq!(calendar.fetch(3).await.unwrap().len(), 1);

        calendar.on_city_switched();
        assert_eq!(calendar.fetch(4).await.unwrap().len(), 3);
    }
}
