use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

use crate::error::ApiError;
use crate::sync::{FeatureFetch, OperationTag};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub subcategories: Vec<DefectSubcategory>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectSubcategory {
    pub id: i64,
    pub name: String,
}

pub trait DefectGateway: Send + Sync + 'static {
    fn defect_categories(
        &self,
        city_id: i64,
    ) -> impl Future<Output = Result<Vec<DefectCategory>, ApiError>> + Send;
}

/// Category tree for reporting defects (potholes, broken lamps, ...).
/// Memoized per city; the cache empties on a city switch so the next fetch
/// loads the new city's tree.
pub struct DefectCategories<G> {
    gateway: Arc<G>,
    cache: Mutex<Option<Vec<DefectCategory>>>,
}

impl<G> DefectCategories<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            cache: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<Vec<DefectCategory>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<G: DefectGateway> FeatureFetch for DefectCategories<G> {
    type Payload = Vec<DefectCategory>;

    const TAG: OperationTag = OperationTag("defects.categories");

    fn unavailable_codes(&self) -> &'static [&'static str] {
        &["defect.service.unavailable"]
    }

    fn is_empty(&self, payload: &Self::Payload) -> bool {
        payload.is_empty()
    }

    async fn fetch(&self, city_id: i64) -> Result<Self::Payload, ApiError> {
        if let Some(categories) = self.cached() {
            return Ok(categories);
        }
        let categories = self.gateway.defect_categories(city_id).await?;
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(categories.clone());
        Ok(categories)
    }

    fn on_city_switched(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingGateway {
        calls: AtomicUsize,
    }

    impl DefectGateway for CountingGateway {
        async fn defect_categories(&self, city_id: i64) -> Result<Vec<DefectCategory>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![DefectCategory {
                id: city_id * 10,
                name: "Straßen & Wege".to_string(),
                subcategories: vec![],
            }])
        }
    }

    #[tokio::test]
    async fn the_category_tree_is_memoized_per_city() {
        let gateway = Arc::new(CountingGateway {
            calls: AtomicUsize::new(0),
        });
        let categories = DefectCategories::new(Arc::clone(&gateway));

        let first = categories.fetch(3).await.unwrap();
        let again = categories.fetch(3).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        categories.on_city_switched();
        let other = categories.fetch(4).await.unwrap();
        assert_eq!(other[0].id, 40);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn categories_parse_with_nested_subcategories() {
        let raw = r#"[
            {
                "id": 7,
                "name": "Beleuchtung",
                "subcategories": [
                    { "id": 71, "name": "Straßenlaterne defekt" },
                    { "id": 72, "name": "Ampel defekt" }
                ]
            }
        ]"#;

        let categories: Vec<DefectCategory> = serde_json::from_str(raw).unwrap();
        assert_eq!(categories[0].subcategories.len(), 2);
        assert_eq!(categories[0].subcategories[1].name, "Ampel defekt");
    }
}
