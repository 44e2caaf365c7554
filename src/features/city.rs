use std::future::Future;
use std::sync::Arc;

use crate::context::{City, ContextBroadcaster};
use crate::error::ApiError;

pub trait CityDirectory: Send + Sync + 'static {
    fn city(&self, city_id: i64) -> impl Future<Output = Result<City, ApiError>> + Send;
}

/// The only writer of the city cell. A city is committed to the broadcaster
/// only after it loaded completely; a failed switch leaves the previous
/// city in place.
pub struct CityInteractor<D> {
    directory: Arc<D>,
    context: ContextBroadcaster,
}

impl<D: CityDirectory> CityInteractor<D> {
    pub fn new(directory: Arc<D>, context: ContextBroadcaster) -> Self {
        Self { directory, context }
    }

    pub async fn switch_city(&self, city_id: i64) -> Result<City, ApiError> {
        let city = self.directory.city(city_id).await?;
        tracing::info!(city_id = city.id, city = %city.name, "city switched");
        self.context.set_city(city.clone());
        Ok(city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDirectory {
        fail: bool,
    }

    impl CityDirectory for FakeDirectory {
        async fn city(&self, city_id: i64) -> Result<City, ApiError> {
            if self.fail {
                return Err(ApiError::NoConnection);
            }
            Ok(City {
                id: city_id,
                name: format!("city-{city_id}"),
                color: 0xFF11_2233,
                postal_codes: vec!["52062".to_string()],
            })
        }
    }

    #[tokio::test]
    async fn successful_switch_commits_the_city() {
        let context = ContextBroadcaster::new();
        let interactor = CityInteractor::new(Arc::new(FakeDirectory { fail: false }), context.clone());

        let city = interactor.switch_city(3).await.unwrap();
        assert_eq!(city.id, 3);
        assert_eq!(context.current_city_id(), Some(3));
    }

    #[tokio::test]
    async fn failed_switch_keeps_the_previous_city() {
        let context = ContextBroadcaster::new();
        let good = CityInteractor::new(Arc::new(FakeDirectory { fail: false }), context.clone());
        let bad = CityInteractor::new(Arc::new(FakeDirectory { fail: true }), context.clone());

        good.switch_city(3).await.unwrap();
        let result = bad.switch_city(4).await;

        assert_eq!(result, Err(ApiError::NoConnection));
        assert_eq!(context.current_city_id(), Some(3));
    }
}
