use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiError;
use crate::sync::{FeatureFetch, OperationTag};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub teaser: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
}

pub trait NewsGateway: Send + Sync + 'static {
    fn news(&self, city_id: i64) -> impl Future<Output = Result<Vec<NewsItem>, ApiError>> + Send;
}

/// City news list. Login-free; a city without any published items shows an
/// empty state rather than an error.
pub struct NewsFeed<G> {
    gateway: Arc<G>,
}

impl<G> NewsFeed<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }
}

impl<G: NewsGateway> FeatureFetch for NewsFeed<G> {
    type Payload = Vec<NewsItem>;

    const TAG: OperationTag = OperationTag("news.list");

    fn is_empty(&self, payload: &Self::Payload) -> bool {
        payload.is_empty()
    }

    async fn fetch(&self, city_id: i64) -> Result<Self::Payload, ApiError> {
        self.gateway.news(city_id).await
    }
}
