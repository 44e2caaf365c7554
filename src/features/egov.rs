use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};

use crate::context::ContextBroadcaster;
use crate::error::ApiError;
use crate::sync::{
    classify_failure, debounce, FeatureFailure, FeatureFetch, FeatureState, GenerationGate,
    OperationTag, RetryDispatcher, RetrySignal,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgovCategory {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgovService {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

pub trait EgovGateway: Send + Sync + 'static {
    fn categories(
        &self,
        city_id: i64,
    ) -> impl Future<Output = Result<Vec<EgovCategory>, ApiError>> + Send;

    fn search_services(
        &self,
        city_id: i64,
        query: &str,
    ) -> impl Future<Output = Result<Vec<EgovService>, ApiError>> + Send;
}

/// Administrative-service categories, memoized until the city changes.
pub struct EgovCategories<G> {
    gateway: Arc<G>,
    cache: Mutex<Option<Vec<EgovCategory>>>,
}

impl<G> EgovCategories<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            cache: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<Vec<EgovCategory>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, categories: Vec<EgovCategory>) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(categories);
    }
}

impl<G: EgovGateway> FeatureFetch for EgovCategories<G> {
    type Payload = Vec<EgovCategory>;

    const TAG: OperationTag = OperationTag("egov.categories");

    fn is_empty(&self, payload: &Self::Payload) -> bool {
        payload.is_empty()
    }

    async fn fetch(&self, city_id: i64) -> Result<Self::Payload, ApiError> {
        if let Some(categories) = self.cached() {
            return Ok(categories);
        }
        let categories = self.gateway.categories(city_id).await?;
        self.store(categories.clone());
        Ok(categories)
    }

    fn on_city_switched(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// A live search session: keystrokes go in, settled results come out.
pub struct SearchSession {
    pub input: mpsc::Sender<String>,
    pub results: watch::Receiver<FeatureState<Vec<EgovService>>>,
}

/// Search-as-you-type over a city's administrative services. Keystrokes
/// are debounced before dispatch, and only the newest settled query's
/// result is ever published.
pub struct ServiceSearch<G> {
    gateway: Arc<G>,
    context: ContextBroadcaster,
    retries: RetryDispatcher,
}

const SEARCH_TAG: OperationTag = OperationTag("egov.search");

impl<G: EgovGateway> ServiceSearch<G> {
    pub fn new(gateway: Arc<G>, context: ContextBroadcaster, retries: RetryDispatcher) -> Self {
        Self {
            gateway,
            context,
            retries,
        }
    }

    /// The session ends when the input sender is dropped.
    pub fn start(&self, window: Duration) -> SearchSession {
        let (input, raw_queries) = mpsc::channel::<String>(16);
        let mut queries = debounce(raw_queries, window);
        let (state_tx, results) = watch::channel(FeatureState::Empty);
        let gateway = Arc::clone(&self.gateway);
        let context = self.context.clone();
        let retries = self.retries.clone();

        tokio::spawn(async move {
            let gate = GenerationGate::new();
            let mut next = queries.recv().await;
            loop {
                let Some(mut query) = next else { break };
                // Whatever settled most recently wins; older queries in the
                // backlog are skipped entirely.
                while let Ok(newer) = queries.try_recv() {
                    query = newer;
                }

                let query = query.trim().to_string();
                if query.is_empty() {
                    state_tx.send_replace(FeatureState::Empty);
                    next = queries.recv().await;
                    continue;
                }
                let Some(city_id) = context.current_city_id() else {
                    state_tx.send_replace(FeatureState::Empty);
                    next = queries.recv().await;
                    continue;
                };

                let generation = gate.begin();
                retries.remove(SEARCH_TAG);
                state_tx.send_replace(FeatureState::Loading);
                let outcome = match gateway.search_services(city_id, &query).await {
                    Ok(services) if services.is_empty() => FeatureState::Empty,
                    Ok(services) => FeatureState::Success(services),
                    Err(error) => classify_failure(error, SEARCH_TAG, &[]),
                };
                let offline = matches!(
                    outcome,
                    FeatureState::Error(FeatureFailure::NoConnection { .. })
                );

                match queries.try_recv() {
                    // A newer query settled while this one was in flight;
                    // its result is stale and never published.
                    Ok(newer) => next = Some(newer),
                    Err(TryRecvError::Empty) => {
                        gate.commit(generation, || {
                            state_tx.send_replace(outcome);
                        });
                        if offline {
                            // Park the failed query; a retry replays it, a
                            // newer query supersedes it.
                            let waiter = retries.register(SEARCH_TAG);
                            tokio::select! {
                                signal = waiter => match signal {
                                    Ok(RetrySignal::Retry) => next = Some(query),
                                    _ => next = queries.recv().await,
                                },
                                newer = queries.recv() => {
                                    retries.remove(SEARCH_TAG);
                                    next = newer;
                                }
                            }
                        } else {
                            next = queries.recv().await;
                        }
                    }
                    Err(TryRecvError::Disconnected) => {
                        gate.commit(generation, || {
                            state_tx.send_replace(outcome);
                        });
                        break;
                    }
                }
            }
        });

        SearchSession { input, results }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::context::City;
    use crate::sync::FeatureStatus;

    struct CountingGateway {
        category_calls: AtomicUsize,
        search_calls: AtomicUsize,
        last_query: Mutex<Option<String>>,
        search_failures: Mutex<VecDeque<ApiError>>,
    }

    impl CountingGateway {
        fn new() -> Self {
            Self {
                category_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
                last_query: Mutex::new(None),
                search_failures: Mutex::new(VecDeque::new()),
            }
        }

        fn fail_search_once(&self, error: ApiError) {
            self.search_failures.lock().unwrap().push_back(error);
        }
    }

    impl EgovGateway for CountingGateway {
        async fn categories(&self, _city_id: i64) -> Result<Vec<EgovCategory>, ApiError> {
            self.category_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![EgovCategory {
                id: 1,
                name: "Ausweise & Dokumente".to_string(),
            }])
        }

        async fn search_services(
            &self,
            city_id: i64,
            query: &str,
        ) -> Result<Vec<EgovService>, ApiError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_query.lock().unwrap() = Some(query.to_string());
            if let Some(error) = self.search_failures.lock().unwrap().pop_front() {
                return Err(error);
            }
            Ok(vec![EgovService {
                id: city_id * 100,
                name: format!("{query}-service"),
                description: None,
                link: None,
            }])
        }
    }

    fn context_with_city(id: i64) -> ContextBroadcaster {
        let context = ContextBroadcaster::new();
        context.set_city(City {
            id,
            name: format!("city-{id}"),
            color: 0,
            postal_codes: vec![],
        });
        context
    }

    #[tokio::test]
    async fn categories_are_served_from_cache_until_the_city_changes() {
        let gateway = Arc::new(CountingGateway::new());
        let categories = EgovCategories::new(Arc::clone(&gateway));

        let first = categories.fetch(3).await.unwrap();
        let second = categories.fetch(3).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(gateway.category_calls.load(Ordering::SeqCst), 1);

        categories.on_city_switched();
        categories.fetch(4).await.unwrap();
        assert_eq!(gateway.category_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn a_typing_burst_results_in_one_search() {
        let gateway = Arc::new(CountingGateway::new());
        let search = ServiceSearch::new(
            Arc::clone(&gateway),
            context_with_city(3),
            RetryDispatcher::new(),
        );
        let mut session = search.start(Duration::from_millis(250));

        session.input.try_send("p".to_string()).unwrap();
        session.input.try_send("pa".to_string()).unwrap();
        session.input.try_send("pass".to_string()).unwrap();

        let state = session
            .results
            .wait_for(|state| state.status() == FeatureStatus::Success)
            .await
            .unwrap()
            .clone();
        let FeatureState::Success(services) = state else {
            panic!("expected results");
        };
        assert_eq!(services[0].name, "pass-service");
        assert_eq!(gateway.search_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            gateway.last_query.lock().unwrap().as_deref(),
            Some("pass")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn a_blank_query_clears_the_results() {
        let gateway = Arc::new(CountingGateway::new());
        let search = ServiceSearch::new(
            Arc::clone(&gateway),
            context_with_city(3),
            RetryDispatcher::new(),
        );
        let mut session = search.start(Duration::from_millis(250));

        session.input.try_send("kita".to_string()).unwrap();
        session
            .results
            .wait_for(|state| state.status() == FeatureStatus::Success)
            .await
            .unwrap();

        session.input.try_send("   ".to_string()).unwrap();
        session
            .results
            .wait_for(|state| *state == FeatureState::Empty)
            .await
            .unwrap();
        assert_eq!(gateway.search_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn an_offline_search_parks_and_replays_on_retry() {
        let gateway = Arc::new(CountingGateway::new());
        gateway.fail_search_once(ApiError::NoConnection);
        let retries = RetryDispatcher::new();
        let search = ServiceSearch::new(
            Arc::clone(&gateway),
            context_with_city(3),
            retries.clone(),
        );
        let mut session = search.start(Duration::from_millis(250));

        session.input.try_send("pass".to_string()).unwrap();
        session
            .results
            .wait_for(|state| state.status() == FeatureStatus::Error)
            .await
            .unwrap();
        assert_eq!(retries.pending_count(), 1);

        retries.on_retry_required();
        let state = session
            .results
            .wait_for(|state| state.status() == FeatureStatus::Success)
            .await
            .unwrap()
            .clone();
        let FeatureState::Success(services) = state else {
            panic!("expected results");
        };
        assert_eq!(services[0].name, "pass-service");
        assert_eq!(gateway.search_calls.load(Ordering::SeqCst), 2);
        assert_eq!(retries.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn a_newer_query_supersedes_the_parked_retry() {
        let gateway = Arc::new(CountingGateway::new());
        gateway.fail_search_once(ApiError::NoConnection);
        let retries = RetryDispatcher::new();
        let search = ServiceSearch::new(
            Arc::clone(&gateway),
            context_with_city(3),
            retries.clone(),
        );
        let mut session = search.start(Duration::from_millis(250));

        session.input.try_send("alt".to_string()).unwrap();
        session
            .results
            .wait_for(|state| state.status() == FeatureStatus::Error)
            .await
            .unwrap();
        assert_eq!(retries.pending_count(), 1);

        session.input.try_send("neu".to_string()).unwrap();
        session
            .results
            .wait_for(|state| state.status() == FeatureStatus::Success)
            .await
            .unwrap();
        assert_eq!(retries.pending_count(), 0);
        assert_eq!(gateway.last_query.lock().unwrap().as_deref(), Some("neu"));
    }

    #[test]
    fn services_parse_from_the_wire_shape() {
        let raw = r#"[
            {
                "id": 300,
                "name": "Reisepass beantragen",
                "description": "Termin und Unterlagen",
                "link": "https://service.example.org/pass"
            }
        ]"#;

        let services: Vec<EgovService> = serde_json::from_str(raw).unwrap();
        assert_eq!(services[0].id, 300);
        assert_eq!(services[0].name, "Reisepass beantragen");
    }
}
