mod debounce;
mod generation;
mod retry;
mod state;

pub use debounce::debounce;
pub use generation::GenerationGate;
pub use retry::{RetryDispatcher, RetrySignal};
pub use state::{FeatureFailure, FeatureState, FeatureStatus, OperationTag};

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

pub(crate) use state::classify_failure;

use crate::context::{City, ContextBroadcaster, UserState};
use crate::error::ApiError;

/// One feature's fetch recipe. Its worker resets to `Loading` on every new
/// city, re-evaluates on login/logout, and parks offline failures behind
/// the retry dispatcher.
pub trait FeatureFetch: Send + Sync + 'static {
    type Payload: Clone + Send + Sync + 'static;

    const TAG: OperationTag;

    fn requires_login(&self) -> bool {
        false
    }

    /// Domain codes meaning "not offered in this city".
    fn unavailable_codes(&self) -> &'static [&'static str] {
        &[]
    }

    fn is_empty(&self, payload: &Self::Payload) -> bool;

    fn fetch(&self, city_id: i64) -> impl Future<Output = Result<Self::Payload, ApiError>> + Send;

    /// Runs once per observed switch into a city, before its first fetch.
    fn on_city_switched(&self) {}
}

enum FeatureCommand {
    Refresh,
}

#[derive(Clone)]
pub struct FeatureHandle<T> {
    state_rx: watch::Receiver<FeatureState<T>>,
    commands: mpsc::Sender<FeatureCommand>,
}

impl<T: Clone> FeatureHandle<T> {
    pub fn current(&self) -> FeatureState<T> {
        self.state_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<FeatureState<T>> {
        self.state_rx.clone()
    }

    pub async fn refresh(&self) {
        let _ = self.commands.send(FeatureCommand::Refresh).await;
    }
}

/// Start a worker for `fetcher` against the shared context. Callers keep
/// their own `Arc` to a fetcher with knobs of its own (street filter,
/// cancellation) and pair those with [`FeatureHandle::refresh`].
pub fn spawn_feature<F: FeatureFetch>(
    fetcher: Arc<F>,
    context: &ContextBroadcaster,
    retries: RetryDispatcher,
) -> FeatureHandle<F::Payload> {
    let (state_tx, state_rx) = watch::channel(FeatureState::Loading);
    let (command_tx, command_rx) = mpsc::channel(8);
    let worker = Worker {
        fetcher,
        state: Arc::new(state_tx),
        gate: GenerationGate::new(),
        retries,
        city_rx: context.watch_city(),
        user_rx: context.watch_user(),
        commands: command_rx,
        current_city: None,
        user_present: false,
    };
    tokio::spawn(worker.run());
    FeatureHandle {
        state_rx,
        commands: command_tx,
    }
}

struct Worker<F: FeatureFetch> {
    fetcher: Arc<F>,
    state: Arc<watch::Sender<FeatureState<F::Payload>>>,
    gate: GenerationGate,
    retries: RetryDispatcher,
    city_rx: watch::Receiver<Option<City>>,
    user_rx: watch::Receiver<UserState>,
    commands: mpsc::Receiver<FeatureCommand>,
    current_city: Option<i64>,
    user_present: bool,
}

impl<F: FeatureFetch> Worker<F> {
    async fn run(mut self) {
        self.current_city = self.city_rx.borrow_and_update().as_ref().map(|city| city.id);
        self.user_present = self.user_rx.borrow_and_update().is_present();
        // A city committed before the first poll still counts as a switch.
        if self.current_city.is_some() {
            self.fetcher.on_city_switched();
        }
        self.start_generation();

        loop {
            tokio::select! {
                changed = self.city_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let id = self.city_rx.borrow_and_update().as_ref().map(|city| city.id);
                    // Keyed by city id: a re-commit of the same city is not
                    // a new context.
                    if id != self.current_city {
                        self.current_city = id;
                        self.fetcher.on_city_switched();
                        self.start_generation();
                    }
                }
                changed = self.user_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let present = self.user_rx.borrow_and_update().is_present();
                    if present != self.user_present {
                        self.user_present = present;
                        self.start_generation();
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(FeatureCommand::Refresh) => self.start_generation(),
                        None => break,
                    }
                }
            }
        }
    }

    /// An in-flight fetch of an earlier generation keeps running but can no
    /// longer commit.
    fn start_generation(&self) {
        let generation = self.gate.begin();
        self.retries.remove(F::TAG);

        if self.fetcher.requires_login() && !self.user_present {
            self.gate.commit(generation, || {
                self.state.send_replace(FeatureState::Unavailable);
            });
            return;
        }
        let Some(city_id) = self.current_city else {
            self.gate.commit(generation, || {
                self.state.send_replace(FeatureState::Loading);
            });
            return;
        };

        self.gate.commit(generation, || {
            self.state.send_replace(FeatureState::Loading);
        });
        tokio::spawn(run_generation(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.state),
            self.gate.clone(),
            self.retries.clone(),
            generation,
            city_id,
        ));
    }
}

/// One generation's fetch, ending in a gated commit. A superseded
/// generation finds its commits refused and unwinds quietly.
async fn run_generation<F: FeatureFetch>(
    fetcher: Arc<F>,
    state: Arc<watch::Sender<FeatureState<F::Payload>>>,
    gate: GenerationGate,
    retries: RetryDispatcher,
    generation: u64,
    city_id: i64,
) {
    loop {
        let next = match fetcher.fetch(city_id).await {
            Ok(payload) if fetcher.is_empty(&payload) => FeatureState::Empty,
            Ok(payload) => FeatureState::Success(payload),
            Err(error) => classify_failure(error, F::TAG, fetcher.unavailable_codes()),
        };
        let offline = matches!(
            next,
            FeatureState::Error(FeatureFailure::NoConnection { .. })
        );

        let committed = gate.commit(generation, || {
            state.send_replace(next);
        });
        if !committed || !offline {
            return;
        }

        tracing::debug!(tag = %F::TAG, "offline, retry armed");
        let waiter = retries.register(F::TAG);
        match waiter.await {
            Ok(RetrySignal::Retry) => {
                let reentered = gate.commit(generation, || {
                    state.send_replace(FeatureState::Loading);
                });
                if !reentered {
                    return;
                }
            }
            _ => return,
        }
    }
}
