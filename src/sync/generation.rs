use std::sync::{Arc, Mutex, PoisonError};

/// Monotonic counter invalidating continuations of a superseded context.
/// The staleness check and the committed effect run under one lock, so a
/// concurrent [`GenerationGate::begin`] can never slip between them.
#[derive(Clone, Default)]
pub struct GenerationGate {
    current: Arc<Mutex<u64>>,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the next generation, invalidating every earlier one.
    pub fn begin(&self) -> u64 {
        let mut current = self.lock();
        *current += 1;
        *current
    }

    pub fn current(&self) -> u64 {
        *self.lock()
    }

    /// Apply `effect` only if `generation` is still current. Returns whether
    /// it ran.
    pub fn commit(&self, generation: u64, effect: impl FnOnce()) -> bool {
        let current = self.lock();
        if *current != generation {
            return false;
        }
        effect();
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, u64> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
