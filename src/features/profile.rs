use std::future::Future;
use std::sync::Arc;

use crate::context::{ContextBroadcaster, UserProfile, UserState};
use crate::error::ApiError;

pub trait ProfileSource: Send + Sync + 'static {
    fn profile(&self) -> impl Future<Output = Result<UserProfile, ApiError>> + Send;
}

/// Loads the profile of the logged-in user and publishes presence. The
/// absent side of the cell is written by the session layer on logout.
pub struct ProfileInteractor<S> {
    source: Arc<S>,
    context: ContextBroadcaster,
}

impl<S: ProfileSource> ProfileInteractor<S> {
    pub fn new(source: Arc<S>, context: ContextBroadcaster) -> Self {
        Self { source, context }
    }

    pub async fn refresh_profile(&self) -> Result<UserProfile, ApiError> {
        let profile = self.source.profile().await?;
        self.context
            .set_user(UserState::Present(profile.clone()));
        Ok(profile)
    }
}
