pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod features;
pub mod redact;
pub mod secrets;
pub mod session;
pub mod sync;
pub mod telemetry;
pub mod transport;

// Re-exports for convenient access
pub use api::{CityApi, HttpCredentialsGateway};
pub use config::Config;
pub use context::{City, ContextBroadcaster, UserProfile, UserState};
pub use error::ApiError;
pub use secrets::{KeyringStore, MemoryStore, SecretStore};
pub use session::{CredentialsGateway, LogoutReason, SessionManager, SessionStatus};
pub use sync::{spawn_feature, FeatureHandle, FeatureState, FeatureStatus, RetryDispatcher};
pub use transport::ApiClient;
