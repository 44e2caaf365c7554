mod gateway;
mod manager;
mod model;

pub use gateway::{CredentialsGateway, LoginRequest, RefreshRequest};
pub use manager::SessionManager;
pub use model::{
    LogoutReason, Session, SessionStatus, TokenEnvelope, UNBOUNDED_EXPIRY, UNBOUNDED_LIFETIME,
};
