pub mod auth;
pub mod session;

pub use auth::{LoginForm, TokenResponse};
pub use session::{GuardDecision, Role, SessionRecord, SessionSnapshot, SessionStatus, User};
