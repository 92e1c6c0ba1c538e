//! Session core and its collaborators.

pub mod api_client;
pub mod auth_client;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod navigator;
pub mod session;
pub mod store;

pub use api_client::ApiClient;
pub use auth_client::{AuthApi, HttpAuthApi, MockAuthApi};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AuthError;
pub use navigator::{Navigator, RedirectNavigator};
pub use session::{AuthRejected, SessionManager};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
