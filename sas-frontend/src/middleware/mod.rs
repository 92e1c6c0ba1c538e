pub mod auth;
pub mod metrics;

pub use auth::{require_role, RouteGuard};
pub use metrics::metrics_middleware;
