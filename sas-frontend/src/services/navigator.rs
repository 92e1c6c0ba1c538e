use std::sync::{Mutex, PoisonError};

/// The router as seen by the session core.
pub trait Navigator: Send + Sync {
    /// Move to `to`, replacing the current history entry.
    fn navigate(&self, to: &str);

    /// Path and query of the view currently shown, if known.
    fn current_location(&self) -> Option<String>;
}

/// Navigator for the HTTP front-end: the latest navigation is parked until
/// the handler that triggered it turns it into a redirect response.
#[derive(Debug, Default)]
pub struct RedirectNavigator {
    pending: Mutex<Option<String>>,
    location: Mutex<Option<String>>,
}

impl RedirectNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the parked redirect target, leaving none behind.
    pub fn take_redirect(&self) -> Option<String> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Remember the view that was just served.
    pub fn record_location(&self, path_and_query: &str) {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(path_and_query.to_string());
    }
}

impl Navigator for RedirectNavigator {
    fn navigate(&self, to: &str) {
        tracing::debug!(to, "navigating");
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(to.to_string());
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = Some(to.to_string());
    }

    fn current_location(&self) -> Option<String> {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
