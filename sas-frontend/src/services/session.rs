//! The session core: who is logged in, with what role, and whether their
//! credential is still good.
//!
//! All mutations of the persisted record and of the in-memory state go
//! through one async commit lock, and every commit bumps a generation
//! counter. Work that started against an older generation (a refresh racing
//! a logout, a bootstrap racing a login) is dropped instead of resurrecting
//! or overwriting a newer session.

use crate::config::SessionSettings;
use crate::models::{
    GuardDecision, Role, SessionRecord, SessionSnapshot, SessionStatus, TokenResponse, User,
};
use crate::services::auth_client::AuthApi;
use crate::services::clock::Clock;
use crate::services::error::AuthError;
use crate::services::metrics;
use crate::services::navigator::Navigator;
use crate::services::store::SessionStore;
use crate::utils::jwt::token_expiry_millis;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Used when the backend gives neither `expiresIn` nor a JWT `exp`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Emitted by the HTTP layer when the backend answers 401 to a request that
/// carried `access_token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRejected {
    pub access_token: String,
}

/// Handle to the session. Clones share the same state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    auth_api: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    state: RwLock<SessionState>,
    commit_lock: tokio::sync::Mutex<()>,
    refresh_in_flight: AtomicBool,
    logout_pending: AtomicBool,
    bootstrapped: AtomicBool,
    intended_destination: Mutex<Option<String>>,
    watch: Mutex<Option<CancellationToken>>,
}

struct SessionState {
    status: SessionStatus,
    record: Option<SessionRecord>,
    resolved: bool,
    generation: u64,
}

enum EndOutcome {
    /// A newer session replaced the one the caller wanted to end.
    Superseded,
    Ended(Option<SessionRecord>),
}

/// Single-flight permit for refreshes. Dropping it (including when the
/// refreshing future is cancelled) lets the next refresh start.
struct RefreshFlight<'a>(&'a AtomicBool);

impl<'a> RefreshFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SessionManager {
    pub fn new(
        auth_api: Arc<dyn AuthApi>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                auth_api,
                store,
                navigator,
                clock,
                settings,
                state: RwLock::new(SessionState {
                    status: SessionStatus::Anonymous,
                    record: None,
                    resolved: false,
                    generation: 0,
                }),
                commit_lock: tokio::sync::Mutex::new(()),
                refresh_in_flight: AtomicBool::new(false),
                logout_pending: AtomicBool::new(false),
                bootstrapped: AtomicBool::new(false),
                intended_destination: Mutex::new(None),
                watch: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.read_state();
        SessionSnapshot {
            status: state.status,
            user: state.record.as_ref().map(|r| r.user.clone()),
            resolved: state.resolved,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.read_state().status
    }

    pub fn user(&self) -> Option<User> {
        self.read_state().record.as_ref().map(|r| r.user.clone())
    }

    /// Credential to attach to outgoing requests, if logged in.
    pub fn access_token(&self) -> Option<String> {
        self.read_state()
            .record
            .as_ref()
            .map(|r| r.access_token.clone())
    }

    /// Whether the bootstrap check has finished.
    pub fn is_resolved(&self) -> bool {
        self.read_state().resolved
    }

    /// `None` means the lowest privilege.
    pub fn has_permission(&self, required: Option<Role>) -> bool {
        let required = required.unwrap_or(Role::Viewer);
        self.read_state()
            .record
            .as_ref()
            .is_some_and(|r| r.user.role.satisfies(required))
    }

    /// Decide what a protected view should do for `requested` (path and
    /// query). An anonymous visit records `requested` as the place to return
    /// to after login.
    pub fn guard(&self, required: Option<Role>, requested: &str) -> GuardDecision {
        let (resolved, role) = {
            let state = self.read_state();
            (state.resolved, state.record.as_ref().map(|r| r.user.role))
        };

        if !resolved {
            return GuardDecision::Pending;
        }

        match role {
            None => {
                self.capture_intended_destination(requested);
                GuardDecision::RedirectToLogin
            }
            Some(role) if !role.satisfies(required.unwrap_or(Role::Viewer)) => {
                debug!(%role, requested, "Role too low for route");
                GuardDecision::Forbidden
            }
            Some(_) => GuardDecision::Allow,
        }
    }

    /// Overwrite the single intended-destination slot.
    pub fn capture_intended_destination(&self, path_and_query: &str) {
        let settings = &self.inner.settings;
        if path_and_query == settings.login_route || path_and_query == settings.unauthorized_route
        {
            return;
        }
        *self
            .inner
            .intended_destination
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(path_and_query.to_string());
    }

    pub fn intended_destination(&self) -> Option<String> {
        self.inner
            .intended_destination
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.update_state(|s| {
            if s.record.is_none() {
                s.status = SessionStatus::Authenticating;
            }
        });

        let tokens = match self.inner.auth_api.login(email, password).await {
            Ok(tokens) => tokens,
            Err(err) => {
                self.abandon_login();
                metrics::record_login("failure");
                warn!(error = %err, "Login failed");
                return Err(err);
            }
        };

        let Some(user) = tokens.user.clone() else {
            self.abandon_login();
            metrics::record_login("failure");
            warn!("Login response carried no user");
            return Err(AuthError::NetworkUnavailable(
                "login response carried no user".to_string(),
            ));
        };

        let record = self.build_record(user, tokens, None);
        let (user_id, role, expires_at) =
            (record.user.id.clone(), record.user.role, record.expires_at);

        if let Err(err) = self.commit(None, record).await {
            self.abandon_login();
            metrics::record_login("failure");
            return Err(err);
        }

        self.restart_watch();
        metrics::record_login("success");
        info!(user_id = %user_id, %role, expires_at, "User logged in successfully");

        let destination = self
            .take_intended_destination()
            .unwrap_or_else(|| self.inner.settings.landing_route.clone());
        self.inner.navigator.navigate(&destination);

        Ok(())
    }

    /// Always succeeds locally. Server-side invalidation runs detached.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let EndOutcome::Ended(Some(previous)) = self.end_session(None).await {
            info!(user_id = %previous.user.id, "User logged out");

            let auth_api = self.inner.auth_api.clone();
            tokio::spawn(async move {
                match auth_api
                    .logout(&previous.access_token, &previous.refresh_token)
                    .await
                {
                    Ok(()) => debug!("Tokens revoked on the backend"),
                    Err(e) => warn!(error = %e, "Failed to revoke tokens during logout"),
                }
            });
        }

        self.inner
            .navigator
            .navigate(&self.inner.settings.login_route);
    }

    /// Exchange the refresh token for a new token triple.
    ///
    /// Returns `Ok(false)` without touching the network when another refresh
    /// is already running, and when a login replaced the session before the
    /// refresh finished. Any other failure ends the session.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<bool, AuthError> {
        let Some(_flight) = RefreshFlight::acquire(&self.inner.refresh_in_flight) else {
            debug!("Refresh already in flight");
            return Ok(false);
        };

        let generation = self.read_state().generation;

        let stored = self.inner.store.load().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read persisted session");
            None
        });
        let Some(stored) = stored.filter(|r| !r.refresh_token.is_empty()) else {
            return self
                .fail_refresh(generation, "no refresh token available".to_string())
                .await;
        };

        self.update_state(|s| {
            if s.generation == generation && s.status == SessionStatus::Authenticated {
                s.status = SessionStatus::Refreshing;
            }
        });

        let tokens = match self.inner.auth_api.refresh(&stored.refresh_token).await {
            Ok(tokens) => tokens,
            Err(err) => return self.fail_refresh(generation, err.to_string()).await,
        };

        let user = tokens.user.clone().unwrap_or_else(|| stored.user.clone());
        let record = self.build_record(user, tokens, Some(&stored.refresh_token));
        let expires_at = record.expires_at;

        match self.commit(Some(generation), record).await {
            Ok(true) => {
                self.ensure_watch();
                metrics::record_refresh("success");
                info!(expires_at, "Access token refreshed");
                Ok(true)
            }
            Ok(false) => {
                debug!("Session changed during refresh; discarding new tokens");
                Ok(false)
            }
            Err(err) => self.fail_refresh(generation, err.to_string()).await,
        }
    }

    /// Restore a persisted session. Runs once per process; later calls are
    /// no-ops. Guarded views stay pending until this returns.
    #[instrument(skip(self))]
    pub async fn check_auth(&self) {
        if self.inner.bootstrapped.swap(true, Ordering::AcqRel) {
            return;
        }

        let generation = {
            let mut state = self.write_state();
            if state.record.is_none() {
                state.status = SessionStatus::Authenticating;
            }
            state.generation
        };

        let stored = self.inner.store.load().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read persisted session");
            None
        });

        match stored {
            None => debug!("No persisted session"),
            Some(record) if self.is_near_expiry(record.expires_at) => {
                info!(
                    expires_at = record.expires_at,
                    "Persisted session near expiry; refreshing"
                );
                if let Err(e) = self.refresh_token().await {
                    info!(error = %e, "Could not restore persisted session");
                }
            }
            Some(record) => self.adopt(generation, record).await,
        }

        self.update_state(|s| {
            s.resolved = true;
            if s.record.is_none() && s.status == SessionStatus::Authenticating {
                s.status = SessionStatus::Anonymous;
            }
        });
    }

    /// Apply a 401 signal. Bursts for the same token collapse into one
    /// logout; signals for a token we no longer hold are ignored.
    pub async fn handle_auth_rejected(&self, event: AuthRejected) {
        let (generation, current) = {
            let state = self.read_state();
            (
                state.generation,
                state.record.as_ref().map(|r| r.access_token.clone()),
            )
        };

        match current {
            None => {
                debug!("401 observed while anonymous");
                return;
            }
            Some(current) if current != event.access_token => {
                debug!("401 for a superseded access token");
                return;
            }
            Some(_) => {}
        }

        if self.inner.logout_pending.swap(true, Ordering::AcqRel) {
            debug!("Logout already pending");
            return;
        }

        warn!("Backend rejected the access token; ending session");
        self.force_logout(Some(generation), "rejected").await;
        self.inner.logout_pending.store(false, Ordering::Release);
    }

    /// Consume 401 signals until every sender is dropped.
    pub fn listen_for_rejections(
        &self,
        mut rx: mpsc::UnboundedReceiver<AuthRejected>,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                manager.handle_auth_rejected(event).await;
            }
            debug!("Rejection listener stopped");
        })
    }

    /// Whether the expiry watch task is currently scheduled.
    pub fn is_watching(&self) -> bool {
        self.inner
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }

    fn is_near_expiry(&self, expires_at: i64) -> bool {
        let threshold = self.inner.settings.refresh_threshold().as_millis() as i64;
        self.inner.clock.now_millis() >= expires_at.saturating_sub(threshold)
    }

    fn build_record(
        &self,
        user: User,
        tokens: TokenResponse,
        previous_refresh_token: Option<&str>,
    ) -> SessionRecord {
        let now = self.inner.clock.now_millis();
        let expires_at = match tokens.expires_in {
            Some(secs) => now.saturating_add(secs.saturating_mul(1000)),
            None => token_expiry_millis(&tokens.token)
                .unwrap_or_else(|| now + DEFAULT_TOKEN_LIFETIME_SECS * 1000),
        };

        // Backends that do not rotate refresh tokens keep the old one valid.
        let refresh_token = tokens
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh_token.map(str::to_string))
            .unwrap_or_default();

        SessionRecord {
            user,
            access_token: tokens.token,
            refresh_token,
            expires_at,
        }
    }

    /// Persist `record` and make it current. With `expected_generation`,
    /// nothing is written if the session changed since the caller looked;
    /// that case returns `Ok(false)`.
    async fn commit(
        &self,
        expected_generation: Option<u64>,
        record: SessionRecord,
    ) -> Result<bool, AuthError> {
        let _guard = self.inner.commit_lock.lock().await;

        if let Some(expected) = expected_generation {
            if self.read_state().generation != expected {
                return Ok(false);
            }
        }

        self.inner.store.save(&record).await.map_err(|e| {
            warn!(error = %e, "Failed to persist session");
            AuthError::Storage(e.to_string())
        })?;

        self.update_state(|s| {
            s.generation += 1;
            s.status = SessionStatus::Authenticated;
            s.record = Some(record);
            s.resolved = true;
        });

        Ok(true)
    }

    async fn adopt(&self, generation: u64, record: SessionRecord) {
        let _guard = self.inner.commit_lock.lock().await;

        let user_id = record.user.id.clone();
        let adopted = {
            let mut state = self.write_state();
            if state.generation == generation {
                state.generation += 1;
                state.status = SessionStatus::Authenticated;
                state.record = Some(record);
                state.resolved = true;
                true
            } else {
                false
            }
        };

        if adopted {
            self.ensure_watch();
            info!(user_id = %user_id, "Restored persisted session");
        }
    }

    async fn end_session(&self, expected_generation: Option<u64>) -> EndOutcome {
        let _guard = self.inner.commit_lock.lock().await;

        if let Some(expected) = expected_generation {
            if self.read_state().generation != expected {
                return EndOutcome::Superseded;
            }
        }

        self.cancel_watch();

        if let Err(e) = self.inner.store.clear().await {
            warn!(error = %e, "Failed to clear persisted session");
        }

        let previous = {
            let mut state = self.write_state();
            state.generation += 1;
            state.status = SessionStatus::Anonymous;
            state.resolved = true;
            state.record.take()
        };

        EndOutcome::Ended(previous)
    }

    /// End the session without the user asking and send them to login,
    /// remembering where they were. Returns false when a newer session had
    /// already replaced the one to end.
    async fn force_logout(&self, expected_generation: Option<u64>, reason: &'static str) -> bool {
        let location = self.inner.navigator.current_location();

        let EndOutcome::Ended(previous) = self.end_session(expected_generation).await else {
            return false;
        };

        if let Some(previous) = previous {
            metrics::record_forced_logout(reason);
            info!(user_id = %previous.user.id, reason, "Session ended");
            if let Some(location) = location {
                self.capture_intended_destination(&location);
            }
        }

        self.inner
            .navigator
            .navigate(&self.inner.settings.login_route);
        true
    }

    /// A failure only ends the session it started from. If a login replaced
    /// that session meanwhile, the failure is dropped like a stale success.
    async fn fail_refresh(&self, generation: u64, reason: String) -> Result<bool, AuthError> {
        if !self.force_logout(Some(generation), "refresh_failed").await {
            debug!(reason = %reason, "Session changed during refresh; ignoring failure");
            return Ok(false);
        }

        warn!(reason = %reason, "Token refresh failed");
        metrics::record_refresh("failure");
        Err(AuthError::RefreshFailed(reason))
    }

    fn abandon_login(&self) {
        self.update_state(|s| {
            if s.record.is_none() && s.status == SessionStatus::Authenticating {
                s.status = SessionStatus::Anonymous;
            }
        });
    }

    fn take_intended_destination(&self) -> Option<String> {
        self.inner
            .intended_destination
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn restart_watch(&self) {
        let token = CancellationToken::new();
        let previous = self
            .inner
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        self.spawn_watch(token);
    }

    fn ensure_watch(&self) {
        let token = {
            let mut slot = self
                .inner
                .watch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|t| !t.is_cancelled()) {
                return;
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };
        self.spawn_watch(token);
    }

    fn cancel_watch(&self) {
        let token = self
            .inner
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    fn spawn_watch(&self, token: CancellationToken) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.settings.watch_interval();

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        SessionManager { inner }.check_expiry().await;
                    }
                }
            }
            debug!("Expiry watch stopped");
        });
    }

    /// One tick of the expiry watch: re-read the persisted expiry and refresh
    /// once it is inside the threshold.
    async fn check_expiry(&self) {
        let record = match self.inner.store.load().await {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Expiry watch could not read persisted session");
                return;
            }
        };

        if self.is_near_expiry(record.expires_at) {
            debug!(expires_at = record.expires_at, "Access token near expiry");
            if let Err(e) = self.refresh_token().await {
                info!(error = %e, "Background refresh failed");
            }
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update_state(&self, f: impl FnOnce(&mut SessionState)) {
        f(&mut self.write_state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_flight_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);

        let first = RefreshFlight::acquire(&flag);
        assert!(first.is_some());
        assert!(RefreshFlight::acquire(&flag).is_none());

        drop(first);
        assert!(RefreshFlight::acquire(&flag).is_some());
    }
}
