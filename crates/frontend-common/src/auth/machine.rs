//! Authentication state machine
//!
//! ```text
//! ANONYMOUS --credentials, 2FA required--> AWAITING_2FA
//! ANONYMOUS --credentials accepted-------> AUTHENTICATED
//! AWAITING_2FA --code verified-----------> AUTHENTICATED
//! AWAITING_2FA --code rejected-----------> AWAITING_2FA
//! AUTHENTICATED --logout-----------------> ANONYMOUS
//! AUTHENTICATED --expired / superseded---> EXPIRED -> ANONYMOUS
//! ```
//!
//! Every way out of AUTHENTICATED goes through the same logout body, guarded
//! against re-entry by `is_logging_out`.

use super::backend::{AuthBackend, CredentialResponse};
use super::error::{AuthError, LogoutReason};
use super::snapshot::{from_snapshot, to_snapshot};
use super::state::{AuthState, AuthStatus};
use crate::clock::Clock;
use crate::session::SessionRegistry;
use crate::spawner::TaskSpawner;
use crate::storage::SharedStorage;
use chrono::{DateTime, Utc};
use portal_core::{SessionConfig, SessionId, User, access};
use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use tracing::{debug, error, info, warn};

/// Called once per completed logout with its reason
pub type LogoutListener = Rc<dyn Fn(LogoutReason)>;

/// How a successful credential submission left the tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated,
    TwoFactorRequired,
}

struct MachineInner {
    state: RefCell<AuthState>,
    registry: SessionRegistry,
    storage: Rc<dyn SharedStorage>,
    clock: Rc<dyn Clock>,
    backend: Rc<dyn AuthBackend>,
    spawner: Rc<dyn TaskSpawner>,
    config: SessionConfig,
    last_logout_reason: Cell<Option<LogoutReason>>,
    logout_listeners: RefCell<Vec<(u64, LogoutListener)>>,
    next_listener: Cell<u64>,
}

/// The tab's authentication state and every transition on it
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct AuthStateMachine {
    inner: Rc<MachineInner>,
}

impl AuthStateMachine {
    pub fn new(
        registry: SessionRegistry,
        storage: Rc<dyn SharedStorage>,
        clock: Rc<dyn Clock>,
        backend: Rc<dyn AuthBackend>,
        spawner: Rc<dyn TaskSpawner>,
        config: SessionConfig,
    ) -> Self {
        let now = clock.now();
        Self {
            inner: Rc::new(MachineInner {
                state: RefCell::new(AuthState::anonymous(now)),
                registry,
                storage,
                clock,
                backend,
                spawner,
                config,
                last_logout_reason: Cell::new(None),
                logout_listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.state.borrow().status
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.state.borrow().session_id.clone()
    }

    pub fn session_expiry(&self) -> Option<DateTime<Utc>> {
        self.inner.state.borrow().session_expiry
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn is_logging_out(&self) -> bool {
        self.inner.state.borrow().is_logging_out
    }

    /// A copy of the whole state
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Why the most recent logout happened
    pub fn last_logout_reason(&self) -> Option<LogoutReason> {
        self.inner.last_logout_reason.get()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.with_role(|role| access::has_permission(role, permission))
    }

    pub fn has_any_permission<P: AsRef<str>>(&self, permissions: &[P]) -> bool {
        self.with_role(|role| access::has_any_permission(role, permissions))
    }

    pub fn has_all_permissions<P: AsRef<str>>(&self, permissions: &[P]) -> bool {
        self.with_role(|role| access::has_all_permissions(role, permissions))
    }

    pub fn has_role(&self, candidate: &str) -> bool {
        self.with_role(|role| access::has_role(role, candidate))
    }

    pub fn has_any_role<R: AsRef<str>>(&self, candidates: &[R]) -> bool {
        self.with_role(|role| access::has_any_role(role, candidates))
    }

    /// Apply an access check to the signed-in user's role; `false` for anyone else
    fn with_role(&self, check: impl FnOnce(&str) -> bool) -> bool {
        let state = self.inner.state.borrow();
        match (&state.user, state.status) {
            (Some(user), AuthStatus::Authenticated) => check(&user.role),
            _ => false,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Send credentials to the server and follow its answer
    ///
    /// # Errors
    ///
    /// Returns the backend's error (state unchanged), or `InvalidTransition`
    /// if the tab is not anonymous before or after the request.
    pub async fn submit_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let status = self.status();
        if status != AuthStatus::Anonymous {
            return Err(AuthError::invalid_transition(status, "sign in"));
        }

        let response = self
            .inner
            .backend
            .submit_credentials(email, password)
            .await
            .inspect_err(|err| debug!(error = %err, "Credentials rejected"))?;

        let status = self.status();
        if status != AuthStatus::Anonymous {
            return Err(AuthError::invalid_transition(status, "complete sign-in"));
        }

        match response {
            CredentialResponse::Authenticated { user } => {
                self.login(user);
                Ok(LoginOutcome::Authenticated)
            }
            CredentialResponse::TwoFactorRequired { temp_token } => {
                let mut state = self.inner.state.borrow_mut();
                state.status = AuthStatus::AwaitingTwoFactor;
                state.temp_token = Some(temp_token);
                debug!("Awaiting second factor");
                Ok(LoginOutcome::TwoFactorRequired)
            }
        }
    }

    /// Check a second-factor code for the pending challenge
    ///
    /// # Errors
    ///
    /// Returns the backend's error, in which case the tab keeps waiting for a
    /// code, or `InvalidTransition` if no challenge is pending (or the
    /// challenge changed while the request was in flight).
    pub async fn verify_code(&self, code: &str) -> Result<(), AuthError> {
        let (status, temp_token) = {
            let state = self.inner.state.borrow();
            (state.status, state.temp_token.clone())
        };
        let Some(temp_token) = temp_token.filter(|_| status == AuthStatus::AwaitingTwoFactor)
        else {
            return Err(AuthError::invalid_transition(status, "verify a code"));
        };

        let user = self
            .inner
            .backend
            .verify_code(code, &temp_token)
            .await
            .inspect_err(|err| debug!(error = %err, "Verification code rejected"))?;

        let still_pending = {
            let state = self.inner.state.borrow();
            state.status == AuthStatus::AwaitingTwoFactor
                && state.temp_token.as_deref() == Some(temp_token.as_str())
        };
        if !still_pending {
            return Err(AuthError::invalid_transition(
                self.status(),
                "complete verification",
            ));
        }

        self.login(user);
        Ok(())
    }

    /// Become AUTHENTICATED as `user` with a freshly published session
    ///
    /// The new state is in place before the id is published, so listeners
    /// woken by the publish already see the matching session id.
    pub fn login(&self, user: User) -> SessionId {
        let user = user.normalized();
        let session_id = self.inner.registry.generate_id();
        let now = self.now();
        let expiry = now + self.inner.config.inactivity_timeout();

        info!(
            session_id = %session_id,
            user_id = %user.id,
            role = %user.role,
            "Logged in"
        );
        *self.inner.state.borrow_mut() = AuthState {
            status: AuthStatus::Authenticated,
            user: Some(user),
            session_id: Some(session_id.clone()),
            session_expiry: Some(expiry),
            last_activity: now,
            temp_token: None,
            is_logging_out: false,
        };

        self.persist();
        self.inner.registry.publish(&session_id);
        session_id
    }

    /// Sign out at the user's request
    pub fn logout(&self) {
        self.end_session(LogoutReason::UserInitiated);
    }

    /// Sign out with an explicit reason tag
    pub fn force_logout(&self, reason: LogoutReason) {
        self.end_session(reason);
    }

    /// Push the expiry out to `now + timeout` after user activity
    ///
    /// Expiry never moves backwards, and a session that has already run out
    /// is left for the next check to end. A tab that no longer holds the
    /// active slot is not extended either, so its snapshot never overwrites
    /// the owner's. Returns whether it was extended.
    pub fn extend_activity(&self) -> bool {
        let now = self.now();
        let Some(ours) = self.session_id() else {
            return false;
        };
        if !self.owns_slot(&ours) {
            debug!(session_id = %ours, "Activity on a session another tab replaced");
            return false;
        }
        {
            let mut state = self.inner.state.borrow_mut();
            if state.status != AuthStatus::Authenticated
                || state.is_logging_out
                || state.is_expired_at(now)
            {
                return false;
            }
            let candidate = now + self.inner.config.inactivity_timeout();
            state.session_expiry = Some(
                state
                    .session_expiry
                    .map_or(candidate, |expiry| expiry.max(candidate)),
            );
            state.last_activity = now;
        }
        self.persist();
        true
    }

    /// Whether the session is still inside its inactivity window
    ///
    /// An elapsed session is logged out with reason `Expired`. A tab waiting
    /// on a second factor reports `false` but is left alone.
    pub fn check_session(&self) -> bool {
        let now = self.now();
        {
            let state = self.inner.state.borrow();
            if state.is_logging_out || state.status == AuthStatus::AwaitingTwoFactor {
                return false;
            }
            if state.status == AuthStatus::Authenticated && !state.is_expired_at(now) {
                return true;
            }
        }
        self.end_session(LogoutReason::Expired);
        false
    }

    /// Whether this tab still owns the browser's active session
    ///
    /// If another id holds the slot the tab logs out with reason `Superseded`;
    /// if the slot is empty another tab signed out, reason `SignedOutElsewhere`.
    /// If the shared slot cannot be read there is no cross-tab view to
    /// enforce, and the tab keeps its session.
    pub fn validate_session(&self) -> bool {
        let ours = {
            let state = self.inner.state.borrow();
            if state.is_logging_out || state.status != AuthStatus::Authenticated {
                return false;
            }
            state.session_id.clone()
        };

        match self.inner.registry.try_read_active() {
            Ok(active) if active.is_some() && active == ours => true,
            Ok(None) => {
                info!(ours = ?ours, "Active session cleared by another tab");
                self.end_session(LogoutReason::SignedOutElsewhere);
                false
            }
            Ok(active) => {
                info!(ours = ?ours, active = ?active, "Session superseded by another tab");
                self.end_session(LogoutReason::Superseded);
                false
            }
            Err(err) => {
                warn!(error = %err, "Cannot read active session; skipping cross-tab check");
                true
            }
        }
    }

    /// Restore a persisted session on page load
    ///
    /// Only applies while anonymous. Never publishes: the restored id is
    /// checked against the shared slot by the next `validate_session`.
    pub fn rehydrate(&self) -> bool {
        if self.status() != AuthStatus::Anonymous {
            return false;
        }

        let key = &self.inner.config.snapshot_key;
        let stored = match self.inner.storage.get_item(key) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "Cannot read persisted auth state");
                return false;
            }
        };
        let Some(json) = stored else {
            return false;
        };

        let snapshot = match from_snapshot(&json) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "Discarding unreadable auth snapshot");
                self.remove_snapshot();
                return false;
            }
        };

        match snapshot.restore(self.now()) {
            Some(state) => {
                info!(session_id = ?state.session_id, "Restored persisted session");
                *self.inner.state.borrow_mut() = state;
                true
            }
            None => {
                if snapshot.is_authenticated {
                    debug!("Persisted session has expired");
                    self.remove_snapshot();
                }
                false
            }
        }
    }

    /// Register for logout notifications; returns an id for unsubscribing
    ///
    /// Natively a panicking listener is logged and the rest still run. On
    /// `wasm32-unknown-unknown` panics abort and cannot be contained.
    pub fn subscribe_logout(&self, listener: LogoutListener) -> u64 {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner.logout_listeners.borrow_mut().push((id, listener));
        id
    }

    pub fn unsubscribe_logout(&self, id: u64) -> bool {
        let mut listeners = self.inner.logout_listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// The one logout body
    ///
    /// Token discard runs under `catch_unwind` so a panicking backend cannot
    /// leave the tab half signed out; that only holds where panics unwind,
    /// not on `wasm32-unknown-unknown`.
    fn end_session(&self, reason: LogoutReason) {
        let session_id = {
            let mut state = self.inner.state.borrow_mut();
            if state.is_logging_out {
                debug!(reason = %reason, "Logout already in progress");
                return;
            }
            if state.holds_nothing() {
                return;
            }
            state.is_logging_out = true;
            if reason.is_forced() && state.status == AuthStatus::Authenticated {
                state.status = AuthStatus::Expired;
            }
            state.session_id.clone()
        };
        info!(reason = %reason, session_id = ?session_id, "Logging out");

        let backend = Rc::clone(&self.inner.backend);
        self.inner.spawner.spawn_detached(Box::pin(async move {
            if let Err(err) = backend.revoke_session().await {
                warn!(error = %err, "Server-side session revocation failed");
            }
        }));

        let backend = &self.inner.backend;
        if catch_unwind(AssertUnwindSafe(|| backend.discard_tokens())).is_err() {
            error!("Discarding tokens panicked; continuing logout");
        }

        self.release_shared_state(session_id.as_ref());

        *self.inner.state.borrow_mut() = AuthState::anonymous(self.now());
        self.inner.last_logout_reason.set(Some(reason));
        self.notify_logout(reason);
    }

    /// Clear the shared slot and snapshot, but only while they are still ours
    ///
    /// A superseded tab must not erase the session that replaced it.
    fn release_shared_state(&self, ours: Option<&SessionId>) {
        let Some(ours) = ours else {
            return;
        };
        if !self.owns_slot(ours) {
            debug!(session_id = %ours, "Active session belongs to another tab; leaving it");
            return;
        }
        self.inner.registry.clear();
        self.remove_snapshot();
    }

    /// Whether the shared slot still names `ours`
    ///
    /// Unreadable storage counts as owned: with no cross-tab view, writes and
    /// clears only affect this tab.
    fn owns_slot(&self, ours: &SessionId) -> bool {
        match self.inner.registry.try_read_active() {
            Ok(active) => active.as_ref() == Some(ours),
            Err(_) => true,
        }
    }

    fn persist(&self) {
        let snapshot = to_snapshot(&self.inner.state.borrow());
        let json = match snapshot.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "Failed to encode auth state");
                return;
            }
        };
        if let Err(err) = self
            .inner
            .storage
            .set_item(&self.inner.config.snapshot_key, &json)
        {
            warn!(error = %err, "Failed to persist auth state");
        }
    }

    fn remove_snapshot(&self) {
        if let Err(err) = self.inner.storage.remove_item(&self.inner.config.snapshot_key) {
            warn!(error = %err, "Failed to remove persisted auth state");
        }
    }

    fn notify_logout(&self, reason: LogoutReason) {
        let listeners: Vec<LogoutListener> = self
            .inner
            .logout_listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(reason))).is_err() {
                error!(reason = %reason, "Logout listener panicked; continuing with the rest");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::backend::mock::MockAuthBackend;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use futures::executor::LocalPool;
    use futures::future::LocalBoxFuture;

    const TIMEOUT_MS: u64 = 1_000;

    struct Harness {
        machine: AuthStateMachine,
        storage: MemoryStorage,
        clock: ManualClock,
        pool: LocalPool,
    }

    fn build(backend: MockAuthBackend, spawner: Option<Rc<dyn TaskSpawner>>) -> Harness {
        let storage = MemoryStorage::new();
        let clock = ManualClock::default();
        let pool = LocalPool::new();
        let config = SessionConfig::with_timeout_ms(TIMEOUT_MS);
        let registry = SessionRegistry::new(
            Rc::new(storage.clone()),
            Rc::new(clock.clone()),
            config.active_session_key.clone(),
        );
        let spawner: Rc<dyn TaskSpawner> = match spawner {
            Some(spawner) => spawner,
            None => Rc::new(pool.spawner()),
        };
        let machine = AuthStateMachine::new(
            registry,
            Rc::new(storage.clone()),
            Rc::new(clock.clone()),
            Rc::new(backend),
            spawner,
            config,
        );
        Harness {
            machine,
            storage,
            clock,
            pool,
        }
    }

    fn harness(backend: MockAuthBackend) -> Harness {
        build(backend, None)
    }

    fn allow_logout(backend: &mut MockAuthBackend) {
        backend.expect_discard_tokens().return_const(());
        backend.expect_revoke_session().returning(|| Ok(()));
    }

    fn patient() -> User {
        User::new("u-1", "Patient", "Pat Doe")
    }

    /// Spawner that pokes the machine while the logout body is running
    #[derive(Default)]
    struct ReentrantSpawner {
        machine: RefCell<Option<AuthStateMachine>>,
        seen_status: Cell<Option<AuthStatus>>,
        seen_logging_out: Cell<bool>,
        nested_validate: Cell<Option<bool>>,
    }

    impl TaskSpawner for ReentrantSpawner {
        fn spawn_detached(&self, _task: LocalBoxFuture<'static, ()>) {
            let machine = self.machine.borrow().clone();
            if let Some(machine) = machine {
                self.seen_status.set(Some(machine.status()));
                self.seen_logging_out.set(machine.is_logging_out());
                machine.logout();
                self.nested_validate.set(Some(machine.validate_session()));
            }
        }
    }

    #[test]
    fn test_login_publishes_and_persists() {
        let h = harness(MockAuthBackend::new());
        let id = h.machine.login(patient());

        assert_eq!(h.machine.status(), AuthStatus::Authenticated);
        assert_eq!(h.machine.session_id(), Some(id.clone()));
        assert_eq!(h.machine.registry().read_active(), Some(id));
        assert_eq!(h.machine.user().unwrap().role, "patient");
        assert_eq!(
            h.machine.session_expiry(),
            Some(h.clock.now() + chrono::Duration::milliseconds(1_000))
        );

        let stored = h.storage.get_item("auth-storage").unwrap().unwrap();
        let snapshot = from_snapshot(&stored).unwrap();
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.session_id, h.machine.session_id());
    }

    #[test]
    fn test_access_checks_follow_signed_in_role() {
        let mut backend = MockAuthBackend::new();
        allow_logout(&mut backend);
        let h = harness(backend);
        assert!(!h.machine.has_permission("manage_own_profile"));

        h.machine.login(User::new("u-2", "ADMIN", "Ada"));
        assert!(h.machine.has_permission("manage_users"));
        assert!(!h.machine.has_permission("write_prescriptions"));
        assert!(h.machine.has_any_permission(&["write_prescriptions", "view_reports"]));
        assert!(!h.machine.has_all_permissions(&["write_prescriptions", "view_reports"]));
        assert!(h.machine.has_role("Admin"));
        assert!(h.machine.has_any_role(&["patient", "admin"]));

        h.machine.logout();
        assert!(!h.machine.has_role("admin"));
    }

    #[test]
    fn test_two_factor_gates_publish() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_submit_credentials()
            .withf(|email, password| email == "pat@example.com" && password == "hunter2")
            .times(1)
            .returning(|_, _| Ok(CredentialResponse::two_factor("tmp-1")));
        backend
            .expect_verify_code()
            .withf(|code, token| code == "123456" && token == "tmp-1")
            .times(1)
            .returning(|_, _| Ok(User::new("u-1", "PROVIDER", "Dr. Lee")));
        let mut h = harness(backend);

        let outcome = h
            .pool
            .run_until(h.machine.submit_credentials("pat@example.com", "hunter2"))
            .unwrap();
        assert_eq!(outcome, LoginOutcome::TwoFactorRequired);
        assert_eq!(h.machine.status(), AuthStatus::AwaitingTwoFactor);
        assert_eq!(h.machine.state().temp_token.as_deref(), Some("tmp-1"));
        assert_eq!(h.machine.registry().read_active(), None);
        assert_eq!(h.storage.get_item("auth-storage").unwrap(), None);

        h.pool.run_until(h.machine.verify_code("123456")).unwrap();
        let state = h.machine.state();
        assert_eq!(state.status, AuthStatus::Authenticated);
        assert_eq!(state.temp_token, None);
        assert_eq!(state.user.unwrap().role, "provider");
        assert_eq!(h.machine.registry().read_active(), state.session_id);
    }

    #[test]
    fn test_credentials_without_two_factor_authenticate() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_submit_credentials()
            .times(1)
            .returning(|_, _| Ok(CredentialResponse::Authenticated { user: patient() }));
        let mut h = harness(backend);

        let outcome = h
            .pool
            .run_until(h.machine.submit_credentials("pat@example.com", "pw"))
            .unwrap();
        assert_eq!(outcome, LoginOutcome::Authenticated);
        assert!(h.machine.validate_session());
    }

    #[test]
    fn test_bad_credentials_stay_anonymous() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_submit_credentials()
            .returning(|_, _| Err(AuthError::validation("Invalid email or password")));
        let mut h = harness(backend);

        let err = h
            .pool
            .run_until(h.machine.submit_credentials("pat@example.com", "nope"))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(h.machine.status(), AuthStatus::Anonymous);
    }

    #[test]
    fn test_rejected_code_keeps_waiting() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_submit_credentials()
            .returning(|_, _| Ok(CredentialResponse::two_factor("tmp-2")));
        backend
            .expect_verify_code()
            .times(2)
            .returning(|code, _| {
                if code == "000000" {
                    Err(AuthError::validation("Invalid code"))
                } else {
                    Ok(User::new("u-2", "admin", "Ada"))
                }
            });
        let mut h = harness(backend);

        h.pool
            .run_until(h.machine.submit_credentials("ada@example.com", "pw"))
            .unwrap();
        let err = h.pool.run_until(h.machine.verify_code("000000")).unwrap_err();
        assert_eq!(err, AuthError::validation("Invalid code"));
        assert_eq!(h.machine.status(), AuthStatus::AwaitingTwoFactor);
        assert_eq!(h.machine.state().temp_token.as_deref(), Some("tmp-2"));

        h.pool.run_until(h.machine.verify_code("654321")).unwrap();
        assert!(h.machine.is_authenticated());
    }

    #[test]
    fn test_verify_without_challenge_is_rejected() {
        let mut h = harness(MockAuthBackend::new());
        let err = h.pool.run_until(h.machine.verify_code("123456")).unwrap_err();
        assert_eq!(
            err,
            AuthError::invalid_transition(AuthStatus::Anonymous, "verify a code")
        );
    }

    #[test]
    fn test_submit_while_authenticated_is_rejected() {
        let mut h = harness(MockAuthBackend::new());
        h.machine.login(patient());
        let err = h
            .pool
            .run_until(h.machine.submit_credentials("pat@example.com", "pw"))
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidTransition { .. }));
    }

    #[test]
    fn test_logout_clears_shared_state() {
        let mut backend = MockAuthBackend::new();
        backend.expect_discard_tokens().times(1).return_const(());
        backend.expect_revoke_session().times(1).returning(|| Ok(()));
        let mut h = harness(backend);
        h.machine.login(patient());

        h.machine.logout();
        h.pool.run_until_stalled();

        assert_eq!(h.machine.status(), AuthStatus::Anonymous);
        assert_eq!(h.machine.registry().read_active(), None);
        assert_eq!(h.storage.get_item("auth-storage").unwrap(), None);
        assert_eq!(h.machine.last_logout_reason(), Some(LogoutReason::UserInitiated));

        // Nothing left to tear down; no second discard or revoke
        h.machine.logout();
        h.pool.run_until_stalled();
        assert!(!h.machine.is_logging_out());
    }

    #[test]
    fn test_revocation_failure_does_not_block_logout() {
        let mut backend = MockAuthBackend::new();
        backend.expect_discard_tokens().times(1).return_const(());
        backend
            .expect_revoke_session()
            .times(1)
            .returning(|| Err(AuthError::RevocationFailed("503".to_string())));
        let mut h = harness(backend);
        h.machine.login(patient());

        h.machine.logout();
        assert_eq!(h.machine.status(), AuthStatus::Anonymous);
        assert_eq!(h.machine.registry().read_active(), None);
        h.pool.run_until_stalled();
        assert_eq!(h.machine.status(), AuthStatus::Anonymous);
    }

    #[test]
    fn test_nested_logout_is_ignored() {
        let mut backend = MockAuthBackend::new();
        backend.expect_discard_tokens().times(1).return_const(());
        let spawner = Rc::new(ReentrantSpawner::default());
        let h = build(backend, Some(spawner.clone() as Rc<dyn TaskSpawner>));
        *spawner.machine.borrow_mut() = Some(h.machine.clone());

        h.machine.login(patient());
        h.machine.logout();

        assert!(spawner.seen_logging_out.get());
        assert_eq!(spawner.seen_status.get(), Some(AuthStatus::Authenticated));
        assert_eq!(spawner.nested_validate.get(), Some(false));
        assert_eq!(h.machine.status(), AuthStatus::Anonymous);
        assert!(!h.machine.is_logging_out());

        spawner.machine.borrow_mut().take();
    }

    #[test]
    fn test_forced_logout_passes_through_expired() {
        let mut backend = MockAuthBackend::new();
        backend.expect_discard_tokens().return_const(());
        let spawner = Rc::new(ReentrantSpawner::default());
        let h = build(backend, Some(spawner.clone() as Rc<dyn TaskSpawner>));
        *spawner.machine.borrow_mut() = Some(h.machine.clone());

        h.machine.login(patient());
        h.clock.advance_millis(1_500);
        assert!(!h.machine.check_session());

        assert_eq!(spawner.seen_status.get(), Some(AuthStatus::Expired));
        assert_eq!(h.machine.status(), AuthStatus::Anonymous);
        assert_eq!(h.machine.last_logout_reason(), Some(LogoutReason::Expired));

        spawner.machine.borrow_mut().take();
    }

    #[test]
    fn test_check_session_leaves_two_factor_alone() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_submit_credentials()
            .returning(|_, _| Ok(CredentialResponse::two_factor("tmp-3")));
        let mut h = harness(backend);
        h.pool
            .run_until(h.machine.submit_credentials("pat@example.com", "pw"))
            .unwrap();

        h.clock.advance_millis(60_000);
        assert!(!h.machine.check_session());
        assert_eq!(h.machine.status(), AuthStatus::AwaitingTwoFactor);
        assert!(!h.machine.validate_session());
        assert_eq!(h.machine.status(), AuthStatus::AwaitingTwoFactor);
    }

    #[test]
    fn test_logout_from_two_factor_discards_temp_token() {
        let mut backend = MockAuthBackend::new();
        backend
            .expect_submit_credentials()
            .returning(|_, _| Ok(CredentialResponse::two_factor("tmp-4")));
        allow_logout(&mut backend);
        let mut h = harness(backend);
        h.pool
            .run_until(h.machine.submit_credentials("pat@example.com", "pw"))
            .unwrap();

        h.machine.logout();
        assert_eq!(h.machine.state(), AuthState::anonymous(h.clock.now()));
    }

    #[test]
    fn test_extend_activity_never_moves_expiry_back() {
        let h = harness(MockAuthBackend::new());
        h.machine.login(patient());
        let first = h.machine.session_expiry().unwrap();

        h.clock.advance_millis(400);
        assert!(h.machine.extend_activity());
        let second = h.machine.session_expiry().unwrap();
        assert!(second > first);

        // Clock stepping backwards must not shrink the window
        h.clock.advance_millis(-300);
        assert!(h.machine.extend_activity());
        assert_eq!(h.machine.session_expiry().unwrap(), second);
    }

    #[test]
    fn test_activity_after_expiry_does_not_revive() {
        let mut backend = MockAuthBackend::new();
        allow_logout(&mut backend);
        let h = harness(backend);
        h.machine.login(patient());
        h.clock.advance_millis(1_000);

        assert!(!h.machine.extend_activity());
        assert!(!h.machine.check_session());
        assert_eq!(h.machine.status(), AuthStatus::Anonymous);
    }

    #[test]
    fn test_validate_degrades_when_storage_unreadable() {
        let h = harness(MockAuthBackend::new());
        h.machine.login(patient());
        h.storage.set_available(false);

        assert!(h.machine.validate_session());
        assert!(h.machine.extend_activity());
        assert!(h.machine.is_authenticated());
    }

    #[test]
    fn test_replaced_session_is_not_extended() {
        let h = harness(MockAuthBackend::new());
        h.machine.login(patient());
        let expiry = h.machine.session_expiry();

        // Another tab took the slot and wrote its own snapshot
        h.storage.set_item("active_session_id", "2-other").unwrap();
        h.storage.set_item("auth-storage", "owner-snapshot").unwrap();
        h.clock.advance_millis(300);

        assert!(!h.machine.extend_activity());
        assert_eq!(h.machine.session_expiry(), expiry);
        assert_eq!(
            h.storage.get_item("auth-storage").unwrap().as_deref(),
            Some("owner-snapshot")
        );
    }

    #[test]
    fn test_validate_tags_cleared_slot_apart_from_replaced() {
        let mut backend = MockAuthBackend::new();
        allow_logout(&mut backend);
        let h = harness(backend);

        h.machine.login(patient());
        h.machine.registry().clear();
        assert!(!h.machine.validate_session());
        assert_eq!(
            h.machine.last_logout_reason(),
            Some(LogoutReason::SignedOutElsewhere)
        );

        h.machine.login(patient());
        h.storage.set_item("active_session_id", "2-other").unwrap();
        assert!(!h.machine.validate_session());
        assert_eq!(h.machine.last_logout_reason(), Some(LogoutReason::Superseded));
    }

    #[test]
    fn test_logout_listeners_get_reason() {
        let mut backend = MockAuthBackend::new();
        allow_logout(&mut backend);
        let h = harness(backend);
        let reasons = Rc::new(RefCell::new(Vec::new()));
        {
            let reasons = reasons.clone();
            h.machine
                .subscribe_logout(Rc::new(|_: LogoutReason| panic!("listener bug")));
            h.machine
                .subscribe_logout(Rc::new(move |reason: LogoutReason| {
                    reasons.borrow_mut().push(reason);
                }));
        }

        h.machine.login(patient());
        h.machine.logout();
        h.machine.login(patient());
        h.clock.advance_millis(2_000);
        h.machine.check_session();

        assert_eq!(
            reasons.borrow().as_slice(),
            &[LogoutReason::UserInitiated, LogoutReason::Expired]
        );
    }

    #[test]
    fn test_rehydrate_restores_live_snapshot() {
        let h = harness(MockAuthBackend::new());
        let id = h.machine.login(patient());

        let tab = h.storage.open_tab();
        let config = SessionConfig::with_timeout_ms(TIMEOUT_MS);
        let other = AuthStateMachine::new(
            SessionRegistry::new(
                Rc::new(tab.clone()),
                Rc::new(h.clock.clone()),
                config.active_session_key.clone(),
            ),
            Rc::new(tab),
            Rc::new(h.clock.clone()),
            Rc::new(MockAuthBackend::new()),
            Rc::new(h.pool.spawner()),
            config,
        );

        assert!(other.rehydrate());
        assert_eq!(other.session_id(), Some(id));
        assert!(other.validate_session());
        assert!(!other.rehydrate(), "only applies while anonymous");
    }

    #[test]
    fn test_rehydrate_drops_expired_or_garbage_snapshot() {
        let h = harness(MockAuthBackend::new());
        h.machine.login(patient());
        let stored = h.storage.get_item("auth-storage").unwrap().unwrap();

        let fresh = harness(MockAuthBackend::new());
        fresh.storage.set_item("auth-storage", &stored).unwrap();
        fresh.clock.set(h.clock.now() + chrono::Duration::milliseconds(5_000));
        assert!(!fresh.machine.rehydrate());
        assert_eq!(fresh.storage.get_item("auth-storage").unwrap(), None);

        fresh.storage.set_item("auth-storage", "{oops").unwrap();
        assert!(!fresh.machine.rehydrate());
        assert_eq!(fresh.storage.get_item("auth-storage").unwrap(), None);
        assert_eq!(fresh.machine.status(), AuthStatus::Anonymous);
    }
}
