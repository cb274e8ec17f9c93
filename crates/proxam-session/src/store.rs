//! Process-wide session state.
//!
//! [`SessionStore`] is the single writer of session data. Login, signup,
//! logout, and startup reconciliation all commit through it, and every
//! commit replaces the whole session at once, so readers never observe
//! an authenticated flag paired with a stale user.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::claims::{Role, SessionUser};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::gateway::{AuthGateway, AuthOutcome, LoginContext, LoginCredentials, SignupRequest};
use crate::permissions;
use crate::storage::{FileTokenStore, TokenStore};
use crate::token;

#[derive(Debug, Default)]
struct Session {
    token: Option<String>,
    user: Option<SessionUser>,
}

/// A point-in-time view of the session, safe to hand to any reader.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<SessionUser>,
    pub is_authenticated: bool,
    /// An authentication operation is currently in flight.
    pub loading: bool,
    /// Startup reconciliation has completed (or a login or logout settled
    /// the session first).
    pub initialized: bool,
}

/// Single writer of session state for the whole process.
pub struct SessionStore {
    gateway: AuthGateway,
    storage: Arc<dyn TokenStore>,
    state: RwLock<Session>,
    // Every user-intended session change claims a generation number at
    // call start; a commit whose number is stale loses to whichever
    // change claimed a later one, regardless of network completion order.
    generation: AtomicU64,
    in_flight: AtomicUsize,
    initialized: AtomicBool,
    init_lock: tokio::sync::Mutex<()>,
}

impl SessionStore {
    /// Build a store with file-backed persistence at the configured
    /// session path.
    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let path = config.session_file()?;
        let gateway = AuthGateway::from_config(config)?;
        Ok(Self::new(gateway, Arc::new(FileTokenStore::new(path))))
    }

    /// Build a store with explicit storage, e.g. in-memory.
    pub fn new(gateway: AuthGateway, storage: Arc<dyn TokenStore>) -> Self {
        Self {
            gateway,
            storage,
            state: RwLock::new(Session::default()),
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            initialized: AtomicBool::new(false),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    // A poisoned lock still guards valid session data; recover it.
    fn read_state(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(|err| err.into_inner())
    }

    fn begin_intent(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    // Storage writes happen under the state lock, so the persisted token
    // always follows the in-memory commit order.
    fn commit(&self, generation: u64, token: String, user: SessionUser) -> Result<(), SessionError> {
        let mut state = self.write_state();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("discarding stale session commit");
            return Err(SessionError::Superseded);
        }
        if let Err(err) = self.storage.save(&token) {
            warn!(error = %err, "failed to persist session token");
        }
        *state = Session {
            token: Some(token),
            user: Some(user),
        };
        drop(state);
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Log in against the identity service (or fallback mode when it is
    /// unreachable). On success the session is committed as one atomic
    /// replacement; on denial the session is left untouched and the
    /// user-facing message is returned as [`SessionError::Denied`].
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
        context: LoginContext,
    ) -> Result<SessionUser, SessionError> {
        let generation = self.begin_intent();
        let _loading = LoadingGuard::new(&self.in_flight);

        match self.gateway.login(credentials, context).await? {
            AuthOutcome::Granted(granted) => {
                self.commit(generation, granted.token, granted.user.clone())?;
                info!(email = %granted.user.email, role = %granted.user.role, "login succeeded");
                Ok(granted.user)
            }
            AuthOutcome::Denied(message) => {
                debug!(email = %credentials.email, "login denied");
                Err(SessionError::Denied(message))
            }
        }
    }

    /// Sign up. Commits the granted session exactly like [`login`].
    ///
    /// [`login`]: SessionStore::login
    pub async fn signup(&self, request: &SignupRequest) -> Result<SessionUser, SessionError> {
        let generation = self.begin_intent();
        let _loading = LoadingGuard::new(&self.in_flight);

        match self.gateway.signup(request).await? {
            AuthOutcome::Granted(granted) => {
                self.commit(generation, granted.token, granted.user.clone())?;
                info!(email = %granted.user.email, "signup succeeded");
                Ok(granted.user)
            }
            AuthOutcome::Denied(message) => {
                debug!(email = %request.email, "signup rejected");
                Err(SessionError::Denied(message))
            }
        }
    }

    /// Log out: clear the in-memory session and the persisted token in one
    /// commit. Wins over any login still in flight, whatever order the
    /// network answers in.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.begin_intent();
        let mut state = self.write_state();
        let had_session = state.user.is_some();
        *state = Session::default();
        let cleared = self.storage.clear();
        drop(state);
        self.initialized.store(true, Ordering::Release);

        if had_session {
            info!("session ended");
        }
        cleared.map_err(SessionError::from)
    }

    /// Reconcile the session with persisted state.
    ///
    /// The reconciliation runs at most once per process; concurrent
    /// callers during startup share a single pass, and every later call
    /// returns the current snapshot without touching storage again.
    pub async fn check_auth(&self) -> SessionSnapshot {
        if self.initialized.load(Ordering::Acquire) {
            return self.snapshot();
        }

        let _init = self.init_lock.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            return self.snapshot();
        }

        {
            let _loading = LoadingGuard::new(&self.in_flight);
            self.reconcile();
        }
        self.initialized.store(true, Ordering::Release);
        self.snapshot()
    }

    fn reconcile(&self) {
        // Captured before the storage read: if a login or logout lands
        // while we reconcile, its commit claims a newer generation and
        // this hydration must yield.
        let generation = self.generation.load(Ordering::SeqCst);

        let stored = match self.storage.load() {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "failed to read persisted session");
                None
            }
        };
        let Some(stored_token) = stored else {
            return;
        };

        match token::try_decode(&stored_token) {
            Ok(claims) => {
                let mut state = self.write_state();
                if self.generation.load(Ordering::SeqCst) != generation {
                    debug!("session changed during reconciliation, keeping newer state");
                    return;
                }
                *state = Session {
                    token: Some(stored_token),
                    user: Some(SessionUser::from(claims)),
                };
            }
            Err(reason) => {
                let mut state = self.write_state();
                if self.generation.load(Ordering::SeqCst) != generation {
                    debug!("session changed during reconciliation, keeping newer state");
                    return;
                }
                *state = Session::default();
                if let Err(err) = self.storage.clear() {
                    warn!(error = %err, "failed to clear persisted session");
                }
                debug!(reason = %reason, "dropping persisted session token");
            }
        }
    }

    /// A point-in-time view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.read_state();
        SessionSnapshot {
            user: state.user.clone(),
            is_authenticated: state.user.is_some(),
            loading: self.in_flight.load(Ordering::Acquire) > 0,
            initialized: self.initialized.load(Ordering::Acquire),
        }
    }

    /// The raw token of the current session, if any.
    pub fn token(&self) -> Option<String> {
        self.read_state().token.clone()
    }

    /// Whether `role` may access `path` per the static permission table.
    pub fn check_access(&self, path: &str, role: Role) -> bool {
        permissions::evaluate(path, role)
    }
}

struct LoadingGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn new(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::AcqRel);
        Self { in_flight }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
