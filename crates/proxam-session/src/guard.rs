//! Per-surface access decisions.
//!
//! An [`AccessGuard`] turns the current session snapshot plus the static
//! permission table into a render decision for one navigation. Nothing is
//! cached between navigations: every evaluation starts from a fresh
//! snapshot, so a logout or role change takes effect on the very next
//! navigation.

use std::sync::Arc;

use tracing::debug;

use crate::permissions;
use crate::store::{SessionSnapshot, SessionStore};

/// What a surface should do for the current navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Session reconciliation has not finished; show a placeholder.
    Initializing,
    /// Not signed in. Redirect to the login surface, carrying the path
    /// the user asked for so a successful login can return there.
    RedirectToLogin { return_to: String },
    /// Signed in, but the role is not allowed on this surface.
    Forbidden,
    /// Render the protected content.
    Allowed,
}

/// A navigable surface and its protection requirements.
#[derive(Debug, Clone)]
pub struct Surface {
    pub path: String,
    pub requires_auth: bool,
    pub role_restricted: bool,
}

impl Surface {
    /// A surface anyone may visit.
    pub fn public(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            requires_auth: false,
            role_restricted: false,
        }
    }

    /// A surface that requires a signed-in user of any role.
    pub fn authenticated(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            requires_auth: true,
            role_restricted: false,
        }
    }

    /// A surface that additionally checks the role against the
    /// permission table.
    pub fn restricted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            requires_auth: true,
            role_restricted: true,
        }
    }
}

/// Decides, for each navigation, whether a surface renders, redirects to
/// login, or is forbidden for the signed-in role.
#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<SessionStore>,
}

impl AccessGuard {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Evaluate a surface against the current snapshot, without waiting
    /// for startup reconciliation.
    pub fn decide(&self, surface: &Surface) -> AccessDecision {
        decide_with(&self.store.snapshot(), surface)
    }

    /// Run startup reconciliation if it has not happened yet, then
    /// evaluate the surface.
    pub async fn authorize(&self, surface: &Surface) -> AccessDecision {
        let snapshot = self.store.check_auth().await;
        decide_with(&snapshot, surface)
    }
}

fn decide_with(snapshot: &SessionSnapshot, surface: &Surface) -> AccessDecision {
    if !surface.requires_auth {
        return AccessDecision::Allowed;
    }
    if !snapshot.initialized {
        return AccessDecision::Initializing;
    }
    let Some(user) = &snapshot.user else {
        debug!(path = %surface.path, "unauthenticated navigation, redirecting to login");
        return AccessDecision::RedirectToLogin {
            return_to: surface.path.clone(),
        };
    };
    if surface.role_restricted && !permissions::evaluate(&surface.path, user.role) {
        debug!(path = %surface.path, role = %user.role, "role not permitted for surface");
        return AccessDecision::Forbidden;
    }
    AccessDecision::Allowed
}
