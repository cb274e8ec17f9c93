//! Session and access control library for the Proxam client.
//!
//! This crate owns the session lifecycle for the coding-assessment
//! platform's client: authenticating against the identity service (with
//! an offline fallback mode), persisting the session token across
//! restarts, and deciding per navigation whether a surface renders,
//! redirects to login, or is forbidden for the signed-in role.

pub mod claims;
pub mod config;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod guard;
pub mod permissions;
pub mod storage;
pub mod store;
pub mod token;

pub use claims::{Claims, Role, SessionUser};
pub use config::SessionConfig;
pub use error::SessionError;
pub use gateway::{AuthGateway, AuthOutcome, LoginContext, LoginCredentials, SignupRequest};
pub use guard::{AccessDecision, AccessGuard, Surface};
pub use store::{SessionSnapshot, SessionStore};
