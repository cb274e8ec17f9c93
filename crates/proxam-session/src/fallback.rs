//! Fallback Authentication Mode.
//!
//! When the identity service cannot be reached, login and signup degrade
//! to a fixed in-process credential table so demos and offline development
//! keep working. Credential rejections from a reachable service never end
//! up here; only transport failures do.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::claims::{Role, SessionUser};
use crate::gateway::{LoginContext, SignupRequest};

/// Sentinel address the local signup validator treats as already taken.
pub const RESERVED_SIGNUP_EMAIL: &str = "existing@example.com";

/// Minimum password length accepted at signup.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Fallback authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Whether fallback authentication is available at all. Disable in
    /// production deployments so an unreachable identity service fails
    /// the login instead.
    pub enabled: bool,
    /// Credential table. When left empty the built-in demo set is used.
    pub users: Vec<FallbackUser>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            users: Vec::new(),
        }
    }
}

/// A fallback credential table entry. Passwords are stored as bcrypt
/// hashes, never in the clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl FallbackUser {
    /// Verify a password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }

    fn to_session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            organization_id: self.organization_id.clone(),
        }
    }
}

// Hashed once per process. A hashing failure leaves an empty hash, which
// verifies against nothing.
static DEMO_USERS: Lazy<Vec<FallbackUser>> = Lazy::new(|| {
    [
        (
            "usr_demo_admin",
            "Demo Admin",
            "admin@example.com",
            "admin123",
            Role::Admin,
            Some("org_demo"),
        ),
        (
            "usr_demo_examiner",
            "Emma Stone",
            "emma@example.com",
            "examiner123",
            Role::Examiner,
            Some("org_demo"),
        ),
        (
            "usr_demo_candidate",
            "John Carter",
            "john@example.com",
            "candidate123",
            Role::Candidate,
            None,
        ),
    ]
    .into_iter()
    .map(|(id, name, email, password, role, org)| FallbackUser {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: bcrypt::hash(password, bcrypt::DEFAULT_COST).unwrap_or_default(),
        role,
        organization_id: org.map(str::to_string),
    })
    .collect()
});

/// The resolved fallback credential table.
#[derive(Debug, Clone)]
pub struct FallbackAuth {
    enabled: bool,
    users: Vec<FallbackUser>,
}

impl FallbackAuth {
    pub fn from_config(config: &FallbackConfig) -> Self {
        let users = if config.enabled && config.users.is_empty() {
            DEMO_USERS.clone()
        } else {
            config.users.clone()
        };
        Self {
            enabled: config.enabled,
            users,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Find a table entry matching the credentials within the login
    /// context. Admin-context logins admit admin and examiner entries;
    /// candidate-context logins admit only candidates.
    pub fn authenticate(
        &self,
        email: &str,
        password: &str,
        context: LoginContext,
    ) -> Option<SessionUser> {
        if !self.enabled {
            return None;
        }
        self.users
            .iter()
            .filter(|user| context.admits(user.role))
            .find(|user| user.email == email && user.verify_password(password))
            .map(FallbackUser::to_session_user)
    }
}

/// Local signup validation, applied only when the identity service is
/// unreachable. Mirrors the checks the remote performs so the offline
/// experience matches the online one.
pub fn validate_signup(request: &SignupRequest) -> Result<(), String> {
    if request.email == RESERVED_SIGNUP_EMAIL {
        return Err("An account with this email already exists".to_string());
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 6 characters".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fallback_user(
        id: &str,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> FallbackUser {
        FallbackUser {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: bcrypt::hash(password, bcrypt::DEFAULT_COST)
                .expect("Failed to hash password"),
            role,
            organization_id: None,
        }
    }

    fn make_signup(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: "Test User".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: None,
            organization_name: None,
            department: None,
        }
    }

    #[test]
    fn test_demo_candidate_login() {
        let auth = FallbackAuth::from_config(&FallbackConfig::default());
        let user = auth
            .authenticate("john@example.com", "candidate123", LoginContext::Candidate)
            .unwrap();
        assert_eq!(user.role, Role::Candidate);
        assert_eq!(user.email, "john@example.com");
    }

    #[test]
    fn test_context_partitioning() {
        let auth = FallbackAuth::from_config(&FallbackConfig::default());

        // Candidate-context logins never admit staff entries.
        assert!(
            auth.authenticate("admin@example.com", "admin123", LoginContext::Candidate)
                .is_none()
        );
        // Admin context admits both admins and examiners.
        assert!(
            auth.authenticate("admin@example.com", "admin123", LoginContext::Admin)
                .is_some()
        );
        assert!(
            auth.authenticate("emma@example.com", "examiner123", LoginContext::Admin)
                .is_some()
        );
        // Candidates do not log in through the admin surface.
        assert!(
            auth.authenticate("john@example.com", "candidate123", LoginContext::Admin)
                .is_none()
        );
    }

    #[test]
    fn test_wrong_password_rejected() {
        let auth = FallbackAuth::from_config(&FallbackConfig::default());
        assert!(
            auth.authenticate("john@example.com", "nope", LoginContext::Candidate)
                .is_none()
        );
    }

    #[test]
    fn test_disabled_never_matches() {
        let auth = FallbackAuth::from_config(&FallbackConfig {
            enabled: false,
            users: Vec::new(),
        });
        assert!(!auth.is_enabled());
        assert!(
            auth.authenticate("john@example.com", "candidate123", LoginContext::Candidate)
                .is_none()
        );
    }

    #[test]
    fn test_configured_users_replace_demo_set() {
        let auth = FallbackAuth::from_config(&FallbackConfig {
            enabled: true,
            users: vec![make_fallback_user(
                "usr_1",
                "Ops",
                "ops@corp.test",
                "s3cret!",
                Role::Admin,
            )],
        });
        assert!(
            auth.authenticate("ops@corp.test", "s3cret!", LoginContext::Admin)
                .is_some()
        );
        assert!(
            auth.authenticate("john@example.com", "candidate123", LoginContext::Candidate)
                .is_none()
        );
    }

    #[test]
    fn test_signup_validation() {
        assert!(validate_signup(&make_signup("new@example.com", "longenough")).is_ok());

        let err = validate_signup(&make_signup(RESERVED_SIGNUP_EMAIL, "longenough")).unwrap_err();
        assert_eq!(err, "An account with this email already exists");

        let err = validate_signup(&make_signup("new@example.com", "short")).unwrap_err();
        assert_eq!(err, "Password must be at least 6 characters");
    }
}
