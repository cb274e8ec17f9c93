//! Remote identity service client.
//!
//! [`AuthGateway`] performs login and signup against the identity service
//! and nothing else: it never touches session state. Callers decide
//! whether to commit a granted session. When the service cannot be
//! reached the gateway degrades to Fallback Authentication Mode; a
//! rejection from a reachable service is final and never falls back.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::claims::{Role, SessionUser};
use crate::config::SessionConfig;
use crate::fallback::{self, FallbackAuth};
use crate::token::{self, TokenError};

/// Which login surface the user is on. The identity service scopes its
/// account lookup by it; fallback mode partitions the credential table
/// by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginContext {
    Admin,
    Candidate,
}

impl LoginContext {
    /// Roles this context is allowed to authenticate.
    pub fn admits(self, role: Role) -> bool {
        match self {
            LoginContext::Admin => matches!(role, Role::Admin | Role::Examiner),
            LoginContext::Candidate => role == Role::Candidate,
        }
    }
}

impl fmt::Display for LoginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginContext::Admin => write!(f, "admin"),
            LoginContext::Candidate => write!(f, "candidate"),
        }
    }
}

impl FromStr for LoginContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(LoginContext::Admin),
            "candidate" => Ok(LoginContext::Candidate),
            _ => Err(format!("unknown login context: {}", s)),
        }
    }
}

/// Login form contents.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// Signup form contents. Serializes to the identity service's wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
    user_type: LoginContext,
}

/// Response shape shared by the login and signup endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A granted session: the token and the user it authenticates.
#[derive(Debug, Clone)]
pub struct GrantedSession {
    pub token: String,
    pub user: SessionUser,
}

/// The verdict of an authentication attempt.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Credentials accepted; a session was issued.
    Granted(GrantedSession),
    /// Credentials or signup data rejected, with a user-facing message.
    Denied(String),
}

/// Failures that prevent the gateway from reaching a verdict.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),

    /// The identity service could not be reached and fallback
    /// authentication is disabled.
    #[error("identity service unreachable: {0}")]
    Unavailable(#[source] reqwest::Error),

    /// The service answered, but the body was not an auth response.
    #[error("unreadable identity service response: {0}")]
    InvalidResponse(#[source] reqwest::Error),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Client for the identity service's auth endpoints.
#[derive(Debug, Clone)]
pub struct AuthGateway {
    http: reqwest::Client,
    base_url: String,
    fallback: FallbackAuth,
}

impl AuthGateway {
    pub fn from_config(config: &SessionConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()
            .map_err(GatewayError::Client)?;
        Ok(Self {
            http,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            fallback: FallbackAuth::from_config(&config.fallback),
        })
    }

    /// Attempt a login. A verdict from a reachable service is final; only
    /// a transport failure (unreachable host, refused connection, timeout)
    /// switches to fallback authentication.
    pub async fn login(
        &self,
        credentials: &LoginCredentials,
        context: LoginContext,
    ) -> Result<AuthOutcome, GatewayError> {
        let url = format!("{}/auth/login", self.base_url);
        let body = LoginBody {
            email: &credentials.email,
            password: &credentials.password,
            user_type: context,
        };

        let response = match self.http.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => return self.fallback_login(credentials, context, err),
        };

        match response.json::<AuthResponse>().await {
            Ok(parsed) => Ok(outcome_from_response(parsed, "Login failed")),
            Err(err) if err.is_timeout() => self.fallback_login(credentials, context, err),
            Err(err) => Err(GatewayError::InvalidResponse(err)),
        }
    }

    /// Attempt a signup. Validation happens remotely; the local checks in
    /// [`fallback`] run only when the service is unreachable.
    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthOutcome, GatewayError> {
        let url = format!("{}/auth/signup", self.base_url);

        let response = match self.http.post(&url).json(request).send().await {
            Ok(response) => response,
            Err(err) => return self.fallback_signup(request, err),
        };

        match response.json::<AuthResponse>().await {
            Ok(parsed) => Ok(outcome_from_response(parsed, "Signup failed")),
            Err(err) if err.is_timeout() => self.fallback_signup(request, err),
            Err(err) => Err(GatewayError::InvalidResponse(err)),
        }
    }

    fn fallback_login(
        &self,
        credentials: &LoginCredentials,
        context: LoginContext,
        cause: reqwest::Error,
    ) -> Result<AuthOutcome, GatewayError> {
        if !self.fallback.is_enabled() {
            return Err(GatewayError::Unavailable(cause));
        }
        warn!(error = %cause, "identity service unreachable, trying fallback authentication");

        match self
            .fallback
            .authenticate(&credentials.email, &credentials.password, context)
        {
            Some(user) => {
                let token = token::issue(&user)?;
                warn!(email = %user.email, role = %user.role, "fallback session granted");
                Ok(AuthOutcome::Granted(GrantedSession { token, user }))
            }
            None => Ok(AuthOutcome::Denied("Invalid email or password".to_string())),
        }
    }

    fn fallback_signup(
        &self,
        request: &SignupRequest,
        cause: reqwest::Error,
    ) -> Result<AuthOutcome, GatewayError> {
        if !self.fallback.is_enabled() {
            return Err(GatewayError::Unavailable(cause));
        }
        warn!(error = %cause, "identity service unreachable, validating signup locally");

        if let Err(message) = fallback::validate_signup(request) {
            return Ok(AuthOutcome::Denied(message));
        }

        let user = SessionUser {
            id: Uuid::new_v4().to_string(),
            email: request.email.clone(),
            name: request.name.clone(),
            role: request.role.unwrap_or_default(),
            organization_id: None,
        };
        let token = token::issue(&user)?;
        warn!(email = %user.email, "fallback signup accepted");
        Ok(AuthOutcome::Granted(GrantedSession { token, user }))
    }
}

fn outcome_from_response(response: AuthResponse, failure_message: &str) -> AuthOutcome {
    let AuthResponse {
        success,
        token,
        user,
        error,
    } = response;
    match (success, token, user) {
        (true, Some(token), Some(user)) => AuthOutcome::Granted(GrantedSession { token, user }),
        _ => AuthOutcome::Denied(error.unwrap_or_else(|| failure_message.to_string())),
    }
}
