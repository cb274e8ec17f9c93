//! Identity types shared across the session layer: roles, token claims,
//! and the user projection exposed to callers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// User roles within the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform administrator with full dashboard access.
    Admin,
    /// Examiner managing candidates and exams for an organization.
    Examiner,
    /// Candidate taking exams.
    #[default]
    Candidate,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Examiner => write!(f, "examiner"),
            Role::Candidate => write!(f, "candidate"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "examiner" => Ok(Role::Examiner),
            "candidate" => Ok(Role::Candidate),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// Claims carried inside a session token.
///
/// A token is the base64 encoding of this structure serialized as JSON.
/// Field names follow the identity service's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Email address
    pub email: String,
    /// Display name
    pub name: String,
    /// Role granted to this session
    pub role: Role,
    /// Organization the user belongs to, if any
    #[serde(
        rename = "organizationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub organization_id: Option<String>,
    /// Expiration timestamp (Unix seconds)
    pub exp: i64,
}

/// User identity as the session layer exposes it to the rest of the client.
///
/// This is the claims set minus the expiry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(
        rename = "organizationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub organization_id: Option<String>,
}

impl SessionUser {
    /// Whether this user holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
            organization_id: claims.organization_id,
        }
    }
}
