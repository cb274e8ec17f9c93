//! Static route permission table.
//!
//! Every role-restricted surface consults this table. Lookup is first
//! exact path match; a path with no entry is admin-only, so a surface
//! nobody thought about never opens up to a wider audience.

use crate::claims::Role;

/// A protected route and the roles allowed to enter it.
#[derive(Debug, Clone, Copy)]
pub struct RoutePermission {
    pub path: &'static str,
    pub allowed_roles: &'static [Role],
    pub description: &'static str,
}

/// Ordered permission table. The first exact path match wins; entries are
/// assumed non-overlapping by convention.
pub const ROUTE_PERMISSIONS: &[RoutePermission] = &[
    RoutePermission {
        path: "/dashboard",
        allowed_roles: &[Role::Admin, Role::Examiner],
        description: "Organization dashboard overview",
    },
    RoutePermission {
        path: "/dashboard/candidates",
        allowed_roles: &[Role::Admin, Role::Examiner],
        description: "Candidate management",
    },
    RoutePermission {
        path: "/dashboard/exams",
        allowed_roles: &[Role::Admin, Role::Examiner],
        description: "Exam authoring and scheduling",
    },
    RoutePermission {
        path: "/dashboard/reports",
        allowed_roles: &[Role::Admin, Role::Examiner],
        description: "Assessment reports",
    },
    RoutePermission {
        path: "/dashboard/settings",
        allowed_roles: &[Role::Admin],
        description: "Organization settings",
    },
    RoutePermission {
        path: "/exams",
        allowed_roles: &[Role::Candidate],
        description: "Assigned exam list",
    },
    RoutePermission {
        path: "/exam",
        allowed_roles: &[Role::Candidate],
        description: "Exam taking environment",
    },
    RoutePermission {
        path: "/results",
        allowed_roles: &[Role::Candidate],
        description: "Candidate results",
    },
];

/// Look up the table entry for a path.
pub fn find(path: &str) -> Option<&'static RoutePermission> {
    ROUTE_PERMISSIONS.iter().find(|entry| entry.path == path)
}

/// Whether `role` may access `path`. Paths not present in the table are
/// restricted to admins.
pub fn evaluate(path: &str, role: Role) -> bool {
    match find(path) {
        Some(entry) => entry.allowed_roles.contains(&role),
        None => role == Role::Admin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_lookup() {
        let entry = find("/dashboard/settings").unwrap();
        assert_eq!(entry.allowed_roles, &[Role::Admin]);
        assert!(find("/dashboard/unknown").is_none());
    }

    #[test]
    fn test_examiner_denied_on_settings() {
        assert!(evaluate("/dashboard/settings", Role::Admin));
        assert!(!evaluate("/dashboard/settings", Role::Examiner));
        assert!(!evaluate("/dashboard/settings", Role::Candidate));
    }

    #[test]
    fn test_candidate_surfaces() {
        assert!(evaluate("/exams", Role::Candidate));
        assert!(evaluate("/exam", Role::Candidate));
        assert!(evaluate("/results", Role::Candidate));
        assert!(!evaluate("/exams", Role::Examiner));
    }

    #[test]
    fn test_unknown_path_is_admin_only() {
        assert!(evaluate("/billing", Role::Admin));
        assert!(!evaluate("/billing", Role::Examiner));
        assert!(!evaluate("/billing", Role::Candidate));
    }

    #[test]
    fn test_no_prefix_matching() {
        // "/exam" admits candidates, but lookup is exact, so a longer
        // path falls through to the admin-only default.
        assert!(!evaluate("/exam/123", Role::Candidate));
        assert!(evaluate("/exam/123", Role::Admin));
    }
}
