//! Session context and typed capabilities
//!
//! Capabilities are derived once from the signed-in user's grade level and
//! system role, widened by any assistant delegations, and then carried in a
//! [`SessionContext`] that pages receive explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PortboardError, PortboardResult};
use crate::organization::{AssistantAssignment, OrganizationSnapshot, User};

pub const ROLE_SUPER_ADMIN: &str = "Super Admin";

/// Grade levels, most senior first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    /// Managing Director
    Mdcs,
    /// Executive Director
    Edcs,
    /// General Manager
    Mss1,
    /// Assistant General Manager
    Mss2,
    /// Principal Manager
    Mss3,
    /// Senior Manager
    Mss4,
}

impl Grade {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "MDCS" => Some(Grade::Mdcs),
            "EDCS" => Some(Grade::Edcs),
            "MSS1" => Some(Grade::Mss1),
            "MSS2" => Some(Grade::Mss2),
            "MSS3" => Some(Grade::Mss3),
            "MSS4" => Some(Grade::Mss4),
            _ => None,
        }
    }

    fn at_least(self, other: Grade) -> bool {
        // Declaration order is seniority order
        (self as u8) <= (other as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveLevel {
    Department,
    Division,
    Directorate,
}

impl fmt::Display for ArchiveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveLevel::Department => write!(f, "department"),
            ArchiveLevel::Division => write!(f, "division"),
            ArchiveLevel::Directorate => write!(f, "directorate"),
        }
    }
}

/// A single gate a page can require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Approvals,
    Analytics,
    ExecutiveDashboard,
    Administration,
    Reports,
    RegisterCorrespondence,
    DocumentManagement,
    Distribute,
    CorrespondenceRegistry,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Approvals => write!(f, "approvals access"),
            Capability::Analytics => write!(f, "analytics access"),
            Capability::ExecutiveDashboard => write!(f, "executive dashboard access"),
            Capability::Administration => write!(f, "administration access"),
            Capability::Reports => write!(f, "reports access"),
            Capability::RegisterCorrespondence => write!(f, "correspondence registration"),
            Capability::DocumentManagement => write!(f, "document management access"),
            Capability::Distribute => write!(f, "distribution rights"),
            Capability::CorrespondenceRegistry => write!(f, "correspondence registry access"),
        }
    }
}

/// What the current session may see and do
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_access_approvals: bool,
    pub can_access_analytics: bool,
    pub can_access_executive_dashboard: bool,
    pub can_access_administration: bool,
    pub can_access_reports: bool,
    pub can_register_correspondence: bool,
    pub can_access_document_management: bool,
    pub can_distribute: bool,
    pub can_view_correspondence_registry: bool,
    pub allowed_archive_levels: Vec<ArchiveLevel>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            can_access_approvals: false,
            can_access_analytics: false,
            can_access_executive_dashboard: false,
            can_access_administration: false,
            can_access_reports: false,
            can_register_correspondence: true,
            can_access_document_management: true,
            can_distribute: false,
            can_view_correspondence_registry: false,
            allowed_archive_levels: vec![ArchiveLevel::Department],
        }
    }
}

fn is_super_admin(user: &User) -> bool {
    user.is_superuser || user.system_role == ROLE_SUPER_ADMIN
}

impl Capabilities {
    /// Everything granted
    pub fn all() -> Self {
        Self {
            can_access_approvals: true,
            can_access_analytics: true,
            can_access_executive_dashboard: true,
            can_access_administration: true,
            can_access_reports: true,
            can_register_correspondence: true,
            can_access_document_management: true,
            can_distribute: true,
            can_view_correspondence_registry: true,
            allowed_archive_levels: vec![
                ArchiveLevel::Department,
                ArchiveLevel::Division,
                ArchiveLevel::Directorate,
            ],
        }
    }

    /// Derives capabilities from grade level and system role
    pub fn for_user(user: Option<&User>) -> Self {
        let Some(user) = user else {
            return Self::default();
        };
        if is_super_admin(user) {
            return Self::all();
        }

        let mut caps = Self::default();
        let Some(grade) = Grade::parse(&user.grade_level) else {
            return caps;
        };

        caps.can_access_approvals = grade.at_least(Grade::Mss4);
        caps.can_access_analytics = grade.at_least(Grade::Mss2);
        caps.can_access_reports = grade.at_least(Grade::Mss2);
        caps.can_access_executive_dashboard = grade.at_least(Grade::Edcs);
        caps.can_access_administration = grade.at_least(Grade::Mss1);
        caps.can_distribute = grade.at_least(Grade::Mss3);
        caps.can_view_correspondence_registry = grade.at_least(Grade::Mss2);

        if grade.at_least(Grade::Mss1) {
            caps.allowed_archive_levels.push(ArchiveLevel::Division);
        }
        if grade.at_least(Grade::Edcs) {
            caps.allowed_archive_levels.push(ArchiveLevel::Directorate);
        }

        caps
    }

    /// Widens capabilities with the user's assistant delegations
    ///
    /// Delegations only ever add capabilities.
    pub fn with_assignments(mut self, user: &User, assignments: &[AssistantAssignment]) -> Self {
        let delegated: Vec<&str> = assignments
            .iter()
            .filter(|a| a.assistant_id == user.id)
            .flat_map(|a| a.permissions.iter().map(String::as_str))
            .collect();

        if delegated.contains(&"forward") {
            self.can_distribute = true;
            self.can_access_approvals = true;
        }
        if delegated.contains(&"draft") {
            self.can_register_correspondence = true;
        }
        if delegated.iter().any(|p| *p == "view" || *p == "coordinate") {
            self.can_access_document_management = true;
        }

        if is_super_admin(user) {
            return Self::all();
        }
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Approvals => self.can_access_approvals,
            Capability::Analytics => self.can_access_analytics,
            Capability::ExecutiveDashboard => self.can_access_executive_dashboard,
            Capability::Administration => self.can_access_administration,
            Capability::Reports => self.can_access_reports,
            Capability::RegisterCorrespondence => self.can_register_correspondence,
            Capability::DocumentManagement => self.can_access_document_management,
            Capability::Distribute => self.can_distribute,
            Capability::CorrespondenceRegistry => self.can_view_correspondence_registry,
        }
    }

    pub fn can_archive_at(&self, level: ArchiveLevel) -> bool {
        self.allowed_archive_levels.contains(&level)
    }
}

/// Merges the identity reported by the auth endpoint with the organization's record
///
/// Organization unit ids come from the organization record when it has them;
/// role and grade come from the remote identity when non-empty; `active`
/// always follows the organization.
pub fn resolve_current_user(remote: &User, org: &OrganizationSnapshot) -> User {
    let org_match = org.users.iter().find(|candidate| {
        candidate.id == remote.id
            || (remote.username.is_some() && candidate.username == remote.username)
    });

    let Some(org_user) = org_match else {
        return remote.clone();
    };

    let mut merged = remote.clone();
    merged.directorate = org_user.directorate.clone().or_else(|| remote.directorate.clone());
    merged.division = org_user.division.clone().or_else(|| remote.division.clone());
    merged.department = org_user.department.clone().or_else(|| remote.department.clone());
    if merged.system_role.is_empty() {
        merged.system_role = org_user.system_role.clone();
    }
    if merged.grade_level.is_empty() {
        merged.grade_level = org_user.grade_level.clone();
    }
    if merged.email.is_empty() {
        merged.email = org_user.email.clone();
    }
    if merged.employee_id.is_empty() {
        merged.employee_id = org_user.employee_id.clone();
    }
    merged.active = org_user.active;
    merged
}

/// Read-only state every page is handed
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: Option<User>,
    pub capabilities: Capabilities,
    pub organization: OrganizationSnapshot,
}

impl SessionContext {
    /// Builds the session for a signed-in (or anonymous) user
    pub fn new(
        user: Option<User>,
        organization: OrganizationSnapshot,
        assignments: &[AssistantAssignment],
    ) -> Self {
        let base = Capabilities::for_user(user.as_ref());
        let capabilities = match &user {
            Some(u) => base.with_assignments(u, assignments),
            None => base,
        };
        tracing::debug!(
            user = user.as_ref().map(|u| u.id.as_str()).unwrap_or("anonymous"),
            registry = capabilities.can_view_correspondence_registry,
            "session established"
        );
        Self {
            user,
            capabilities,
            organization,
        }
    }

    /// Gate for restricted pages
    pub fn require(&self, capability: Capability) -> PortboardResult<()> {
        if self.capabilities.has(capability) {
            Ok(())
        } else {
            Err(PortboardError::PermissionDenied(capability))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(grade: &str) -> User {
        let mut u = User::new("u1", "Test User");
        u.grade_level = grade.into();
        u
    }

    #[test]
    fn test_anonymous_defaults() {
        let caps = Capabilities::for_user(None);
        assert!(caps.can_register_correspondence);
        assert!(caps.can_access_document_management);
        assert!(!caps.can_access_approvals);
        assert!(!caps.can_view_correspondence_registry);
        assert_eq!(caps.allowed_archive_levels, vec![ArchiveLevel::Department]);
    }

    #[test]
    fn test_managing_director() {
        let caps = Capabilities::for_user(Some(&graded("MDCS")));
        assert_eq!(caps, Capabilities::all());
    }

    #[test]
    fn test_general_manager() {
        let caps = Capabilities::for_user(Some(&graded("MSS1")));
        assert!(caps.can_access_administration);
        assert!(caps.can_access_analytics);
        assert!(!caps.can_access_executive_dashboard);
        assert!(caps.can_archive_at(ArchiveLevel::Division));
        assert!(!caps.can_archive_at(ArchiveLevel::Directorate));
    }

    #[test]
    fn test_registry_from_agm_up() {
        assert!(Capabilities::for_user(Some(&graded("MSS2"))).can_view_correspondence_registry);
        assert!(!Capabilities::for_user(Some(&graded("MSS3"))).can_view_correspondence_registry);
    }

    #[test]
    fn test_principal_and_senior_manager() {
        let pm = Capabilities::for_user(Some(&graded("MSS3")));
        assert!(pm.can_access_approvals);
        assert!(pm.can_distribute);
        assert!(!pm.can_access_reports);

        let sm = Capabilities::for_user(Some(&graded("mss4")));
        assert!(sm.can_access_approvals);
        assert!(!sm.can_distribute);
    }

    #[test]
    fn test_unknown_grade_gets_defaults() {
        assert_eq!(Capabilities::for_user(Some(&graded("Officer"))), Capabilities::default());
    }

    #[test]
    fn test_super_admin_role() {
        let mut u = graded("");
        u.system_role = ROLE_SUPER_ADMIN.into();
        assert_eq!(Capabilities::for_user(Some(&u)), Capabilities::all());
    }

    #[test]
    fn test_assignments_only_widen() {
        let user = graded("MSS4");
        let assignments = vec![
            AssistantAssignment {
                assistant_id: "u1".into(),
                principal_id: "gm".into(),
                permissions: vec!["forward".into()],
            },
            AssistantAssignment {
                assistant_id: "someone-else".into(),
                principal_id: "gm".into(),
                permissions: vec!["draft".into()],
            },
        ];
        let caps = Capabilities::for_user(Some(&user)).with_assignments(&user, &assignments);
        assert!(caps.can_distribute);
        assert!(caps.can_access_approvals);

        let none = Capabilities::for_user(Some(&user)).with_assignments(&user, &[]);
        assert_eq!(none, Capabilities::for_user(Some(&user)));
    }

    #[test]
    fn test_require_gates() {
        let session = SessionContext::new(Some(graded("MSS3")), OrganizationSnapshot::new(), &[]);
        assert!(session.require(Capability::Approvals).is_ok());
        let err = session.require(Capability::CorrespondenceRegistry).unwrap_err();
        assert!(matches!(err, PortboardError::PermissionDenied(Capability::CorrespondenceRegistry)));
    }

    #[test]
    fn test_resolve_current_user_merges() {
        let mut org_user = User::new("u1", "Ada Obi");
        org_user.division = Some("div-ict".into());
        org_user.grade_level = "MSS2".into();
        org_user.active = false;
        let org = OrganizationSnapshot {
            users: vec![org_user],
            ..Default::default()
        };

        let mut remote = User::new("u1", "Ada O.");
        remote.system_role = "Officer".into();
        let merged = resolve_current_user(&remote, &org);
        assert_eq!(merged.name, "Ada O.");
        assert_eq!(merged.division.as_deref(), Some("div-ict"));
        assert_eq!(merged.grade_level, "MSS2");
        assert_eq!(merged.system_role, "Officer");
        assert!(!merged.active);

        let stranger = User::new("u9", "Nobody");
        assert_eq!(resolve_current_user(&stranger, &org), stranger);
    }
}
