use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability tier that decides which dashboard a user may view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
    Superadmin,
}

impl Role {
    /// Name stored in the `profiles.role` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Human-readable label used in forms and headers.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Faculty => "Faculty",
            Role::Admin => "Admin",
            Role::Superadmin => "Super Admin",
        }
    }

    /// Where a freshly logged-in user of this role lands.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Student => "/studentdashboard",
            Role::Faculty => "/facultydashboard",
            Role::Admin => "/dashboard",
            Role::Superadmin => "/superadmindashboard",
        }
    }

    /// Roles that can be picked on the login form.
    pub const ALL: [Role; 4] = [Role::Student, Role::Faculty, Role::Admin, Role::Superadmin];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored role is outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            // Older rows use "teacher" for faculty accounts.
            "faculty" | "teacher" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_set_case_insensitively() {
        assert_eq!("Student".parse::<Role>(), Ok(Role::Student));
        assert_eq!(" SUPERADMIN ".parse::<Role>(), Ok(Role::Superadmin));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
    }

    #[test]
    fn teacher_is_faculty() {
        assert_eq!("teacher".parse::<Role>(), Ok(Role::Faculty));
        assert_eq!(Role::Faculty.as_str(), "faculty");
    }

    #[test]
    fn rejects_values_outside_the_set() {
        assert!("root".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn every_role_has_a_dashboard() {
        for role in Role::ALL {
            assert!(role.dashboard_path().starts_with('/'));
        }
        assert_eq!(Role::Admin.dashboard_path(), "/dashboard");
    }
}
