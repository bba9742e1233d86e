use garde::Validate;
use serde::{Deserialize, Serialize};

/// A head-of-department account (row of the `admin` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub qualification: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A row of the `department` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub admin_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A department with its owning admin joined in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentView {
    #[serde(flatten)]
    pub department: Department,
    pub admin: Option<Admin>,
}

/// Fields submitted when creating or editing a department.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DepartmentDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub admin_id: Option<i64>,
}

/// Fields of a new `admin` row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminDraft {
    pub name: String,
    pub email: String,
    pub qualification: String,
}

/// Fields submitted when editing an admin.
///
/// The email is the admin's login identity and cannot be changed here.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AdminEdit {
    #[serde(default)]
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[garde(length(max = 255))]
    pub qualification: String,
}
