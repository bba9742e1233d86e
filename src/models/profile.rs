use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of the `students` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    pub user_id: Uuid,
    pub name: String,
    pub registration_number: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department_id: Option<i64>,
    #[serde(default)]
    pub class_id: Option<i64>,
    /// Academic session, e.g. "2023-2027".
    #[serde(default)]
    pub session: Option<String>,
}

/// Row of the `teachers` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub user_id: Uuid,
    pub name: String,
    pub faculty_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department_id: Option<i64>,
}

/// Row of the `superadmin` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperadminProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
}
