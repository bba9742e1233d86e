use uuid::Uuid;

use crate::{
    backend::{
        client::{decode_row, encode_record, Backend},
        query::TableQuery,
    },
    error::Result,
    models::{
        profile::{StudentProfile, SuperadminProfile, TeacherProfile},
        role::Role,
        user::Profile,
    },
};

pub const PROFILES: &str = "profiles";
pub const STUDENTS: &str = "students";
pub const TEACHERS: &str = "teachers";
pub const SUPERADMINS: &str = "superadmin";

/// Finds the `profiles` row of a user.
pub async fn find_profile(
    backend: &dyn Backend,
    token: Option<&str>,
    user_id: Uuid,
) -> Result<Option<Profile>> {
    let query = TableQuery::from(PROFILES)
        .select("id, email, role")
        .eq("id", user_id);
    let row = backend.select(&query, token).await?.into_iter().next();
    Ok(row.map(decode_row).transpose()?)
}

/// Inserts the `profiles` row created at registration.
pub async fn create_profile(
    backend: &dyn Backend,
    token: Option<&str>,
    user_id: Uuid,
    email: &str,
    role: Role,
) -> Result<()> {
    let profile = Profile {
        id: user_id,
        email: Some(email.to_string()),
        role: role.as_str().to_string(),
    };
    backend
        .insert(PROFILES, vec![encode_record(&profile)?], token)
        .await?;
    Ok(())
}

/// Inserts the `students` row created at registration.
pub async fn create_student(
    backend: &dyn Backend,
    token: Option<&str>,
    student: &StudentProfile,
) -> Result<()> {
    backend
        .insert(STUDENTS, vec![encode_record(student)?], token)
        .await?;
    Ok(())
}

/// Inserts the `teachers` row created at registration.
pub async fn create_teacher(
    backend: &dyn Backend,
    token: Option<&str>,
    teacher: &TeacherProfile,
) -> Result<()> {
    backend
        .insert(TEACHERS, vec![encode_record(teacher)?], token)
        .await?;
    Ok(())
}

/// Finds a student's detail row.
pub async fn find_student(
    backend: &dyn Backend,
    token: Option<&str>,
    user_id: Uuid,
) -> Result<Option<StudentProfile>> {
    let query = TableQuery::from(STUDENTS).eq("user_id", user_id);
    let row = backend.select(&query, token).await?.into_iter().next();
    Ok(row.map(decode_row).transpose()?)
}

/// Finds a faculty member's detail row.
pub async fn find_teacher(
    backend: &dyn Backend,
    token: Option<&str>,
    user_id: Uuid,
) -> Result<Option<TeacherProfile>> {
    let query = TableQuery::from(TEACHERS).eq("user_id", user_id);
    let row = backend.select(&query, token).await?.into_iter().next();
    Ok(row.map(decode_row).transpose()?)
}

/// Finds a superadmin by email.
pub async fn find_superadmin(
    backend: &dyn Backend,
    token: Option<&str>,
    email: &str,
) -> Result<Option<SuperadminProfile>> {
    let query = TableQuery::from(SUPERADMINS)
        .select("id, name, email")
        .eq("email", email);
    let row = backend.select(&query, token).await?.into_iter().next();
    Ok(row.map(decode_row).transpose()?)
}

/// Name of a department, for dashboard headers.
pub async fn department_name(
    backend: &dyn Backend,
    token: Option<&str>,
    department_id: i64,
) -> Result<Option<String>> {
    let query = TableQuery::from(super::department::DEPARTMENTS)
        .select("name")
        .eq("id", department_id);
    let row = backend.select(&query, token).await?.into_iter().next();
    Ok(row.and_then(|r| {
        r.get("name")
            .and_then(|v| sonic_rs::JsonValueTrait::as_str(v).map(str::to_string))
    }))
}

/// Returns the role of `user_id`, or `None` if the row is missing or the value is unknown.
pub async fn find_role(
    backend: &dyn Backend,
    token: Option<&str>,
    user_id: Uuid,
) -> Result<Option<Role>> {
    let Some(profile) = find_profile(backend, token, user_id).await? else {
        tracing::warn!("❌ No profile row for user {}", user_id);
        return Ok(None);
    };

    match profile.role.parse::<Role>() {
        Ok(role) => Ok(Some(role)),
        Err(e) => {
            tracing::warn!("❌ Profile of {} has {}", user_id, e);
            Ok(None)
        }
    }
}
