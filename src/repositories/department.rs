use crate::{
    backend::{
        client::{decode_rows, encode_record, Backend},
        query::{Direction, TableQuery},
    },
    error::{AppError, Result},
    models::department::{Department, DepartmentDraft},
};

pub const DEPARTMENTS: &str = "department";

#[derive(serde::Serialize)]
struct DepartmentRow<'a> {
    name: &'a str,
    admin_id: Option<i64>,
}

/// Lists every department, newest first.
pub async fn list_departments(backend: &dyn Backend, token: Option<&str>) -> Result<Vec<Department>> {
    let query = TableQuery::from(DEPARTMENTS)
        .select("id, name, admin_id, created_at")
        .order("created_at", Direction::Desc);
    Ok(decode_rows(backend.select(&query, token).await?)?)
}

/// Inserts a department.
pub async fn create_department(
    backend: &dyn Backend,
    token: Option<&str>,
    draft: &DepartmentDraft,
) -> Result<()> {
    let row = DepartmentRow {
        name: draft.name.trim(),
        admin_id: draft.admin_id,
    };
    backend
        .insert(DEPARTMENTS, vec![encode_record(&row)?], token)
        .await?;
    Ok(())
}

/// Updates name and admin of department `id`.
pub async fn update_department(
    backend: &dyn Backend,
    token: Option<&str>,
    id: i64,
    draft: &DepartmentDraft,
) -> Result<()> {
    let row = DepartmentRow {
        name: draft.name.trim(),
        admin_id: draft.admin_id,
    };
    let query = TableQuery::from(DEPARTMENTS).eq("id", id);
    let updated = backend.update(&query, encode_record(&row)?, token).await?;
    if updated.is_empty() {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Deletes department `id`.
pub async fn delete_department(backend: &dyn Backend, token: Option<&str>, id: i64) -> Result<()> {
    let query = TableQuery::from(DEPARTMENTS).eq("id", id);
    let deleted = backend.delete(&query, token).await?;
    if deleted.is_empty() {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Departments headed by admin `admin_id`.
pub async fn list_for_admin(
    backend: &dyn Backend,
    token: Option<&str>,
    admin_id: i64,
) -> Result<Vec<Department>> {
    let query = TableQuery::from(DEPARTMENTS)
        .select("id, name, admin_id, created_at")
        .eq("admin_id", admin_id)
        .order("name", Direction::Asc);
    Ok(decode_rows(backend.select(&query, token).await?)?)
}
