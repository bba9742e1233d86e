use crate::{
    backend::{
        client::{decode_rows, encode_record, Backend},
        query::{Direction, TableQuery},
    },
    error::{AppError, Result},
    models::department::{Admin, AdminDraft, AdminEdit},
};

pub const ADMINS: &str = "admin";

#[derive(serde::Serialize)]
struct AdminRow<'a> {
    name: &'a str,
    email: &'a str,
    qualification: &'a str,
}

#[derive(serde::Serialize)]
struct AdminEditRow<'a> {
    name: &'a str,
    qualification: &'a str,
}

/// Lists every admin ordered by name.
pub async fn list_admins(backend: &dyn Backend, token: Option<&str>) -> Result<Vec<Admin>> {
    let query = TableQuery::from(ADMINS)
        .select("id, name, email, qualification, created_at")
        .order("name", Direction::Asc);
    Ok(decode_rows(backend.select(&query, token).await?)?)
}

/// Whether an admin with `email` exists.
pub async fn email_taken(backend: &dyn Backend, token: Option<&str>, email: &str) -> Result<bool> {
    let query = TableQuery::from(ADMINS).select("email").eq("email", email);
    Ok(!backend.select(&query, token).await?.is_empty())
}

/// Inserts an admin and returns the stored row.
pub async fn create_admin(
    backend: &dyn Backend,
    token: Option<&str>,
    draft: &AdminDraft,
) -> Result<Admin> {
    let row = AdminRow {
        name: draft.name.trim(),
        email: draft.email.trim(),
        qualification: draft.qualification.trim(),
    };
    let inserted = backend
        .insert(ADMINS, vec![encode_record(&row)?], token)
        .await?;
    decode_rows::<Admin>(inserted)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("Admin insert returned no row".to_string()))
}

/// Updates the name and qualification of admin `id`.
pub async fn update_admin(
    backend: &dyn Backend,
    token: Option<&str>,
    id: i64,
    edit: &AdminEdit,
) -> Result<()> {
    let row = AdminEditRow {
        name: edit.name.trim(),
        qualification: edit.qualification.trim(),
    };
    let query = TableQuery::from(ADMINS).eq("id", id);
    if backend.update(&query, encode_record(&row)?, token).await?.is_empty() {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Deletes admin `id`.
pub async fn delete_admin(backend: &dyn Backend, token: Option<&str>, id: i64) -> Result<()> {
    let query = TableQuery::from(ADMINS).eq("id", id);
    if backend.delete(&query, token).await?.is_empty() {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// Finds the admin row of a signed-in admin account.
pub async fn find_by_email(
    backend: &dyn Backend,
    token: Option<&str>,
    email: &str,
) -> Result<Option<Admin>> {
    let query = TableQuery::from(ADMINS)
        .select("id, name, email, qualification, created_at")
        .eq("email", email);
    Ok(decode_rows::<Admin>(backend.select(&query, token).await?)?
        .into_iter()
        .next())
}
