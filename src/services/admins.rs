use garde::Validate;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    backend::{client::Backend, query::TableQuery},
    error::{AppError, Result},
    models::{
        department::{Admin, AdminDraft, AdminEdit},
        role::Role,
    },
    repositories::{admin as admin_repo, profile as profile_repo},
    services::departments::{Confirmation, DeleteOutcome},
};

/// Form for creating a head-of-department account.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAdmin {
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    #[garde(length(max = 255))]
    pub qualification: String,
}

/// Creates an admin row, its login and its `profiles` row.
///
/// # Arguments
///
/// * `backend` - The auth and data backend.
/// * `token` - The superadmin's access token.
/// * `form` - The submitted admin form.
///
/// # Returns
///
/// The stored `admin` row. The row is removed again if the sign-up is
/// rejected.
pub async fn create_admin(backend: &dyn Backend, token: &str, form: NewAdmin) -> Result<Admin> {
    form.validate()?;
    let email = form.email.trim().to_lowercase();
    if form.name.trim().is_empty() {
        return Err(AppError::Validation("Name cannot be empty".to_string()));
    }

    if admin_repo::email_taken(backend, Some(token), &email).await? {
        return Err(AppError::Validation(
            "An admin with this email already exists".to_string(),
        ));
    }

    let draft = AdminDraft {
        name: form.name,
        email: email.clone(),
        qualification: form.qualification,
    };
    let admin = admin_repo::create_admin(backend, Some(token), &draft).await?;
    tracing::debug!("📝 Admin row {} created for {}", admin.id, email);

    let metadata = sonic_rs::json!({ "user_role": Role::Admin.as_str() });
    let user = match backend.sign_up(&email, &form.password, metadata).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("❌ Sign-up failed for admin {}: {}", email, e);
            let query = TableQuery::from(admin_repo::ADMINS).eq("id", admin.id);
            if let Err(cleanup) = backend.delete(&query, Some(token)).await {
                tracing::error!("❌ Could not remove orphan admin row {}: {}", admin.id, cleanup);
            }
            return Err(e.into());
        }
    };

    profile_repo::create_profile(backend, Some(token), user.id, &email, Role::Admin).await?;
    tracing::info!("✅ Admin created: {} ({})", admin.id, user.id);
    Ok(admin)
}

/// View-model behind the head-of-department list.
pub struct AdminBoard {
    backend: Arc<dyn Backend>,
    token: String,
    admins: Vec<Admin>,
}

impl AdminBoard {
    pub fn new(backend: Arc<dyn Backend>, token: impl Into<String>) -> Self {
        Self {
            backend,
            token: token.into(),
            admins: Vec::new(),
        }
    }

    pub async fn load(&mut self) -> Result<()> {
        self.admins = admin_repo::list_admins(self.backend.as_ref(), Some(&self.token)).await?;
        Ok(())
    }

    pub fn admins(&self) -> &[Admin] {
        &self.admins
    }

    /// Admins whose name, email or qualification contains `term`, ignoring case.
    pub fn filtered(&self, term: &str) -> Vec<Admin> {
        let term = term.trim().to_lowercase();
        self.admins
            .iter()
            .filter(|a| {
                term.is_empty()
                    || [&a.name, &a.email, &a.qualification]
                        .iter()
                        .any(|field| field.to_lowercase().contains(&term))
            })
            .cloned()
            .collect()
    }

    /// Writes `edit` to admin `id` and mirrors it locally once accepted.
    ///
    /// The email stays as it was created, since the admin dashboard finds its
    /// row by the login email.
    pub async fn update(&mut self, id: i64, edit: AdminEdit) -> Result<()> {
        edit.validate()?;
        if edit.name.trim().is_empty() {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }
        if !self.admins.iter().any(|a| a.id == id) {
            return Err(AppError::NotFound);
        }

        admin_repo::update_admin(self.backend.as_ref(), Some(&self.token), id, &edit).await?;
        if let Some(admin) = self.admins.iter_mut().find(|a| a.id == id) {
            admin.name = edit.name.trim().to_string();
            admin.qualification = edit.qualification.trim().to_string();
        }
        tracing::info!("✅ Admin {} updated", id);
        Ok(())
    }

    /// Deletes admin `id` if the user confirmed.
    pub async fn delete(&mut self, id: i64, confirmation: Confirmation) -> Result<DeleteOutcome> {
        if confirmation == Confirmation::Declined {
            return Ok(DeleteOutcome::Declined);
        }
        admin_repo::delete_admin(self.backend.as_ref(), Some(&self.token), id).await?;
        self.admins.retain(|a| a.id != id);
        tracing::info!("🗑️ Admin {} deleted", id);
        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::repositories::{admin::ADMINS, profile::PROFILES};
    use sonic_rs::{json, JsonValueTrait};

    fn seeded() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            ADMINS,
            vec![
                json!({"id": 1, "name": "Dr. Rao", "email": "rao@uni.edu", "qualification": "PhD Physics"}),
                json!({"id": 2, "name": "Dr. Iyer", "email": "iyer@uni.edu", "qualification": "MTech"}),
            ],
        );
        backend
    }

    fn new_admin(email: &str) -> NewAdmin {
        NewAdmin {
            name: "Dr. Menon".into(),
            email: email.into(),
            password: "hod-pass-123".into(),
            qualification: "PhD".into(),
        }
    }

    #[tokio::test]
    async fn create_admin_inserts_row_login_and_profile() {
        let backend = seeded();
        let admin = create_admin(backend.as_ref(), "token", new_admin("Menon@Uni.edu"))
            .await
            .unwrap();
        assert_eq!(admin.email, "menon@uni.edu");
        assert_eq!(backend.rows(ADMINS).len(), 3);

        let profiles = backend.rows(PROFILES);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].get("role").and_then(|v| v.as_str()), Some("admin"));

        let session = backend
            .sign_in_with_password("menon@uni.edu", "hod-pass-123")
            .await
            .unwrap();
        assert_eq!(
            profiles[0].get("id").and_then(|v| v.as_str()),
            Some(session.user.id.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn create_admin_rejects_taken_email() {
        let backend = seeded();
        let err = create_admin(backend.as_ref(), "token", new_admin("rao@uni.edu"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "An admin with this email already exists");
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test]
    async fn create_admin_validates_form() {
        let backend = seeded();
        let mut form = new_admin("not-an-email");
        assert!(create_admin(backend.as_ref(), "token", form.clone()).await.is_err());
        form.email = "ok@uni.edu".into();
        form.password = "short".into();
        assert!(create_admin(backend.as_ref(), "token", form).await.is_err());
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test]
    async fn failed_sign_up_removes_the_admin_row() {
        let backend = seeded();
        backend.add_account("menon@uni.edu", "whatever-123");
        assert!(create_admin(backend.as_ref(), "token", new_admin("menon@uni.edu"))
            .await
            .is_err());
        assert_eq!(backend.rows(ADMINS).len(), 2);
        assert!(backend.rows(PROFILES).is_empty());
    }

    #[tokio::test]
    async fn filter_covers_name_email_and_qualification() {
        let backend = seeded();
        let mut board = AdminBoard::new(backend.clone(), "token");
        board.load().await.unwrap();
        assert_eq!(board.admins()[0].name, "Dr. Iyer");
        assert_eq!(board.filtered("physics").len(), 1);
        assert_eq!(board.filtered("IYER@").len(), 1);
        assert_eq!(board.filtered("dr.").len(), 2);
    }

    #[tokio::test]
    async fn update_changes_only_that_admin() {
        let backend = seeded();
        let mut board = AdminBoard::new(backend.clone(), "token");
        board.load().await.unwrap();
        board
            .update(
                1,
                AdminEdit {
                    name: "Prof. Rao".into(),
                    qualification: "PhD".into(),
                },
            )
            .await
            .unwrap();

        let rao = board.admins().iter().find(|a| a.id == 1).unwrap();
        assert_eq!(rao.name, "Prof. Rao");
        let iyer = board.admins().iter().find(|a| a.id == 2).unwrap();
        assert_eq!(iyer.name, "Dr. Iyer");
        assert_eq!(backend.writes(), 1);
    }

    #[tokio::test]
    async fn failed_update_keeps_local_row() {
        let backend = seeded();
        let mut board = AdminBoard::new(backend.clone(), "token");
        board.load().await.unwrap();
        backend.fail_next_write("permission denied");
        let edit = AdminEdit {
            name: "Prof. Rao".into(),
            qualification: "PhD".into(),
        };
        assert!(board.update(1, edit).await.is_err());
        assert_eq!(board.admins().iter().find(|a| a.id == 1).unwrap().name, "Dr. Rao");
    }

    #[tokio::test]
    async fn edited_admin_is_still_found_by_login_email() {
        let backend = seeded();
        let created = create_admin(backend.as_ref(), "token", new_admin("menon@uni.edu"))
            .await
            .unwrap();
        let mut board = AdminBoard::new(backend.clone(), "token");
        board.load().await.unwrap();

        // A client that still sends an email gets it ignored.
        let edit: AdminEdit = sonic_rs::from_str(
            r#"{"name": "Prof. Menon", "email": "Rao@Uni.edu", "qualification": "DSc"}"#,
        )
        .unwrap();
        board.update(created.id, edit).await.unwrap();

        let found = admin_repo::find_by_email(backend.as_ref(), Some("token"), "menon@uni.edu")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.name, "Prof. Menon");
        assert_eq!(found.qualification, "DSc");

        let rao = backend
            .rows(ADMINS)
            .into_iter()
            .filter(|row| row.get("email").and_then(|v| v.as_str()) == Some("rao@uni.edu"))
            .count();
        assert_eq!(rao, 1);
        assert_eq!(board.admins().iter().find(|a| a.id == created.id).unwrap().email, "menon@uni.edu");
    }

    #[tokio::test]
    async fn delete_respects_confirmation() {
        let backend = seeded();
        let mut board = AdminBoard::new(backend.clone(), "token");
        board.load().await.unwrap();

        assert_eq!(
            board.delete(2, Confirmation::Declined).await.unwrap(),
            DeleteOutcome::Declined
        );
        assert_eq!(board.admins().len(), 2);

        assert_eq!(
            board.delete(2, Confirmation::Confirmed).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(board.admins().len(), 1);
        assert_eq!(backend.rows(ADMINS).len(), 1);
    }
}
