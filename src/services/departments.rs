use std::sync::Arc;

use crate::{
    backend::client::Backend,
    error::{AppError, Result},
    models::department::{Admin, Department, DepartmentDraft, DepartmentView},
    repositories::{admin as admin_repo, department as department_repo},
};

/// Answer to an "are you sure?" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Declined,
    Confirmed,
}

impl Confirmation {
    pub fn from_flag(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Declined
        }
    }
}

/// What a delete request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Declined,
    Deleted,
}

#[derive(Debug, Clone)]
struct EditState {
    id: i64,
    draft: DepartmentDraft,
}

/// View-model behind the superadmin department screen.
///
/// Local rows only change after a write the backend accepted.
pub struct DepartmentBoard {
    backend: Arc<dyn Backend>,
    token: String,
    admins: Vec<Admin>,
    departments: Vec<DepartmentView>,
    editing: Option<EditState>,
}

fn join_admins(
    departments: Vec<Department>,
    admins: &[Admin],
) -> Vec<DepartmentView> {
    departments
        .into_iter()
        .map(|department| {
            let admin = department
                .admin_id
                .and_then(|id| admins.iter().find(|a| a.id == id).cloned());
            if department.admin_id.is_some() && admin.is_none() {
                tracing::warn!("Department {} points at a missing admin", department.id);
            }
            DepartmentView { department, admin }
        })
        .collect()
}

impl DepartmentBoard {
    /// An empty board that acts with `token`.
    pub fn new(backend: Arc<dyn Backend>, token: impl Into<String>) -> Self {
        Self {
            backend,
            token: token.into(),
            admins: Vec::new(),
            departments: Vec::new(),
            editing: None,
        }
    }

    fn token(&self) -> Option<&str> {
        Some(&self.token)
    }

    /// Fetches admins and departments and joins them.
    pub async fn load(&mut self) -> Result<()> {
        let (admins, departments) = futures::try_join!(
            admin_repo::list_admins(self.backend.as_ref(), self.token()),
            department_repo::list_departments(self.backend.as_ref(), self.token()),
        )?;

        self.departments = join_admins(departments, &admins);
        self.admins = admins;
        tracing::debug!(
            "📋 Loaded {} departments and {} admins",
            self.departments.len(),
            self.admins.len()
        );
        Ok(())
    }

    pub fn admins(&self) -> &[Admin] {
        &self.admins
    }

    /// Rows as displayed, with the pending edit laid over its row.
    pub fn rows(&self) -> Vec<DepartmentView> {
        self.departments
            .iter()
            .map(|row| match &self.editing {
                Some(edit) if edit.id == row.department.id => {
                    let mut shown = row.clone();
                    shown.department.name = edit.draft.name.clone();
                    shown.department.admin_id = edit.draft.admin_id;
                    shown.admin = edit
                        .draft
                        .admin_id
                        .and_then(|id| self.admins.iter().find(|a| a.id == id).cloned());
                    shown
                }
                _ => row.clone(),
            })
            .collect()
    }

    /// Rows whose name or admin name contains `term`, ignoring case.
    pub fn filtered(&self, term: &str) -> Vec<DepartmentView> {
        let term = term.trim().to_lowercase();
        self.rows()
            .into_iter()
            .filter(|row| {
                term.is_empty()
                    || row.department.name.to_lowercase().contains(&term)
                    || row
                        .admin
                        .as_ref()
                        .is_some_and(|a| a.name.to_lowercase().contains(&term))
            })
            .collect()
    }

    fn check_draft(draft: &DepartmentDraft) -> Result<()> {
        if draft.admin_id.is_none() {
            return Err(AppError::Validation(
                "Please select an admin for the department".to_string(),
            ));
        }
        if draft.name.trim().is_empty() {
            return Err(AppError::Validation(
                "Department name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Inserts a department and reloads.
    pub async fn create(&mut self, draft: DepartmentDraft) -> Result<()> {
        Self::check_draft(&draft)?;
        department_repo::create_department(self.backend.as_ref(), self.token(), &draft).await?;
        tracing::info!("✅ Department created: {}", draft.name.trim());
        self.load().await
    }

    /// Starts editing row `id`, seeding the draft from its current values.
    pub fn begin_edit(&mut self, id: i64) -> Result<()> {
        let row = self
            .departments
            .iter()
            .find(|r| r.department.id == id)
            .ok_or(AppError::NotFound)?;
        self.editing = Some(EditState {
            id,
            draft: DepartmentDraft {
                name: row.department.name.clone(),
                admin_id: row.department.admin_id,
            },
        });
        Ok(())
    }

    /// Id of the row being edited.
    pub fn editing(&self) -> Option<i64> {
        self.editing.as_ref().map(|e| e.id)
    }

    pub fn edit_name(&mut self, name: &str) {
        if let Some(edit) = self.editing.as_mut() {
            edit.draft.name = name.to_string();
        }
    }

    pub fn edit_admin(&mut self, admin_id: Option<i64>) {
        if let Some(edit) = self.editing.as_mut() {
            edit.draft.admin_id = admin_id;
        }
    }

    /// Drops the draft without touching the backend.
    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Writes the draft to its row and reloads.
    ///
    /// On failure the draft is kept so the user can retry or cancel.
    pub async fn save_edit(&mut self) -> Result<()> {
        let edit = self
            .editing
            .clone()
            .ok_or_else(|| AppError::Validation("Nothing is being edited".to_string()))?;
        Self::check_draft(&edit.draft)?;

        department_repo::update_department(self.backend.as_ref(), self.token(), edit.id, &edit.draft)
            .await?;
        tracing::info!("✅ Department {} updated", edit.id);
        self.editing = None;
        self.load().await
    }

    /// Deletes row `id` if the user confirmed.
    pub async fn delete(&mut self, id: i64, confirmation: Confirmation) -> Result<DeleteOutcome> {
        if confirmation == Confirmation::Declined {
            return Ok(DeleteOutcome::Declined);
        }

        department_repo::delete_department(self.backend.as_ref(), self.token(), id).await?;
        self.departments.retain(|r| r.department.id != id);
        if self.editing() == Some(id) {
            self.editing = None;
        }
        tracing::info!("🗑️ Department {} deleted", id);
        Ok(DeleteOutcome::Deleted)
    }
}
