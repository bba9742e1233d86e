use garde::Validate;
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::role::Role,
};

/// Fields posted by the login form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[garde(email)]
    pub email: String,
    #[serde(default)]
    #[garde(length(min = 1, max = 128))]
    pub password: String,
    #[serde(default)]
    #[garde(skip)]
    pub role: String,
}

impl LoginForm {
    /// Checks the form and returns the role the user picked.
    pub fn check(&self) -> Result<Role> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        let role = selected_role(&self.role)?;
        self.validate()?;
        Ok(role)
    }
}

/// Fields posted by the registration form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterForm {
    #[serde(default)]
    #[garde(skip)]
    pub role: String,
    #[serde(default)]
    #[garde(email)]
    pub email: String,
    #[serde(default)]
    #[garde(skip)]
    pub password: String,
    #[serde(default)]
    #[garde(skip)]
    pub confirm_password: String,
    #[serde(default)]
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    #[garde(length(max = 32))]
    pub phone: String,
    #[serde(default)]
    #[garde(length(max = 64))]
    pub registration_number: String,
    #[serde(default)]
    #[garde(length(max = 64))]
    pub faculty_id: String,
    #[serde(default)]
    #[garde(skip)]
    pub department: String,
    #[serde(default)]
    #[garde(skip)]
    pub class: String,
    #[serde(default)]
    #[garde(length(max = 32))]
    pub session: String,
}

impl RegisterForm {
    /// Runs every registration rule and returns the chosen role.
    pub fn check(&self, allowed_domain: Option<&str>) -> Result<Role> {
        let role = registration_role(&self.role)?;
        validate_email_domain(&self.email, allowed_domain)?;
        validate_password_confirmation(&self.password, &self.confirm_password)?;
        validate_password(&self.password)?;

        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }
        match role {
            Role::Student if self.registration_number.trim().is_empty() => {
                return Err(AppError::Validation(
                    "Registration number is required".to_string(),
                ));
            }
            Role::Faculty if self.faculty_id.trim().is_empty() => {
                return Err(AppError::Validation("Faculty ID is required".to_string()));
            }
            _ => {}
        }

        optional_id(&self.department, "Department")?;
        optional_id(&self.class, "Class")?;
        self.validate()?;
        Ok(role)
    }

    pub fn department_id(&self) -> Option<i64> {
        optional_id(&self.department, "Department").ok().flatten()
    }

    pub fn class_id(&self) -> Option<i64> {
        optional_id(&self.class, "Class").ok().flatten()
    }

    pub fn phone(&self) -> Option<String> {
        non_empty(&self.phone)
    }

    pub fn academic_session(&self) -> Option<String> {
        non_empty(&self.session)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn optional_id(value: &str, field: &str) -> Result<Option<i64>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| AppError::Validation(format!("{} is not valid", field)))
}

/// Parses the role picked on the login form.
pub fn selected_role(value: &str) -> Result<Role> {
    if value.trim().is_empty() {
        return Err(AppError::Validation("Please select a role".to_string()));
    }
    value
        .parse()
        .map_err(|_| AppError::Validation("Please select a valid role".to_string()))
}

/// Only students and faculty can sign themselves up.
pub fn registration_role(value: &str) -> Result<Role> {
    match value.parse::<Role>() {
        Ok(role @ (Role::Student | Role::Faculty)) => Ok(role),
        _ => Err(AppError::Validation(
            "Please register as a student or a teacher".to_string(),
        )),
    }
}

/// Rejects emails outside the institutional domain, when one is configured.
pub fn validate_email_domain(email: &str, allowed_domain: Option<&str>) -> Result<()> {
    let email = email.trim();
    let Some((local, domain)) = email.rsplit_once('@') else {
        return Err(AppError::Validation("Please enter a valid email address".to_string()));
    };
    if local.is_empty() || domain.is_empty() {
        return Err(AppError::Validation("Please enter a valid email address".to_string()));
    }

    match allowed_domain {
        Some(allowed) if !domain.eq_ignore_ascii_case(allowed) => Err(AppError::Validation(
            format!("Please use your institutional email address (@{})", allowed),
        )),
        _ => Ok(()),
    }
}

/// Validates a password.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_password_confirmation(password: &str, confirm: &str) -> Result<()> {
    if password != confirm {
        return Err(AppError::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_form() -> RegisterForm {
        RegisterForm {
            role: "student".into(),
            email: "asha.k@uni.edu".into(),
            password: "correct-horse".into(),
            confirm_password: "correct-horse".into(),
            name: "Asha K".into(),
            registration_number: "RA2111003010".into(),
            department: "3".into(),
            ..Default::default()
        }
    }

    #[test]
    fn login_requires_a_role() {
        let form = LoginForm {
            email: "a@uni.edu".into(),
            password: "x".into(),
            role: String::new(),
        };
        assert_eq!(form.check().unwrap_err().user_message(), "Please select a role");
    }

    #[test]
    fn login_accepts_teacher_alias() {
        let form = LoginForm {
            email: "a@uni.edu".into(),
            password: "x".into(),
            role: "teacher".into(),
        };
        assert_eq!(form.check().unwrap(), Role::Faculty);
    }

    #[test]
    fn login_rejects_bad_email() {
        let form = LoginForm {
            email: "nope".into(),
            password: "x".into(),
            role: "student".into(),
        };
        assert!(form.check().is_err());
    }

    #[test]
    fn register_happy_path() {
        let form = student_form();
        assert_eq!(form.check(Some("uni.edu")).unwrap(), Role::Student);
        assert_eq!(form.department_id(), Some(3));
        assert_eq!(form.class_id(), None);
        assert_eq!(form.phone(), None);
    }

    #[test]
    fn register_enforces_domain() {
        let mut form = student_form();
        form.email = "asha@gmail.com".into();
        let err = form.check(Some("uni.edu")).unwrap_err();
        assert_eq!(err.user_message(), "Please use your institutional email address (@uni.edu)");
        assert!(form.check(None).is_ok());
    }

    #[test]
    fn register_checks_passwords() {
        let mut form = student_form();
        form.confirm_password = "something-else".into();
        assert_eq!(form.check(None).unwrap_err().user_message(), "Passwords do not match");

        form.password = "short".into();
        form.confirm_password = "short".into();
        assert_eq!(
            form.check(None).unwrap_err().user_message(),
            "Password must be at least 8 characters long"
        );
    }

    #[test]
    fn register_requires_role_specific_fields() {
        let mut form = student_form();
        form.registration_number = " ".into();
        assert!(form.check(None).is_err());

        form.role = "teacher".into();
        assert_eq!(form.check(None).unwrap_err().user_message(), "Faculty ID is required");
        form.faculty_id = "FAC-042".into();
        assert_eq!(form.check(None).unwrap(), Role::Faculty);
    }

    #[test]
    fn register_refuses_privileged_roles() {
        let mut form = student_form();
        form.role = "superadmin".into();
        assert!(form.check(None).is_err());
        form.role = "admin".into();
        assert!(form.check(None).is_err());
    }

    #[test]
    fn register_rejects_non_numeric_department() {
        let mut form = student_form();
        form.department = "CSE".into();
        assert_eq!(form.check(None).unwrap_err().user_message(), "Department is not valid");
    }
}
