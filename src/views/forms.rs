use std::fmt::Write;

use super::layout::{alert, escape};
use crate::{
    models::{department::Department, role::Role},
    validation::auth::{LoginForm, RegisterForm},
};

fn role_options(selected: &str, roles: &[Role]) -> String {
    let selected = selected.parse::<Role>().ok();
    let mut html = String::from(r#"<option value="">Select your role</option>"#);
    for role in roles {
        let _ = write!(
            html,
            r#"<option value="{}"{}>{}</option>"#,
            role.as_str(),
            if selected == Some(*role) { " selected" } else { "" },
            role.label()
        );
    }
    html
}

/// Login form; `form` carries the values to re-fill after an error.
pub fn login(form: &LoginForm, error: Option<&str>, notice: Option<&str>) -> String {
    let notice = notice
        .map(|n| format!(r#"<div class="alert alert-success">{}</div>"#, escape(n)))
        .unwrap_or_default();
    format!(
        r#"<section class="auth-card">
<h1>Welcome back</h1>
{notice}{error}
<form method="post" action="/login">
<label>Role<select name="role" required>{roles}</select></label>
<label>Email<input type="email" name="email" value="{email}" required autocomplete="email"></label>
<label>Password<input type="password" name="password" required autocomplete="current-password"></label>
<button type="submit">Sign in</button>
</form>
<p>New here? <a href="/register">Create an account</a></p>
</section>"#,
        notice = notice,
        error = alert(error),
        roles = role_options(&form.role, &Role::ALL),
        email = escape(&form.email),
    )
}

/// Registration form for students and faculty.
pub fn register(
    form: &RegisterForm,
    departments: &[Department],
    allowed_domain: Option<&str>,
    error: Option<&str>,
) -> String {
    let mut department_options = String::from(r#"<option value="">Select department</option>"#);
    for department in departments {
        let id = department.id.to_string();
        let _ = write!(
            department_options,
            r#"<option value="{}"{}>{}</option>"#,
            id,
            if form.department.trim() == id { " selected" } else { "" },
            escape(&department.name)
        );
    }

    let placeholder = allowed_domain
        .map(|d| format!("your.name@{}", d))
        .unwrap_or_else(|| "you@example.edu".to_string());

    format!(
        r#"<section class="auth-card">
<h1>Create your account</h1>
{error}
<form method="post" action="/register">
<label>I am a<select name="role" required>{roles}</select></label>
<label>Email<input type="email" name="email" value="{email}" placeholder="{placeholder}" required></label>
<label>Password<input type="password" name="password" minlength="8" maxlength="128" required></label>
<label>Confirm password<input type="password" name="confirm_password" required></label>
<label>Full name<input type="text" name="name" value="{name}" required></label>
<label>Phone<input type="tel" name="phone" value="{phone}"></label>
<label>Department<select name="department">{departments}</select></label>
<fieldset class="student-only">
<label>Registration number<input type="text" name="registration_number" value="{registration_number}"></label>
<label>Class<input type="number" name="class" value="{class}"></label>
<label>Session<input type="text" name="session" value="{session}" placeholder="2023-2027"></label>
</fieldset>
<fieldset class="faculty-only">
<label>Faculty ID<input type="text" name="faculty_id" value="{faculty_id}"></label>
</fieldset>
<button type="submit">Register</button>
</form>
<p>Already registered? <a href="/login">Sign in</a></p>
</section>"#,
        error = alert(error),
        roles = role_options(&form.role, &[Role::Student, Role::Faculty]),
        email = escape(&form.email),
        placeholder = escape(&placeholder),
        name = escape(&form.name),
        phone = escape(&form.phone),
        departments = department_options,
        registration_number = escape(&form.registration_number),
        class = escape(&form.class),
        session = escape(&form.session),
        faculty_id = escape(&form.faculty_id),
    )
}
