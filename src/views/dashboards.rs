use std::fmt::Write;

use super::layout::{alert, escape};
use crate::models::{
    department::{Admin, DepartmentView},
    profile::{StudentProfile, SuperadminProfile, TeacherProfile},
    role::Role,
    user::AuthUser,
};

fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .map(escape)
        .unwrap_or_else(|| "&mdash;".to_string())
}

fn header(name: &str, user: &AuthUser, role: Role) -> String {
    format!(
        r#"<header class="dashboard-header"><h1>Welcome back, {}</h1><p>{} &middot; {}</p></header>"#,
        escape(name),
        or_dash(user.email.as_deref()),
        role.label()
    )
}

pub fn student(
    user: &AuthUser,
    profile: Option<&StudentProfile>,
    department: Option<&str>,
) -> String {
    let Some(profile) = profile else {
        return format!(
            r#"{}<section class="card"><p>Your student profile has not been set up yet. Please contact your department.</p></section>"#,
            header("Student", user, Role::Student)
        );
    };

    format!(
        r#"{header}
<section class="grid">
<article class="card"><h2>Academic Information</h2><dl>
<dt>Registration number</dt><dd>{reg}</dd>
<dt>Department</dt><dd>{department}</dd>
<dt>Class</dt><dd>{class}</dd>
</dl></article>
<article class="card"><h2>Current Session</h2><p>{session}</p></article>
<article class="card"><h2>Contact</h2><p>{phone}</p></article>
</section>"#,
        header = header(&profile.name, user, Role::Student),
        reg = escape(&profile.registration_number),
        department = or_dash(department),
        class = or_dash(profile.class_id.map(|c| c.to_string()).as_deref()),
        session = or_dash(profile.session.as_deref()),
        phone = or_dash(profile.phone.as_deref()),
    )
}

pub fn faculty(
    user: &AuthUser,
    profile: Option<&TeacherProfile>,
    department: Option<&str>,
) -> String {
    let name = profile.map(|p| p.name.as_str()).unwrap_or("Faculty");
    let details = match profile {
        Some(p) => format!(
            r#"<dl><dt>Faculty ID</dt><dd>{}</dd><dt>Department</dt><dd>{}</dd><dt>Phone</dt><dd>{}</dd></dl>"#,
            escape(&p.faculty_id),
            or_dash(department),
            or_dash(p.phone.as_deref())
        ),
        None => "<p>Your faculty profile has not been set up yet.</p>".to_string(),
    };
    format!(
        r#"{}<section class="grid"><article class="card"><h2>Faculty Profile</h2>{}</article></section>"#,
        header(name, user, Role::Faculty),
        details
    )
}

/// Landing page for any role; admins also see the departments they head.
pub fn overview(user: &AuthUser, role: Role, admin: Option<&Admin>, headed: &[String]) -> String {
    let name = admin.map(|a| a.name.as_str()).unwrap_or(role.label());
    let mut html = header(name, user, role);

    if role == Role::Admin {
        html.push_str(r#"<section class="card"><h2>Departments you head</h2>"#);
        if headed.is_empty() {
            html.push_str("<p>No department is assigned to you yet.</p>");
        } else {
            html.push_str("<ul>");
            for name in headed {
                let _ = write!(html, "<li>{}</li>", escape(name));
            }
            html.push_str("</ul>");
        }
        html.push_str("</section>");
    } else {
        let _ = write!(
            html,
            r#"<section class="card"><p><a class="button" href="{}">Open your {} dashboard</a></p></section>"#,
            role.dashboard_path(),
            role.label()
        );
    }
    html
}

/// Inputs of the superadmin screen.
pub struct SuperadminView<'a> {
    pub user: &'a AuthUser,
    pub profile: Option<&'a SuperadminProfile>,
    pub search: &'a str,
    pub departments: &'a [DepartmentView],
    pub editing: Option<i64>,
    pub editing_admin: Option<i64>,
    pub admins: &'a [Admin],
    pub matching_admins: &'a [Admin],
    pub error: Option<&'a str>,
}

/// Link back to the superadmin screen, keeping the search term.
///
/// `edit` is the query key and row id of the card to open for editing.
fn dashboard_href(edit: Option<(&str, i64)>, search: &str) -> String {
    let mut params: Vec<(&str, String)> = Vec::new();
    if let Some((key, id)) = edit {
        params.push((key, id.to_string()));
    }
    if !search.is_empty() {
        params.push(("search", search.to_string()));
    }

    match serde_urlencoded::to_string(&params) {
        Ok(query) if !query.is_empty() => escape(&format!("/superadmindashboard?{}", query)),
        _ => "/superadmindashboard".to_string(),
    }
}

fn admin_options(admins: &[Admin], selected: Option<i64>) -> String {
    let mut html = String::from(r#"<option value="">Select admin</option>"#);
    for admin in admins {
        let _ = write!(
            html,
            r#"<option value="{}"{}>{}</option>"#,
            admin.id,
            if selected == Some(admin.id) { " selected" } else { "" },
            escape(&admin.name)
        );
    }
    html
}

fn department_card(row: &DepartmentView, admins: &[Admin], editing: bool, search: &str) -> String {
    let d = &row.department;
    let admin_line = row
        .admin
        .as_ref()
        .map(|a| format!("{} ({})", escape(&a.name), escape(&a.email)))
        .unwrap_or_else(|| "No admin assigned".to_string());

    if editing {
        format!(
            r#"<article class="card editing" data-department="{id}">
<form class="js-update-department" data-id="{id}">
<input type="text" name="name" value="{name}" required>
<select name="admin_id">{options}</select>
<button type="submit">Save</button>
<a class="button secondary" href="{cancel}">Cancel</a>
</form></article>"#,
            id = d.id,
            name = escape(&d.name),
            options = admin_options(admins, d.admin_id),
            cancel = dashboard_href(None, search),
        )
    } else {
        format!(
            r#"<article class="card" data-department="{id}"><h3>{name}</h3><p>{admin}</p>
<a href="{edit}">Edit</a>
<button class="js-delete" data-url="/api/departments/{id}" data-confirm="Are you sure you want to delete this department?">Delete</button>
</article>"#,
            id = d.id,
            name = escape(&d.name),
            admin = admin_line,
            edit = dashboard_href(Some(("edit", d.id)), search),
        )
    }
}

fn admin_card(admin: &Admin, editing: bool, search: &str) -> String {
    if editing {
        return format!(
            r#"<article class="card editing" data-admin="{id}">
<form class="js-update-admin" data-id="{id}">
<input type="text" name="name" value="{name}" required>
<p>{email}</p>
<input type="text" name="qualification" value="{qualification}" placeholder="Qualification">
<button type="submit">Save</button>
<a class="button secondary" href="{cancel}">Cancel</a>
</form></article>"#,
            id = admin.id,
            name = escape(&admin.name),
            email = escape(&admin.email),
            qualification = escape(&admin.qualification),
            cancel = dashboard_href(None, search),
        );
    }

    format!(
        r#"<article class="card" data-admin="{id}"><h3>{name}</h3><p>{email}</p><p>{qualification}</p>
<a href="{edit}">Edit</a>
<button class="js-delete" data-url="/api/admins/{id}" data-confirm="Are you sure you want to remove this HOD?">Remove</button></article>"#,
        id = admin.id,
        name = escape(&admin.name),
        email = escape(&admin.email),
        qualification = or_dash(Some(admin.qualification.as_str())),
        edit = dashboard_href(Some(("edit_admin", admin.id)), search),
    )
}

pub fn superadmin(view: &SuperadminView<'_>) -> String {
    let name = view.profile.map(|p| p.name.as_str()).unwrap_or("Superadmin");
    let mut html = header(name, view.user, Role::Superadmin);
    html.push_str(&alert(view.error));

    let _ = write!(
        html,
        r#"<section><h2>Departments</h2>
<form method="get" action="/superadmindashboard" class="search"><input type="search" name="search" value="{search}" placeholder="Search departments or admins..."></form>
<form class="js-create-department"><input type="text" name="name" placeholder="Department name" required><select name="admin_id">{options}</select><button type="submit">Create department</button></form>
<div class="grid">"#,
        search = escape(view.search),
        options = admin_options(view.admins, None),
    );
    if view.departments.is_empty() {
        html.push_str("<p>No departments found.</p>");
    }
    for row in view.departments {
        html.push_str(&department_card(
            row,
            view.admins,
            view.editing == Some(row.department.id),
            view.search,
        ));
    }
    html.push_str("</div></section>");

    html.push_str(
        r#"<section class="split"><div><h2>Create Head of Department</h2>
<form class="js-create-admin">
<input type="text" name="name" placeholder="Full name" required>
<input type="email" name="email" placeholder="Email" required>
<input type="password" name="password" placeholder="Password" minlength="8" required>
<input type="text" name="qualification" placeholder="Qualification">
<button type="submit">Create admin</button>
</form></div><div><h2>Head of Departments</h2><div class="grid">"#,
    );
    for admin in view.matching_admins {
        html.push_str(&admin_card(
            admin,
            view.editing_admin == Some(admin.id),
            view.search,
        ));
    }
    html.push_str("</div></div></section>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::department::Department;
    use uuid::Uuid;

    fn user() -> AuthUser {
        AuthUser { id: Uuid::new_v4(), email: Some("root@uni.edu".into()) }
    }

    fn admin(id: i64, name: &str) -> Admin {
        Admin {
            id,
            name: name.into(),
            email: format!("{}@uni.edu", id),
            qualification: String::new(),
            created_at: None,
        }
    }

    fn row(id: i64, name: &str, admin: Option<Admin>) -> DepartmentView {
        DepartmentView {
            department: Department {
                id,
                name: name.into(),
                admin_id: admin.as_ref().map(|a| a.id),
                created_at: None,
            },
            admin,
        }
    }

    #[test]
    fn editing_row_renders_a_form_and_others_do_not() {
        let admins = vec![admin(1, "Dr. Rao"), admin(2, "Dr. Iyer")];
        let rows = vec![row(10, "CSE", Some(admins[0].clone())), row(11, "ECE", None)];
        let u = user();
        let html = superadmin(&SuperadminView {
            user: &u,
            profile: None,
            search: "",
            departments: &rows,
            editing: Some(10),
            editing_admin: None,
            admins: &admins,
            matching_admins: &admins,
            error: None,
        });
        assert!(html.contains(r#"class="js-update-department" data-id="10""#));
        assert!(!html.contains(r#"data-id="11""#));
        assert!(html.contains(r#"<option value="1" selected>Dr. Rao</option>"#));
        assert!(html.contains("No admin assigned"));
    }

    #[test]
    fn editing_admin_renders_name_and_qualification_only() {
        let admins = vec![admin(1, "Dr. Rao"), admin(2, "Dr. Iyer")];
        let u = user();
        let html = superadmin(&SuperadminView {
            user: &u,
            profile: None,
            search: "",
            departments: &[],
            editing: None,
            editing_admin: Some(2),
            admins: &admins,
            matching_admins: &admins,
            error: None,
        });
        assert!(html.contains(r#"class="js-update-admin" data-id="2""#));
        assert!(!html.contains(r#"class="js-update-admin" data-id="1""#));
        assert!(!html.contains(r#"<input type="email" name="email" value="#));
        assert!(html.contains(r#"href="/superadmindashboard?edit_admin=1""#));
    }

    #[test]
    fn search_term_is_url_encoded_in_links() {
        let rows = vec![row(10, "CS & AI", None)];
        let u = user();
        let html = superadmin(&SuperadminView {
            user: &u,
            profile: None,
            search: "CS & AI #1",
            departments: &rows,
            editing: None,
            editing_admin: None,
            admins: &[],
            matching_admins: &[],
            error: None,
        });
        assert!(html.contains(r#"href="/superadmindashboard?edit=10&amp;search=CS+%26+AI+%231""#));
        assert_eq!(dashboard_href(None, ""), "/superadmindashboard");
        assert_eq!(dashboard_href(None, "a b"), "/superadmindashboard?search=a+b");
    }

    #[test]
    fn student_without_profile_row_sees_notice() {
        let html = student(&user(), None, None);
        assert!(html.contains("has not been set up"));
    }

    #[test]
    fn admin_overview_lists_headed_departments() {
        let html = overview(&user(), Role::Admin, None, &["Mechanical".to_string()]);
        assert!(html.contains("<li>Mechanical</li>"));
    }
}
