use axum::response::Html;
use std::fmt::Write;

use crate::models::role::Role;

/// Escapes text for HTML element content and quoted attributes.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Who the navbar is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Anonymous,
    SignedIn(Role),
}

fn navbar(nav: Nav, csrf: Option<&str>) -> String {
    let mut html = String::from(
        r#"<nav class="navbar"><a class="brand" href="/">Campus Portal</a><ul>"#,
    );
    for (href, label) in [
        ("/", "Home"),
        ("/courses", "Courses"),
        ("/practice", "Practice"),
        ("/community", "Community"),
    ] {
        let _ = write!(html, r#"<li><a href="{}">{}</a></li>"#, href, label);
    }
    html.push_str("</ul><div class=\"nav-actions\">");

    match nav {
        Nav::Anonymous => {
            html.push_str(r#"<a href="/login">Login</a><a class="button" href="/register">Register</a>"#);
        }
        Nav::SignedIn(role) => {
            let _ = write!(
                html,
                r#"<a href="{}">{} Dashboard</a><form method="post" action="/logout"><input type="hidden" name="csrf_token" value="{}"><button type="submit">Sign out</button></form>"#,
                role.dashboard_path(),
                role.label(),
                escape(csrf.unwrap_or_default()),
            );
        }
    }
    html.push_str("</div></nav>");
    html
}

const FOOTER: &str = r#"<footer class="footer"><p>Campus Portal. Learn, practice and grow together.</p></footer>"#;

/// Wraps `body` in the shared page shell.
pub fn page(title: &str, nav: Nav, csrf: Option<&str>, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | Campus Portal</title>
<link rel="stylesheet" href="/css/portal.css">
</head>
<body>
{nav}
<main>
{body}
</main>
{footer}
<script src="/js/portal.js" defer></script>
</body>
</html>"#,
        title = escape(title),
        nav = navbar(nav, csrf),
        body = body,
        footer = FOOTER,
    ))
}

/// Neutral page shown while the session's role is still resolving.
///
/// It carries no page content and reloads itself instead of redirecting.
pub fn loading_page() -> Html<String> {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="1">
<title>Loading | Campus Portal</title>
<link rel="stylesheet" href="/css/portal.css">
</head>
<body><div class="loading" role="status"><span class="spinner"></span></div></body>
</html>"#
            .to_string(),
    )
}

/// Inline error banner, or nothing.
pub fn alert(error: Option<&str>) -> String {
    error
        .map(|e| format!(r#"<div class="alert alert-error" role="alert">{}</div>"#, escape(e)))
        .unwrap_or_default()
}
