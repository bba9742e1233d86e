//! Runs against a live server (`cargo run`) backed by Redis and a seeded
//! backend project. Ignored by default:
//!
//! `E2E_STUDENT_EMAIL=.. E2E_STUDENT_PASSWORD=.. cargo test -- --ignored`

use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use reqwest::redirect::Policy;
use sonic_rs::{JsonValueTrait, Value};

// Shared test context
struct TestContext {
    client: reqwest::Client,
    base_url: String,
}

static REDIS_CLIENT: Lazy<redis::Client> = Lazy::new(|| {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string());
    redis::Client::open(url).unwrap()
});

impl TestContext {
    fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .cookie_store(true)
                .redirect(Policy::none())
                .build()
                .unwrap(),
            base_url: std::env::var("E2E_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn session(&self) -> Value {
        let response = self.client.get(self.url("/api/session")).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        sonic_rs::from_str(&response.text().await.unwrap()).unwrap()
    }
}

async fn get_redis_conn() -> ConnectionManager {
    REDIS_CLIENT.get_connection_manager().await.unwrap()
}

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() {
        let mut con = get_redis_conn().await;
        let _: () = redis::cmd("DEL").arg("rate_limit:login:127.0.0.1").query_async(&mut con).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn anonymous_visitor_is_sent_to_login() {
        setup().await;
        let context = TestContext::new();

        let snapshot = context.session().await;
        assert!(snapshot["user"].is_null());
        assert_eq!(snapshot["loading"].as_bool(), Some(false));

        let response = context.client.get(context.url("/studentdashboard")).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 303);
        assert_eq!(location(&response), "/login");

        let courses = context.client.get(context.url("/courses")).send().await.unwrap();
        assert_eq!(courses.status().as_u16(), 200);
        assert!(courses.text().await.unwrap().contains("Explore Our Courses"));
    }

    #[tokio::test]
    #[ignore]
    async fn wrong_password_stays_on_the_form() {
        setup().await;
        let context = TestContext::new();

        let response = context
            .client
            .post(context.url("/login"))
            .form(&[
                ("email", "nobody@example.edu"),
                ("password", "definitely-wrong"),
                ("role", "student"),
            ])
            .send()
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        let html = response.text().await.unwrap();
        assert!(html.contains(r#"value="nobody@example.edu""#));
        assert!(!html.contains("definitely-wrong"));
    }

    #[tokio::test]
    #[ignore]
    async fn student_login_guard_and_logout() {
        setup().await;
        let email = std::env::var("E2E_STUDENT_EMAIL").expect("E2E_STUDENT_EMAIL not set");
        let password = std::env::var("E2E_STUDENT_PASSWORD").expect("E2E_STUDENT_PASSWORD not set");
        let context = TestContext::new();

        // Step 1: Login
        let login = context
            .client
            .post(context.url("/login"))
            .form(&[("email", email.as_str()), ("password", password.as_str()), ("role", "student")])
            .send()
            .await
            .unwrap();
        assert_eq!(login.status().as_u16(), 303, "Login failed");
        assert_eq!(location(&login), "/studentdashboard");

        let csrf_token = login
            .cookies()
            .find(|c| c.name() == "csrf_token")
            .map(|c| c.value().to_string())
            .expect("CSRF token not found in login response");

        // Step 2: Own dashboard is served, other roles are not
        let dashboard = context.client.get(context.url("/studentdashboard")).send().await.unwrap();
        assert_eq!(dashboard.status().as_u16(), 200);

        let other = context.client.get(context.url("/superadmindashboard")).send().await.unwrap();
        assert_eq!(other.status().as_u16(), 303);
        assert_eq!(location(&other), "/login");

        let api = context.client.get(context.url("/api/departments")).send().await.unwrap();
        assert_eq!(api.status().as_u16(), 403);

        let snapshot = context.session().await;
        assert_eq!(snapshot["role"].as_str(), Some("student"));

        // Step 3: A mistyped password keeps the current session
        let retry = context
            .client
            .post(context.url("/login"))
            .form(&[("email", email.as_str()), ("password", "not-the-password"), ("role", "student")])
            .send()
            .await
            .unwrap();
        assert!(retry.status().is_client_error());
        assert_eq!(context.session().await["role"].as_str(), Some("student"));
        let dashboard = context.client.get(context.url("/studentdashboard")).send().await.unwrap();
        assert_eq!(dashboard.status().as_u16(), 200);

        // Step 4: Logout
        let logout = context
            .client
            .post(context.url("/logout"))
            .form(&[("csrf_token", csrf_token.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(logout.status().as_u16(), 303);
        assert!(context.session().await["user"].is_null());
    }
}
