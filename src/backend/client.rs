use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::{
    backend::query::TableQuery,
    error::BackendError,
    models::{session::BackendSession, user::AuthUser},
};

/// One table row as returned by the data API.
pub type Record = BTreeMap<String, sonic_rs::Value>;

/// Connect timeout for the backend HTTP client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// The hosted auth + data service, as the rest of the portal sees it.
///
/// `token` arguments are the caller's access token; `None` falls back to the
/// anon key, which only passes row-level policies open to anonymous callers.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<BackendSession, BackendError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: sonic_rs::Value,
    ) -> Result<AuthUser, BackendError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<BackendSession, BackendError>;

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    async fn select(
        &self,
        query: &TableQuery,
        token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError>;

    async fn insert(
        &self,
        table: &str,
        rows: Vec<Record>,
        token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError>;

    async fn update(
        &self,
        query: &TableQuery,
        patch: Record,
        token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError>;

    async fn delete(
        &self,
        query: &TableQuery,
        token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError>;
}

/// Converts fetched rows into typed models.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Record>) -> Result<Vec<T>, BackendError> {
    rows.into_iter().map(decode_row).collect()
}

/// Converts one fetched row into a typed model.
pub fn decode_row<T: DeserializeOwned>(row: Record) -> Result<T, BackendError> {
    let json = sonic_rs::to_string(&row)?;
    Ok(sonic_rs::from_str(&json)?)
}

/// Converts a typed model into a row for insert/update.
pub fn encode_record<T: Serialize>(value: &T) -> Result<Record, BackendError> {
    let json = sonic_rs::to_string(value)?;
    Ok(sonic_rs::from_str(&json)?)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> BackendSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| {
                Utc::now() + chrono::Duration::seconds(self.expires_in.unwrap_or(3600))
            });

        BackendSession {
            user: self.user,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Sign-up answers with a bare user when email confirmation is on, and with
/// a full session otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    WithSession { user: AuthUser },
    Bare(AuthUser),
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn parse(status: u16, text: &str) -> String {
        let body: ErrorBody = sonic_rs::from_str(text).unwrap_or_default();
        body.message
            .or(body.msg)
            .or(body.error_description)
            .or(body.error)
            .unwrap_or_else(|| format!("request failed with status {}", status))
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: sonic_rs::Value,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// `Backend` over the Supabase HTTP surface (GoTrue + PostgREST).
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: Zeroizing<String>,
}

impl SupabaseClient {
    /// Creates a client for `base_url` using the public `anon_key`.
    pub fn new(
        base_url: &str,
        anon_key: Zeroizing<String>,
        request_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, url: String, token: Option<&str>) -> RequestBuilder {
        let bearer = token.unwrap_or(self.anon_key.as_str());
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(bearer)
    }

    fn with_json<T: Serialize>(
        builder: RequestBuilder,
        payload: &T,
    ) -> Result<RequestBuilder, BackendError> {
        Ok(builder
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(sonic_rs::to_string(payload)?))
    }

    /// Sends the request and returns the body of a 2xx response.
    async fn send(&self, builder: RequestBuilder, auth_call: bool) -> Result<String, BackendError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Http(e)
            }
        })?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        if (200..300).contains(&status) {
            return Ok(text);
        }

        let message = ErrorBody::parse(status, &text);
        tracing::debug!("Backend answered {}: {}", status, message);

        if auth_call && matches!(status, 400 | 401 | 403 | 422) {
            Err(BackendError::Auth(message))
        } else {
            Err(BackendError::Api { status, message })
        }
    }

    async fn token_grant<T: Serialize>(
        &self,
        grant_type: &str,
        payload: &T,
    ) -> Result<BackendSession, BackendError> {
        let url = format!("{}?grant_type={}", self.auth_url("token"), grant_type);
        let builder = Self::with_json(self.request(Method::POST, url, None), payload)?;
        let text = self.send(builder, true).await?;
        let token: TokenResponse = sonic_rs::from_str(&text)?;
        Ok(token.into_session())
    }

    fn rows(text: &str) -> Result<Vec<Record>, BackendError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(sonic_rs::from_str(text)?)
    }
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<BackendSession, BackendError> {
        tracing::debug!("🔐 Password sign-in for {}", email);
        self.token_grant("password", &Credentials { email, password }).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: sonic_rs::Value,
    ) -> Result<AuthUser, BackendError> {
        let payload = SignUpRequest {
            email,
            password,
            data: metadata,
        };
        let builder = Self::with_json(
            self.request(Method::POST, self.auth_url("signup"), None),
            &payload,
        )?;
        let text = self.send(builder, true).await?;

        match sonic_rs::from_str::<SignUpResponse>(&text)? {
            SignUpResponse::WithSession { user } | SignUpResponse::Bare(user) => Ok(user),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<BackendSession, BackendError> {
        self.token_grant("refresh_token", &RefreshRequest { refresh_token })
            .await
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let builder = self.request(Method::GET, self.auth_url("user"), Some(access_token));
        let text = self.send(builder, true).await?;
        Ok(sonic_rs::from_str(&text)?)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let builder = self.request(Method::POST, self.auth_url("logout"), Some(access_token));
        self.send(builder, true).await?;
        Ok(())
    }

    async fn select(
        &self,
        query: &TableQuery,
        token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError> {
        let builder = self
            .request(Method::GET, self.rest_url(&query.table), token)
            .query(&query.to_params());
        let text = self.send(builder, false).await?;
        Self::rows(&text)
    }

    async fn insert(
        &self,
        table: &str,
        rows: Vec<Record>,
        token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError> {
        let builder = self
            .request(Method::POST, self.rest_url(table), token)
            .header("Prefer", "return=representation");
        let builder = Self::with_json(builder, &rows)?;
        let text = self.send(builder, false).await?;
        Self::rows(&text)
    }

    async fn update(
        &self,
        query: &TableQuery,
        patch: Record,
        token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError> {
        let builder = self
            .request(Method::PATCH, self.rest_url(&query.table), token)
            .query(&query.filter_params())
            .header("Prefer", "return=representation");
        let builder = Self::with_json(builder, &patch)?;
        let text = self.send(builder, false).await?;
        Self::rows(&text)
    }

    async fn delete(
        &self,
        query: &TableQuery,
        token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError> {
        let builder = self
            .request(Method::DELETE, self.rest_url(&query.table), token)
            .query(&query.filter_params())
            .header("Prefer", "return=representation");
        let text = self.send(builder, false).await?;
        Self::rows(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::department::Department;

    #[test]
    fn error_body_prefers_message_fields() {
        assert_eq!(
            ErrorBody::parse(400, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(ErrorBody::parse(422, r#"{"code":422,"msg":"User already registered"}"#), "User already registered");
        assert_eq!(ErrorBody::parse(500, "oops"), "request failed with status 500");
    }

    #[test]
    fn token_response_uses_absolute_expiry_when_present() {
        let text = r#"{
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "expires_at": 1893456000,
            "user": {"id": "6f1c2d9e-8a4b-4c3d-9e2f-1a2b3c4d5e6f", "email": "a@b.edu", "aud": "authenticated"}
        }"#;
        let session = sonic_rs::from_str::<TokenResponse>(text).unwrap().into_session();
        assert_eq!(session.expires_at.timestamp(), 1_893_456_000);
        assert_eq!(session.user.email.as_deref(), Some("a@b.edu"));
    }

    #[test]
    fn sign_up_accepts_both_shapes() {
        let bare = r#"{"id":"6f1c2d9e-8a4b-4c3d-9e2f-1a2b3c4d5e6f","email":"x@y.edu"}"#;
        let wrapped = r#"{"access_token":"t","user":{"id":"6f1c2d9e-8a4b-4c3d-9e2f-1a2b3c4d5e6f","email":"x@y.edu"}}"#;
        for text in [bare, wrapped] {
            match sonic_rs::from_str::<SignUpResponse>(text).unwrap() {
                SignUpResponse::WithSession { user } | SignUpResponse::Bare(user) => {
                    assert_eq!(user.email.as_deref(), Some("x@y.edu"))
                }
            }
        }
    }

    #[test]
    fn records_decode_into_models() {
        let rows: Vec<Record> =
            sonic_rs::from_str(r#"[{"id":4,"name":"CSE","admin_id":null,"created_at":"2025-01-01T00:00:00Z"}]"#)
                .unwrap();
        let depts: Vec<Department> = decode_rows(rows).unwrap();
        assert_eq!(depts[0].id, 4);
        assert_eq!(depts[0].admin_id, None);
    }
}
