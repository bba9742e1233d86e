//! In-memory `Backend` used by the unit tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sonic_rs::JsonValueTrait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    backend::{
        client::{encode_record, Backend, Record},
        query::{Direction, Filter, TableQuery},
    },
    error::BackendError,
    models::{session::BackendSession, user::AuthUser},
};

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Record>>,
    accounts: HashMap<String, (String, AuthUser)>,
    tokens: HashMap<String, AuthUser>,
    refresh_tokens: HashMap<String, AuthUser>,
    next_id: i64,
    writes: usize,
    fail_next_write: Option<String>,
}

#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

fn scalar(value: &sonic_rs::Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        Some(s.to_string())
    } else if let Some(n) = value.as_i64() {
        Some(n.to_string())
    } else if let Some(n) = value.as_u64() {
        Some(n.to_string())
    } else if let Some(b) = value.as_bool() {
        Some(b.to_string())
    } else {
        value.as_f64().map(|f| f.to_string())
    }
}

fn matches(record: &Record, filters: &[Filter]) -> bool {
    filters.iter().all(|f| {
        record
            .get(&f.column)
            .and_then(scalar)
            .is_some_and(|v| v == f.value)
    })
}

fn compare(a: &Record, b: &Record, column: &str) -> Ordering {
    let a = a.get(column).and_then(scalar);
    let b = b.get(column).and_then(scalar);
    match (&a, &b) {
        (Some(x), Some(y)) => match (x.parse::<i64>(), y.parse::<i64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        },
        _ => a.cmp(&b),
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rows to `table` as given.
    pub fn seed(&self, table: &str, rows: Vec<sonic_rs::Value>) {
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            let record = encode_record(&row).unwrap();
            if let Some(id) = record.get("id").and_then(|v| v.as_i64()) {
                inner.next_id = inner.next_id.max(id);
            }
            inner.tables.entry(table.to_string()).or_default().push(record);
        }
    }

    /// Current rows of `table`.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.inner
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Registers an account that can sign in.
    pub fn add_account(&self, email: &str, password: &str) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        self.inner
            .lock()
            .unwrap()
            .accounts
            .insert(email.to_string(), (password.to_string(), user.clone()));
        user
    }

    /// Makes the next insert/update/delete fail with `message`.
    pub fn fail_next_write(&self, message: &str) {
        self.inner.lock().unwrap().fail_next_write = Some(message.to_string());
    }

    /// Number of insert/update/delete calls that reached the tables.
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    fn issue_session(inner: &mut Inner, user: AuthUser) -> BackendSession {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        inner.tokens.insert(access_token.clone(), user.clone());
        inner.refresh_tokens.insert(refresh_token.clone(), user.clone());
        BackendSession {
            user,
            access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    fn begin_write(inner: &mut Inner) -> Result<(), BackendError> {
        if let Some(message) = inner.fail_next_write.take() {
            return Err(BackendError::Api {
                status: 500,
                message,
            });
        }
        inner.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<BackendSession, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        let user = match inner.accounts.get(email) {
            Some((stored, user)) if stored == password => user.clone(),
            _ => return Err(BackendError::Auth("Invalid login credentials".to_string())),
        };
        Ok(Self::issue_session(&mut inner, user))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _metadata: sonic_rs::Value,
    ) -> Result<AuthUser, BackendError> {
        if self.inner.lock().unwrap().accounts.contains_key(email) {
            return Err(BackendError::Auth("User already registered".to_string()));
        }
        Ok(self.add_account(email, password))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<BackendSession, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| BackendError::Auth("Invalid Refresh Token".to_string()))?;
        Ok(Self::issue_session(&mut inner, user))
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        self.inner
            .lock()
            .unwrap()
            .tokens
            .get(access_token)
            .cloned()
            .ok_or_else(|| BackendError::Auth("invalid JWT".to_string()))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.tokens.remove(access_token) {
            inner.refresh_tokens.retain(|_, u| u.id != user.id);
        }
        Ok(())
    }

    async fn select(
        &self,
        query: &TableQuery,
        _token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<Record> = inner
            .tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| matches(r, &query.filters)).cloned().collect())
            .unwrap_or_default();

        if let Some((column, direction)) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(a, b, column);
                if *direction == Direction::Desc { ord.reverse() } else { ord }
            });
        }
        Ok(rows)
    }

    async fn insert(
        &self,
        table: &str,
        rows: Vec<Record>,
        _token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        Self::begin_write(&mut inner)?;

        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            inner.next_id += 1;
            let n = inner.next_id;
            row.entry("id".to_string()).or_insert_with(|| sonic_rs::json!(n));
            let created = Utc.timestamp_opt(1_735_689_600 + n, 0).single().unwrap_or_else(Utc::now);
            row.entry("created_at".to_string())
                .or_insert_with(|| sonic_rs::json!(created.to_rfc3339()));
            inserted.push(row.clone());
            inner.tables.entry(table.to_string()).or_default().push(row);
        }
        Ok(inserted)
    }

    async fn update(
        &self,
        query: &TableQuery,
        patch: Record,
        _token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        Self::begin_write(&mut inner)?;

        let mut updated = Vec::new();
        if let Some(rows) = inner.tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|r| matches(r, &query.filters)) {
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(
        &self,
        query: &TableQuery,
        _token: Option<&str>,
    ) -> Result<Vec<Record>, BackendError> {
        let mut inner = self.inner.lock().unwrap();
        Self::begin_write(&mut inner)?;

        let Some(rows) = inner.tables.get_mut(&query.table) else {
            return Ok(Vec::new());
        };
        let (gone, kept): (Vec<Record>, Vec<Record>) =
            rows.drain(..).partition(|r| matches(r, &query.filters));
        *rows = kept;
        Ok(gone)
    }
}
