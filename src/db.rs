use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type DbPool = Pool<Postgres>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            other => anyhow::bail!("Unknown role: {}", other),
        }
    }
}

/// The slice of a user record the admission path needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    role: String,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            role: row.role.parse()?,
        })
    }
}

/// Read-only user lookup used to confirm that a token subject still exists
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup_user_by_id(&self, user_id: &Uuid) -> Result<Option<UserRecord>>;
}

pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Postgres-backed directory (`users` table)
pub struct PgUserDirectory {
    pool: DbPool,
}

impl PgUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn lookup_user_by_id(&self, user_id: &Uuid) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, role
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up user")?;

        row.map(UserRecord::try_from).transpose()
    }
}

/// Fixed directory for tests and local runs without Postgres
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    users: HashMap<Uuid, Role>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: Uuid, role: Role) -> Self {
        self.users.insert(id, role);
        self
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn lookup_user_by_id(&self, user_id: &Uuid) -> Result<Option<UserRecord>> {
        Ok(self.users.get(user_id).map(|role| UserRecord {
            id: *user_id,
            role: *role,
        }))
    }
}
