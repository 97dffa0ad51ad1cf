//! Process-wide session state: the bearer token and the logged-in user.
//!
//! Only the login/logout flows and the Gateway's auth-failure handling write
//! to it; everything else reads through [`Session`].

use std::{collections::HashMap, sync::Arc};

use agrochoco_db::{prelude::SessionEntries, session_entries};
use anyhow::Context;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue, Database, DatabaseConnection, EntityTrait, IntoActiveModel,
    sqlx::types::chrono,
};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "usuarioLogueado";

/// Device-local key-value storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct MemoryStore(RwLock<HashMap<String, String>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.0.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.0.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.0.write().await.remove(key);
        Ok(())
    }
}

pub struct DbStore(DatabaseConnection);

impl DbStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        if let Some(path) = url.strip_prefix("sqlite://") {
            let path = std::path::Path::new(path.split('?').next().unwrap_or(path));
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let db = Database::connect(url)
            .await
            .with_context(|| format!("Failed to connect to session database {url}"))?;
        agrochoco_db::create_tables(&db)
            .await
            .context("Failed to create session tables")?;
        Ok(Self(db))
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self(db)
    }
}

#[async_trait]
impl SessionStore for DbStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entry = SessionEntries::find_by_id(key.to_string()).one(&self.0).await?;
        Ok(entry.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if let Some(entry) = SessionEntries::find_by_id(key.to_string()).one(&self.0).await? {
            let mut updated_entry = entry.into_active_model();
            updated_entry.value = ActiveValue::Set(value.to_string());
            updated_entry.updated_at = ActiveValue::Set(chrono::Utc::now());
            updated_entry.update(&self.0).await?;
        } else {
            let new_entry = session_entries::ActiveModel {
                key: ActiveValue::Set(key.to_string()),
                value: ActiveValue::Set(value.to_string()),
                updated_at: ActiveValue::Set(chrono::Utc::now()),
            };
            new_entry.insert(&self.0).await?;
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        SessionEntries::delete_by_id(key.to_string()).exec(&self.0).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn token(&self) -> anyhow::Result<Option<String>> {
        Ok(self
            .store
            .get(TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty()))
    }

    pub async fn user(&self) -> anyhow::Result<Option<Value>> {
        match self.store.get(USER_KEY).await? {
            Some(raw) => Ok(Some(
                serde_json::from_str(&raw).context("Stored user record is not valid JSON")?,
            )),
            None => Ok(None),
        }
    }

    pub async fn is_logged_in(&self) -> anyhow::Result<bool> {
        Ok(self.token().await?.is_some())
    }

    /// Persists the result of a successful login.
    pub async fn login(&self, token: &str, user: &Value) -> anyhow::Result<()> {
        self.store.set(TOKEN_KEY, token).await?;
        self.store.set(USER_KEY, &serde_json::to_string(user)?).await?;
        info!("Session stored");
        Ok(())
    }

    pub async fn logout(&self) -> anyhow::Result<()> {
        self.clear().await?;
        info!("Logged out");
        Ok(())
    }

    /// Drops the persisted session after the backend rejected it.
    pub(crate) async fn invalidate(&self) -> anyhow::Result<()> {
        warn!("Backend rejected credentials, clearing session");
        self.clear().await
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let token = self.store.remove(TOKEN_KEY).await;
        let user = self.store.remove(USER_KEY).await;
        token.and(user)
    }
}
