use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use super::{schema, UserStore};
use crate::models::User;

/// In-process store holding the encoded JSON per email, like browser storage.
///
/// Records go through the same versioned encoding as the SQLite store, so a
/// load always returns a detached, validated copy.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw encoded record, bypassing validation (imports and tests).
    pub async fn put_raw(&self, email: &str, raw: impl Into<String>) {
        self.records.write().await.insert(email.to_string(), raw.into());
    }

    /// Raw encoded record for an email.
    pub async fn get_raw(&self, email: &str) -> Option<String> {
        self.records.read().await.get(email).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl UserStore for MemoryStore {
    async fn load(&self, email: &str) -> Result<Option<User>> {
        let records = self.records.read().await;
        records.get(email).map(|raw| schema::decode(raw)).transpose()
    }

    async fn save(&self, user: &User) -> Result<()> {
        let raw = schema::encode(user)?;
        self.records
            .write()
            .await
            .insert(user.email().to_string(), raw);
        Ok(())
    }
}
