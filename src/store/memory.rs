//! In-memory user store for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;
use uuid::Uuid;

use anyhow::anyhow;

use super::{NewAccount, StoreError, UserAccount, UserStore};

/// Mutex-guarded map keyed by email; the single lock makes the duplicate
/// check and the insert one atomic step, matching the Postgres unique index.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    accounts: Mutex<HashMap<String, UserAccount>>,
    unavailable: bool,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that fails every operation, for exercising outage handling.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            unavailable: true,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.lock().map(|map| map.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable(anyhow!("store offline")));
        }
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable(anyhow!("store lock poisoned")))?;
        Ok(accounts.get(email).cloned())
    }

    async fn create_account(&self, account: NewAccount) -> Result<UserAccount, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable(anyhow!("store offline")));
        }
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable(anyhow!("store lock poisoned")))?;

        if accounts.contains_key(&account.email) {
            return Err(StoreError::UniqueViolation);
        }

        let created = UserAccount {
            id: Uuid::now_v7(),
            name: account.name,
            email: account.email.clone(),
            password_secret: account.password_secret,
            created_at: now_unix_seconds(),
        };
        accounts.insert(account.email, created.clone());
        Ok(created)
    }
}
