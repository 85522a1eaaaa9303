//! Persistent user store behind a capability trait.
//!
//! The signup core only ever sees these two operations; the duplicate-email
//! check-then-act is atomic inside each implementation.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

/// A confirmed, persisted account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_secret: String,
    /// Unix seconds; assigned by the store at creation time.
    pub created_at: i64,
}

/// Account data to persist once a signup is confirmed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    /// Already-derived secret from the activation token, stored as-is.
    pub password_secret: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another account already owns this email (or raced us to it).
    #[error("email already registered")]
    UniqueViolation,
    /// The store could not be reached or the query failed; safe to retry.
    #[error("user store unavailable")]
    Unavailable(#[source] anyhow::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Read-only lookup by normalized email. `Ok(None)` means "not found",
    /// which is distinct from the store being unreachable.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;

    /// Persist a new account. Implementations enforce email uniqueness
    /// atomically and report duplicates as [`StoreError::UniqueViolation`].
    async fn create_account(&self, account: NewAccount) -> Result<UserAccount, StoreError>;
}
