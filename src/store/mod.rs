//! Durable store
//!
//! Document store keyed by phone number (accounts, pending transfers) and
//! transfer id (settled transfers). No cross-document transactions are
//! assumed; the only atomicity the protocol relies on is the single-document
//! claim of a pending transfer, which every implementation must provide as a
//! conditional remove-and-return so exactly one concurrent confirmer wins.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::records::{Account, PendingTransfer, SettledTransfer};
use crate::types::{ConfirmationCode, PhoneNumber, TransferId};

pub use memory::MemStore;
pub use postgres::PgStore;

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Durable document store
#[async_trait]
pub trait Store: Send + Sync {
    // === Accounts ===

    async fn get_account(&self, phone: &PhoneNumber) -> Result<Option<Account>, StoreError>;

    /// Insert or fully overwrite an account document
    async fn upsert_account(&self, account: &Account) -> Result<(), StoreError>;

    // === Pending transfers (at most one live per sender) ===

    /// Record a pending transfer, replacing the sender's previous one if any
    async fn put_pending(&self, pending: &PendingTransfer) -> Result<(), StoreError>;

    /// Atomically remove and return the sender's pending transfer matching
    /// `code`, provided it has not expired. At most one concurrent caller
    /// observes `Some`.
    async fn claim_pending(
        &self,
        sender: &PhoneNumber,
        code: &ConfirmationCode,
    ) -> Result<Option<PendingTransfer>, StoreError>;

    /// Atomically remove and return the sender's live pending transfer
    /// regardless of code (the bare-YES path)
    async fn claim_latest_pending(
        &self,
        sender: &PhoneNumber,
    ) -> Result<Option<PendingTransfer>, StoreError>;

    /// Drop every expired pending transfer; returns how many were reclaimed
    async fn purge_expired_pending(&self) -> Result<u64, StoreError>;

    // === Settled transfers ===

    async fn insert_settled(&self, transfer: &SettledTransfer) -> Result<(), StoreError>;

    async fn get_settled(&self, id: TransferId) -> Result<Option<SettledTransfer>, StoreError>;

    /// CAS: Executing -> Completed with the chain transaction id.
    /// Returns false if the record was not in Executing.
    async fn complete_settled(&self, id: TransferId, tx_hash: &str) -> Result<bool, StoreError>;

    /// CAS: Executing -> Failed with the captured error message
    async fn fail_settled(&self, id: TransferId, error: &str) -> Result<bool, StoreError>;

    /// CAS: Pending -> Executing
    async fn mark_executing(&self, id: TransferId) -> Result<bool, StoreError>;
}
