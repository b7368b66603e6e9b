//! In-memory store
//!
//! DashMap-backed implementation used by tests and local development.
//! `DashMap::remove_if` gives the same single-winner claim semantics the
//! PostgreSQL store gets from conditional `DELETE .. RETURNING`.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::{Store, StoreError};
use crate::records::{Account, PendingTransfer, SettledTransfer, SettlementStatus};
use crate::types::{ConfirmationCode, PhoneNumber, TransferId};

#[derive(Default)]
pub struct MemStore {
    accounts: DashMap<PhoneNumber, Account>,
    /// Keyed by sender: at most one live pending transfer per sender
    pending: DashMap<PhoneNumber, PendingTransfer>,
    settled: DashMap<TransferId, SettledTransfer>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every settled transfer, in no particular order
    pub fn all_settled(&self) -> Vec<SettledTransfer> {
        self.settled.iter().map(|t| t.clone()).collect()
    }

    /// CAS on a settled transfer's status
    fn update_settled_if(
        &self,
        id: TransferId,
        expected: SettlementStatus,
        apply: impl FnOnce(&mut SettledTransfer),
    ) -> bool {
        match self.settled.get_mut(&id) {
            Some(mut entry) if entry.status == expected => {
                apply(&mut entry);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Store for MemStore {
    async fn get_account(&self, phone: &PhoneNumber) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(phone).map(|a| a.clone()))
    }

    async fn upsert_account(&self, account: &Account) -> Result<(), StoreError> {
        self.accounts.insert(account.phone.clone(), account.clone());
        Ok(())
    }

    async fn put_pending(&self, pending: &PendingTransfer) -> Result<(), StoreError> {
        self.pending.insert(pending.sender.clone(), pending.clone());
        Ok(())
    }

    async fn claim_pending(
        &self,
        sender: &PhoneNumber,
        code: &ConfirmationCode,
    ) -> Result<Option<PendingTransfer>, StoreError> {
        let now = Utc::now();
        Ok(self
            .pending
            .remove_if(sender, |_, p| p.code == *code && !p.is_expired_at(now))
            .map(|(_, p)| p))
    }

    async fn claim_latest_pending(
        &self,
        sender: &PhoneNumber,
    ) -> Result<Option<PendingTransfer>, StoreError> {
        let now = Utc::now();
        Ok(self
            .pending
            .remove_if(sender, |_, p| !p.is_expired_at(now))
            .map(|(_, p)| p))
    }

    async fn purge_expired_pending(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        // Counted inside the predicate: a concurrent put_pending between two
        // len() reads would skew a before/after count
        let mut purged = 0u64;
        self.pending.retain(|_, p| {
            let keep = !p.is_expired_at(now);
            if !keep {
                purged += 1;
            }
            keep
        });
        Ok(purged)
    }

    async fn insert_settled(&self, transfer: &SettledTransfer) -> Result<(), StoreError> {
        self.settled.insert(transfer.id, transfer.clone());
        Ok(())
    }

    async fn get_settled(&self, id: TransferId) -> Result<Option<SettledTransfer>, StoreError> {
        Ok(self.settled.get(&id).map(|t| t.clone()))
    }

    async fn complete_settled(&self, id: TransferId, tx_hash: &str) -> Result<bool, StoreError> {
        Ok(
            self.update_settled_if(id, SettlementStatus::Executing, |t| {
                t.status = SettlementStatus::Completed;
                t.tx_hash = Some(tx_hash.to_string());
                t.completed_at = Some(Utc::now());
            }),
        )
    }

    async fn fail_settled(&self, id: TransferId, error: &str) -> Result<bool, StoreError> {
        Ok(
            self.update_settled_if(id, SettlementStatus::Executing, |t| {
                t.status = SettlementStatus::Failed;
                t.error = Some(error.to_string());
                t.completed_at = Some(Utc::now());
            }),
        )
    }

    async fn mark_executing(&self, id: TransferId) -> Result<bool, StoreError> {
        Ok(self.update_settled_if(id, SettlementStatus::Pending, |t| {
            t.status = SettlementStatus::Executing;
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    use crate::types::Token;

    fn phone(s: &str) -> PhoneNumber {
        PhoneNumber::parse(s).unwrap()
    }

    fn pending(sender: &str, ttl_secs: i64) -> PendingTransfer {
        PendingTransfer::new(
            phone(sender),
            phone("+15557654321"),
            Decimal::from(5),
            Token::Usdc,
            Duration::seconds(ttl_secs),
        )
    }

    #[tokio::test]
    async fn test_account_roundtrip() {
        let store = MemStore::new();
        let account = Account::new(phone("+15551234567"), "env".into(), "addr".into(), "hash".into());

        assert!(store.get_account(&account.phone).await.unwrap().is_none());
        store.upsert_account(&account).await.unwrap();

        let loaded = store.get_account(&account.phone).await.unwrap().unwrap();
        assert_eq!(loaded.address, "addr");
        assert!(loaded.verified);
    }

    #[tokio::test]
    async fn test_claim_pending_by_code() {
        let store = MemStore::new();
        let p = pending("+15551234567", 300);
        store.put_pending(&p).await.unwrap();

        // Wrong code claims nothing and leaves the record in place
        let wrong = ConfirmationCode::parse("ZZZZZZ").unwrap();
        assert!(store.claim_pending(&p.sender, &wrong).await.unwrap().is_none());

        let claimed = store.claim_pending(&p.sender, &p.code).await.unwrap().unwrap();
        assert_eq!(claimed.code, p.code);

        // Claim removed the record: a second claim finds nothing
        assert!(store.claim_pending(&p.sender, &p.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_expired_fails() {
        let store = MemStore::new();
        let p = pending("+15551234567", -1); // already expired
        store.put_pending(&p).await.unwrap();

        assert!(store.claim_pending(&p.sender, &p.code).await.unwrap().is_none());
        assert!(store.claim_latest_pending(&p.sender).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_pending_replaces_previous() {
        let store = MemStore::new();
        let first = pending("+15551234567", 300);
        let second = pending("+15551234567", 300);
        store.put_pending(&first).await.unwrap();
        store.put_pending(&second).await.unwrap();

        // The first code is dead after replacement
        assert!(
            store
                .claim_pending(&first.sender, &first.code)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .claim_pending(&second.sender, &second.code)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        let store = Arc::new(MemStore::new());
        let p = pending("+15551234567", 300);
        store.put_pending(&p).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let sender = p.sender.clone();
            let code = p.code.clone();
            handles.push(tokio::spawn(async move {
                store.claim_pending(&sender, &code).await.unwrap().is_some()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemStore::new();
        store.put_pending(&pending("+15551111111", -1)).await.unwrap();
        store.put_pending(&pending("+15552222222", 300)).await.unwrap();

        assert_eq!(store.purge_expired_pending().await.unwrap(), 1);
        assert_eq!(store.purge_expired_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_settled_status_cas() {
        let store = MemStore::new();
        let t = SettledTransfer::new(
            phone("+15551234567"),
            phone("+15557654321"),
            "a1".into(),
            "a2".into(),
            Decimal::from(5),
            Token::Usdc,
        );
        store.insert_settled(&t).await.unwrap();

        // Completing before executing is refused
        assert!(!store.complete_settled(t.id, "0xabc").await.unwrap());

        assert!(store.mark_executing(t.id).await.unwrap());
        // Double mark is refused
        assert!(!store.mark_executing(t.id).await.unwrap());

        assert!(store.complete_settled(t.id, "0xabc").await.unwrap());
        // Terminal record is immutable
        assert!(!store.fail_settled(t.id, "late error").await.unwrap());

        let loaded = store.get_settled(t.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SettlementStatus::Completed);
        assert_eq!(loaded.tx_hash.as_deref(), Some("0xabc"));
        assert!(loaded.completed_at.is_some());
    }
}
