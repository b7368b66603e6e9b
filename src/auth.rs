//! PIN authentication
//!
//! Every authenticated command carries the PIN inline, so verification runs
//! on each message. Failures are counted on the account document; the fifth
//! consecutive failure locks the account, and a locked account stays locked
//! until cleared out-of-band. The lock check runs before the hash so a locked
//! account leaks nothing about PIN correctness.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;
use tracing::warn;

use crate::error::WalletError;
use crate::records::Account;
use crate::store::Store;
use crate::types::PhoneNumber;

/// Consecutive failures that trip the lock
pub const MAX_PIN_ATTEMPTS: i32 = 5;

pub struct AuthGuard {
    store: Arc<dyn Store>,
}

impl AuthGuard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Hash a PIN into a PHC string for persistence
    pub fn hash_pin(pin: &str) -> Result<String, WalletError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| WalletError::Custody(format!("PIN hashing failed: {}", e)))?
            .to_string();
        Ok(hash)
    }

    fn verify_hash(pin: &str, pin_hash: &str) -> bool {
        match PasswordHash::new(pin_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(pin.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Load the account and verify the PIN, enforcing the lockout policy.
    ///
    /// Order of checks: existence, lock state, then the hash. The failure
    /// counter is persisted before the error returns so a crash cannot
    /// forget an attempt it already rejected.
    pub async fn authenticate(&self, phone: &PhoneNumber, pin: &str) -> Result<Account, WalletError> {
        let mut account = self
            .store
            .get_account(phone)
            .await?
            .filter(|a| a.verified)
            .ok_or(WalletError::AccountNotFound)?;

        if account.locked {
            return Err(WalletError::AccountLocked);
        }

        if !Self::verify_hash(pin, &account.pin_hash) {
            account.pin_fail_attempts += 1;
            if account.pin_fail_attempts >= MAX_PIN_ATTEMPTS {
                account.locked = true;
                warn!(
                    phone = %account.phone,
                    attempts = account.pin_fail_attempts,
                    "account locked after repeated PIN failures"
                );
            }
            let locked = account.locked;
            self.store.upsert_account(&account).await?;

            return Err(if locked {
                WalletError::AccountLocked
            } else {
                WalletError::InvalidPin
            });
        }

        if account.pin_fail_attempts > 0 {
            account.pin_fail_attempts = 0;
        }
        account.last_activity = chrono::Utc::now();
        self.store.upsert_account(&account).await?;

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn phone(s: &str) -> PhoneNumber {
        PhoneNumber::parse(s).unwrap()
    }

    async fn seed_account(store: &MemStore, p: &PhoneNumber, pin: &str) {
        let hash = AuthGuard::hash_pin(pin).unwrap();
        let account = Account::new(p.clone(), "env".into(), "addr".into(), hash);
        store.upsert_account(&account).await.unwrap();
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = AuthGuard::hash_pin("1234").unwrap();
        assert!(AuthGuard::verify_hash("1234", &hash));
        assert!(!AuthGuard::verify_hash("4321", &hash));
    }

    #[test]
    fn test_empty_hash_never_verifies() {
        // Placeholder accounts persist an empty pin_hash
        assert!(!AuthGuard::verify_hash("1234", ""));
    }

    #[tokio::test]
    async fn test_authenticate_success_resets_counter() {
        let store = Arc::new(MemStore::new());
        let p = phone("+15551230001");
        seed_account(&store, &p, "1234").await;

        let guard = AuthGuard::new(store.clone());

        // Two failures, then success
        assert!(guard.authenticate(&p, "0000").await.is_err());
        assert!(guard.authenticate(&p, "0000").await.is_err());
        let account = guard.authenticate(&p, "1234").await.unwrap();
        assert_eq!(account.pin_fail_attempts, 0);

        let stored = store.get_account(&p).await.unwrap().unwrap();
        assert_eq!(stored.pin_fail_attempts, 0);
        assert!(!stored.locked);
    }

    #[tokio::test]
    async fn test_lockout_after_five_failures() {
        let store = Arc::new(MemStore::new());
        let p = phone("+15551230002");
        seed_account(&store, &p, "1234").await;

        let guard = AuthGuard::new(store.clone());

        for i in 1..=MAX_PIN_ATTEMPTS {
            let err = guard.authenticate(&p, "9999").await.unwrap_err();
            if i < MAX_PIN_ATTEMPTS {
                assert!(matches!(err, WalletError::InvalidPin), "attempt {}", i);
            } else {
                assert!(matches!(err, WalletError::AccountLocked));
            }
        }

        let stored = store.get_account(&p).await.unwrap().unwrap();
        assert!(stored.locked);
        assert_eq!(stored.pin_fail_attempts, MAX_PIN_ATTEMPTS);

        // Correct PIN no longer helps
        let err = guard.authenticate(&p, "1234").await.unwrap_err();
        assert!(matches!(err, WalletError::AccountLocked));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let store = Arc::new(MemStore::new());
        let guard = AuthGuard::new(store);
        let err = guard
            .authenticate(&phone("+15551230003"), "1234")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::AccountNotFound));
    }

    #[tokio::test]
    async fn test_placeholder_account_is_not_authenticable() {
        let store = Arc::new(MemStore::new());
        let p = phone("+15551230004");
        let account = Account::placeholder(p.clone(), "env".into(), "addr".into());
        store.upsert_account(&account).await.unwrap();

        let guard = AuthGuard::new(store);
        let err = guard.authenticate(&p, "1234").await.unwrap_err();
        assert!(matches!(err, WalletError::AccountNotFound));
    }
}
