//! Balance oracle
//!
//! The chain is the source of truth for balances; the account document only
//! caches them. A refresh overwrites the cache for every supported token and
//! persists the account. When the chain is unreachable a refresh fails with
//! a network error and the cache is left untouched; `refresh_best_effort`
//! swallows the failure for call sites that tolerate a stale read.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain::{ChainClient, ChainError};
use crate::error::WalletError;
use crate::records::Account;
use crate::store::Store;
use crate::types::{PhoneNumber, Token};

pub struct BalanceOracle {
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainClient>,
}

impl BalanceOracle {
    pub fn new(store: Arc<dyn Store>, chain: Arc<dyn ChainClient>) -> Self {
        Self { store, chain }
    }

    /// Refresh every token balance for the account from the chain and
    /// persist the updated cache. Returns the refreshed account.
    ///
    /// A chain failure propagates as a network error and leaves the cached
    /// values untouched; callers choose between failing their request and
    /// serving the stale cache.
    pub async fn refresh(&self, phone: &PhoneNumber) -> Result<Account, WalletError> {
        let mut account = self
            .store
            .get_account(phone)
            .await?
            .ok_or(WalletError::AccountNotFound)?;

        let balances = self.query_all(&account.address).await.map_err(|e| {
            warn!(phone = %account.phone, error = %e, "balance refresh failed, cache left untouched");
            WalletError::from(e)
        })?;

        for (token, balance) in balances {
            account.balances.insert(token, balance);
        }
        account.updated_at = chrono::Utc::now();
        self.store.upsert_account(&account).await?;
        debug!(phone = %account.phone, "balances refreshed");
        Ok(account)
    }

    /// Refresh without surfacing any error; used where balance freshness is
    /// a nicety rather than a requirement (registration, staging a transfer,
    /// post-settlement refresh).
    pub async fn refresh_best_effort(&self, phone: &PhoneNumber) {
        if let Err(e) = self.refresh(phone).await {
            warn!(phone = %phone, error = %e, "best-effort balance refresh failed");
        }
    }

    async fn query_all(&self, address: &str) -> Result<Vec<(Token, rust_decimal::Decimal)>, ChainError> {
        let mut balances = Vec::with_capacity(Token::ALL.len());
        for token in Token::ALL {
            let balance = if token.is_native() {
                self.chain.native_balance(address).await?
            } else {
                self.chain.token_balance(address, token).await?
            };
            balances.push((token, balance));
        }
        Ok(balances)
    }
}
