//! Transfer coordinator
//!
//! Two-phase transfers: SEND stages a `PendingTransfer` with a confirmation
//! code, CONFIRM (or a bare YES) claims it and executes on chain. The claim
//! is the store's atomic remove-and-return, so a code can be spent exactly
//! once no matter how many confirmations race. Execution is journaled as a
//! `SettledTransfer` whose status only moves forward; a chain failure is
//! written to the journal before the error propagates.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::chain::ChainClient;
use crate::custody::KeyCustody;
use crate::error::WalletError;
use crate::oracle::BalanceOracle;
use crate::records::{Account, PendingTransfer, SettledTransfer};
use crate::store::Store;
use crate::types::{ConfirmationCode, PhoneNumber, Token};

use rust_decimal::Decimal;

pub struct TransferCoordinator {
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainClient>,
    custody: Arc<KeyCustody>,
    oracle: Arc<BalanceOracle>,
    /// How long a staged transfer stays claimable
    confirm_ttl: chrono::Duration,
}

/// Result of a completed execution: the journal record plus the sender's
/// account with refreshed balances, for the completion SMS
#[derive(Debug)]
pub struct TransferOutcome {
    pub transfer: SettledTransfer,
    pub sender: Account,
    pub recipient_verified: bool,
}

impl TransferCoordinator {
    pub fn new(
        store: Arc<dyn Store>,
        chain: Arc<dyn ChainClient>,
        custody: Arc<KeyCustody>,
        oracle: Arc<BalanceOracle>,
        confirm_ttl: chrono::Duration,
    ) -> Self {
        Self {
            store,
            chain,
            custody,
            oracle,
            confirm_ttl,
        }
    }

    /// Stage a transfer: validate, provision the recipient if unknown, and
    /// record a pending transfer. Replaces any earlier unconfirmed transfer
    /// by the same sender. Nothing moves on chain yet.
    pub async fn initiate(
        &self,
        sender: &Account,
        recipient: PhoneNumber,
        amount: Decimal,
        token: Token,
    ) -> Result<PendingTransfer, WalletError> {
        if recipient == sender.phone {
            return Err(WalletError::Validation(
                "You cannot send money to yourself.".to_string(),
            ));
        }

        // The staging check runs against the cached balance; a chain outage
        // must not block staging, and execution re-checks on chain anyway
        self.oracle.refresh_best_effort(&sender.phone).await;
        let sender = self
            .store
            .get_account(&sender.phone)
            .await?
            .ok_or(WalletError::AccountNotFound)?;
        if sender.balance(token) < amount {
            return Err(WalletError::InsufficientFunds { token });
        }

        self.ensure_recipient(&recipient).await?;

        let pending = PendingTransfer::new(
            sender.phone.clone(),
            recipient,
            amount,
            token,
            self.confirm_ttl,
        );
        self.store.put_pending(&pending).await?;

        info!(
            sender = %pending.sender,
            recipient = %pending.recipient,
            amount = %pending.amount,
            token = %pending.token,
            "transfer staged, awaiting confirmation"
        );
        Ok(pending)
    }

    /// Confirm by code. Exactly one of any concurrent confirmations with the
    /// same code proceeds to execution; the rest see `ExpiredOrNotFound`.
    pub async fn confirm(
        &self,
        sender: &Account,
        code: &ConfirmationCode,
    ) -> Result<TransferOutcome, WalletError> {
        let pending = self
            .store
            .claim_pending(&sender.phone, code)
            .await?
            .ok_or(WalletError::ExpiredOrNotFound)?;

        self.execute(pending).await
    }

    /// Confirm the sender's latest staged transfer without a code (YES)
    pub async fn confirm_latest(&self, sender: &Account) -> Result<TransferOutcome, WalletError> {
        let pending = self
            .store
            .claim_latest_pending(&sender.phone)
            .await?
            .ok_or(WalletError::NoPendingTransfer)?;

        self.execute(pending).await
    }

    /// Drop staged transfers past their expiry; for the maintenance loop.
    /// Claims already refuse expired records, this just reclaims storage.
    pub async fn purge_expired(&self) -> Result<u64, WalletError> {
        let purged = self.store.purge_expired_pending().await?;
        if purged > 0 {
            info!(purged, "expired pending transfers reclaimed");
        }
        Ok(purged)
    }

    /// Spawn the periodic expiry sweep
    pub fn spawn_expiry_sweeper(
        coordinator: Arc<TransferCoordinator>,
        period: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = coordinator.purge_expired().await {
                    warn!(error = %e, "expiry sweep failed");
                }
            }
        })
    }

    /// Auto-provision a placeholder account so the recipient has an address
    /// to receive into before they ever register
    async fn ensure_recipient(&self, recipient: &PhoneNumber) -> Result<Account, WalletError> {
        if let Some(account) = self.store.get_account(recipient).await? {
            return Ok(account);
        }

        let wallet = self.custody.generate()?;
        let account =
            Account::placeholder(recipient.clone(), wallet.encrypted_key, wallet.address);
        self.store.upsert_account(&account).await?;
        info!(recipient = %recipient, "placeholder account provisioned");
        Ok(account)
    }

    /// Execute a claimed transfer on chain, journaling every step.
    ///
    /// Status walk: insert Pending, CAS to Executing, chain call, CAS to
    /// Completed or Failed. The Failed write happens before the error
    /// returns so the journal never loses a failure.
    async fn execute(&self, pending: PendingTransfer) -> Result<TransferOutcome, WalletError> {
        let sender = self
            .store
            .get_account(&pending.sender)
            .await?
            .ok_or(WalletError::AccountNotFound)?;
        let recipient = self
            .store
            .get_account(&pending.recipient)
            .await?
            .ok_or(WalletError::AccountNotFound)?;

        let mut transfer = SettledTransfer::new(
            pending.sender.clone(),
            pending.recipient.clone(),
            sender.address.clone(),
            recipient.address.clone(),
            pending.amount,
            pending.token,
        );
        self.store.insert_settled(&transfer).await?;

        if !self.store.mark_executing(transfer.id).await? {
            // Someone else holds this record; the claim should make this
            // unreachable, treat it as a spent code
            return Err(WalletError::ExpiredOrNotFound);
        }

        let signing_key = match self.custody.decrypt(&sender.encrypted_key) {
            Ok(key) => key,
            Err(e) => {
                let err = WalletError::from(e);
                self.journal_failure(&transfer, &err).await;
                return Err(err);
            }
        };

        let tx_hash = match self
            .chain
            .send_token(&signing_key, &recipient.address, pending.amount, pending.token)
            .await
        {
            Ok(hash) => hash,
            Err(e) => {
                let err = WalletError::from(e);
                self.journal_failure(&transfer, &err).await;
                return Err(err);
            }
        };

        if !self.store.complete_settled(transfer.id, &tx_hash).await? {
            warn!(transfer_id = %transfer.id, "completion write lost the status race");
        }
        transfer.status = crate::records::SettlementStatus::Completed;
        transfer.tx_hash = Some(tx_hash.clone());

        info!(
            transfer_id = %transfer.id,
            tx_hash = %tx_hash,
            sender = %transfer.sender,
            recipient = %transfer.recipient,
            "transfer completed"
        );

        // Post-settlement refreshes are best effort on both sides: the
        // transfer is already terminal and a refresh failure must not
        // re-fail it
        self.oracle.refresh_best_effort(&transfer.sender).await;
        self.oracle.refresh_best_effort(&transfer.recipient).await;
        let sender = self
            .store
            .get_account(&transfer.sender)
            .await?
            .ok_or(WalletError::AccountNotFound)?;

        Ok(TransferOutcome {
            transfer,
            sender,
            recipient_verified: recipient.verified,
        })
    }

    async fn journal_failure(&self, transfer: &SettledTransfer, err: &WalletError) {
        error!(
            transfer_id = %transfer.id,
            code = err.code(),
            error = %err,
            "transfer execution failed"
        );
        if let Err(write_err) = self.store.fail_settled(transfer.id, &err.to_string()).await {
            error!(
                transfer_id = %transfer.id,
                error = %write_err,
                "failed to journal transfer failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthGuard;
    use crate::chain::mock::MockChainClient;
    use crate::records::SettlementStatus;
    use crate::store::MemStore;

    const TEST_CIPHER_KEY: &str =
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    struct Fixture {
        store: Arc<MemStore>,
        chain: Arc<MockChainClient>,
        custody: Arc<KeyCustody>,
        coordinator: TransferCoordinator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemStore::new());
        let chain = Arc::new(MockChainClient::new());
        let custody = Arc::new(KeyCustody::new(TEST_CIPHER_KEY).unwrap());
        let oracle = Arc::new(BalanceOracle::new(store.clone(), chain.clone()));
        let coordinator = TransferCoordinator::new(
            store.clone(),
            chain.clone(),
            custody.clone(),
            oracle,
            chrono::Duration::minutes(5),
        );
        Fixture {
            store,
            chain,
            custody,
            coordinator,
        }
    }

    fn phone(s: &str) -> PhoneNumber {
        PhoneNumber::parse(s).unwrap()
    }

    async fn registered_account(fx: &Fixture, p: &PhoneNumber, usdc: i64) -> Account {
        let wallet = fx.custody.generate().unwrap();
        fx.chain.fund(&wallet.address, Token::Usdc, Decimal::from(usdc));
        let account = Account::new(
            p.clone(),
            wallet.encrypted_key,
            wallet.address,
            AuthGuard::hash_pin("1234").unwrap(),
        );
        fx.store.upsert_account(&account).await.unwrap();
        account
    }

    #[tokio::test]
    async fn test_initiate_then_confirm() {
        let fx = fixture();
        let alice = phone("+15557770001");
        let bob = phone("+15557770002");
        let sender = registered_account(&fx, &alice, 100).await;
        registered_account(&fx, &bob, 0).await;

        let pending = fx
            .coordinator
            .initiate(&sender, bob.clone(), Decimal::from(25), Token::Usdc)
            .await
            .unwrap();

        let outcome = fx.coordinator.confirm(&sender, &pending.code).await.unwrap();
        assert_eq!(outcome.transfer.status, SettlementStatus::Completed);
        assert!(outcome.transfer.tx_hash.is_some());
        assert_eq!(outcome.sender.balance(Token::Usdc), Decimal::from(75));
        assert!(outcome.recipient_verified);

        // Journal record is terminal and carries the hash
        let stored = fx
            .store
            .get_settled(outcome.transfer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SettlementStatus::Completed);
        assert_eq!(stored.tx_hash, outcome.transfer.tx_hash);

        // Recipient cache got refreshed
        let recipient = fx.store.get_account(&bob).await.unwrap().unwrap();
        assert_eq!(recipient.balance(Token::Usdc), Decimal::from(25));
    }

    #[tokio::test]
    async fn test_code_spent_exactly_once() {
        let fx = fixture();
        let alice = phone("+15557770003");
        let bob = phone("+15557770004");
        let sender = registered_account(&fx, &alice, 100).await;
        registered_account(&fx, &bob, 0).await;

        let pending = fx
            .coordinator
            .initiate(&sender, bob, Decimal::from(10), Token::Usdc)
            .await
            .unwrap();

        fx.coordinator.confirm(&sender, &pending.code).await.unwrap();

        let err = fx
            .coordinator
            .confirm(&sender, &pending.code)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::ExpiredOrNotFound));
        assert_eq!(fx.chain.send_count(), 1);
    }

    #[tokio::test]
    async fn test_self_send_rejected() {
        let fx = fixture();
        let alice = phone("+15557770005");
        let sender = registered_account(&fx, &alice, 100).await;

        let err = fx
            .coordinator
            .initiate(&sender, alice, Decimal::from(5), Token::Usdc)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Validation(_)));
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let fx = fixture();
        let alice = phone("+15557770006");
        let bob = phone("+15557770007");
        let sender = registered_account(&fx, &alice, 3).await;

        let err = fx
            .coordinator
            .initiate(&sender, bob, Decimal::from(10), Token::Usdc)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientFunds { token: Token::Usdc }
        ));
    }

    #[tokio::test]
    async fn test_unknown_recipient_gets_placeholder() {
        let fx = fixture();
        let alice = phone("+15557770008");
        let carol = phone("+15557770009");
        let sender = registered_account(&fx, &alice, 100).await;

        let pending = fx
            .coordinator
            .initiate(&sender, carol.clone(), Decimal::from(7), Token::Usdc)
            .await
            .unwrap();

        let placeholder = fx.store.get_account(&carol).await.unwrap().unwrap();
        assert!(!placeholder.verified);
        assert!(!placeholder.address.is_empty());

        // Transfer still executes into the placeholder's address
        let outcome = fx.coordinator.confirm(&sender, &pending.code).await.unwrap();
        assert_eq!(outcome.transfer.recipient_address, placeholder.address);
        assert!(!outcome.recipient_verified);
    }

    #[tokio::test]
    async fn test_new_send_replaces_previous_pending() {
        let fx = fixture();
        let alice = phone("+15557770010");
        let bob = phone("+15557770011");
        let sender = registered_account(&fx, &alice, 100).await;
        registered_account(&fx, &bob, 0).await;

        let first = fx
            .coordinator
            .initiate(&sender, bob.clone(), Decimal::from(5), Token::Usdc)
            .await
            .unwrap();
        let second = fx
            .coordinator
            .initiate(&sender, bob, Decimal::from(9), Token::Usdc)
            .await
            .unwrap();

        // Old code is dead
        let err = fx.coordinator.confirm(&sender, &first.code).await.unwrap_err();
        assert!(matches!(err, WalletError::ExpiredOrNotFound));

        let outcome = fx.coordinator.confirm(&sender, &second.code).await.unwrap();
        assert_eq!(outcome.transfer.amount, Decimal::from(9));
    }

    #[tokio::test]
    async fn test_confirm_latest_without_code() {
        let fx = fixture();
        let alice = phone("+15557770012");
        let bob = phone("+15557770013");
        let sender = registered_account(&fx, &alice, 100).await;
        registered_account(&fx, &bob, 0).await;

        fx.coordinator
            .initiate(&sender, bob, Decimal::from(12), Token::Usdc)
            .await
            .unwrap();

        let outcome = fx.coordinator.confirm_latest(&sender).await.unwrap();
        assert_eq!(outcome.transfer.amount, Decimal::from(12));

        // Nothing left to confirm
        let err = fx.coordinator.confirm_latest(&sender).await.unwrap_err();
        assert!(matches!(err, WalletError::NoPendingTransfer));
    }

    #[tokio::test]
    async fn test_chain_failure_journals_failed_status() {
        let fx = fixture();
        let alice = phone("+15557770014");
        let bob = phone("+15557770015");
        let sender = registered_account(&fx, &alice, 100).await;
        registered_account(&fx, &bob, 0).await;

        let pending = fx
            .coordinator
            .initiate(&sender, bob, Decimal::from(20), Token::Usdc)
            .await
            .unwrap();

        fx.chain.set_fail_network(true);
        let err = fx
            .coordinator
            .confirm(&sender, &pending.code)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Network(_)));

        // The journal saw the failure before the error surfaced
        let failed: Vec<_> = fx
            .store
            .all_settled()
            .into_iter()
            .filter(|t| t.status == SettlementStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error.as_deref().unwrap().contains("Network"));
        assert!(failed[0].tx_hash.is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_after_settlement_keeps_transfer_completed() {
        let fx = fixture();
        let alice = phone("+15557770018");
        let bob = phone("+15557770019");
        let sender = registered_account(&fx, &alice, 100).await;
        registered_account(&fx, &bob, 0).await;

        let pending = fx
            .coordinator
            .initiate(&sender, bob, Decimal::from(20), Token::Usdc)
            .await
            .unwrap();

        // Balance queries go dark after staging; the transfer itself works
        fx.chain.set_fail_balance(true);
        let outcome = fx.coordinator.confirm(&sender, &pending.code).await.unwrap();

        // Settlement is terminal despite the failed post-settlement refresh
        assert_eq!(outcome.transfer.status, SettlementStatus::Completed);
        let stored = fx
            .store
            .get_settled(outcome.transfer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, SettlementStatus::Completed);

        // The sender's balance is the last cached value, not an invented one
        assert_eq!(outcome.sender.balance(Token::Usdc), Decimal::from(100));
    }

    #[tokio::test]
    async fn test_concurrent_confirms_single_execution() {
        let fx = fixture();
        let alice = phone("+15557770016");
        let bob = phone("+15557770017");
        let sender = registered_account(&fx, &alice, 100).await;
        registered_account(&fx, &bob, 0).await;

        let pending = fx
            .coordinator
            .initiate(&sender, bob, Decimal::from(30), Token::Usdc)
            .await
            .unwrap();

        let coordinator = Arc::new(fx.coordinator);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            let sender = sender.clone();
            let code = pending.code.clone();
            handles.push(tokio::spawn(async move {
                coordinator.confirm(&sender, &code).await.is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(fx.chain.send_count(), 1);
    }
}
