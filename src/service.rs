//! Inbound dispatch
//!
//! `WalletService` is the single entry point for inbound messages: parse,
//! authenticate, dispatch to the owning component and reply. Every path ends
//! in exactly one SMS back to the sender; the recipient receipt after a
//! completed transfer is the one extra message, and it is best effort.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::AuthGuard;
use crate::command::{self, SmsCommand};
use crate::coordinator::{TransferCoordinator, TransferOutcome};
use crate::custody::KeyCustody;
use crate::error::WalletError;
use crate::notify;
use crate::oracle::BalanceOracle;
use crate::records::Account;
use crate::sms::SmsGateway;
use crate::store::Store;
use crate::types::{ConfirmationCode, PhoneNumber, Token};

use rust_decimal::Decimal;

/// An inbound message as handed over by the webhook layer
#[derive(Debug, Clone)]
pub struct InboundSms {
    pub from: PhoneNumber,
    pub body: String,
}

pub struct WalletService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn SmsGateway>,
    custody: Arc<KeyCustody>,
    auth: AuthGuard,
    oracle: Arc<BalanceOracle>,
    coordinator: TransferCoordinator,
}

impl WalletService {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn SmsGateway>,
        custody: Arc<KeyCustody>,
        auth: AuthGuard,
        oracle: Arc<BalanceOracle>,
        coordinator: TransferCoordinator,
    ) -> Self {
        Self {
            store,
            gateway,
            custody,
            auth,
            oracle,
            coordinator,
        }
    }

    /// Process one inbound message end to end. Never returns an error: every
    /// failure becomes a reply to the sender, and a failure to deliver the
    /// reply itself is logged and dropped.
    pub async fn handle_inbound(&self, sms: InboundSms) {
        info!(from = %sms.from, "inbound SMS");

        let reply = match command::parse(&sms.body) {
            Ok(cmd) => match self.dispatch(&sms.from, cmd).await {
                Ok(reply) => reply,
                Err(e) => {
                    if e.is_sensitive() {
                        error!(from = %sms.from, code = e.code(), error = %e, "command failed");
                    } else {
                        info!(from = %sms.from, code = e.code(), "command rejected: {}", e);
                    }
                    notify::error_reply(&e)
                }
            },
            Err(e) => notify::error_reply(&WalletError::Validation(e.0)),
        };

        if let Err(e) = self.gateway.send(&sms.from, &reply).await {
            error!(to = %sms.from, error = %e, "failed to deliver reply");
        }
    }

    async fn dispatch(&self, from: &PhoneNumber, cmd: SmsCommand) -> Result<String, WalletError> {
        match cmd {
            SmsCommand::Register { pin } => self.register(from, &pin).await,
            SmsCommand::Balance { pin } => self.balance(from, &pin).await,
            SmsCommand::Send {
                recipient,
                amount,
                token,
                pin,
            } => self.send(from, recipient, amount, token, &pin).await,
            SmsCommand::Confirm { code, pin } => self.confirm(from, code, &pin).await,
            SmsCommand::Yes => self.confirm_latest(from).await,
            SmsCommand::Help => Ok(notify::help()),
        }
    }

    /// REGISTER: create a wallet, or upgrade the placeholder this number
    /// already received funds into
    async fn register(&self, phone: &PhoneNumber, pin: &str) -> Result<String, WalletError> {
        let pin_hash = AuthGuard::hash_pin(pin)?;

        let account = match self.store.get_account(phone).await? {
            Some(existing) if existing.verified => return Err(WalletError::AccountExists),
            Some(mut placeholder) => {
                // Keep the address funds were already sent to
                placeholder.pin_hash = pin_hash;
                placeholder.verified = true;
                placeholder.last_activity = chrono::Utc::now();
                placeholder
            }
            None => {
                let wallet = self.custody.generate()?;
                Account::new(phone.clone(), wallet.encrypted_key, wallet.address, pin_hash)
            }
        };

        self.store.upsert_account(&account).await?;
        info!(phone = %phone, "account registered");

        // Fresh balances are a nicety at this point, not a requirement
        self.oracle.refresh_best_effort(phone).await;

        Ok(notify::welcome())
    }

    async fn balance(&self, phone: &PhoneNumber, pin: &str) -> Result<String, WalletError> {
        self.auth.authenticate(phone, pin).await?;
        let account = self.oracle.refresh(phone).await?;
        Ok(notify::balance_report(&account))
    }

    async fn send(
        &self,
        phone: &PhoneNumber,
        recipient: PhoneNumber,
        amount: Decimal,
        token: Token,
        pin: &str,
    ) -> Result<String, WalletError> {
        let sender = self.auth.authenticate(phone, pin).await?;
        let pending = self
            .coordinator
            .initiate(&sender, recipient, amount, token)
            .await?;
        Ok(notify::confirm_prompt(&pending))
    }

    async fn confirm(
        &self,
        phone: &PhoneNumber,
        code: ConfirmationCode,
        pin: &str,
    ) -> Result<String, WalletError> {
        let sender = self.auth.authenticate(phone, pin).await?;
        let outcome = self.coordinator.confirm(&sender, &code).await?;
        self.finish_transfer(outcome).await
    }

    /// YES carries no PIN: staging the transfer already authenticated the
    /// sender, and the claim is scoped to their own pending record
    async fn confirm_latest(&self, phone: &PhoneNumber) -> Result<String, WalletError> {
        let sender = self
            .store
            .get_account(phone)
            .await?
            .filter(|a| a.verified)
            .ok_or(WalletError::AccountNotFound)?;
        if sender.locked {
            return Err(WalletError::AccountLocked);
        }
        let outcome = self.coordinator.confirm_latest(&sender).await?;
        self.finish_transfer(outcome).await
    }

    /// Render the completion reply and push the best-effort receipt
    async fn finish_transfer(&self, outcome: TransferOutcome) -> Result<String, WalletError> {
        let transfer = &outcome.transfer;

        if outcome.recipient_verified {
            if let Err(e) = self.send_receipt(transfer.recipient.clone(), transfer).await {
                warn!(
                    transfer_id = %transfer.id,
                    recipient = %transfer.recipient,
                    error = %e,
                    "receipt delivery failed"
                );
            }
        }

        Ok(notify::completion(
            &transfer.recipient,
            transfer.amount,
            transfer.token,
            outcome.sender.balance(transfer.token),
        ))
    }

    async fn send_receipt(
        &self,
        recipient: PhoneNumber,
        transfer: &crate::records::SettledTransfer,
    ) -> Result<(), WalletError> {
        let account = self
            .store
            .get_account(&recipient)
            .await?
            .ok_or(WalletError::AccountNotFound)?;
        let body = notify::receipt(
            &transfer.sender,
            transfer.amount,
            transfer.token,
            account.balance(transfer.token),
        );
        self.gateway
            .send(&recipient, &body)
            .await
            .map_err(|e| WalletError::Network(e.to_string()))
    }
}
