//! Wallet error taxonomy
//!
//! One error enum across the protocol layer. `Display` text is what the
//! sender reads in the error reply, so messages stay in plain command-line
//! English. Custody failures are the one exception: they are logged in full
//! and replaced with a generic message at the transport boundary.

use thiserror::Error;

use crate::types::Token;

/// Protocol-level errors surfaced by command handlers
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    // === Validation ===
    #[error("{0}")]
    Validation(String),

    // === Authentication ===
    #[error("Invalid PIN")]
    InvalidPin,

    #[error("Account is locked due to too many failed attempts")]
    AccountLocked,

    #[error("Account not found. Text REGISTER <PIN> to create a wallet.")]
    AccountNotFound,

    #[error("An account already exists for this phone number")]
    AccountExists,

    // === Transfers ===
    #[error("Insufficient {token} balance")]
    InsufficientFunds { token: Token },

    #[error("Invalid confirmation code or expired transaction")]
    ExpiredOrNotFound,

    #[error("No pending transaction to confirm")]
    NoPendingTransfer,

    // === Infrastructure ===
    #[error("Network error: {0}")]
    Network(String),

    /// Key decryption failure. Never shown verbatim to the end user.
    #[error("Custody error: {0}")]
    Custody(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl WalletError {
    /// Stable error code for logs and structured events
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::Validation(_) => "VALIDATION",
            WalletError::InvalidPin => "INVALID_PIN",
            WalletError::AccountLocked => "ACCOUNT_LOCKED",
            WalletError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            WalletError::AccountExists => "ACCOUNT_EXISTS",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::ExpiredOrNotFound => "EXPIRED_OR_NOT_FOUND",
            WalletError::NoPendingTransfer => "NO_PENDING_TRANSFER",
            WalletError::Network(_) => "NETWORK_ERROR",
            WalletError::Custody(_) => "CUSTODY_ERROR",
            WalletError::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the cause must be hidden from the end user
    pub fn is_sensitive(&self) -> bool {
        matches!(self, WalletError::Custody(_))
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::Store(e.to_string())
    }
}

impl From<crate::types::TypeError> for WalletError {
    fn from(e: crate::types::TypeError) -> Self {
        WalletError::Validation(e.to_string())
    }
}

impl From<crate::money::MoneyError> for WalletError {
    fn from(e: crate::money::MoneyError) -> Self {
        WalletError::Validation(e.to_string())
    }
}

impl From<crate::custody::CustodyError> for WalletError {
    fn from(e: crate::custody::CustodyError) -> Self {
        WalletError::Custody(e.to_string())
    }
}

impl From<crate::chain::ChainError> for WalletError {
    fn from(e: crate::chain::ChainError) -> Self {
        WalletError::Network(e.to_string())
    }
}

impl From<crate::store::StoreError> for WalletError {
    fn from(e: crate::store::StoreError) -> Self {
        WalletError::Store(e.to_string())
    }
}
