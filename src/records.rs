//! Persisted records
//!
//! Store-owned documents: `Account`, `PendingTransfer` and `SettledTransfer`.
//! Status IDs are designed for PostgreSQL storage as SMALLINT.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::types::{ConfirmationCode, PhoneNumber, Token, TransferId};

// ============================================================================
// Account
// ============================================================================

/// A phone-number-identified custodial account.
///
/// Exactly one wallet address per account, fixed for the account's lifetime.
/// A placeholder account (`verified == false`) is auto-provisioned when an
/// unknown phone number is named as a transfer recipient; registration later
/// upgrades it in place, keeping the address.
#[derive(Debug, Clone)]
pub struct Account {
    pub phone: PhoneNumber,
    /// Custody envelope, the only persisted form of the signing key
    pub encrypted_key: String,
    /// Derived wallet address, hex-encoded public key
    pub address: String,
    /// Argon2 PHC hash of the PIN
    pub pin_hash: String,
    /// Consecutive failed PIN attempts; reset on success
    pub pin_fail_attempts: i32,
    /// Set after too many failed attempts; cleared only out-of-band
    pub locked: bool,
    /// Cached on-chain balances, overwritten on refresh
    pub balances: HashMap<Token, Decimal>,
    /// False for placeholder accounts awaiting their own registration
    pub verified: bool,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a fully registered account
    pub fn new(phone: PhoneNumber, encrypted_key: String, address: String, pin_hash: String) -> Self {
        let now = Utc::now();
        Self {
            phone,
            encrypted_key,
            address,
            pin_hash,
            pin_fail_attempts: 0,
            locked: false,
            balances: Token::ALL.iter().map(|t| (*t, Decimal::ZERO)).collect(),
            verified: true,
            last_activity: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an unverified placeholder for a recipient that has not
    /// registered yet. The PIN hash is empty and can never verify.
    pub fn placeholder(phone: PhoneNumber, encrypted_key: String, address: String) -> Self {
        let mut account = Self::new(phone, encrypted_key, address, String::new());
        account.verified = false;
        account
    }

    /// Cached balance for a token, zero if never refreshed
    pub fn balance(&self, token: Token) -> Decimal {
        self.balances.get(&token).copied().unwrap_or_default()
    }
}

// ============================================================================
// PendingTransfer
// ============================================================================

/// A transfer awaiting confirmation by its sender.
///
/// Owned by the coordinator for its short lifetime: created on SEND, removed
/// on claim, replacement or expiry. At most one live record per sender.
#[derive(Debug, Clone)]
pub struct PendingTransfer {
    pub code: ConfirmationCode,
    pub sender: PhoneNumber,
    pub recipient: PhoneNumber,
    pub amount: Decimal,
    pub token: Token,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingTransfer {
    pub fn new(
        sender: PhoneNumber,
        recipient: PhoneNumber,
        amount: Decimal,
        token: Token,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            code: ConfirmationCode::generate(),
            sender,
            recipient,
            amount,
            token,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ============================================================================
// SettlementStatus
// ============================================================================

/// Settled-transfer lifecycle status
///
/// Transitions are monotonic and one-directional:
/// Pending -> Executing -> Completed | Failed. Terminal records are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum SettlementStatus {
    /// Recorded, execution not yet started
    Pending = 0,

    /// Chain call in flight - must eventually reach a terminal status
    Executing = 10,

    /// Terminal: on-chain transfer confirmed submitted
    Completed = 20,

    /// Terminal: execution failed, error message recorded
    Failed = -10,
}

impl SettlementStatus {
    /// Check if this is a terminal status (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementStatus::Completed | SettlementStatus::Failed)
    }

    /// Numeric status ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL status ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(SettlementStatus::Pending),
            10 => Some(SettlementStatus::Executing),
            20 => Some(SettlementStatus::Completed),
            -10 => Some(SettlementStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "PENDING",
            SettlementStatus::Executing => "EXECUTING",
            SettlementStatus::Completed => "COMPLETED",
            SettlementStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SettledTransfer
// ============================================================================

/// Durable record of an executed (or failed) transfer
#[derive(Debug, Clone)]
pub struct SettledTransfer {
    pub id: TransferId,
    pub sender: PhoneNumber,
    pub recipient: PhoneNumber,
    pub sender_address: String,
    pub recipient_address: String,
    pub amount: Decimal,
    pub token: Token,
    pub status: SettlementStatus,
    /// Chain transaction id, set on completion
    pub tx_hash: Option<String>,
    /// Captured error message, set on failure
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SettledTransfer {
    /// Create a new record in `Pending` status
    pub fn new(
        sender: PhoneNumber,
        recipient: PhoneNumber,
        sender_address: String,
        recipient_address: String,
        amount: Decimal,
        token: Token,
    ) -> Self {
        Self {
            id: TransferId::new(),
            sender,
            recipient,
            sender_address,
            recipient_address,
            amount,
            token,
            status: SettlementStatus::Pending,
            tx_hash: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

impl fmt::Display for SettledTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] {} -> {} {} {} status={}",
            self.id, self.sender, self.recipient, self.amount, self.token, self.status
        )
    }
}
