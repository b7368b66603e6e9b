//! TextPay - SMS Custodial Wallet
//!
//! A custodial crypto wallet driven entirely over SMS: plain-text commands
//! in, plain-text replies out. Keys never leave the service and never touch
//! disk unencrypted.
//!
//! # Modules
//!
//! - [`types`] - Validated domain types (PhoneNumber, Token, codes, ids)
//! - [`money`] - Amount parsing, scaled units, display formatting
//! - [`command`] - SMS command grammar
//! - [`records`] - Persisted documents (Account, PendingTransfer, SettledTransfer)
//! - [`error`] - Protocol error taxonomy
//! - [`custody`] - Key generation and encrypt-before-persist envelopes
//! - [`auth`] - PIN verification with lockout
//! - [`store`] - Document store (PostgreSQL + in-memory)
//! - [`chain`] - Settlement-network client
//! - [`oracle`] - Chain-backed balance cache
//! - [`coordinator`] - Two-phase transfer lifecycle
//! - [`notify`] - Outbound message templates
//! - [`sms`] - Outbound gateway
//! - [`service`] - Inbound dispatch

pub mod config;
pub mod error;
pub mod logging;
pub mod money;
pub mod records;
pub mod types;

pub mod auth;
pub mod chain;
pub mod command;
pub mod coordinator;
pub mod custody;
pub mod notify;
pub mod oracle;
pub mod service;
pub mod sms;
pub mod store;

// Convenient re-exports at crate root
pub use auth::AuthGuard;
pub use chain::{ChainClient, RpcChainClient};
pub use command::SmsCommand;
pub use config::AppConfig;
pub use coordinator::{TransferCoordinator, TransferOutcome};
pub use custody::KeyCustody;
pub use error::WalletError;
pub use oracle::BalanceOracle;
pub use records::{Account, PendingTransfer, SettledTransfer, SettlementStatus};
pub use service::{InboundSms, WalletService};
pub use sms::{HttpSmsGateway, SmsGateway};
pub use store::{MemStore, PgStore, Store};
pub use types::{ConfirmationCode, PhoneNumber, Token, TransferId};
