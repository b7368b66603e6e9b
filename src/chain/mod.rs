//! Settlement-network client
//!
//! The chain is an external collaborator: the service hands it a signing key,
//! a recipient address and an amount, and gets back a transaction id or a
//! network error. `RpcChainClient` talks JSON-RPC to a live node; the mock
//! keeps an in-memory ledger for tests.

pub mod rpc;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::Token;

pub use rpc::RpcChainClient;

/// Chain client failures
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC connection error: {0}")]
    RpcConnection(String),

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("Transfer rejected by network: {0}")]
    Rejected(String),
}

/// Client for the settlement network
///
/// Balance queries are read-only; `send_token` signs and submits a transfer
/// and blocks until the network acknowledges it with a transaction id.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Balance of a token at an address, in decimal token units
    async fn token_balance(&self, address: &str, token: Token) -> Result<Decimal, ChainError>;

    /// Balance of the network's native unit at an address
    async fn native_balance(&self, address: &str) -> Result<Decimal, ChainError>;

    /// Sign and submit a token transfer; returns the transaction id
    async fn send_token(
        &self,
        signing_key: &SigningKey,
        to_address: &str,
        amount: Decimal,
        token: Token,
    ) -> Result<String, ChainError>;
}
