//! JSON-RPC chain client
//!
//! Talks to a settlement-network node over HTTP JSON-RPC. Balance queries
//! return scaled integer units as decimal strings; transfers are ed25519
//! signatures over a canonical JSON payload submitted alongside the sender's
//! public key.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ChainClient, ChainError};
use crate::config::ChainConfig;
use crate::custody::KeyCustody;
use crate::money;
use crate::types::Token;

/// JSON-RPC request structure
#[derive(Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Transfer payload signed by the sender's key.
///
/// Serialized with fields in this declaration order; the node verifies the
/// signature over exactly these bytes.
#[derive(Serialize)]
struct TransferPayload<'a> {
    from: &'a str,
    to: &'a str,
    token: &'a str,
    /// Scaled integer units as a decimal string
    units: String,
    /// Millisecond timestamp doubling as a replay nonce
    nonce: i64,
}

#[derive(Serialize)]
struct SubmitTransferParams<'a> {
    payload: TransferPayload<'a>,
    /// Hex-encoded ed25519 signature over the canonical payload JSON
    signature: String,
}

#[derive(Deserialize)]
struct SubmitTransferResult {
    tx_hash: String,
}

/// Production chain client backed by a JSON-RPC node
pub struct RpcChainClient {
    config: ChainConfig,
    client: reqwest::Client,
}

impl RpcChainClient {
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        info!(url = %config.rpc_url, "Initializing settlement RPC client");

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.rpc_timeout_secs))
            .build()
            .map_err(|e| {
                ChainError::RpcConnection(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Make a JSON-RPC call
    async fn rpc_call<T, R>(&self, method: &'static str, params: T) -> Result<R, ChainError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.config.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::RpcConnection(format!("HTTP request failed: {}", e)))?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(ChainError::Rejected(format!(
                "RPC error {}: {}",
                error.code, error.message
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| ChainError::InvalidResponse("No result in RPC response".to_string()))
    }

    /// Parse a scaled-units decimal string into token units
    fn parse_units(raw: &str, token: Token) -> Result<Decimal, ChainError> {
        let units: u128 = raw
            .parse()
            .map_err(|_| ChainError::InvalidResponse(format!("Invalid balance units: {}", raw)))?;
        Ok(money::from_scaled_units(units, token))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn token_balance(&self, address: &str, token: Token) -> Result<Decimal, ChainError> {
        let raw: String = self
            .rpc_call("ledger_tokenBalance", (address, token.symbol()))
            .await?;
        let balance = Self::parse_units(&raw, token)?;
        debug!(address = %address, token = %token, balance = %balance, "Fetched token balance");
        Ok(balance)
    }

    async fn native_balance(&self, address: &str) -> Result<Decimal, ChainError> {
        let raw: String = self.rpc_call("ledger_nativeBalance", (address,)).await?;
        Self::parse_units(&raw, Token::Eth)
    }

    async fn send_token(
        &self,
        signing_key: &SigningKey,
        to_address: &str,
        amount: Decimal,
        token: Token,
    ) -> Result<String, ChainError> {
        let from = KeyCustody::address_of(signing_key);
        let units = money::to_scaled_units(amount, token)
            .map_err(|e| ChainError::Rejected(e.to_string()))?;

        let payload = TransferPayload {
            from: &from,
            to: to_address,
            token: token.symbol(),
            units: units.to_string(),
            nonce: chrono::Utc::now().timestamp_millis(),
        };

        let payload_bytes = serde_json::to_vec(&payload)
            .map_err(|e| ChainError::InvalidResponse(format!("Payload encoding: {}", e)))?;
        let signature = signing_key.sign(&payload_bytes);

        let result: SubmitTransferResult = self
            .rpc_call(
                "ledger_submitTransfer",
                SubmitTransferParams {
                    payload,
                    signature: hex::encode(signature.to_bytes()),
                },
            )
            .await?;

        info!(
            tx_hash = %result.tx_hash,
            to = %to_address,
            amount = %amount,
            token = %token,
            "Transfer submitted"
        );
        Ok(result.tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChainConfig {
        ChainConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            rpc_timeout_secs: 30,
        }
    }

    #[test]
    fn test_client_creation() {
        assert!(RpcChainClient::new(test_config()).is_ok());
    }

    #[test]
    fn test_parse_units() {
        let balance = RpcChainClient::parse_units("1500000", Token::Usdc).unwrap();
        assert_eq!(balance, Decimal::new(15, 1));

        assert!(matches!(
            RpcChainClient::parse_units("0x1f", Token::Usdc),
            Err(ChainError::InvalidResponse(_))
        ));
        assert!(matches!(
            RpcChainClient::parse_units("-5", Token::Usdc),
            Err(ChainError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_payload_signing_is_deterministic() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let payload = TransferPayload {
            from: "aa",
            to: "bb",
            token: "USDC",
            units: "5000000".to_string(),
            nonce: 1_700_000_000_000,
        };
        let bytes = serde_json::to_vec(&payload).unwrap();
        let sig1 = signing_key.sign(&bytes);
        let sig2 = signing_key.sign(&bytes);
        assert_eq!(sig1.to_bytes(), sig2.to_bytes());
    }
}
