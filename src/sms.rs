//! SMS gateway
//!
//! Outbound-only transport. Inbound messages arrive through whatever webhook
//! hosts the service and are handed to `WalletService` already paired with
//! their sender number.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::config::SmsConfig;
use crate::types::PhoneNumber;

/// Gateway failures
#[derive(Debug, Error)]
pub enum SmsError {
    #[error("SMS gateway connection error: {0}")]
    Connection(String),

    #[error("SMS gateway rejected message: {0}")]
    Rejected(String),
}

/// Outbound SMS transport
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<(), SmsError>;
}

#[derive(Serialize)]
struct SendPayload<'a> {
    to: [&'a str; 1],
    message: &'a str,
    sender_name: &'a str,
    route: &'static str,
}

#[derive(Deserialize)]
struct SendResponse {
    status: u16,
    #[serde(default)]
    message: String,
}

/// HTTP JSON gateway client
pub struct HttpSmsGateway {
    config: SmsConfig,
    client: reqwest::Client,
}

impl HttpSmsGateway {
    pub fn new(config: SmsConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| SmsError::Connection(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, to: &PhoneNumber, body: &str) -> Result<(), SmsError> {
        let payload = SendPayload {
            to: [to.as_str()],
            message: body,
            sender_name: &self.config.sender_id,
            route: "non_dnd",
        };

        let url = format!("{}/sms/send", self.config.api_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(to = %to, error = %e, "SMS send failed");
                SmsError::Connection(e.to_string())
            })?;

        let result: SendResponse = response
            .json()
            .await
            .map_err(|e| SmsError::Connection(format!("invalid gateway response: {}", e)))?;

        if result.status != 200 {
            return Err(SmsError::Rejected(result.message));
        }

        info!(to = %to, "SMS sent");
        Ok(())
    }
}
