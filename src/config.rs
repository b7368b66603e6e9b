use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL for the durable store
    #[serde(default)]
    pub postgres_url: Option<String>,
    /// Process-wide custody cipher key, 64 hex characters
    pub custody_key_hex: String,
    pub chain: ChainConfig,
    pub sms: SmsConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Settlement-network RPC settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

fn default_rpc_timeout() -> u64 {
    30
}

/// Outbound SMS gateway settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SmsConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_id: String,
}

/// Transfer lifecycle settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    /// How long a pending transfer stays confirmable
    pub confirm_window_secs: i64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            confirm_window_secs: 300,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
