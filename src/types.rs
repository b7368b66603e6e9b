//! Core domain types
//!
//! Validated wrapper types for phone numbers, tokens, confirmation codes and
//! transfer ids. Fields are private to force validation through the public
//! constructors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Validation Errors
// ============================================================================

/// Validation errors for domain wrapper types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("Invalid phone number '{0}': expected +<country code><number> (7-15 digits)")]
    InvalidPhone(String),

    #[error("Unsupported token: {0}")]
    UnsupportedToken(String),

    #[error("Invalid confirmation code")]
    InvalidCode,

    #[error("Invalid transfer id: {0}")]
    InvalidTransferId(String),
}

// ============================================================================
// PhoneNumber
// ============================================================================

/// E.164-style phone number: `+` followed by 7-15 digits.
///
/// The phone number is the sole external identity of an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        let digits = match s.strip_prefix('+') {
            Some(d) => d,
            None => return Err(TypeError::InvalidPhone(s.to_string())),
        };

        if digits.len() < 7 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(TypeError::InvalidPhone(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PhoneNumber> for String {
    fn from(p: PhoneNumber) -> Self {
        p.0
    }
}

// ============================================================================
// Token
// ============================================================================

/// Supported tokens on the settlement network.
///
/// The set is fixed at compile time: extending it is a configuration change
/// of the service, not a protocol change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    /// USD stablecoin, the primary transfer token
    Usdc,
    /// Native unit of the settlement network (gas + value transfer)
    Eth,
}

impl Token {
    /// All supported tokens, native unit last
    pub const ALL: [Token; 2] = [Token::Usdc, Token::Eth];

    /// Tokens a user may name in a SEND command
    pub const SENDABLE: [Token; 1] = [Token::Usdc];

    /// Symbol as stored and displayed (always uppercase)
    pub fn symbol(&self) -> &'static str {
        match self {
            Token::Usdc => "USDC",
            Token::Eth => "ETH",
        }
    }

    /// On-chain decimal precision
    pub fn decimals(&self) -> u32 {
        match self {
            Token::Usdc => 6,
            Token::Eth => 18,
        }
    }

    /// Decimal places used when rendering balances in outbound SMS
    pub fn display_dp(&self) -> u32 {
        match self {
            Token::Usdc => 2,
            Token::Eth => 4,
        }
    }

    /// Whether this is the network's native unit
    pub fn is_native(&self) -> bool {
        matches!(self, Token::Eth)
    }

    /// Parse a token symbol, case-insensitive
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s.trim().to_uppercase().as_str() {
            "USDC" => Ok(Token::Usdc),
            "ETH" => Ok(Token::Eth),
            other => Err(TypeError::UnsupportedToken(other.to_string())),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Token {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// ConfirmationCode
// ============================================================================

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;

/// Short-lived confirmation code binding a pending transfer to its execution.
///
/// Codes are stored and compared uppercase; user input is normalized on parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfirmationCode(String);

impl ConfirmationCode {
    /// Generate a fresh 6-character uppercase alphanumeric code
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let code: String = (0..CODE_LEN)
            .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse user-supplied code: 4-8 alphanumerics, normalized to uppercase
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        if s.len() < 4 || s.len() > 8 || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TypeError::InvalidCode);
        }
        Ok(Self(s.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ConfirmationCode {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ConfirmationCode> for String {
    fn from(c: ConfirmationCode) -> Self {
        c.0
    }
}

// ============================================================================
// TransferId
// ============================================================================

/// Settled-transfer id - ULID-based unique identifier
///
/// ULIDs are monotonic, sortable and need no coordination between processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    /// Generate a new unique TransferId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidTransferId(e.to_string()))
    }
}
