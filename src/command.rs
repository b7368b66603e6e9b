//! SMS command grammar
//!
//! Turns one line of free text into a typed command or a user-facing parse
//! error. Command shapes are tried in a fixed order; a shape that matches
//! structurally (keyword + arity) but carries an invalid field reports that
//! field's error instead of falling through to the next shape. Only when no
//! shape matches at all does the generic unrecognized-command error apply.

use rust_decimal::Decimal;

use crate::money::{self, MoneyError};
use crate::types::{ConfirmationCode, PhoneNumber, Token};

/// A parsed, field-validated inbound command
#[derive(Debug, Clone, PartialEq)]
pub enum SmsCommand {
    /// `REGISTER <pin>`
    Register { pin: String },
    /// `BALANCE <pin>`
    Balance { pin: String },
    /// `SEND <recipient> <amount> <token> <pin>`
    Send {
        recipient: PhoneNumber,
        amount: Decimal,
        token: Token,
        pin: String,
    },
    /// `CONFIRM <code> <pin>`
    Confirm { code: ConfirmationCode, pin: String },
    /// `HELP`
    Help,
    /// `YES` - confirms the sender's live pending transfer
    Yes,
}

/// Parse error with the exact text to send back to the user
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

const MSG_INVALID_PIN: &str = "Invalid PIN. It should be 4-6 digits.";
const MSG_INVALID_RECIPIENT: &str =
    "Invalid recipient phone number. It should include the country code (e.g., +1234567890).";
const MSG_INVALID_AMOUNT: &str = "Invalid amount. It should be a number greater than 0.";
const MSG_INVALID_CODE: &str = "Invalid confirmation code.";
const MSG_UNRECOGNIZED: &str = "Invalid command format. Text HELP for available commands.";

/// Parse one inbound SMS body.
///
/// Shapes are tried in declaration order: REGISTER, BALANCE, SEND, CONFIRM,
/// HELP, YES. The order must stay fixed so field errors are attributed to the
/// right command.
pub fn parse(text: &str) -> Result<SmsCommand, ParseError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(ParseError::new(MSG_UNRECOGNIZED));
    }

    type Shape = fn(&[&str]) -> Option<Result<SmsCommand, ParseError>>;
    const SHAPES: [Shape; 6] = [
        parse_register,
        parse_balance,
        parse_send,
        parse_confirm,
        parse_help,
        parse_yes,
    ];

    for shape in SHAPES {
        if let Some(result) = shape(&tokens) {
            return result;
        }
    }

    Err(ParseError::new(MSG_UNRECOGNIZED))
}

/// PIN rule: 4-6 ASCII digits
fn validate_pin(pin: &str) -> Result<String, ParseError> {
    if (4..=6).contains(&pin.len()) && pin.chars().all(|c| c.is_ascii_digit()) {
        Ok(pin.to_string())
    } else {
        Err(ParseError::new(MSG_INVALID_PIN))
    }
}

fn keyword_matches(token: &str, keyword: &str) -> bool {
    token.eq_ignore_ascii_case(keyword)
}

fn parse_register(tokens: &[&str]) -> Option<Result<SmsCommand, ParseError>> {
    if tokens.len() != 2 || !keyword_matches(tokens[0], "REGISTER") {
        return None;
    }
    Some(validate_pin(tokens[1]).map(|pin| SmsCommand::Register { pin }))
}

fn parse_balance(tokens: &[&str]) -> Option<Result<SmsCommand, ParseError>> {
    if tokens.len() != 2 || !keyword_matches(tokens[0], "BALANCE") {
        return None;
    }
    Some(validate_pin(tokens[1]).map(|pin| SmsCommand::Balance { pin }))
}

fn parse_send(tokens: &[&str]) -> Option<Result<SmsCommand, ParseError>> {
    if tokens.len() != 5 || !keyword_matches(tokens[0], "SEND") {
        return None;
    }
    let (recipient, amount_str, token_str, pin) = (tokens[1], tokens[2], tokens[3], tokens[4]);

    let result = (|| {
        let recipient = PhoneNumber::parse(recipient)
            .map_err(|_| ParseError::new(MSG_INVALID_RECIPIENT))?;

        // Token before amount: the precision bound depends on the token
        let token = Token::parse(token_str)
            .ok()
            .filter(|t| Token::SENDABLE.contains(t))
            .ok_or_else(|| {
                let supported: Vec<&str> = Token::SENDABLE.iter().map(|t| t.symbol()).collect();
                ParseError::new(format!(
                    "Invalid token. Supported tokens are: {}.",
                    supported.join(", ")
                ))
            })?;

        let amount = money::parse_amount(amount_str, token).map_err(|e| match e {
            MoneyError::PrecisionOverflow { .. } => ParseError::new(e.to_string()),
            _ => ParseError::new(MSG_INVALID_AMOUNT),
        })?;

        let pin = validate_pin(pin)?;

        Ok(SmsCommand::Send {
            recipient,
            amount,
            token,
            pin,
        })
    })();

    Some(result)
}

fn parse_confirm(tokens: &[&str]) -> Option<Result<SmsCommand, ParseError>> {
    if tokens.len() != 3 || !keyword_matches(tokens[0], "CONFIRM") {
        return None;
    }
    let result = (|| {
        let code = ConfirmationCode::parse(tokens[1])
            .map_err(|_| ParseError::new(MSG_INVALID_CODE))?;
        let pin = validate_pin(tokens[2])?;
        Ok(SmsCommand::Confirm { code, pin })
    })();
    Some(result)
}

fn parse_help(tokens: &[&str]) -> Option<Result<SmsCommand, ParseError>> {
    (tokens.len() == 1 && keyword_matches(tokens[0], "HELP")).then(|| Ok(SmsCommand::Help))
}

fn parse_yes(tokens: &[&str]) -> Option<Result<SmsCommand, ParseError>> {
    (tokens.len() == 1 && keyword_matches(tokens[0], "YES")).then(|| Ok(SmsCommand::Yes))
}
