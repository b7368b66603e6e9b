//! Outbound message templates
//!
//! All user-visible text lives here, rendered as plain strings with no
//! markup. Balances use each token's display precision.

use crate::error::WalletError;
use crate::money::format_balance;
use crate::records::{Account, PendingTransfer};
use crate::types::{PhoneNumber, Token};

use rust_decimal::Decimal;

/// Registration welcome with the quick-start command list
pub fn welcome() -> String {
    "Welcome to TextPay! Your wallet has been created.\n\
     - To check your balance, text: BALANCE <PIN>\n\
     - To send money, text: SEND <RECIPIENT> <AMOUNT> <TOKEN> <PIN>\n\
     - For help, text: HELP"
        .to_string()
}

/// Balance report, one line per supported token
pub fn balance_report(account: &Account) -> String {
    let mut lines = vec!["TextPay Balance:".to_string()];
    for token in Token::ALL {
        lines.push(format!(
            "{}: {}",
            token.symbol(),
            format_balance(account.balance(token), token)
        ));
    }
    lines.join("\n")
}

/// Confirmation prompt for a staged transfer. Carries the code so the
/// sender can also confirm from another thread with CONFIRM <code> <PIN>.
pub fn confirm_prompt(pending: &PendingTransfer) -> String {
    format!(
        "Confirm sending {} {} to {}?\n\
         Code: {}\n\
         Reply with YES to confirm, or ignore this message to cancel.",
        pending.amount, pending.token, pending.recipient, pending.code
    )
}

/// Completion notice to the sender, with their fresh balance
pub fn completion(recipient: &PhoneNumber, amount: Decimal, token: Token, new_balance: Decimal) -> String {
    format!(
        "Sent {} {} to {}.\nNew {} balance: {}",
        amount,
        token,
        recipient,
        token,
        format_balance(new_balance, token)
    )
}

/// Receipt to the recipient, with their fresh balance
pub fn receipt(sender: &PhoneNumber, amount: Decimal, token: Token, new_balance: Decimal) -> String {
    format!(
        "You received {} {} from {}.\nNew {} balance: {}",
        amount,
        token,
        sender,
        token,
        format_balance(new_balance, token)
    )
}

pub fn help() -> String {
    "TextPay Commands:\n\
     - REGISTER <PIN> - Create a new wallet\n\
     - BALANCE <PIN> - Check your balance\n\
     - SEND <RECIPIENT> <AMOUNT> USDC <PIN> - Send USDC\n\
     \x20 Example: SEND +1234567890 10 USDC 1234\n\
     - CONFIRM <CODE> <PIN> - Confirm a pending transfer\n\
     - HELP - Show this message"
        .to_string()
}

/// Render a handler error as an SMS reply. Sensitive causes are replaced
/// with a generic failure text; callers log the real cause.
pub fn error_reply(err: &WalletError) -> String {
    if err.is_sensitive() {
        "Error: Unable to process your request. Please try again later.".to_string()
    } else {
        format!("Error: {}", err)
    }
}
