//! Text the bot sends back to users.

pub(crate) const PRICE_PROMPT: &str = "Please enter the price and currency in this format: 10.00 USD. \
     Supported currencies: https://docs.stripe.com/currencies";
pub(crate) const PRICE_FORMAT_ERROR: &str = "Invalid format. Please enter the price and currency in this format: 10.00 USD. \
     Supported currencies: https://docs.stripe.com/currencies";
pub(crate) const INVALID_PRICE: &str = "Invalid price format.";
pub(crate) const PRICE_NOT_POSITIVE: &str = "Price must be a positive number.";
pub(crate) const NAME_PROMPT: &str = "Enter product name:";
pub(crate) const QUANTITY_PROMPT: &str = "Enter quantity:";
pub(crate) const INVALID_QUANTITY: &str = "Invalid quantity format.";
pub(crate) const PROVIDER_ERROR: &str =
    "Failed to generate Stripe payment link. Please try again later.";
pub(crate) const CANCELLED: &str = "Cancelled.";
pub(crate) const NO_SESSION: &str = "No active session. Send /start to begin.";
pub(crate) const SESSION_EXPIRED: &str =
    "Your session has expired. Please send /start to begin again.";
pub(crate) const MISSING_SESSION: &str = "Something went wrong. Please start again with /start.";
pub(crate) const SESSION_CHANGED: &str =
    "Your session changed while this message was processed. Send /status to see where you are.";
pub(crate) const UNEXPECTED_INPUT: &str = "Unexpected input. Please use /help.";
pub(crate) const NOT_SET: &str = "(not set)";

pub(crate) const HELP: &str = "\
🤖 PaymentBot Help

Available commands:
/start – Begin payment link creation
/reset – Start over with a fresh payment link
/cancel – Cancel current operation
/status – Check your current input progress
/help – Show this help message

💡 Input guidance:
- After /start, provide the price and currency (e.g. 10.00 USD)
  ↳ Supported currencies: https://docs.stripe.com/currencies
- Then, enter the product name
- Finally, provide the quantity

The bot will return a Stripe payment link based on your input.";

pub(crate) fn payment_link(url: &str) -> String {
    format!("Here is your payment link:\n{url}")
}
