//! Stage input handlers.
//!
//! Each stage has exactly one handler. Handlers receive the session snapshot
//! the dispatcher read and write back with compare-and-swap, so a concurrent
//! `/cancel` or `/start` is never overwritten by a stale transition.

use paylink_core::providers::LinkProvider;
use paylink_core::session::{Session, SessionStore, Stage, UserId};
use tracing::{debug, warn};

use crate::replies;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceError {
    /// Not exactly two tokens.
    Format,
    /// The amount is not a plain decimal number, or is too large.
    InvalidAmount,
    /// The amount is zero, negative, or rounds to zero minor units.
    NotPositive,
}

impl PriceError {
    /// Reply shown to the user for this error.
    pub fn message(self) -> &'static str {
        match self {
            PriceError::Format => replies::PRICE_FORMAT_ERROR,
            PriceError::InvalidAmount => replies::INVALID_PRICE,
            PriceError::NotPositive => replies::PRICE_NOT_POSITIVE,
        }
    }
}

/// Parses `"<amount> <currency>"` into minor units and a lower-case code.
///
/// The amount is read as a decimal string and rounded half-up to cents, so
/// `1.005` becomes 101.
///
/// # Errors
/// Returns the reason the input was rejected.
pub fn parse_price(text: &str) -> Result<(u64, String), PriceError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let [amount, currency] = tokens.as_slice() else {
        return Err(PriceError::Format);
    };

    let minor_units = parse_minor_units(amount)?;
    if minor_units == 0 {
        return Err(PriceError::NotPositive);
    }

    Ok((minor_units, currency.to_lowercase()))
}

/// `[+-]digits[.digits]` to cents. Negative amounts are `NotPositive`.
fn parse_minor_units(amount: &str) -> Result<u64, PriceError> {
    let (negative, unsigned) = match amount.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, amount.strip_prefix('+').unwrap_or(amount)),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let is_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(PriceError::InvalidAmount);
    }
    if negative {
        return Err(PriceError::NotPositive);
    }

    let mut fraction_digits = fraction.bytes().map(|byte| u64::from(byte - b'0'));
    let tenths = fraction_digits.next().unwrap_or(0);
    let hundredths = fraction_digits.next().unwrap_or(0);
    let round_up = fraction_digits.next().is_some_and(|digit| digit >= 5);

    whole
        .bytes()
        .try_fold(0u64, |acc, byte| {
            acc.checked_mul(10)?.checked_add(u64::from(byte - b'0'))
        })
        .and_then(|units| units.checked_mul(100))
        .and_then(|cents| cents.checked_add(tenths * 10 + hundredths + u64::from(round_up)))
        .ok_or(PriceError::InvalidAmount)
}

/// Routes free text to the handler for the session's stage.
pub(crate) async fn handle_input<P: LinkProvider>(
    sessions: &SessionStore,
    provider: &P,
    user: UserId,
    session: Session,
    text: &str,
) -> String {
    match session.stage() {
        Stage::AwaitingPrice => handle_price(sessions, user, &session, text),
        Stage::AwaitingName => handle_name(sessions, user, &session, text),
        Stage::AwaitingQuantity => handle_quantity(sessions, provider, user, &session, text).await,
    }
}

fn handle_price(sessions: &SessionStore, user: UserId, session: &Session, text: &str) -> String {
    match parse_price(text) {
        Ok((price_minor_units, currency)) => {
            let draft = session.draft().with_price(price_minor_units, currency);
            let next = Session::new(Stage::AwaitingName, draft);
            commit(sessions, user, session, next, replies::NAME_PROMPT)
        }
        Err(err) => {
            debug!(user, ?err, "rejected price input");
            err.message().to_string()
        }
    }
}

fn handle_name(sessions: &SessionStore, user: UserId, session: &Session, text: &str) -> String {
    let name = text.trim();
    if name.is_empty() {
        return replies::NAME_PROMPT.to_string();
    }

    let next = Session::new(Stage::AwaitingQuantity, session.draft().with_name(name));
    commit(sessions, user, session, next, replies::QUANTITY_PROMPT)
}

async fn handle_quantity<P: LinkProvider>(
    sessions: &SessionStore,
    provider: &P,
    user: UserId,
    session: &Session,
    text: &str,
) -> String {
    let Ok(quantity) = text.trim().parse::<u32>() else {
        debug!(user, "rejected quantity input");
        return replies::INVALID_QUANTITY.to_string();
    };

    let Some(checkout) = session.draft().complete(quantity) else {
        warn!(user, "quantity stage reached with an unfinished draft");
        sessions.clear_if_current(user, session);
        return replies::UNEXPECTED_INPUT.to_string();
    };

    // No store lock is held here; the session may change while we wait.
    match provider.create_link(&checkout).await {
        Ok(url) => {
            if !sessions.clear_if_current(user, session) {
                debug!(user, "session changed during link creation; leaving it in place");
            }
            replies::payment_link(&url)
        }
        Err(err) => {
            warn!(user, error = %err, "payment link creation failed");
            replies::PROVIDER_ERROR.to_string()
        }
    }
}

fn commit(
    sessions: &SessionStore,
    user: UserId,
    current: &Session,
    next: Session,
    reply: &str,
) -> String {
    if sessions.replace(user, current, next) {
        return reply.to_string();
    }

    if sessions.get(user).is_some() {
        debug!(user, "session changed concurrently; transition dropped");
        replies::SESSION_CHANGED.to_string()
    } else {
        sessions.clear(user);
        replies::MISSING_SESSION.to_string()
    }
}

#[cfg(test)]
mod tests {
    use paylink_core::session::Draft;

    use super::*;

    #[test]
    fn parses_amount_into_minor_units() {
        assert_eq!(parse_price("10.00 USD"), Ok((1000, "usd".to_string())));
        assert_eq!(parse_price("19.99 eur"), Ok((1999, "eur".to_string())));
        assert_eq!(parse_price("  5   GBP "), Ok((500, "gbp".to_string())));
        assert_eq!(parse_price("0.5 usd"), Ok((50, "usd".to_string())));
        assert_eq!(parse_price(".75 usd"), Ok((75, "usd".to_string())));
        assert_eq!(parse_price("+3. usd"), Ok((300, "usd".to_string())));
    }

    #[test]
    fn sub_cent_amounts_round_half_up_on_the_decimal_value() {
        assert_eq!(parse_price("1.005 USD"), Ok((101, "usd".to_string())));
        assert_eq!(parse_price("2.675 USD"), Ok((268, "usd".to_string())));
        assert_eq!(parse_price("1.0049 USD"), Ok((100, "usd".to_string())));
        assert_eq!(parse_price("0.005 USD"), Ok((1, "usd".to_string())));
    }

    #[test]
    fn wrong_token_count_is_a_format_error() {
        assert_eq!(parse_price("10.00"), Err(PriceError::Format));
        assert_eq!(parse_price("10.00 USD extra"), Err(PriceError::Format));
        assert_eq!(parse_price(""), Err(PriceError::Format));
    }

    #[test]
    fn non_numeric_amounts_are_rejected() {
        assert_eq!(parse_price("ten USD"), Err(PriceError::InvalidAmount));
        assert_eq!(parse_price("inf USD"), Err(PriceError::InvalidAmount));
        assert_eq!(parse_price("NaN USD"), Err(PriceError::InvalidAmount));
        assert_eq!(parse_price("1e30 USD"), Err(PriceError::InvalidAmount));
        assert_eq!(parse_price("1.2.3 USD"), Err(PriceError::InvalidAmount));
        assert_eq!(parse_price(". USD"), Err(PriceError::InvalidAmount));
        assert_eq!(parse_price("1,50 USD"), Err(PriceError::InvalidAmount));
        assert_eq!(
            parse_price("999999999999999999999 USD"),
            Err(PriceError::InvalidAmount)
        );
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert_eq!(parse_price("0 USD"), Err(PriceError::NotPositive));
        assert_eq!(parse_price("-5 USD"), Err(PriceError::NotPositive));
        assert_eq!(parse_price("0.001 USD"), Err(PriceError::NotPositive));
        assert_eq!(parse_price("-0 USD"), Err(PriceError::NotPositive));
    }

    const USER: UserId = 42;

    #[tokio::test(start_paused = true)]
    async fn transition_on_cleared_session_asks_to_restart() {
        let sessions = SessionStore::default();
        sessions.put(USER, Session::start());
        let snapshot = sessions.get(USER).unwrap();
        sessions.clear(USER);

        let reply = handle_price(&sessions, USER, &snapshot, "10.00 USD");

        assert_eq!(reply, replies::MISSING_SESSION);
        assert!(sessions.get(USER).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn transition_on_replaced_session_is_dropped() {
        let sessions = SessionStore::default();
        let draft = Draft::empty().with_price(1000, "usd");
        sessions.put(USER, Session::new(Stage::AwaitingName, draft));
        let snapshot = sessions.get(USER).unwrap();
        sessions.put(USER, Session::start());
        let newer = sessions.get(USER).unwrap();

        let reply = handle_name(&sessions, USER, &snapshot, "Widget");

        assert_eq!(reply, replies::SESSION_CHANGED);
        assert_eq!(sessions.get(USER), Some(newer));
    }

    #[tokio::test(start_paused = true)]
    async fn transition_on_current_session_is_committed() {
        let sessions = SessionStore::default();
        sessions.put(USER, Session::start());
        let snapshot = sessions.get(USER).unwrap();

        let reply = handle_price(&sessions, USER, &snapshot, "10.00 USD");

        assert_eq!(reply, replies::NAME_PROMPT);
        let session = sessions.get(USER).unwrap();
        assert_eq!(session.stage(), Stage::AwaitingName);
        assert_eq!(session.draft().price_minor_units(), 1000);
    }
}
