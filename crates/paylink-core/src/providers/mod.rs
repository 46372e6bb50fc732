//! Payment-link providers.
//!
//! A provider turns a completed product description into a checkout URL the
//! buyer can open. The bot only talks to providers through [`LinkProvider`].

use std::future::Future;

use thiserror::Error;

pub mod stripe;

pub use stripe::{StripeClient, StripeSettings};

/// A completed product description, ready to be sold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    /// Unit price in minor units (cents).
    pub price_minor_units: u64,
    /// Lower-case ISO currency code.
    pub currency: String,
    pub product_name: String,
    pub quantity: u32,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("payment provider request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("payment provider rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("failed to decode payment provider response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("payment provider response did not include a checkout URL")]
    MissingUrl,
}

/// Mints checkout links.
pub trait LinkProvider: Send + Sync {
    /// Creates a checkout link for `checkout`.
    ///
    /// May be slow; callers must not hold locks across the call.
    fn create_link(
        &self,
        checkout: &Checkout,
    ) -> impl Future<Output = Result<String, LinkError>> + Send;
}
