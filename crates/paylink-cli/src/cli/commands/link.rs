//! One-shot payment link creation.

use anyhow::{Context, Result, anyhow, bail};
use paylink_core::config::Config;
use paylink_core::providers::{Checkout, LinkProvider, StripeClient, StripeSettings};
use tracing::debug;

pub async fn run(config: &Config, price: &str, name: &str, quantity: u32) -> Result<()> {
    let (price_minor_units, currency) =
        paylink_bot::parse_price(price).map_err(|err| anyhow!("{}", err.message()))?;

    let product_name = name.trim();
    if product_name.is_empty() {
        bail!("product name must not be empty");
    }

    let settings = StripeSettings::from_config(config)?;
    let client = StripeClient::new(settings)?;
    let checkout = Checkout {
        price_minor_units,
        currency,
        product_name: product_name.to_string(),
        quantity,
    };
    debug!(?checkout, "creating payment link");

    let url = client
        .create_link(&checkout)
        .await
        .context("create payment link")?;
    println!("{url}");
    Ok(())
}
