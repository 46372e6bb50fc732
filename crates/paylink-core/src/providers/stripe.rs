//! Stripe Checkout link provider.
//!
//! Creates a one-line-item Checkout Session per completed draft and returns
//! its hosted URL.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use super::{Checkout, LinkError, LinkProvider};
use crate::config::{Config, resolve_value};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
const CHECKOUT_SESSIONS_PATH: &str = "/v1/checkout/sessions";

/// Validated Stripe settings.
#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub success_url: String,
    pub cancel_url: String,
    pub base_url: String,
    pub request_timeout: Option<Duration>,
}

impl StripeSettings {
    /// Resolves Stripe settings from the environment and config file.
    ///
    /// # Errors
    /// Returns an error if a required value is missing or a URL is malformed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let stripe = &config.stripe;
        let Some(secret_key) = resolve_value(
            stripe.secret_key.as_deref(),
            &["PAYLINK_STRIPE_SECRET_KEY", "STRIPE_SECRET_KEY"],
        ) else {
            bail!("stripe.secret_key or PAYLINK_STRIPE_SECRET_KEY is required");
        };
        let Some(success_url) = resolve_value(
            stripe.success_url.as_deref(),
            &["PAYLINK_STRIPE_SUCCESS_URL"],
        ) else {
            bail!("stripe.success_url or PAYLINK_STRIPE_SUCCESS_URL is required");
        };
        let Some(cancel_url) =
            resolve_value(stripe.cancel_url.as_deref(), &["PAYLINK_STRIPE_CANCEL_URL"])
        else {
            bail!("stripe.cancel_url or PAYLINK_STRIPE_CANCEL_URL is required");
        };
        let base_url = resolve_value(stripe.base_url.as_deref(), &["PAYLINK_STRIPE_BASE_URL"])
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        for (key, value) in [
            ("stripe.success_url", &success_url),
            ("stripe.cancel_url", &cancel_url),
            ("stripe.base_url", &base_url),
        ] {
            url::Url::parse(value).with_context(|| format!("{key} is not a valid URL: {value}"))?;
        }

        Ok(Self {
            secret_key,
            success_url,
            cancel_url,
            base_url,
            request_timeout: stripe.request_timeout(),
        })
    }
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    settings: StripeSettings,
}

impl StripeClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: StripeSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build Stripe HTTP client")?;
        Ok(Self { http, settings })
    }

    fn checkout_sessions_url(&self) -> String {
        format!(
            "{}{}",
            self.settings.base_url.trim_end_matches('/'),
            CHECKOUT_SESSIONS_PATH
        )
    }
}

impl LinkProvider for StripeClient {
    async fn create_link(&self, checkout: &Checkout) -> Result<String, LinkError> {
        let form = checkout_form(checkout, &self.settings);
        let response = self
            .http
            .post(self.checkout_sessions_url())
            .bearer_auth(&self.settings.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(LinkError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("Stripe returned status {status}"));
            return Err(LinkError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSessionResponse =
            response.json().await.map_err(LinkError::Decode)?;
        debug!(session_id = session.id.as_deref(), "created checkout session");
        session
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or(LinkError::MissingUrl)
    }
}

fn checkout_form(checkout: &Checkout, settings: &StripeSettings) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("success_url", settings.success_url.clone()),
        ("cancel_url", settings.cancel_url.clone()),
        ("line_items[0][quantity]", checkout.quantity.to_string()),
        (
            "line_items[0][price_data][currency]",
            checkout.currency.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]",
            checkout.price_minor_units.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            checkout.product_name.clone(),
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::StripeConfig;

    fn settings(base_url: &str) -> StripeSettings {
        StripeSettings {
            secret_key: "sk_test_123".to_string(),
            success_url: "https://shop.example/success".to_string(),
            cancel_url: "https://shop.example/cancel".to_string(),
            base_url: base_url.to_string(),
            request_timeout: None,
        }
    }

    fn widget() -> Checkout {
        Checkout {
            price_minor_units: 1000,
            currency: "usd".to_string(),
            product_name: "Widget".to_string(),
            quantity: 3,
        }
    }

    #[tokio::test]
    async fn creates_checkout_session_and_returns_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(body_string_contains("mode=payment"))
            .and(body_string_contains(
                "line_items%5B0%5D%5Bprice_data%5D%5Bunit_amount%5D=1000",
            ))
            .and(body_string_contains(
                "line_items%5B0%5D%5Bprice_data%5D%5Bcurrency%5D=usd",
            ))
            .and(body_string_contains(
                "line_items%5B0%5D%5Bprice_data%5D%5Bproduct_data%5D%5Bname%5D=Widget",
            ))
            .and(body_string_contains("line_items%5B0%5D%5Bquantity%5D=3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = StripeClient::new(settings(&server.uri())).unwrap();
        let url = client.create_link(&widget()).await.unwrap();

        assert_eq!(url, "https://checkout.stripe.com/c/pay/cs_test_1");
    }

    #[tokio::test]
    async fn maps_stripe_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "type": "invalid_request_error",
                    "message": "Invalid currency: zzz"
                }
            })))
            .mount(&server)
            .await;

        let client = StripeClient::new(settings(&server.uri())).unwrap();
        let err = client.create_link(&widget()).await.unwrap_err();

        match err {
            LinkError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid currency: zzz");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_url_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cs_test_2" })))
            .mount(&server)
            .await;

        let client = StripeClient::new(settings(&server.uri())).unwrap();
        let err = client.create_link(&widget()).await.unwrap_err();

        assert!(matches!(err, LinkError::MissingUrl));
    }

    #[test]
    fn settings_require_redirect_urls() {
        let config = Config {
            stripe: StripeConfig {
                secret_key: Some("sk_test_123".to_string()),
                success_url: Some("https://shop.example/success".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        // Only meaningful when the environment does not provide the value.
        if std::env::var("PAYLINK_STRIPE_CANCEL_URL").is_err() {
            let err = StripeSettings::from_config(&config).unwrap_err();
            assert!(err.to_string().contains("stripe.cancel_url"));
        }
    }

    #[test]
    fn settings_reject_malformed_urls() {
        let config = Config {
            stripe: StripeConfig {
                secret_key: Some("sk_test_123".to_string()),
                success_url: Some("not a url".to_string()),
                cancel_url: Some("https://shop.example/cancel".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        if std::env::var("PAYLINK_STRIPE_SUCCESS_URL").is_err() {
            let err = StripeSettings::from_config(&config).unwrap_err();
            assert!(err.to_string().contains("stripe.success_url"));
        }
    }
}
