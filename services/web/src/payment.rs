//! Stripe Checkout adapter
//!
//! Sessions are created through the REST API with a form-encoded request.
//! Completed payments arrive on the webhook, whose `Stripe-Signature`
//! header is an HMAC-SHA256 over `"{timestamp}.{payload}"`.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::models::Tour;

/// Accepted clock skew for webhook timestamps, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

const PUBLIC_IMAGE_BASE: &str = "https://www.natours.dev/img/tours";

type HmacSha256 = Hmac<Sha256>;

/// Stripe REST client
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(api_base: &str, secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.stripe_api_base,
            &config.stripe_secret_key,
            &config.stripe_webhook_secret,
        )
    }

    /// Create a checkout session for one seat on `tour`
    ///
    /// `base_url` is the scheme and host the client used, e.g.
    /// `https://natours.io`.
    pub async fn create_checkout_session(
        &self,
        tour: &Tour,
        customer_email: &str,
        base_url: &str,
    ) -> Result<Value> {
        let form = checkout_form(tour, customer_email, base_url);

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .context("Failed to reach the payment provider")?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("Invalid response from the payment provider")?;

        if !status.is_success() {
            error!("Checkout session rejected ({}): {}", status, body);
            anyhow::bail!("Checkout session could not be created");
        }

        debug!("Created checkout session for tour {}", tour.id);
        Ok(body)
    }

    /// Verify and decode a webhook delivery
    pub fn construct_event(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<WebhookEvent, SignatureError> {
        verify_signature(payload, signature_header, &self.webhook_secret, now)?;
        serde_json::from_slice(payload).map_err(|e| SignatureError::Payload(e.to_string()))
    }
}

/// Form fields of a checkout session request
pub fn checkout_form(tour: &Tour, customer_email: &str, base_url: &str) -> Vec<(String, String)> {
    let item = "line_items[0]";
    let product = format!("{item}[price_data][product_data]");

    vec![
        ("mode".into(), "payment".into()),
        ("payment_method_types[0]".into(), "card".into()),
        (
            "success_url".into(),
            format!("{base_url}/my-tours?alert=booking"),
        ),
        ("cancel_url".into(), format!("{base_url}/tour/{}", tour.slug)),
        ("customer_email".into(), customer_email.to_string()),
        ("client_reference_id".into(), tour.id.to_string()),
        (format!("{item}[quantity]"), "1".into()),
        (format!("{item}[price_data][currency]"), "usd".into()),
        (
            format!("{item}[price_data][unit_amount]"),
            unit_amount(tour.price).to_string(),
        ),
        (format!("{product}[name]"), format!("{} Tour", tour.name)),
        (format!("{product}[description]"), tour.summary.clone()),
        (
            format!("{product}[images][0]"),
            format!("{PUBLIC_IMAGE_BASE}/{}", tour.image_cover),
        ),
    ]
}

/// Price in cents
pub fn unit_amount(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

#[derive(Error, Debug, PartialEq)]
pub enum SignatureError {
    #[error("missing or malformed signature header")]
    MalformedHeader,
    #[error("timestamp outside the tolerance zone")]
    Expired,
    #[error("no signatures found matching the expected signature for payload")]
    Mismatch,
    #[error("invalid payload: {0}")]
    Payload(String),
}

/// Check a `t=<unix>,v1=<hex>` header against the payload
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let matched = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Webhook envelope
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// The parts of a completed checkout session a booking needs
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub tour_reference: String,
    pub customer_email: String,
    pub price: f64,
}

impl WebhookEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.kind == "checkout.session.completed"
    }

    /// Extract the booking data, `None` when a field is missing
    pub fn completed_checkout(&self) -> Option<CompletedCheckout> {
        let session = &self.data.object;
        let customer_email = session["customer_email"]
            .as_str()
            .or_else(|| session["customer_details"]["email"].as_str())?;

        Some(CompletedCheckout {
            session_id: session["id"].as_str()?.to_string(),
            tour_reference: session["client_reference_id"].as_str()?.to_string(),
            customer_email: customer_email.to_string(),
            price: session["amount_total"].as_f64()? / 100.0,
        })
    }
}
