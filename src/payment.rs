use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{CartItem, PaymentIntent, PaymentIntentRequest};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid payment request: {0}")]
    Invalid(String),
    #[error("payment provider is not configured")]
    NotConfigured,
    #[error("payment provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// PaymentProvider
///
/// Contract for the external payment service.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError>;
}

pub type PaymentState = Arc<dyn PaymentProvider>;

/// Builds the provider request for a cart, validating it on the way.
///
/// Amounts are summed in minor units; currencies are ISO 4217 codes and are
/// lower-cased because that is what the provider expects.
pub fn intent_for_cart(items: &[CartItem], currency: &str) -> Result<PaymentIntentRequest, PaymentError> {
    if items.is_empty() {
        return Err(PaymentError::Invalid("cart is empty".into()));
    }
    if let Some(bad) = items.iter().find(|i| i.quantity == 0 || i.unit_price_cents <= 0) {
        return Err(PaymentError::Invalid(format!("invalid line for sku {}", bad.sku)));
    }
    let currency = currency.trim().to_ascii_lowercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(PaymentError::Invalid(format!("unsupported currency {:?}", currency)));
    }

    let amount = items
        .iter()
        .try_fold(0i64, |acc, item| {
            item.unit_price_cents
                .checked_mul(i64::from(item.quantity))
                .and_then(|line| acc.checked_add(line))
        })
        .ok_or_else(|| PaymentError::Invalid("cart total overflows".into()))?;

    Ok(PaymentIntentRequest {
        amount,
        currency,
        payment_method_types: vec!["card".to_string()],
    })
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

/// StripeClient
///
/// Creates payment intents through the provider's form-encoded REST API. The
/// secret key comes from configuration.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(api_base: &str, secret_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        if self.secret_key.is_empty() {
            return Err(PaymentError::NotConfigured);
        }

        let mut form: Vec<(&str, String)> = vec![
            ("amount", request.amount.to_string()),
            ("currency", request.currency.clone()),
        ];
        form.extend(
            request
                .payment_method_types
                .iter()
                .map(|t| ("payment_method_types[]", t.clone())),
        );

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ProviderErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            tracing::error!(status = status.as_u16(), "payment intent rejected: {}", message);
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let intent = response.json::<PaymentIntent>().await?;
        tracing::info!(intent = %intent.id, amount = intent.amount, "payment intent created");
        Ok(intent)
    }
}
