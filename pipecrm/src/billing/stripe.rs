//! Stripe billing provider implementation

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, instrument, trace};
use url::Url;

use super::{
    BillingError, BillingProvider, Result,
    events::{Event, Subscription},
    signature,
};
use crate::config::StripeConfig;

/// Stripe billing provider
pub struct StripeProvider {
    client: Client,
    api_key: String,
    webhook_secret: String,
    api_base_url: Url,
    checkout_url: Option<Url>,
    signature_tolerance: Duration,
}

impl From<StripeConfig> for StripeProvider {
    fn from(config: StripeConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key,
            webhook_secret: config.webhook_secret,
            api_base_url: config.api_base_url,
            checkout_url: config.checkout_url,
            signature_tolerance: config.signature_tolerance,
        }
    }
}

#[async_trait]
impl BillingProvider for StripeProvider {
    fn construct_event(&self, payload: &[u8], signature: &str) -> Result<Event> {
        signature::verify_signature(
            payload,
            signature,
            &self.webhook_secret,
            self.signature_tolerance,
            Utc::now().timestamp(),
        )?;

        let event: Event = serde_json::from_slice(payload).map_err(|e| BillingError::InvalidPayload(e.to_string()))?;
        trace!(event_id = %event.id, event_type = %event.event_type, "Validated Stripe webhook event");
        Ok(event)
    }

    #[instrument(skip(self), err)]
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription> {
        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BillingError::ProviderApi("Stripe API base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "subscriptions", subscription_id]);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| BillingError::ProviderApi(format!("retrieve subscription: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::ProviderApi(format!(
                "retrieve subscription {subscription_id}: status {status}: {body}"
            )));
        }

        let subscription: Subscription = response
            .json()
            .await
            .map_err(|e| BillingError::ProviderApi(format!("decode subscription: {e}")))?;
        debug!(status = %subscription.status, "Retrieved subscription");
        Ok(subscription)
    }

    fn checkout_url(&self, email: &str) -> Option<Url> {
        let mut url = self.checkout_url.clone()?;
        url.query_pairs_mut().append_pair("prefilled_email", email);
        Some(url)
    }
}
