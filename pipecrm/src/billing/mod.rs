//! Payment provider abstraction layer
//!
//! This module defines the `BillingProvider` trait, which covers what the service needs from a
//! subscription billing provider: authenticating webhook deliveries, looking subscriptions up and
//! pointing users at a checkout page.
//!
//! - [`signature`]: webhook signature scheme
//! - [`events`]: typed webhook payloads
//! - [`sync`]: mapping events onto profile subscription state
//! - [`stripe`]: the Stripe implementation

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::{config::BillingConfig, db::errors::DbError};

pub mod events;
pub mod signature;
pub mod stripe;
pub mod sync;

use events::{Event, Subscription};
use signature::SignatureError;

/// Create a billing provider from configuration
///
/// This is the single point where we convert config into provider instances.
/// Adding a new provider requires adding a match arm here.
pub fn create_provider(config: &BillingConfig) -> Arc<dyn BillingProvider> {
    match config {
        BillingConfig::Stripe(stripe_config) => Arc::new(stripe::StripeProvider::from(stripe_config.clone())),
    }
}

/// Result type for billing operations
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur while handling billing events
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

/// Abstract billing provider interface
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Authenticate a webhook delivery and decode it
    ///
    /// `signature` is the raw signature header. Any verification failure is an error; the
    /// payload is never decoded unless the signature holds.
    fn construct_event(&self, payload: &[u8], signature: &str) -> Result<Event>;

    /// Fetch the current state of a subscription
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription>;

    /// Hosted checkout page for a user, if one is configured
    fn checkout_url(&self, email: &str) -> Option<Url>;
}
