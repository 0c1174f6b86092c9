//! API models for billing endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Acknowledgement of a verified webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookReceived {
    pub received: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutLinkResponse {
    /// Hosted checkout page with the caller's email prefilled
    pub url: String,
}
