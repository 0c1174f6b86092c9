//! Database models for profiles.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::subscription::SubscriptionStatus;
use crate::types::UserId;

/// Database entity model
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub subscription_status: String,
    pub stripe_customer_id: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from(self.subscription_status.as_str())
    }
}

/// Request for creating a profile right after the auth backend accepted a sign-up
#[derive(Debug, Clone)]
pub struct ProfileCreateDBRequest {
    pub id: UserId,
    pub email: String,
}

/// How a billing update finds its profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLookup {
    /// Case-insensitive match on the profile email
    Email(String),
    /// Match on the linked Stripe customer id
    CustomerId(String),
}

/// Subscription fields carried by a provider event.
///
/// `stripe_customer_id` and `email` only overwrite when present. `period` is `None` for events
/// that carry no subscription data, which leaves the stored period untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionPatch {
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub email: Option<String>,
    pub period: Option<BillingPeriod>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}
