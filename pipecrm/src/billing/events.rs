//! Typed views of the Stripe webhook payloads we react to.
//!
//! Only the fields reconciliation reads are modelled. Expandable references (`customer`,
//! `subscription`) arrive either as an id string or as an expanded object. Only the string form
//! identifies anything here, so [`Expandable::id`] returns `None` for objects.

use serde::Deserialize;
use serde_json::Value;

/// Envelope of every webhook delivery
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl Event {
    /// Decode `data.object` as `T`
    pub fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data.object)
    }
}

/// Event types that change a profile
pub mod types {
    pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
    pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
    pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
    pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
    pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";
    pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";
}

/// A reference that is either an id or an expanded object
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Expandable(Option<Value>);

impl Expandable {
    pub fn id(&self) -> Option<&str> {
        match &self.0 {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    #[serde(default)]
    pub customer: Expandable,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub subscription: Expandable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

impl CheckoutSession {
    /// The buyer's email: the one typed at checkout, else a client reference that looks like one.
    pub fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .filter(|e| !e.is_empty())
            .or_else(|| self.client_reference_id.as_deref().filter(|r| r.contains('@')))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub customer: Expandable,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

impl Subscription {
    /// Billing period of the first item, as unix seconds
    pub fn current_period(&self) -> (Option<i64>, Option<i64>) {
        self.items
            .data
            .first()
            .map(|item| (item.current_period_start, item.current_period_end))
            .unwrap_or((None, None))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    #[serde(default)]
    pub customer: Expandable,
}
