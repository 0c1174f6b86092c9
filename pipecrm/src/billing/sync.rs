//! Mapping of verified billing events onto profile subscription state.
//!
//! [`reconcile`] decides what an event means for a profile without touching the database, and
//! [`process_event`] applies that decision. Updates overwrite: the last delivered event wins.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use super::{
    BillingError, BillingProvider, Result,
    events::{CheckoutSession, Event, Invoice, Subscription, types},
};
use crate::{
    db::{
        handlers::Profiles,
        models::profiles::{BillingPeriod, ProfileLookup, SubscriptionPatch},
    },
    subscription::SubscriptionStatus,
    types::mask_email,
};

/// A patch together with the profile it applies to
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub target: ProfileLookup,
    pub patch: SubscriptionPatch,
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

fn billing_period(subscription: &Subscription) -> BillingPeriod {
    let (start, end) = subscription.current_period();
    BillingPeriod {
        start: timestamp(start),
        end: timestamp(end),
        cancel_at_period_end: subscription.cancel_at_period_end,
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &Event) -> Result<T> {
    event
        .object()
        .map_err(|e| BillingError::InvalidPayload(format!("{} object: {e}", event.event_type)))
}

/// Work out which profile an event updates and how.
///
/// Returns `None` for event types we do not handle and for events that identify no profile.
#[instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type), err)]
pub async fn reconcile(event: &Event, provider: &dyn BillingProvider) -> Result<Option<ProfileUpdate>> {
    let update = match event.event_type.as_str() {
        types::CHECKOUT_SESSION_COMPLETED => {
            let session: CheckoutSession = decode(event)?;
            let customer_id = session.customer.id().map(str::to_string);
            let email = session.email().map(|e| e.trim().to_lowercase());

            let (status, period) = match session.subscription.id() {
                Some(subscription_id) => {
                    let subscription = provider.retrieve_subscription(subscription_id).await?;
                    (SubscriptionStatus::from(subscription.status.as_str()), Some(billing_period(&subscription)))
                }
                None => (SubscriptionStatus::Active, None),
            };

            let target = match (&email, &customer_id) {
                (Some(email), _) => ProfileLookup::Email(email.clone()),
                (None, Some(customer_id)) => ProfileLookup::CustomerId(customer_id.clone()),
                (None, None) => {
                    warn!("Checkout session carries neither an email nor a customer id");
                    return Ok(None);
                }
            };

            Some(ProfileUpdate {
                target,
                patch: SubscriptionPatch {
                    status,
                    stripe_customer_id: customer_id,
                    email,
                    period,
                },
            })
        }
        types::SUBSCRIPTION_CREATED | types::SUBSCRIPTION_UPDATED | types::SUBSCRIPTION_DELETED => {
            let subscription: Subscription = decode(event)?;
            let status = if event.event_type == types::SUBSCRIPTION_DELETED {
                SubscriptionStatus::Canceled
            } else {
                SubscriptionStatus::from(subscription.status.as_str())
            };

            subscription.customer.id().map(|customer_id| ProfileUpdate {
                target: ProfileLookup::CustomerId(customer_id.to_string()),
                patch: SubscriptionPatch {
                    status,
                    stripe_customer_id: None,
                    email: None,
                    period: Some(billing_period(&subscription)),
                },
            })
        }
        types::INVOICE_PAYMENT_FAILED | types::INVOICE_PAYMENT_SUCCEEDED => {
            let invoice: Invoice = decode(event)?;
            let status = if event.event_type == types::INVOICE_PAYMENT_FAILED {
                SubscriptionStatus::PastDue
            } else {
                SubscriptionStatus::Active
            };

            invoice.customer.id().map(|customer_id| ProfileUpdate {
                target: ProfileLookup::CustomerId(customer_id.to_string()),
                patch: SubscriptionPatch {
                    status,
                    stripe_customer_id: None,
                    email: None,
                    period: None,
                },
            })
        }
        _ => {
            debug!("Ignoring unhandled event type");
            return Ok(None);
        }
    };

    if update.is_none() {
        warn!("Event does not reference a customer, nothing to update");
    }
    Ok(update)
}

/// Reconcile an event and write the result, returning whether a profile changed
#[instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type), err)]
pub async fn process_event(db: &PgPool, provider: &dyn BillingProvider, event: &Event) -> Result<bool> {
    let Some(update) = reconcile(event, provider).await? else {
        return Ok(false);
    };

    let mut conn = db.acquire().await.map_err(crate::db::errors::DbError::from)?;
    let rows = Profiles::new(&mut conn)
        .apply_subscription_patch(&update.target, &update.patch)
        .await?;

    let target = match &update.target {
        ProfileLookup::Email(email) => mask_email(email),
        ProfileLookup::CustomerId(customer_id) => customer_id.clone(),
    };
    if rows == 0 {
        warn!(%target, "No profile matched billing event");
    } else {
        info!(%target, status = %update.patch.status, "Applied subscription update");
    }

    Ok(rows > 0)
}
