use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use tracing::{error, info, warn};

use crate::{
    AppState,
    api::models::billing::{CheckoutLinkResponse, WebhookReceived},
    auth::current_user::CurrentUser,
    billing::{
        BillingError,
        signature::{SIGNATURE_HEADER, SignatureError},
        sync,
    },
    errors::Error,
    types::abbrev_uuid,
};

/// Receive a payment provider webhook
///
/// The raw body is verified against the signature header before anything is parsed. Every
/// verified event is acknowledged, including types that are not handled.
#[utoipa::path(
    post,
    path = "/billing/webhook",
    tag = "billing",
    request_body(content = String, description = "Raw signed event payload", content_type = "application/json"),
    params(
        ("stripe-signature" = String, Header, description = "Signature over the timestamp and raw body"),
    ),
    responses(
        (status = 200, description = "Event verified and processed", body = WebhookReceived),
        (status = 400, description = "Missing or invalid signature, or malformed payload"),
        (status = 500, description = "Billing not configured, or the event could not be applied"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<WebhookReceived>, Error> {
    let Some(provider) = state.billing.as_ref() else {
        return Err(Error::NotConfigured {
            what: "Webhook".to_string(),
        });
    };

    let Some(signature) = headers.get(SIGNATURE_HEADER) else {
        return Err(Error::BadRequest {
            message: format!("Missing {SIGNATURE_HEADER} header"),
        });
    };

    let event = signature
        .to_str()
        .map_err(|_| BillingError::InvalidSignature(SignatureError::MalformedHeader))
        .and_then(|signature| provider.construct_event(&body, signature))
        .map_err(|e| match e {
            BillingError::InvalidSignature(reason) => {
                warn!(%reason, "Rejected webhook with invalid signature");
                Error::BadRequest {
                    message: "Invalid signature".to_string(),
                }
            }
            BillingError::InvalidPayload(reason) => {
                warn!(%reason, "Rejected malformed webhook payload");
                Error::BadRequest {
                    message: "Invalid payload".to_string(),
                }
            }
            other => webhook_failure(other),
        })?;

    info!(event_id = %event.id, event_type = %event.event_type, "Received webhook event");

    sync::process_event(&state.db, provider.as_ref(), &event)
        .await
        .map_err(webhook_failure)?;

    Ok(Json(WebhookReceived { received: true }))
}

fn webhook_failure(e: BillingError) -> Error {
    error!(error = %e, "Webhook handler failed");
    Error::Upstream {
        operation: format!("handle webhook: {e}"),
        message: "Webhook handler failed".to_string(),
    }
}

/// Checkout link for the signed-in user
///
/// Only needs a session, since users without a subscription are the ones who need it.
#[utoipa::path(
    get,
    path = "/billing/checkout",
    tag = "billing",
    responses(
        (status = 200, description = "Hosted checkout page", body = CheckoutLinkResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Checkout link not configured"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %abbrev_uuid(&user.id)))]
pub async fn checkout(State(state): State<AppState>, user: CurrentUser) -> Result<Json<CheckoutLinkResponse>, Error> {
    let url = state
        .billing
        .as_ref()
        .and_then(|provider| provider.checkout_url(&user.email))
        .ok_or_else(|| Error::Upstream {
            operation: "build checkout link: billing.stripe.checkout_url is not set".to_string(),
            message: "Link de checkout não configurado.".to_string(),
        })?;

    Ok(Json(CheckoutLinkResponse { url: url.into() }))
}
