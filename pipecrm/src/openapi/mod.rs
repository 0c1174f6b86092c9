//! OpenAPI documentation for the CRM API, served at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, auth_providers};

/// Bearer session tokens as issued by `/auth/login` and `/auth/register`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session access token. Include it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer ACCESS_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::register,
        api::handlers::auth::forgot_password,
        api::handlers::auth::reset_password,
        api::handlers::auth::subscription_status,
        api::handlers::billing::webhook,
        api::handlers::billing::checkout,
        api::handlers::pipeline::get_board,
        api::handlers::pipeline::create_deal,
        api::handlers::pipeline::move_deal,
        api::handlers::dashboard::get_dashboard,
    ),
    components(
        schemas(
            api::models::auth::LoginRequest,
            api::models::auth::RegisterRequest,
            api::models::auth::ForgotPasswordRequest,
            api::models::auth::ResetPasswordRequest,
            api::models::auth::SubscriptionStatusRequest,
            api::models::auth::AuthResponse,
            api::models::auth::OkResponse,
            api::models::auth::SubscriptionStatusResponse,
            auth_providers::AuthUser,
            auth_providers::AuthSession,
            api::models::billing::WebhookReceived,
            api::models::billing::CheckoutLinkResponse,
            api::models::pipeline::PipelineResponse,
            api::models::pipeline::StageResponse,
            api::models::pipeline::DealResponse,
            api::models::pipeline::BoardResponse,
            api::models::pipeline::DealCreate,
            api::models::pipeline::DealMove,
            api::models::dashboard::DashboardResponse,
        )
    ),
    tags(
        (name = "auth", description = "Sign in, sign up and password recovery. Rate limited per client address."),
        (name = "billing", description = "Subscription sync from the payment provider."),
        (name = "pipeline", description = "The sales board. Every route here requires an active or trialing subscription.

Rejections carry a `redirect` path: the login page on `401`, the plans page on `402`."),
    ),
    info(
        title = "PipeCRM API",
        description = "Multi-tenant sales pipeline CRM.

## Errors

Errors are JSON objects with a single human readable message:

```json
{ \"error\": \"Email ou senha incorretos.\" }
```

Rate limited requests answer `429` with a `Retry-After` header.",
    ),
)]
pub struct ApiDoc;
