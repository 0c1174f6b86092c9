//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/auth/*`): Login, registration, password reset, subscription status.
//!   Rate limited per client address.
//! - **Billing** (`/billing/*`): Signed webhook from the payment provider, checkout link
//! - **Pipeline** (`/pipeline`, `/pipeline/deals/*`): The user's board. Requires an active
//!   subscription.
//! - **Dashboard** (`/dashboard`): Deal totals. Requires an active subscription.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. The rendered reference is served at
//! `/docs`.

pub mod handlers;
pub mod models;
