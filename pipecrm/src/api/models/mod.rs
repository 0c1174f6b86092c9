//! API request and response data models.
//!
//! These structures define the public JSON contract and are kept separate from the database
//! models so storage can change without breaking clients. All of them derive `utoipa::ToSchema`
//! for the generated API docs.
//!
//! - [`auth`]: login, registration, password reset and session status
//! - [`billing`]: webhook acknowledgement and checkout links
//! - [`pipeline`]: the deal board
//! - [`dashboard`]: deal summaries

pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod pipeline;
