//! HTTP request handlers for all API endpoints.
//!
//! Each handler validates its input, applies the rate limit or subscription gate that guards it,
//! performs the work through the database repositories or provider traits, and returns JSON.
//!
//! # Handler Modules
//!
//! - [`auth`]: Login, registration, password reset and subscription status
//! - [`billing`]: Payment provider webhook and checkout link
//! - [`dashboard`]: Deal totals for the signed-in user
//! - [`pipeline`]: The user's board and deal management
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which renders as `{"error": "..."}` with the
//! matching status code. Routes behind the subscription gate reject with
//! [`crate::subscription::GateRejection`], which also carries a `redirect` path.

pub mod auth;
pub mod billing;
pub mod dashboard;
pub mod pipeline;
