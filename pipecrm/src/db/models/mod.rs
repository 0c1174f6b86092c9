//! Database record models matching table schemas.
//!
//! These structs derive `sqlx::FromRow` and are returned by the repositories in
//! [`crate::db::handlers`]. API representations live in [`crate::api::models`] and convert from
//! these.
//!
//! - [`profiles`]: per-user profile and mirrored subscription state
//! - [`credentials`]: password hashes for the native auth backend
//! - [`password_reset_tokens`]: single-use reset tokens
//! - [`pipelines`], [`stages`], [`deals`]: the deal board

pub mod credentials;
pub mod deals;
pub mod password_reset_tokens;
pub mod pipelines;
pub mod profiles;
pub mod stages;
