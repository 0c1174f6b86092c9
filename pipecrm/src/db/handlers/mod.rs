//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (pooled connection or transaction) and returns the
//! models from [`crate::db::models`].
//!
//! - [`Profiles`]: profile lookup and subscription state updates
//! - [`Credentials`]: native auth backend password storage
//! - [`PasswordResetTokens`]: reset token lifecycle
//! - [`Pipelines`], [`Stages`]: deal board scaffolding used by the bootstrap
//! - [`Deals`]: the deals on a board
//!
//! [`Profiles`], [`PasswordResetTokens`] and [`Deals`] implement the generic [`Repository`] trait.

pub mod credentials;
pub mod deals;
pub mod password_reset_tokens;
pub mod pipelines;
pub mod profiles;
pub mod repository;
pub mod stages;

pub use credentials::Credentials;
pub use deals::Deals;
pub use password_reset_tokens::PasswordResetTokens;
pub use pipelines::Pipelines;
pub use profiles::Profiles;
pub use repository::Repository;
pub use stages::Stages;
