//! Request authentication and credential helpers.
//!
//! - [`current_user`]: bearer-token extractor resolving the caller through the auth backend
//! - [`client_ip`]: caller address for rate limit keys
//! - [`password`]: hashing, reset tokens and input validation
//! - [`session`]: JWTs issued by the native auth backend

pub mod client_ip;
pub mod current_user;
pub mod password;
pub mod session;
