//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases so signatures document what they carry:
//!
//! - [`UserId`]: auth backend user id, shared with `profiles.id`
//! - [`PipelineId`], [`StageId`], [`DealId`]: deal board entities
//! - [`ResetTokenId`]: password reset token row id
//!
//! [`abbrev_uuid`] shortens ids for log fields.

use uuid::Uuid;

pub type UserId = Uuid;
pub type PipelineId = Uuid;
pub type StageId = Uuid;
pub type DealId = Uuid;
pub type ResetTokenId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Mask an email address for logging, keeping the first character and the domain.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}
