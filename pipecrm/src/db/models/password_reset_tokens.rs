//! Database models for password reset tokens.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{ResetTokenId, UserId};

/// Database entity model
#[derive(Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: ResetTokenId,
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

// The raw token is a bearer credential and must not end up in logs.
impl std::fmt::Debug for PasswordResetToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordResetToken")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("used", &self.used)
            .finish()
    }
}

/// Why a stored token cannot be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Used,
    Expired,
}

impl PasswordResetToken {
    /// Check a looked-up token, used before expired.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), TokenRejection> {
        if self.used {
            return Err(TokenRejection::Used);
        }
        if self.expires_at < now {
            return Err(TokenRejection::Expired);
        }
        Ok(())
    }
}

/// Request for creating a password reset token
#[derive(Clone)]
pub struct PasswordResetTokenCreateDBRequest {
    pub user_id: UserId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Request for updating a password reset token (mark as used)
#[derive(Debug, Clone)]
pub struct PasswordResetTokenUpdateDBRequest {
    pub used: bool,
}

/// Filter for password reset tokens
#[derive(Debug, Clone, Default)]
pub struct PasswordResetTokenFilter {
    pub user_id: Option<UserId>,
    pub unused_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn token(used: bool, expires_in: Duration) -> PasswordResetToken {
        let now = Utc::now();
        PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "a".repeat(64),
            expires_at: now + expires_in,
            used,
            created_at: now,
        }
    }

    #[test]
    fn test_fresh_token_is_usable() {
        assert_eq!(token(false, Duration::hours(1)).check_usable(Utc::now()), Ok(()));
    }

    #[test]
    fn test_used_token_rejected_before_expiry_check() {
        // Used and expired at once: the used check wins.
        assert_eq!(
            token(true, Duration::hours(-1)).check_usable(Utc::now()),
            Err(TokenRejection::Used)
        );
        assert_eq!(token(true, Duration::hours(1)).check_usable(Utc::now()), Err(TokenRejection::Used));
    }

    #[test]
    fn test_expired_unused_token_rejected() {
        assert_eq!(
            token(false, Duration::seconds(-1)).check_usable(Utc::now()),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", token(false, Duration::hours(1)));
        assert!(!rendered.contains(&"a".repeat(64)));
        assert!(rendered.contains("<redacted>"));
    }
}
