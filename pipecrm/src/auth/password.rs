//! Password hashing, reset tokens and credential input validation.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::prelude::RngExt;
use rand::rng;

use crate::config::PasswordConfig;
use crate::errors::Error;

/// Length of a hex-encoded reset token (32 random bytes).
pub const RESET_TOKEN_LEN: usize = 64;

/// Longest email accepted by the auth endpoints.
pub const MAX_EMAIL_LEN: usize = 255;

/// Hash a password using Argon2id with default parameters.
pub fn hash_string(input: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(input.as_bytes(), &salt)
        .map_err(|e| Error::Internal {
            operation: format!("hash string: {e}"),
        })?;

    Ok(hash.to_string())
}

/// Verify a string against a hash.
///
/// Note: Verification uses the parameters embedded in the hash itself.
pub fn verify_string(input: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    Ok(Argon2::default().verify_password(input.as_bytes(), &parsed_hash).is_ok())
}

/// Generate a secure random token for password reset: 32 bytes as lowercase hex.
pub fn generate_reset_token() -> String {
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);
    hex::encode(token_bytes)
}

/// Whether `token` has the shape of a reset token, checked before any storage lookup.
pub fn is_valid_reset_token(token: &str) -> bool {
    token.len() == RESET_TOKEN_LEN && token.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Trim and lowercase an email as typed by a user.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose syntax check: one `@`, no whitespace, and a dot somewhere after the `@` with text on
/// both sides.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Enforce configured password length bounds, counted in characters.
pub fn validate_password_length(password: &str, rules: &PasswordConfig) -> Result<(), Error> {
    let length = password.chars().count();
    if length < rules.min_length {
        return Err(Error::BadRequest {
            message: format!("A senha deve ter pelo menos {} caracteres.", rules.min_length),
        });
    }
    if length > rules.max_length {
        return Err(Error::BadRequest {
            message: "Senha muito longa.".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hashing() {
        let input = "test_password_123";
        let hash = hash_string(input).unwrap();

        assert!(!hash.is_empty());
        assert!(verify_string(input, &hash).unwrap());
        assert!(!verify_string("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let hash1 = hash_string("same_password").unwrap();
        let hash2 = hash_string("same_password").unwrap();

        // Salted, so hashes differ but both verify
        assert_ne!(hash1, hash2);
        assert!(verify_string("same_password", &hash1).unwrap());
        assert!(verify_string("same_password", &hash2).unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_string("password", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_generate_reset_token() {
        let token1 = generate_reset_token();
        let token2 = generate_reset_token();

        assert_ne!(token1, token2);
        assert_eq!(token1.len(), RESET_TOKEN_LEN);
        assert!(is_valid_reset_token(&token1));
        assert!(is_valid_reset_token(&token2));
    }

    #[test]
    fn test_reset_token_shape() {
        assert!(is_valid_reset_token(&"0123456789abcdef".repeat(4)));
        assert!(!is_valid_reset_token(&"0123456789ABCDEF".repeat(4)));
        assert!(!is_valid_reset_token(&"a".repeat(63)));
        assert!(!is_valid_reset_token(&"a".repeat(65)));
        assert!(!is_valid_reset_token(&format!("{}g", "a".repeat(63))));
        assert!(!is_valid_reset_token(""));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last+tag@mail.example.com.br"));

        assert!(!is_valid_email(""));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.com"));
        assert!(!is_valid_email("a@.com"));
        assert!(!is_valid_email("a@b."));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email(&format!("{}@b.com", "a".repeat(MAX_EMAIL_LEN))));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_password_length_bounds() {
        let rules = PasswordConfig::default();

        assert!(validate_password_length("longenough1", &rules).is_ok());
        assert!(validate_password_length(&"x".repeat(128), &rules).is_ok());

        match validate_password_length("short", &rules) {
            Err(Error::BadRequest { message }) => assert!(message.contains('8')),
            other => panic!("expected BadRequest, got {other:?}"),
        }
        assert!(validate_password_length(&"x".repeat(129), &rules).is_err());
    }
}
