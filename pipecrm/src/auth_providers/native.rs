//! Built-in auth backend: argon2 hashes in Postgres and stateless JWT access tokens.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::prelude::RngExt;
use rand::rng;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::{AuthError, AuthProvider, AuthSession, AuthUser, Result, SignUpOutcome};
use crate::{
    auth::{password, session},
    db::{
        errors::DbError,
        handlers::Credentials,
        models::credentials::{Credential, CredentialCreateDBRequest},
    },
    types::{UserId, abbrev_uuid},
};

pub struct NativeProvider {
    db: PgPool,
    secret_key: String,
    session_duration: Duration,
}

impl NativeProvider {
    pub fn new(db: PgPool, secret_key: String, session_duration: Duration) -> Self {
        Self {
            db,
            secret_key,
            session_duration,
        }
    }

    fn issue_session(&self, user: AuthUser) -> Result<AuthSession> {
        let (access_token, expires_at) = session::create_session_token(&user, &self.secret_key, self.session_duration)?;

        Ok(AuthSession {
            access_token,
            refresh_token: generate_refresh_token(),
            token_type: "bearer".to_string(),
            expires_in: self.session_duration.as_secs() as i64,
            expires_at: Some(expires_at),
            user,
        })
    }
}

/// Opaque refresh token. Native sessions are validated from the access token alone.
fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| AuthError::Upstream(format!("spawn password hashing task: {e}")))?
        .map_err(|e| AuthError::Upstream(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| AuthError::Upstream(format!("spawn password verification task: {e}")))?
        .map_err(|e| AuthError::Upstream(e.to_string()))
}

fn auth_user(credential: &Credential) -> AuthUser {
    AuthUser {
        id: credential.id,
        email: credential.email.clone(),
        created_at: Some(credential.created_at),
    }
}

#[async_trait]
impl AuthProvider for NativeProvider {
    #[instrument(skip_all, err)]
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let password_hash = hash_password(password.to_string()).await?;

        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        let credential = Credentials::new(&mut conn)
            .create(&CredentialCreateDBRequest {
                email: email.to_string(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation { .. } => AuthError::SignUpRejected("email already registered".to_string()),
                other => AuthError::Database(other),
            })?;

        debug!(user_id = %abbrev_uuid(&credential.id), "Created native credential");
        let user = auth_user(&credential);
        let session = self.issue_session(user.clone())?;
        Ok(SignUpOutcome {
            user,
            session: Some(session),
        })
    }

    #[instrument(skip_all, err)]
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        let Some(credential) = Credentials::new(&mut conn).get_by_email(email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password.to_string(), credential.password_hash.clone()).await? {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_session(auth_user(&credential))
    }

    async fn get_session_user(&self, access_token: &str, _refresh_token: Option<&str>) -> Result<AuthUser> {
        let claims = session::verify_session_token(access_token, &self.secret_key)?;
        Ok(claims.into())
    }

    #[instrument(skip(self, password), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn admin_update_password(&self, user_id: UserId, password: &str) -> Result<()> {
        let password_hash = hash_password(password.to_string()).await?;

        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        if !Credentials::new(&mut conn).update_password_hash(user_id, &password_hash).await? {
            return Err(AuthError::Upstream(format!("no credential for user {user_id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const SECRET: &str = "native-provider-test-secret";

    fn provider(pool: PgPool) -> NativeProvider {
        NativeProvider::new(pool, SECRET.to_string(), Duration::from_secs(3600))
    }

    #[sqlx::test]
    async fn test_sign_up_then_sign_in(pool: PgPool) {
        let provider = provider(pool);

        let outcome = provider.sign_up("a@b.com", "longenough1").await.unwrap();
        let session = outcome.session.expect("native sign-up issues a session");
        assert_eq!(session.token_type, "bearer");
        assert_eq!(session.expires_in, 3600);
        assert_eq!(session.user.id, outcome.user.id);

        let user = provider.get_session_user(&session.access_token, None).await.unwrap();
        assert_eq!(user.id, outcome.user.id);
        assert_eq!(user.email, "a@b.com");

        let signed_in = provider.sign_in_with_password("a@b.com", "longenough1").await.unwrap();
        assert_eq!(signed_in.user.id, outcome.user.id);
        assert_ne!(signed_in.refresh_token, session.refresh_token);
    }

    #[sqlx::test]
    async fn test_duplicate_sign_up_rejected(pool: PgPool) {
        let provider = provider(pool);

        provider.sign_up("dup@b.com", "longenough1").await.unwrap();
        let result = provider.sign_up("dup@b.com", "another-password").await;
        assert!(matches!(result, Err(AuthError::SignUpRejected(_))));
    }

    #[sqlx::test]
    async fn test_wrong_password_and_unknown_email_look_the_same(pool: PgPool) {
        let provider = provider(pool);
        provider.sign_up("user@b.com", "longenough1").await.unwrap();

        assert!(matches!(
            provider.sign_in_with_password("user@b.com", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            provider.sign_in_with_password("nobody@b.com", "longenough1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[sqlx::test]
    async fn test_admin_update_password(pool: PgPool) {
        let provider = provider(pool);
        let outcome = provider.sign_up("reset@b.com", "old-password").await.unwrap();

        provider.admin_update_password(outcome.user.id, "new-password").await.unwrap();

        assert!(provider.sign_in_with_password("reset@b.com", "old-password").await.is_err());
        assert!(provider.sign_in_with_password("reset@b.com", "new-password").await.is_ok());
        assert!(matches!(
            provider.admin_update_password(Uuid::new_v4(), "whatever-123").await,
            Err(AuthError::Upstream(_))
        ));
    }

    #[sqlx::test]
    async fn test_invalid_access_token(pool: PgPool) {
        let provider = provider(pool);
        assert!(matches!(
            provider.get_session_user("garbage", Some("refresh")).await,
            Err(AuthError::InvalidSession)
        ));
    }
}
