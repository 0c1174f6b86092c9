//! Test utilities shared by the unit and integration tests.

use std::time::Duration;

use axum_test::TestServer;
use sqlx::PgPool;

use crate::{
    auth_providers::{AuthProvider, AuthSession, native::NativeProvider},
    config::{Config, EmailTransportConfig},
    db::{
        handlers::{Profiles, Repository},
        models::profiles::{Profile, ProfileCreateDBRequest, SubscriptionPatch},
    },
    subscription::SubscriptionStatus,
};

/// Password given to every user created by [`create_test_user`]
pub const TEST_PASSWORD: &str = "correct-horse-battery";

const TEST_SECRET_KEY: &str = "test-secret-key-for-testing-only";

/// Install the process-wide rustls provider. Needed before building any `reqwest` client.
pub fn ensure_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let emails_dir = std::env::temp_dir().join(format!("pipecrm-test-emails-{}", std::process::id()));

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some(TEST_SECRET_KEY.to_string()),
        ..Default::default()
    };
    config.email.transport = EmailTransportConfig::File {
        path: emails_dir.to_string_lossy().to_string(),
    };
    config.email.from_name = "SaaS CRM".to_string();
    config
}

/// Build the full router on top of the test pool
pub async fn create_test_app(pool: PgPool, config: Config) -> TestServer {
    ensure_crypto_provider();

    crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application")
        .into_test_server()
}

pub struct TestUser {
    pub profile: Profile,
    /// A live native session, valid against any app built from [`create_test_config`]
    pub session: AuthSession,
}

/// Register `email` through the native backend and give its profile `status`.
pub async fn create_test_user(pool: &PgPool, email: &str, status: SubscriptionStatus) -> TestUser {
    let provider = NativeProvider::new(pool.clone(), TEST_SECRET_KEY.to_string(), Duration::from_secs(60 * 60));
    let outcome = provider.sign_up(email, TEST_PASSWORD).await.expect("Failed to sign up test user");
    let session = outcome.session.expect("Native sign-up always issues a session");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut profiles = Profiles::new(&mut conn);
    profiles
        .ensure(&ProfileCreateDBRequest {
            id: outcome.user.id,
            email: email.to_string(),
        })
        .await
        .expect("Failed to create test profile");

    let profile = profiles
        .update(
            outcome.user.id,
            &SubscriptionPatch {
                status,
                stripe_customer_id: None,
                email: None,
                period: None,
            },
        )
        .await
        .expect("Failed to set test subscription status");

    TestUser { profile, session }
}
