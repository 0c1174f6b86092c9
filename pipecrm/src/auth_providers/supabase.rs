//! Hosted GoTrue (Supabase Auth) backend.
//!
//! Every request carries the `apikey` header. User-facing calls use the anon key; admin calls
//! authenticate with the service-role key as a bearer token.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{AuthError, AuthProvider, AuthSession, AuthUser, Result, SignUpOutcome};
use crate::{
    config::SupabaseConfig,
    types::{UserId, abbrev_uuid},
};

pub struct SupabaseProvider {
    client: Client,
    auth_url: Url,
    anon_key: String,
    service_role_key: String,
}

/// `/signup` answers with a session when email confirmation is off, and with the bare user
/// otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(AuthSession),
    User(AuthUser),
}

impl SupabaseProvider {
    pub fn new(config: SupabaseConfig) -> anyhow::Result<Self> {
        let auth_url = config.url.join("auth/v1/")?;
        Ok(Self {
            client: Client::new(),
            auth_url,
            anon_key: config.anon_key,
            service_role_key: config.service_role_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.auth_url
            .join(path)
            .map_err(|e| AuthError::Upstream(format!("build auth URL for {path}: {e}")))
    }

    fn token_endpoint(&self, grant_type: &str) -> Result<Url> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }

    fn public(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.anon_key)
    }

    fn admin(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| AuthError::Upstream(format!("{operation}: {e}")))
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response, operation: &str) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| AuthError::Upstream(format!("{operation}: invalid response body: {e}")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession> {
        let url = self.token_endpoint("refresh_token")?;
        let response = self
            .send(
                self.public(self.client.post(url)).json(&json!({ "refresh_token": refresh_token })),
                "refresh session",
            )
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AuthError::InvalidSession);
        }
        if !status.is_success() {
            return Err(AuthError::Upstream(format!("refresh session: status {status}")));
        }
        Self::parse(response, "refresh session").await
    }
}

/// Pull the human readable message out of a GoTrue error body
async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<serde_json::Value>().await {
        Ok(body) => ["msg", "error_description", "message", "error"]
            .iter()
            .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("status {status}")),
        Err(_) => format!("status {status}"),
    }
}

#[async_trait]
impl AuthProvider for SupabaseProvider {
    #[instrument(skip_all, err)]
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let url = self.endpoint("signup")?;
        let response = self
            .send(
                self.public(self.client.post(url))
                    .json(&json!({ "email": email, "password": password })),
                "sign up",
            )
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let message = error_message(response).await;
            debug!("Sign-up rejected by auth backend: {message}");
            return Err(AuthError::SignUpRejected(message));
        }
        if !status.is_success() {
            return Err(AuthError::Upstream(format!("sign up: {}", error_message(response).await)));
        }

        match Self::parse::<SignUpResponse>(response, "sign up").await? {
            SignUpResponse::Session(session) => Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            }),
            SignUpResponse::User(user) => Ok(SignUpOutcome { user, session: None }),
        }
    }

    #[instrument(skip_all, err)]
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let url = self.token_endpoint("password")?;
        let response = self
            .send(
                self.public(self.client.post(url))
                    .json(&json!({ "email": email, "password": password })),
                "sign in",
            )
            .await?;

        let status = response.status();
        if status.is_client_error() {
            debug!("Sign-in rejected: {}", error_message(response).await);
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Upstream(format!("sign in: {}", error_message(response).await)));
        }

        Self::parse(response, "sign in").await
    }

    #[instrument(skip_all, err)]
    async fn get_session_user(&self, access_token: &str, refresh_token: Option<&str>) -> Result<AuthUser> {
        let url = self.endpoint("user")?;
        let response = self
            .send(self.public(self.client.get(url)).bearer_auth(access_token), "get user")
            .await?;

        match response.status() {
            status if status.is_success() => Self::parse(response, "get user").await,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => match refresh_token {
                Some(refresh_token) => {
                    debug!("Access token rejected, trying refresh token");
                    Ok(self.refresh(refresh_token).await?.user)
                }
                None => Err(AuthError::InvalidSession),
            },
            status if status.is_client_error() => Err(AuthError::InvalidSession),
            status => Err(AuthError::Upstream(format!("get user: status {status}"))),
        }
    }

    #[instrument(skip(self, password), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn admin_update_password(&self, user_id: UserId, password: &str) -> Result<()> {
        let url = self.endpoint(&format!("admin/users/{user_id}"))?;
        let response = self
            .send(
                self.admin(self.client.put(url)).json(&json!({ "password": password })),
                "update password",
            )
            .await?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            warn!("Admin password update failed: {message}");
            return Err(AuthError::Upstream(format!("update password: {message}")));
        }
        Ok(())
    }
}
