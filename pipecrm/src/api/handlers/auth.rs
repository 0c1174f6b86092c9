use axum::{Json, extract::State};
use chrono::Utc;
use tracing::{info, warn};

use crate::{
    AppState,
    api::models::auth::{
        AuthResponse, ForgotPasswordRequest, LoginRequest, OkResponse, RegisterRequest, ResetPasswordRequest,
        SubscriptionStatusRequest, SubscriptionStatusResponse,
    },
    auth::{client_ip::ClientIp, password},
    db::{
        errors::DbError,
        handlers::{PasswordResetTokens, Profiles, Repository},
        models::{password_reset_tokens::TokenRejection, profiles::ProfileCreateDBRequest},
    },
    errors::Error,
    subscription::SubscriptionStatus,
    types::{abbrev_uuid, mask_email},
};

fn bad_request(message: &str) -> Error {
    Error::BadRequest {
        message: message.to_string(),
    }
}

fn upstream(operation: impl std::fmt::Display, message: &str) -> Error {
    Error::Upstream {
        operation: operation.to_string(),
        message: message.to_string(),
    }
}

/// Email and password from a login or registration body, normalized and required
fn credentials(email: Option<String>, password: Option<String>) -> Result<(String, String), Error> {
    let email = email.as_deref().map(password::normalize_email).unwrap_or_default();
    match password {
        Some(password) if !email.is_empty() && !password.is_empty() => Ok((email, password)),
        _ => Err(bad_request("Email e senha são obrigatórios.")),
    }
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Missing or oversized fields"),
        (status = 401, description = "Wrong email or password"),
        (status = 429, description = "Too many attempts, see Retry-After"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    client_ip: ClientIp,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, Error> {
    let (email, password) = credentials(request.email, request.password)?;
    if email.len() > password::MAX_EMAIL_LEN || password.chars().count() > state.config.auth.password.max_length {
        return Err(bad_request("Dados inválidos."));
    }

    state
        .rate_limiter
        .enforce(&format!("login:{email}:{client_ip}"), &state.config.rate_limits.login)?;

    let session = state.auth.sign_in_with_password(&email, &password).await?;
    info!(user_id = %abbrev_uuid(&session.user.id), "User signed in");

    Ok(Json(session.into()))
}

/// Create an account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Account created; session is null until the email is confirmed", body = AuthResponse),
        (status = 400, description = "Invalid input or sign-up rejected"),
        (status = 429, description = "Too many attempts, see Retry-After"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    client_ip: ClientIp,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, Error> {
    let (email, password) = credentials(request.email, request.password)?;
    if !password::is_valid_email(&email) {
        return Err(bad_request("Email inválido."));
    }
    password::validate_password_length(&password, &state.config.auth.password)?;

    state
        .rate_limiter
        .enforce(&format!("register:{client_ip}"), &state.config.rate_limits.register)?;

    let outcome = state.auth.sign_up(&email, &password).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Profiles::new(&mut conn)
        .ensure(&ProfileCreateDBRequest {
            id: outcome.user.id,
            email: email.clone(),
        })
        .await?;

    info!(user_id = %abbrev_uuid(&outcome.user.id), confirmed = outcome.session.is_some(), "User registered");
    Ok(Json(outcome.into()))
}

/// Request a password reset link
///
/// Answers `{ok: true}` whether or not the email belongs to an account.
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Reset link sent if the account exists", body = OkResponse),
        (status = 400, description = "Invalid email"),
        (status = 500, description = "Token could not be stored or email could not be sent"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    client_ip: ClientIp,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<OkResponse>, Error> {
    let email = request.email.as_deref().map(password::normalize_email).unwrap_or_default();
    if !password::is_valid_email(&email) {
        return Err(bad_request("E-mail inválido."));
    }

    let decision = state
        .rate_limiter
        .check(&format!("forgot:{client_ip}"), &state.config.rate_limits.forgot_password);
    if !decision.allowed {
        info!(ip = %client_ip, "Password reset requests rate limited");
        return Ok(Json(OkResponse::ok()));
    }

    let mut conn = match state.db.acquire().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(error = %e, "Database unavailable during password reset request");
            return Ok(Json(OkResponse::ok()));
        }
    };

    let profile = match Profiles::new(&mut conn).get_by_email(&email).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            info!(email = %mask_email(&email), "Password reset requested for unknown email");
            return Ok(Json(OkResponse::ok()));
        }
        Err(e) => {
            warn!(error = %e, "Profile lookup failed during password reset request");
            return Ok(Json(OkResponse::ok()));
        }
    };

    let token = {
        let mut tokens = PasswordResetTokens::new(&mut conn);
        let token_failure = |e: DbError| upstream(format!("create reset token: {e}"), "Falha ao gerar token de redefinição.");
        tokens.invalidate_for_user(profile.id).await.map_err(token_failure)?;
        tokens
            .create_for_user(profile.id, state.config.auth.password_reset.token_duration)
            .await
            .map_err(token_failure)?
    };

    let reset_url = state.config.password_reset_url(&token.token);
    state.email.send_password_reset_email(&profile.email, &reset_url).await?;

    info!(user_id = %abbrev_uuid(&profile.id), "Password reset email sent");
    Ok(Json(OkResponse::ok()))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password updated", body = OkResponse),
        (status = 400, description = "Invalid, used or expired token, or unacceptable password"),
        (status = 429, description = "Too many attempts, see Retry-After"),
        (status = 500, description = "Token check or password update failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    client_ip: ClientIp,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<OkResponse>, Error> {
    let token = request.token.as_deref().map(str::trim).unwrap_or_default();
    let new_password = request.password.unwrap_or_default();
    if token.is_empty() || new_password.is_empty() {
        return Err(bad_request("Token e nova senha são obrigatórios."));
    }
    if !password::is_valid_reset_token(token) {
        return Err(bad_request("Token inválido."));
    }
    password::validate_password_length(&new_password, &state.config.auth.password)?;

    state
        .rate_limiter
        .enforce(&format!("reset:{client_ip}"), &state.config.rate_limits.reset_password)?;

    // Token row is locked until commit; any error rolls back and leaves it unused
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let stored = {
        let mut tokens = PasswordResetTokens::new(&mut tx);

        let stored = tokens
            .find_by_token_for_update(token)
            .await
            .map_err(|e| upstream(format!("look up reset token: {e}"), "Falha ao verificar token."))?
            .ok_or_else(|| bad_request("Token inválido ou expirado."))?;

        stored.check_usable(Utc::now()).map_err(|rejection| match rejection {
            TokenRejection::Used => bad_request("Este link já foi utilizado. Solicite um novo."),
            TokenRejection::Expired => bad_request("Este link expirou. Solicite um novo."),
        })?;

        state
            .auth
            .admin_update_password(stored.user_id, &new_password)
            .await
            .map_err(|e| upstream(format!("update password: {e}"), "Falha ao atualizar a senha."))?;

        tokens.mark_used(stored.id).await?;
        stored
    };
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(user_id = %abbrev_uuid(&stored.user_id), "Password reset completed");
    Ok(Json(OkResponse::with_message("Senha redefinida com sucesso.")))
}

/// Report the subscription status behind a session
#[utoipa::path(
    post,
    path = "/auth/subscription-status",
    request_body = SubscriptionStatusRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Live subscription status", body = SubscriptionStatusResponse),
        (status = 400, description = "Missing tokens"),
        (status = 401, description = "Invalid session"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn subscription_status(
    State(state): State<AppState>,
    Json(request): Json<SubscriptionStatusRequest>,
) -> Result<Json<SubscriptionStatusResponse>, Error> {
    let (Some(access_token), Some(refresh_token)) = (
        request.access_token.filter(|t| !t.is_empty()),
        request.refresh_token.filter(|t| !t.is_empty()),
    ) else {
        return Err(bad_request("Missing tokens"));
    };

    let user = state.auth.get_session_user(&access_token, Some(&refresh_token)).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let status = Profiles::new(&mut conn)
        .get_by_id(user.id)
        .await?
        .map(|profile| profile.status())
        .unwrap_or(SubscriptionStatus::Incomplete);

    Ok(Json(SubscriptionStatusResponse {
        has_active_subscription: status.is_active(),
        subscription_status: status.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailTransportConfig;
    use crate::test_utils::{create_test_app, create_test_config, create_test_user};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;
    use std::future::IntoFuture;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[sqlx::test]
    async fn test_register_then_subscription_status_is_incomplete(pool: PgPool) {
        let server = create_test_app(pool, create_test_config()).await;

        let response = server
            .post("/auth/register")
            .json(&json!({ "email": "a@b.com", "password": "longenough1" }))
            .await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.user.email, "a@b.com");
        let session = body.session.expect("native sign-up returns a session");

        let response = server
            .post("/auth/subscription-status")
            .json(&json!({ "access_token": session.access_token, "refresh_token": session.refresh_token }))
            .await;
        response.assert_status_ok();
        let status: SubscriptionStatusResponse = response.json();
        assert_eq!(status.subscription_status, "incomplete");
        assert!(!status.has_active_subscription);
    }

    #[sqlx::test]
    async fn test_register_validation(pool: PgPool) {
        let server = create_test_app(pool, create_test_config()).await;

        let cases = [
            (json!({ "email": "a@b.com" }), "Email e senha são obrigatórios."),
            (json!({ "email": "  ", "password": "longenough1" }), "Email e senha são obrigatórios."),
            (json!({ "email": "not-an-email", "password": "longenough1" }), "Email inválido."),
            (json!({ "email": "a@b.com", "password": "short" }), "A senha deve ter pelo menos 8 caracteres."),
            (json!({ "email": "a@b.com", "password": "x".repeat(129) }), "Senha muito longa."),
        ];
        for (body, message) in cases {
            let response = server.post("/auth/register").json(&body).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<Value>()["error"], message, "body {body}");
        }
    }

    #[sqlx::test]
    async fn test_register_duplicate_email_is_rejected(pool: PgPool) {
        let server = create_test_app(pool, create_test_config()).await;
        let body = json!({ "email": "dup@example.com", "password": "longenough1" });

        server.post("/auth/register").json(&body).await.assert_status_ok();
        let response = server
            .post("/auth/register")
            .add_header("x-forwarded-for", "10.0.0.2")
            .json(&json!({ "email": "DUP@example.com", "password": "longenough1" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["error"],
            "Não foi possível criar a conta. Verifique os dados e tente novamente."
        );
    }

    #[sqlx::test]
    async fn test_login(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        create_test_user(&pool, "seller@example.com", SubscriptionStatus::Active).await;

        let response = server
            .post("/auth/login")
            .json(&json!({ "email": " Seller@Example.com ", "password": crate::test_utils::TEST_PASSWORD }))
            .await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.user.email, "seller@example.com");
        assert!(body.session.is_some());

        let response = server
            .post("/auth/login")
            .json(&json!({ "email": "seller@example.com", "password": "wrong-password" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "Email ou senha incorretos.");

        let response = server
            .post("/auth/login")
            .json(&json!({ "email": "seller@example.com", "password": "x".repeat(129) }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Dados inválidos.");
    }

    #[sqlx::test]
    async fn test_login_rate_limit_is_per_email_and_ip(pool: PgPool) {
        let server = create_test_app(pool, create_test_config()).await;
        let attempt = json!({ "email": "victim@example.com", "password": "guess-guess" });

        for _ in 0..5 {
            server
                .post("/auth/login")
                .add_header("x-forwarded-for", "203.0.113.9")
                .json(&attempt)
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }

        let response = server
            .post("/auth/login")
            .add_header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .json(&attempt)
            .await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response.header("retry-after").to_str().unwrap().parse().unwrap();
        assert!(retry_after > 0 && retry_after <= 900);

        // Another IP has its own budget
        server
            .post("/auth/login")
            .add_header("x-forwarded-for", "198.51.100.1")
            .json(&attempt)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_forgot_password_is_enumeration_safe(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;

        let response = server
            .post("/auth/forgot-password")
            .json(&json!({ "email": "nobody@example.com" }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({ "ok": true }));

        let response = server.post("/auth/forgot-password").json(&json!({ "email": "bad" })).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "E-mail inválido.");
    }

    #[sqlx::test]
    async fn test_forgot_password_rate_limit_is_silent(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let user = create_test_user(&pool, "forgetful@example.com", SubscriptionStatus::Incomplete).await;

        for _ in 0..5 {
            server
                .post("/auth/forgot-password")
                .json(&json!({ "email": "forgetful@example.com" }))
                .await
                .assert_status_ok();
        }

        // Only the first three requests got through to token creation
        let tokens: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_tokens WHERE user_id = $1")
            .bind(user.profile.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(tokens, 3);
    }

    async fn request_reset_token(server: &axum_test::TestServer, pool: &PgPool, email: &str) -> String {
        server
            .post("/auth/forgot-password")
            .json(&json!({ "email": email }))
            .await
            .assert_status_ok();

        sqlx::query_scalar(
            r#"
            SELECT t.token FROM password_reset_tokens t JOIN profiles p ON p.id = t.user_id
            WHERE p.email = $1 AND NOT t.used
            "#,
        )
        .bind(email)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn test_password_reset_flow(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        create_test_user(&pool, "reset@example.com", SubscriptionStatus::Active).await;

        let first = request_reset_token(&server, &pool, "reset@example.com").await;
        let second = request_reset_token(&server, &pool, "reset@example.com").await;
        assert_ne!(first, second);

        // Requesting again invalidated the first token
        let response = server
            .post("/auth/reset-password")
            .json(&json!({ "token": first, "password": "brand-new-password" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Este link já foi utilizado. Solicite um novo.");

        let response = server
            .post("/auth/reset-password")
            .json(&json!({ "token": format!("  {second} "), "password": "brand-new-password" }))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>(),
            json!({ "ok": true, "message": "Senha redefinida com sucesso." })
        );

        server
            .post("/auth/login")
            .json(&json!({ "email": "reset@example.com", "password": "brand-new-password" }))
            .await
            .assert_status_ok();

        let response = server
            .post("/auth/reset-password")
            .json(&json!({ "token": second, "password": "another-password" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Este link já foi utilizado. Solicite um novo.");
    }

    #[sqlx::test]
    async fn test_reset_password_rejections(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let user = create_test_user(&pool, "expired@example.com", SubscriptionStatus::Active).await;

        let expired = {
            let mut conn = pool.acquire().await.unwrap();
            let token = PasswordResetTokens::new(&mut conn)
                .create_for_user(user.profile.id, Duration::from_secs(3600))
                .await
                .unwrap();
            sqlx::query("UPDATE password_reset_tokens SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
                .bind(token.id)
                .execute(&pool)
                .await
                .unwrap();
            token.token
        };

        let cases = [
            (json!({ "password": "longenough1" }), "Token e nova senha são obrigatórios."),
            (json!({ "token": "ABC", "password": "longenough1" }), "Token inválido."),
            (json!({ "token": "a".repeat(64), "password": "short" }), "A senha deve ter pelo menos 8 caracteres."),
            (json!({ "token": "a".repeat(64), "password": "longenough1" }), "Token inválido ou expirado."),
            (json!({ "token": expired, "password": "longenough1" }), "Este link expirou. Solicite um novo."),
        ];
        for (body, message) in cases {
            let response = server.post("/auth/reset-password").json(&body).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<Value>()["error"], message, "body {body}");
        }
    }

    #[sqlx::test]
    async fn test_concurrent_resets_consume_token_once(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        create_test_user(&pool, "race@example.com", SubscriptionStatus::Active).await;
        let token = request_reset_token(&server, &pool, "race@example.com").await;

        let (first, second) = tokio::join!(
            server
                .post("/auth/reset-password")
                .add_header("x-forwarded-for", "192.0.2.1")
                .json(&json!({ "token": token, "password": "first-new-password" }))
                .into_future(),
            server
                .post("/auth/reset-password")
                .add_header("x-forwarded-for", "192.0.2.2")
                .json(&json!({ "token": token, "password": "second-new-password" }))
                .into_future(),
        );

        let mut statuses = [first.status_code(), second.status_code()];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);

        let rejected = if first.status_code() == StatusCode::BAD_REQUEST { first } else { second };
        assert_eq!(rejected.json::<Value>()["error"], "Este link já foi utilizado. Solicite um novo.");

        let used: bool = sqlx::query_scalar("SELECT used FROM password_reset_tokens WHERE token = $1")
            .bind(&token)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(used);
    }

    #[sqlx::test]
    async fn test_failed_password_update_leaves_token_unused(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;

        // A profile with no native credentials, so the password update fails
        let user_id = uuid::Uuid::new_v4();
        let mut conn = pool.acquire().await.unwrap();
        Profiles::new(&mut conn)
            .create(&ProfileCreateDBRequest {
                id: user_id,
                email: "orphan@example.com".to_string(),
            })
            .await
            .unwrap();
        let token = PasswordResetTokens::new(&mut conn)
            .create_for_user(user_id, Duration::from_secs(3600))
            .await
            .unwrap();

        let response = server
            .post("/auth/reset-password")
            .json(&json!({ "token": token.token, "password": "brand-new-password" }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<Value>()["error"], "Falha ao atualizar a senha.");

        let stored = PasswordResetTokens::new(&mut conn).get_by_id(token.id).await.unwrap().unwrap();
        assert!(!stored.used);
    }

    #[sqlx::test]
    async fn test_reset_password_rate_limit(pool: PgPool) {
        let server = create_test_app(pool, create_test_config()).await;
        let attempt = json!({ "token": "b".repeat(64), "password": "longenough1" });

        for _ in 0..5 {
            server
                .post("/auth/reset-password")
                .add_header("x-forwarded-for", "203.0.113.20")
                .json(&attempt)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }

        let response = server
            .post("/auth/reset-password")
            .add_header("x-forwarded-for", "203.0.113.20")
            .json(&attempt)
            .await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response.header("retry-after").to_str().unwrap().parse().unwrap();
        assert!(retry_after > 0 && retry_after <= 900);
    }

    #[sqlx::test]
    async fn test_register_rate_limit(pool: PgPool) {
        let mut config = create_test_config();
        config.rate_limits.register = crate::limits::RateLimitRule::new(Duration::from_secs(900), 1);
        let server = create_test_app(pool, config).await;

        server
            .post("/auth/register")
            .add_header("x-forwarded-for", "203.0.113.30")
            .json(&json!({ "email": "first@example.com", "password": "longenough1" }))
            .await
            .assert_status_ok();

        let response = server
            .post("/auth/register")
            .add_header("x-forwarded-for", "203.0.113.30")
            .json(&json!({ "email": "second@example.com", "password": "longenough1" }))
            .await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert!(!response.header("retry-after").is_empty());
    }

    #[sqlx::test]
    async fn test_forgot_password_email_failure_keeps_token(pool: PgPool) {
        let mail_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&mail_server)
            .await;

        let mut config = create_test_config();
        config.email.transport = EmailTransportConfig::Sendgrid {
            api_key: "SG.test".to_string(),
            api_base_url: url::Url::parse(&mail_server.uri()).unwrap(),
        };
        let server = create_test_app(pool.clone(), config).await;
        let user = create_test_user(&pool, "unlucky@example.com", SubscriptionStatus::Active).await;

        let response = server
            .post("/auth/forgot-password")
            .json(&json!({ "email": "unlucky@example.com" }))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<Value>()["error"], "Falha ao enviar e-mail. Tente novamente.");

        let unused: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_tokens WHERE user_id = $1 AND NOT used")
            .bind(user.profile.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(unused, 1);
    }

    #[sqlx::test]
    async fn test_forgot_password_database_outage_is_silent(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        pool.close().await;

        let response = server
            .post("/auth/forgot-password")
            .json(&json!({ "email": "someone@example.com" }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({ "ok": true }));
    }

    #[sqlx::test]
    async fn test_subscription_status(pool: PgPool) {
        let server = create_test_app(pool.clone(), create_test_config()).await;
        let user = create_test_user(&pool, "trial@example.com", SubscriptionStatus::Trialing).await;

        let response = server
            .post("/auth/subscription-status")
            .json(&json!({ "access_token": user.session.access_token, "refresh_token": user.session.refresh_token }))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>(),
            json!({ "subscription_status": "trialing", "has_active_subscription": true })
        );

        let response = server
            .post("/auth/subscription-status")
            .json(&json!({ "access_token": user.session.access_token }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Missing tokens");

        let response = server
            .post("/auth/subscription-status")
            .json(&json!({ "access_token": "garbage", "refresh_token": "garbage" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(response.json::<Value>()["error"], "Invalid session");
    }
}
