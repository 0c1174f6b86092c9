//! Email service for password reset messages.
//!
//! Three transports are supported: SMTP and a directory of `.eml` files (both via lettre), and
//! the SendGrid v3 HTTP API.

use std::{path::Path, time::Duration};

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
    types::mask_email,
};

const SEND_FAILURE_MESSAGE: &str = "Falha ao enviar e-mail. Tente novamente.";

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    link_lifetime: Duration,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
    Sendgrid { client: Client, api_key: String, api_base_url: Url },
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
            EmailTransportConfig::Sendgrid { api_key, api_base_url } => EmailTransport::Sendgrid {
                client: Client::new(),
                api_key: api_key.clone(),
                api_base_url: api_base_url.clone(),
            },
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            link_lifetime: config.auth.password_reset.token_duration,
        })
    }

    /// Send the reset link to `to_email`. The link itself is never logged.
    #[instrument(skip_all, fields(to = %mask_email(to_email)), err)]
    pub async fn send_password_reset_email(&self, to_email: &str, reset_url: &str) -> Result<(), Error> {
        let subject = format!("Redefinir sua senha - {}", self.from_name);
        let body = self.create_password_reset_body(reset_url);

        self.send_email(to_email, &subject, &body).await
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                let message = self.build_message(to_email, subject, body)?;
                smtp.send(message).await.map_err(|e| send_failure(format!("send SMTP email: {e}")))?;
            }
            EmailTransport::File(file) => {
                let message = self.build_message(to_email, subject, body)?;
                file.send(message).await.map_err(|e| send_failure(format!("send file email: {e}")))?;
            }
            EmailTransport::Sendgrid {
                client,
                api_key,
                api_base_url,
            } => {
                let url = api_base_url
                    .join("v3/mail/send")
                    .map_err(|e| send_failure(format!("build SendGrid URL: {e}")))?;

                let response = client
                    .post(url)
                    .bearer_auth(api_key)
                    .json(&json!({
                        "personalizations": [{ "to": [{ "email": to_email }] }],
                        "from": { "email": self.from_email, "name": self.from_name },
                        "subject": subject,
                        "content": [{ "type": "text/html", "value": body }],
                    }))
                    .send()
                    .await
                    .map_err(|e| send_failure(format!("send SendGrid email: {e}")))?;

                let status = response.status();
                if !status.is_success() {
                    let detail = response.text().await.unwrap_or_default();
                    return Err(send_failure(format!("send SendGrid email: status {status}: {detail}")));
                }
            }
        }

        debug!("Email sent");
        Ok(())
    }

    fn build_message(&self, to_email: &str, subject: &str, body: &str) -> Result<Message, Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email
            .parse::<Mailbox>()
            .map_err(|e| send_failure(format!("parse to email: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })
    }

    fn create_password_reset_body(&self, reset_link: &str) -> String {
        let product = &self.from_name;
        let lifetime = describe_lifetime(self.link_lifetime);

        format!(
            r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="utf-8">
    <title>Redefinir senha - {product}</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; background: #f5f5f5; }}
        .container {{ max-width: 480px; margin: 40px auto; padding: 40px; background: #fff; border-radius: 16px; }}
        .button {{ display: inline-block; padding: 14px 32px; background: #000; color: #fff; border-radius: 9999px; text-decoration: none; font-weight: 700; }}
        .link {{ font-size: 12px; word-break: break-all; background: #f5f5f5; padding: 12px 16px; border-radius: 8px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #999; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Redefinir senha</h2>

        <p>Recebemos uma solicitação para redefinir a senha da sua conta. Clique no botão abaixo para criar uma nova senha.</p>

        <p><a class="button" href="{reset_link}">Redefinir minha senha</a></p>

        <p>Se o botão não funcionar, copie e cole o link abaixo no seu navegador:</p>
        <p class="link">{reset_link}</p>

        <div class="footer">
            <p>Este link expira em {lifetime}. Se você não solicitou a redefinição, ignore este e-mail.</p>
            <p>{product}</p>
        </div>
    </div>
</body>
</html>"#
        )
    }
}

fn send_failure(operation: String) -> Error {
    Error::Upstream {
        operation,
        message: SEND_FAILURE_MESSAGE.to_string(),
    }
}

/// Portuguese rendering of the reset link lifetime, e.g. "1 hora" or "30 minutos"
fn describe_lifetime(lifetime: Duration) -> String {
    let minutes = (lifetime.as_secs() / 60).max(1);
    match (minutes / 60, minutes % 60) {
        (1, 0) => "1 hora".to_string(),
        (hours, 0) => format!("{hours} horas"),
        _ if minutes == 1 => "1 minuto".to_string(),
        _ => format!("{minutes} minutos"),
    }
}
