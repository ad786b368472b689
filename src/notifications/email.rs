use sendgrid::v3::{Content, Email, Message, Personalization, Sender};

use super::templates::NotificationTemplates;

pub struct Mailer {
    sender: Sender,
    from: String,
}

impl Mailer {
    /// None when no provider is configured; callers fall back to logging.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("SENDGRID_API_KEY").ok().filter(|k| !k.is_empty())?;
        let from = std::env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "no-reply@formcheck.app".to_string());
        Some(Self {
            sender: Sender::new(api_key),
            from,
        })
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: String,
    ) -> Result<(), sendgrid::SendgridError> {
        let message = Message::new(Email::new(self.from.clone()))
            .set_subject(subject)
            .add_content(
                Content::new()
                    .set_content_type("text/html")
                    .set_value(html_body),
            )
            .add_personalization(Personalization::new(Email::new(to.to_string())));

        self.sender.send(&message).await?;
        Ok(())
    }
}

pub fn reset_link(token: &str) -> String {
    let app_url =
        std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    format!(
        "{}/update-password?token={}",
        app_url.trim_end_matches('/'),
        token
    )
}

/// Fire-and-forget: password-reset delivery never blocks or fails the HTTP
/// response. Without a configured provider the link is logged instead.
pub fn spawn_password_reset_email(to: String, user_name: String, token: &str) {
    let link = reset_link(token);

    let Some(mailer) = Mailer::from_env() else {
        tracing::info!(email = %to, link = %link, "email provider not configured, logging reset link");
        return;
    };

    tokio::spawn(async move {
        let body = NotificationTemplates::password_reset_email(&user_name, &link);
        match mailer.send(&to, "Reset your FormCheck password", body).await {
            Ok(()) => {
                tracing::info!(email = %to, "password reset email sent");
                metrics::counter!("formcheck_notifications_sent_total", "channel" => "email")
                    .increment(1);
            }
            Err(e) => {
                tracing::error!(email = %to, error = %e, "failed to send password reset email");
                metrics::counter!("formcheck_notifications_failed_total", "channel" => "email")
                    .increment(1);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_strips_trailing_slash_from_app_url() {
        // Relies on APP_URL being unset in the test environment.
        let link = reset_link("abc123");
        assert!(link.ends_with("/update-password?token=abc123"));
        assert!(!link.contains("//update-password"));
    }
}
