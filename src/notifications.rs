use std::sync::Arc;

use anyhow::Context;

use crate::domain::RegistrantEmail;
use crate::email_client::EmailClient;

/// Capability to deliver one transactional email.
///
/// Handlers only ever talk to [`Notifier`]; swapping the provider means
/// implementing this trait, nothing else.
#[async_trait::async_trait]
pub trait EmailDelivery: Send + Sync {
    async fn deliver(
        &self,
        recipient: &RegistrantEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), anyhow::Error>;
}

#[async_trait::async_trait]
impl EmailDelivery for EmailClient {
    async fn deliver(
        &self,
        recipient: &RegistrantEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), anyhow::Error> {
        self.send_email(recipient, subject, html_content, text_content)
            .await
            .map_err(Into::into)
    }
}

/// The three message kinds this service sends.
pub struct Notifier {
    delivery: Arc<dyn EmailDelivery>,
    alert_recipient: RegistrantEmail,
}

impl Notifier {
    pub fn new(delivery: Arc<dyn EmailDelivery>, alert_recipient: RegistrantEmail) -> Self {
        Self {
            delivery,
            alert_recipient,
        }
    }

    #[tracing::instrument(name = "Send verification email", skip(self, verify_url))]
    pub async fn send_verification_email(
        &self,
        recipient: &RegistrantEmail,
        verify_url: &str,
    ) -> Result<(), anyhow::Error> {
        let html_body = format!(
            r#"Please visit this url to verify your email address: <a href="{verify_url}">{verify_url}</a>"#
        );
        let text_body =
            format!("Please visit this url to confirm your email address: {verify_url}");
        self.delivery
            .deliver(
                recipient,
                "Please verify your email address",
                &html_body,
                &text_body,
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to send verification email to '{}'",
                    recipient.as_ref()
                )
            })
    }

    #[tracing::instrument(name = "Send confirmation email", skip(self))]
    pub async fn send_confirmation_email(
        &self,
        recipient: &RegistrantEmail,
    ) -> Result<(), anyhow::Error> {
        let body = "Thank you for confirming your interest. \
             We'll contact you regarding it in the next few days.";
        self.delivery
            .deliver(
                recipient,
                "Thank you for confirming your interest",
                body,
                body,
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to send confirmation email to '{}'",
                    recipient.as_ref()
                )
            })
    }

    /// Best-effort: a lost alert must never cascade into a user-visible
    /// failure, so errors are logged and swallowed here.
    #[tracing::instrument(name = "Send operator alert", skip(self, content))]
    pub async fn alert_operator(&self, subject: &str, content: &str) {
        match self
            .delivery
            .deliver(&self.alert_recipient, subject, content, content)
            .await
        {
            Ok(()) => {
                tracing::info!("Alert email sent to '{}'", self.alert_recipient.as_ref());
            }
            Err(e) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Failed to send alert email to the operator"
                );
            }
        }
    }
}
