use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{
    HttpResponse, ResponseError,
    web::{self, Query},
};
use anyhow::Context;

use crate::domain::{RegistrantEmail, TokenError, VerificationToken};
use crate::notifications::Notifier;
use crate::store::RegistrationStore;

use super::error_chain_fmt;

#[derive(serde::Deserialize)]
pub struct VerifyParams {
    token: Option<String>,
}

#[derive(thiserror::Error)]
pub enum VerifyError {
    #[error("No verification token provided")]
    MissingToken,
    #[error("The verification token is not valid")]
    MalformedToken(#[source] TokenError),
    #[error("That token value isn't known to us. Broken email link?")]
    UnknownToken,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for VerifyError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::MalformedToken(_) | Self::UnknownToken => {
                StatusCode::BAD_REQUEST
            }
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[tracing::instrument(name = "Verify a registration", skip(params, store, notifier))]
pub async fn verify(
    params: Query<VerifyParams>,
    store: web::Data<RegistrationStore>,
    notifier: web::Data<Notifier>,
) -> Result<HttpResponse, VerifyError> {
    let encoded = params
        .into_inner()
        .token
        .filter(|t| !t.is_empty())
        .ok_or(VerifyError::MissingToken)?;
    let token = VerificationToken::decode(&encoded).map_err(VerifyError::MalformedToken)?;

    let already_verified = store
        .token_state(&token)
        .await
        .context("Failed to look up the verification token")?
        .ok_or(VerifyError::UnknownToken)?;

    store
        .mark_verified(&token)
        .await
        .context("Failed to update the verification status")?;

    // The user gets their page regardless of what happens to the follow-up
    // emails; a second click on the same link stays a quiet no-op.
    if !already_verified {
        tokio::spawn(notify_verified(
            store.into_inner(),
            notifier.into_inner(),
            token,
        ));
    }

    Ok(HttpResponse::Ok()
        .content_type(actix_web::http::header::ContentType::html())
        .body(include_str!("verify.html")))
}

#[tracing::instrument(
    name = "Send post-verification notifications",
    skip_all,
    fields(registrant_email = tracing::field::Empty)
)]
async fn notify_verified(
    store: Arc<RegistrationStore>,
    notifier: Arc<Notifier>,
    token: VerificationToken,
) {
    let email = match store.email_for_token(&token).await {
        Ok(email) => email,
        Err(e) => {
            let msg = format!("Retrieving the email address for a verified token failed: {e}");
            tracing::error!(error.cause_chain = ?e, "{msg}");
            notifier
                .alert_operator("Error while verifying an interest registration", &msg)
                .await;
            return;
        }
    };
    tracing::Span::current().record("registrant_email", tracing::field::display(&email));

    let email = match RegistrantEmail::parse(email) {
        Ok(email) => email,
        Err(e) => {
            let msg = format!("A token was verified but its stored email address is invalid: {e}");
            tracing::error!("{msg}");
            notifier
                .alert_operator("Error while verifying an interest registration", &msg)
                .await;
            return;
        }
    };

    if let Err(e) = notifier.send_confirmation_email(&email).await {
        tracing::error!(
            error.cause_chain = ?e,
            error.message = %e,
            "Failed to send the registration confirmation email"
        );
        return;
    }
    tracing::info!(
        "Registration confirmation email sent to '{}'",
        email.as_ref()
    );

    notifier
        .alert_operator(
            "New verified interest",
            &format!(
                "Someone has registered their interest: {}",
                email.as_ref()
            ),
        )
        .await;
}
