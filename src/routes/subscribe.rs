use actix_web::http::StatusCode;
use actix_web::{
    HttpResponse, ResponseError,
    web::{self, Form},
};
use anyhow::Context;

use crate::challenge::{ChallengeError, ChallengeVerifier};
use crate::domain::{RegistrantEmail, VerificationToken};
use crate::notifications::Notifier;
use crate::startup::ApplicationBaseUrl;
use crate::store::RegistrationStore;

use super::error_chain_fmt;

#[derive(serde::Deserialize)]
pub struct SubscribeForm {
    email: String,
    #[serde(rename = "cf-turnstile-response")]
    turnstile_response: Option<String>,
}

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("Missing challenge response token")]
    MissingChallengeToken,
    #[error("The anti-automation challenge was not passed. Please go back and try again.")]
    ChallengeFailed(#[source] ChallengeError),
    #[error("Bad email address provided: {0}")]
    InvalidEmail(String),
    #[error("That email address has already been submitted and verified")]
    AlreadyVerified,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SubscribeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingChallengeToken | Self::ChallengeFailed(_) => StatusCode::FORBIDDEN,
            Self::InvalidEmail(_) | Self::AlreadyVerified => StatusCode::BAD_REQUEST,
            Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[tracing::instrument(
    name = "Register a new interest",
    skip(form, store, notifier, challenge, base_url),
    fields(registrant_email = %form.email)
)]
pub async fn subscribe(
    Form(form): Form<SubscribeForm>,
    store: web::Data<RegistrationStore>,
    notifier: web::Data<Notifier>,
    challenge: web::Data<Option<ChallengeVerifier>>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, SubscribeError> {
    let passed_challenge = match challenge.as_ref() {
        Some(verifier) => {
            let response_token = form
                .turnstile_response
                .as_deref()
                .filter(|t| !t.is_empty())
                .ok_or(SubscribeError::MissingChallengeToken)?;
            match verifier.verify(response_token).await {
                Ok(()) => true,
                Err(e @ ChallengeError::Rejected(_)) => {
                    return Err(SubscribeError::ChallengeFailed(e));
                }
                Err(e @ ChallengeError::Provider(_)) => {
                    return Err(anyhow::Error::from(e)
                        .context("Failed to validate the challenge response")
                        .into());
                }
            }
        }
        None => false,
    };

    let email = RegistrantEmail::parse(form.email).map_err(SubscribeError::InvalidEmail)?;

    if store
        .is_verified(email.as_ref())
        .await
        .context("Failed to look for an existing verified registration")?
    {
        tracing::info!(
            "'{}' was submitted again, but it's already verified",
            email.as_ref()
        );
        return Err(SubscribeError::AlreadyVerified);
    }

    let token = VerificationToken::generate();
    store
        .upsert_pending(email.as_ref(), &token, passed_challenge)
        .await
        .context("Failed to store the pending registration")?;

    let verify_url = format!("{}/verify?token={}", base_url.0, token.encode());
    notifier
        .send_verification_email(&email, &verify_url)
        .await
        .context("Failed to send the verification email")?;
    tracing::info!("Verification email sent to '{}'", email.as_ref());

    Ok(HttpResponse::Ok()
        .content_type(actix_web::http::header::ContentType::html())
        .body(include_str!("subscribe.html")))
}
