use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};

/// Server-side validator for Cloudflare Turnstile response tokens.
///
/// Only constructed when the challenge is enabled in configuration; handlers
/// treat its absence as "skip the check".
pub struct ChallengeVerifier {
    http_client: Client,
    verify_url: String,
    secret_key: Secret<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ChallengeError {
    #[error("the challenge provider rejected the response token: {0:?}")]
    Rejected(Vec<String>),
    #[error("failed to validate the response token with the challenge provider")]
    Provider(#[from] reqwest::Error),
}

#[derive(serde::Serialize)]
struct SiteverifyRequest<'a> {
    response: &'a str,
    secret: &'a str,
}

// Response shape per
// https://developers.cloudflare.com/turnstile/get-started/server-side-validation/
#[derive(serde::Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(rename = "challenge_ts")]
    challenge_timestamp: Option<DateTime<Utc>>,
    hostname: Option<String>,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

impl ChallengeVerifier {
    pub fn new(verify_url: String, secret_key: Secret<String>) -> Self {
        Self {
            http_client: Client::new(),
            verify_url,
            secret_key,
        }
    }

    #[tracing::instrument(name = "Validate challenge response token", skip(self, response_token))]
    pub async fn verify(&self, response_token: &str) -> Result<(), ChallengeError> {
        let response = self
            .http_client
            .post(&self.verify_url)
            .json(&SiteverifyRequest {
                response: response_token,
                secret: self.secret_key.expose_secret(),
            })
            .send()
            .await?
            .error_for_status()?
            .json::<SiteverifyResponse>()
            .await?;

        tracing::debug!(
            success = response.success,
            challenge_timestamp = ?response.challenge_timestamp,
            hostname = ?response.hostname,
            error_codes = ?response.error_codes,
            "Challenge provider responded"
        );

        if !response.success {
            return Err(ChallengeError::Rejected(response.error_codes));
        }
        Ok(())
    }
}
