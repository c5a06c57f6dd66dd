use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use uuid::Uuid;

/// A registration verification token.
///
/// Generated as a UUIDv7 so tokens sort by creation time while still carrying
/// enough cryptographically random bits to be unguessable. The canonical
/// string form is what gets stored; the base64 form is what travels inside
/// the verification link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken(String);

impl AsRef<str> for VerificationToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl VerificationToken {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL-safe text form for the `token` query parameter.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0.as_bytes())
    }

    /// Reverses [`encode`](Self::encode) and validates the token shape.
    ///
    /// A value that decodes but does not look like a token at all is rejected
    /// here, before any database lookup.
    pub fn decode(encoded: &str) -> Result<Self, TokenError> {
        let raw = URL_SAFE_NO_PAD.decode(encoded)?;
        let raw = String::from_utf8(raw)?;
        Uuid::try_parse(&raw)?;
        Ok(Self(raw))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("the token is not valid URL-safe base64")]
    Encoding(#[from] base64::DecodeError),
    #[error("the decoded token is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("the decoded token has the wrong shape")]
    Shape(#[from] uuid::Error),
}
