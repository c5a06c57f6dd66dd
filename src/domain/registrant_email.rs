use validator::ValidateEmail;

#[derive(Debug, Clone)]
pub struct RegistrantEmail(String);

impl AsRef<str> for RegistrantEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl RegistrantEmail {
    /// Syntax check only. The address is kept exactly as submitted, no
    /// case-folding or other normalization.
    pub fn parse(email: impl ToString) -> Result<Self, String> {
        let email = email.to_string();
        if !ValidateEmail::validate_email(&email) {
            return Err("Invalid email".to_string());
        }
        Ok(Self(email))
    }
}
