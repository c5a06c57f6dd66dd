mod registrant_email;
mod verification_token;

pub use registrant_email::RegistrantEmail;
pub use verification_token::{TokenError, VerificationToken};
