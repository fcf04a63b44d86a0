/// Time-based one-time passwords
///
/// Codes are 6-digit SHA-1 TOTPs on a 120 second step with one step of skew,
/// so an emailed code stays usable for two to four minutes. The same secret
/// works in any authenticator app via the `otpauth://` URL.

use serde::{Deserialize, Serialize};
use totp_rs::{Algorithm, Secret, TOTP};

const TOTP_DIGITS: usize = 6;
pub const TOTP_STEP: u64 = 120;
const TOTP_SKEW: u8 = 1;
const TOTP_ISSUER: &str = "EstateHub";

#[derive(Debug, thiserror::Error)]
pub enum TotpError {
    #[error("Invalid TOTP secret: {0}")]
    InvalidSecret(String),

    #[error("Failed to build TOTP: {0}")]
    Build(String),

    #[error("System clock error: {0}")]
    Clock(String),
}

/// A base32-encoded TOTP secret, as stored in `users.totp_secret`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TotpSecret(String);

impl TotpSecret {
    /// Generates a new random 160-bit secret
    pub fn generate() -> Self {
        Self(Secret::generate_secret().to_encoded().to_string())
    }

    /// Wraps a stored secret, checking that it decodes
    pub fn from_base32(secret: impl Into<String>) -> Result<Self, TotpError> {
        let secret = secret.into();
        Secret::Encoded(secret.clone())
            .to_bytes()
            .map_err(|e| TotpError::InvalidSecret(format!("{:?}", e)))?;
        Ok(Self(secret))
    }

    pub fn as_base32(&self) -> &str {
        &self.0
    }

    fn to_totp(&self, account_name: &str) -> Result<TOTP, TotpError> {
        let bytes = Secret::Encoded(self.0.clone())
            .to_bytes()
            .map_err(|e| TotpError::InvalidSecret(format!("{:?}", e)))?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            bytes,
            Some(TOTP_ISSUER.to_string()),
            account_name.to_string(),
        )
        .map_err(|e| TotpError::Build(e.to_string()))
    }

    /// Checks a code against the current window (and one step either side)
    pub fn verify(&self, code: &str, account_name: &str) -> Result<bool, TotpError> {
        let code = code.trim();
        if code.len() != TOTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        self.to_totp(account_name)?
            .check_current(code)
            .map_err(|e| TotpError::Clock(e.to_string()))
    }

    /// The code valid right now; this is what the worker emails
    pub fn current_code(&self, account_name: &str) -> Result<String, TotpError> {
        self.to_totp(account_name)?
            .generate_current()
            .map_err(|e| TotpError::Clock(e.to_string()))
    }

    /// `otpauth://` URL for authenticator apps
    pub fn otpauth_url(&self, account_name: &str) -> Result<String, TotpError> {
        Ok(self.to_totp(account_name)?.get_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "testq@gmail.com";

    #[test]
    fn test_generate_is_valid_base32() {
        let secret = TotpSecret::generate();
        assert!(TotpSecret::from_base32(secret.as_base32()).is_ok());
        assert_ne!(secret, TotpSecret::generate());
    }

    #[test]
    fn test_current_code_verifies() {
        let secret = TotpSecret::generate();
        let code = secret.current_code(ACCOUNT).unwrap();

        assert_eq!(code.len(), 6);
        assert!(secret.verify(&code, ACCOUNT).unwrap());
    }

    #[test]
    fn test_malformed_code_is_rejected_without_error() {
        let secret = TotpSecret::generate();
        assert!(!secret.verify("abc", ACCOUNT).unwrap());
        assert!(!secret.verify("1234567", ACCOUNT).unwrap());
        assert!(!secret.verify("", ACCOUNT).unwrap());
    }

    #[test]
    fn test_from_base32_rejects_garbage() {
        assert!(TotpSecret::from_base32("not base32 !!").is_err());
    }

    #[test]
    fn test_otpauth_url() {
        let secret = TotpSecret::generate();
        let url = secret.otpauth_url(ACCOUNT).unwrap();
        assert!(url.starts_with("otpauth://totp/"));
        assert!(url.contains("issuer=EstateHub"));
        assert!(url.contains("period=120"));
    }
}
