/// Password hashing and validation using Argon2id
///
/// Hashes are PHC strings (`$argon2id$v=19$m=...`) so parameters travel with
/// the hash and older hashes keep verifying after a parameter change.
///
/// Social-only accounts have no password at all; the login path treats a
/// missing hash exactly like a wrong password.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Passwords rejected regardless of length
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "qwertyuiop",
    "iloveyou",
    "sunshine",
    "football",
    "letmein1",
    "welcome1",
    "admin123",
];

/// Error type for password operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    // 64 MB, 3 iterations, 4 lanes, 32-byte output
    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored PHC hash in constant time
///
/// Returns `Ok(false)` for a wrong password and `Err` only for a corrupt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    if parsed_hash.salt.is_none() || parsed_hash.hash.is_none() {
        return Err(PasswordError::InvalidHash("Hash has no salt or output".to_string()));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Spends one hash's worth of work without storing anything
///
/// Called when the email is unknown so a failed login takes about as long
/// whether or not the account exists.
pub fn hash_dummy(password: &str) {
    if let Err(e) = hash_password(password) {
        tracing::debug!(error = %e, "Dummy hash failed");
    }
}

/// Checks a new password against the registration rules
///
/// Rules: at least [`MIN_PASSWORD_LENGTH`] characters, not entirely numeric,
/// not a well-known password, and not the local part of the account's email.
pub fn validate_password_strength(password: &str, email: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("Password can't be entirely numeric".to_string());
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err("Password is too common".to_string());
    }

    let local_part = email.split('@').next().unwrap_or_default().to_lowercase();
    if !local_part.is_empty() && lowered.contains(&local_part) && local_part.len() * 2 >= lowered.len() {
        return Err("Password is too similar to the email address".to_string());
    }

    Ok(())
}
