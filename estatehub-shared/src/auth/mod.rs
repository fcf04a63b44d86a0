/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: access/refresh token pairs
/// - [`totp`]: time-based one-time passwords for the second factor
/// - [`email_token`]: signed, expiring email verification links
/// - [`middleware`]: the `AuthContext` request extension
/// - [`authorization`]: agency ownership checks for listing mutations
///
/// # Example
///
/// ```no_run
/// use estatehub_shared::auth::password::{hash_password, verify_password};
/// use estatehub_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("MoiDrodzyRekturerzy123")?;
/// assert!(verify_password("MoiDrodzyRekturerzy123", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), TokenType::Access);
/// let token = create_token(&claims, "your-secret-key-at-least-32-bytes")?;
/// let validated = validate_token(&token, "your-secret-key-at-least-32-bytes")?;
/// assert_eq!(validated.sub, claims.sub);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod email_token;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod totp;
