/// Email verification links
///
/// A link is `/email/verify/{uid}/{token}`: `uid` is the user ID in URL-safe
/// base64 and `token` is `{issued_at_base36}-{hmac_hex}`. The HMAC covers the
/// user ID, the verified flag and the password hash, so a token stops working
/// as soon as it has been used or the password changes. Nothing is stored
/// server-side.
///
/// # Example
///
/// ```
/// use estatehub_shared::auth::email_token::{EmailTokenSigner, TokenSubject};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// let signer = EmailTokenSigner::new("server-secret", Duration::days(3));
/// let subject = TokenSubject { user_id: Uuid::new_v4(), email_verified: false, password_hash: None };
///
/// let token = signer.make_token(&subject);
/// assert!(signer.check_token(&subject, &token));
///
/// let verified = TokenSubject { email_verified: true, ..subject };
/// assert!(!signer.check_token(&verified, &token));
/// ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// State of a user that a token is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub email_verified: bool,
    pub password_hash: Option<&'a str>,
}

/// Makes and checks verification tokens with a server secret
#[derive(Clone)]
pub struct EmailTokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for EmailTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailTokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl EmailTokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    fn mac(&self, subject: &TokenSubject<'_>, issued_at: i64) -> HmacSha256 {
        // new_from_slice only fails for fixed-size keys; HMAC takes any length
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(subject.user_id.as_bytes());
        mac.update(&[subject.email_verified as u8]);
        mac.update(subject.password_hash.unwrap_or_default().as_bytes());
        mac.update(&issued_at.to_be_bytes());
        mac
    }

    pub fn make_token(&self, subject: &TokenSubject<'_>) -> String {
        self.make_token_at(subject, Utc::now())
    }

    pub fn make_token_at(&self, subject: &TokenSubject<'_>, now: DateTime<Utc>) -> String {
        let issued_at = now.timestamp();
        let signature = self.mac(subject, issued_at).finalize().into_bytes();
        format!("{}-{}", to_base36(issued_at as u64), hex::encode(signature))
    }

    pub fn check_token(&self, subject: &TokenSubject<'_>, token: &str) -> bool {
        self.check_token_at(subject, token, Utc::now())
    }

    pub fn check_token_at(&self, subject: &TokenSubject<'_>, token: &str, now: DateTime<Utc>) -> bool {
        let Some((ts, signature)) = token.split_once('-') else {
            return false;
        };
        let Some(issued_at) = from_base36(ts) else {
            return false;
        };
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        if self.mac(subject, issued_at).verify_slice(&signature).is_err() {
            return false;
        }

        let age = now.timestamp() - issued_at;
        age >= 0 && age <= self.ttl.num_seconds()
    }
}

/// Encodes a user ID for the verification URL
pub fn encode_uid(user_id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

/// Decodes a verification URL `uid`, returning `None` for anything malformed
pub fn decode_uid(uid: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(uid.trim_end_matches('=')).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    Uuid::parse_str(&text).ok()
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn from_base36(text: &str) -> Option<i64> {
    if text.is_empty() || text.len() > 12 {
        return None;
    }
    i64::from_str_radix(text, 36).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(user_id: Uuid) -> TokenSubject<'static> {
        TokenSubject {
            user_id,
            email_verified: false,
            password_hash: Some("$argon2id$v=19$fake"),
        }
    }

    #[test]
    fn test_token_checks_for_same_subject() {
        let signer = EmailTokenSigner::new("secret", Duration::days(3));
        let subject = subject(Uuid::new_v4());

        let token = signer.make_token(&subject);
        assert!(signer.check_token(&subject, &token));
    }

    #[test]
    fn test_token_bound_to_user_and_state() {
        let signer = EmailTokenSigner::new("secret", Duration::days(3));
        let subject = subject(Uuid::new_v4());
        let token = signer.make_token(&subject);

        assert!(!signer.check_token(&self::subject(Uuid::new_v4()), &token));
        assert!(!signer.check_token(&TokenSubject { email_verified: true, ..subject }, &token));
        assert!(!signer.check_token(&TokenSubject { password_hash: None, ..subject }, &token));
    }

    #[test]
    fn test_token_expires() {
        let signer = EmailTokenSigner::new("secret", Duration::days(3));
        let subject = subject(Uuid::new_v4());
        let issued = Utc::now() - Duration::days(4);

        let token = signer.make_token_at(&subject, issued);
        assert!(signer.check_token_at(&subject, &token, issued + Duration::days(2)));
        assert!(!signer.check_token(&subject, &token));
    }

    #[test]
    fn test_other_secret_rejected() {
        let subject = subject(Uuid::new_v4());
        let token = EmailTokenSigner::new("one", Duration::days(3)).make_token(&subject);
        assert!(!EmailTokenSigner::new("two", Duration::days(3)).check_token(&subject, &token));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let signer = EmailTokenSigner::new("secret", Duration::days(3));
        let subject = subject(Uuid::new_v4());
        for token in ["", "abc", "zz-nothex", "-deadbeef", "!!-00"] {
            assert!(!signer.check_token(&subject, token), "{token:?} should be rejected");
        }
    }

    #[test]
    fn test_uid_round_trip_and_garbage() {
        let id = Uuid::new_v4();
        assert_eq!(decode_uid(&encode_uid(id)), Some(id));
        assert_eq!(decode_uid("not-base64!"), None);
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("42")), None);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(from_base36(&to_base36(1_717_000_000)), Some(1_717_000_000));
    }
}
