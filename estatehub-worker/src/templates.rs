/// Message rendering for each email job kind
///
/// | kind              | subject                  | content                    |
/// |-------------------|--------------------------|----------------------------|
/// | `verify_email`    | "Activate your account." | verification link          |
/// | `two_factor_code` | "Continue to sign in."   | current TOTP code          |
///
/// Both the link token and the code are computed at send time, from the user
/// row as it is when the job runs.

use chrono::Duration;
use estatehub_shared::{
    auth::{
        email_token::{encode_uid, EmailTokenSigner},
        totp::{TotpError, TOTP_STEP},
    },
    models::{email_job::EmailJobKind, user::User},
};

use crate::{config::WorkerConfig, mailer::Email};

pub const VERIFY_SUBJECT: &str = "Activate your account.";
pub const CODE_SUBJECT: &str = "Continue to sign in.";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Cannot compute sign-in code: {0}")]
    Totp(#[from] TotpError),
}

#[derive(Debug, Clone)]
pub struct Renderer {
    signer: EmailTokenSigner,
    public_domain: String,
    from: String,
}

impl Renderer {
    pub fn new(signer: EmailTokenSigner, public_domain: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            signer,
            public_domain: public_domain.into(),
            from: from.into(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        let signer = EmailTokenSigner::new(
            config.email_token_secret.as_bytes(),
            Duration::hours(config.email_token_ttl_hours),
        );
        Self::new(signer, config.public_domain.clone(), config.mail_from.clone())
    }

    /// Absolute link that marks the user's email verified
    pub fn verification_link(&self, user: &User) -> String {
        format!(
            "{}/v1/users/email/verify/{}/{}",
            self.public_domain,
            encode_uid(user.id),
            self.signer.make_token(&user.token_subject())
        )
    }

    pub fn render(&self, kind: EmailJobKind, user: &User) -> Result<Email, TemplateError> {
        let (subject, body) = match kind {
            EmailJobKind::VerifyEmail => (
                VERIFY_SUBJECT,
                format!(
                    "Hi {},\n\n\
                     Please confirm your email address to activate your EstateHub account:\n\n\
                     {}\n\n\
                     If you did not create an account, you can ignore this message.\n",
                    user.first_name,
                    self.verification_link(user)
                ),
            ),
            EmailJobKind::TwoFactorCode => {
                let code = user.totp()?.current_code(&user.email)?;
                (
                    CODE_SUBJECT,
                    format!(
                        "Hi {},\n\n\
                         Your sign-in code is {}\n\n\
                         It is valid for about {} minutes. If you did not try to sign in, \
                         change your password.\n",
                        user.first_name,
                        code,
                        TOTP_STEP * 2 / 60
                    ),
                )
            }
        };

        Ok(Email {
            from: self.from.clone(),
            to: user.email.clone(),
            subject: subject.to_string(),
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use estatehub_shared::auth::{email_token::decode_uid, totp::TotpSecret};
    use uuid::Uuid;

    pub(crate) fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "testq@gmail.com".to_string(),
            username: None,
            first_name: "Staszek".to_string(),
            last_name: "Kowalski".to_string(),
            password_hash: Some("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string()),
            date_of_birth: None,
            is_industry_professional: false,
            is_email_verified: false,
            is_2fa_enabled: true,
            is_active: true,
            totp_secret: TotpSecret::generate().as_base32().to_string(),
            fb_user_id: None,
            google_user_id: None,
            linkedin_user_id: None,
            agency_id: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    pub(crate) fn renderer() -> Renderer {
        Renderer::new(
            EmailTokenSigner::new("worker-test-secret", Duration::hours(72)),
            "https://estatehub.example",
            "noreply@estatehub.com",
        )
    }

    #[test]
    fn test_verification_email_link_is_valid() {
        let renderer = renderer();
        let user = user();

        let email = renderer.render(EmailJobKind::VerifyEmail, &user).unwrap();
        assert_eq!(email.subject, VERIFY_SUBJECT);
        assert_eq!(email.to, "testq@gmail.com");
        assert_eq!(email.from, "noreply@estatehub.com");

        let link = email
            .body
            .lines()
            .find(|line| line.starts_with("https://"))
            .unwrap();
        let rest = link
            .strip_prefix("https://estatehub.example/v1/users/email/verify/")
            .unwrap();
        let (uid, token) = rest.split_once('/').unwrap();

        assert_eq!(decode_uid(uid), Some(user.id));
        assert!(renderer.signer.check_token(&user.token_subject(), token));
    }

    #[test]
    fn test_code_email_carries_current_code() {
        let user = user();

        let email = renderer().render(EmailJobKind::TwoFactorCode, &user).unwrap();
        assert_eq!(email.subject, CODE_SUBJECT);

        let code = user.totp().unwrap().current_code(&user.email).unwrap();
        assert!(email.body.contains(&code));
        assert!(user.totp().unwrap().verify(&code, &user.email).unwrap());
    }

    #[test]
    fn test_code_email_with_corrupt_secret() {
        let mut user = user();
        user.totp_secret = "not base32!".to_string();

        let err = renderer().render(EmailJobKind::TwoFactorCode, &user).unwrap_err();
        assert!(matches!(err, TemplateError::Totp(_)));
    }
}
