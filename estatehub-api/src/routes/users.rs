/// User registration and authentication endpoints
///
/// Two identity paths share every endpoint, picked by `auth_type` in the body:
///
/// - `email`: email + password
/// - `socials`: a Facebook access token (`fb_token`)
///
/// # Login flow
///
/// ```text
/// POST /token ──(2FA off)──> {access, refresh}           audited
///             ──(2FA on)───> {"detail": "Please check email for code"}
///                               │ code emailed by the worker
/// POST /token/code + code ─────> {access, refresh}       audited
/// ```
///
/// # Endpoints
///
/// - `POST /v1/users` - Register
/// - `GET /v1/users` - Current user
/// - `POST /v1/users/token` - First factor
/// - `POST /v1/users/token/code` - Second factor
/// - `POST /v1/users/token/refresh` - New access token
/// - `GET /v1/users/email?email=` - Account lookup
/// - `POST /v1/users/email/verify` - Send verification email
/// - `GET /v1/users/email/verify/:uid/:token` - Verify email
/// - `PUT /v1/users/2fa` - Enable or disable 2FA

use crate::{
    app::AppState,
    client::ClientInfo,
    clients::facebook::SocialError,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use estatehub_shared::{
    auth::{
        authorization::current_user,
        email_token::decode_uid,
        jwt::{self, Claims, TokenPair, TokenType},
        middleware::AuthContext,
        password,
        totp::TotpSecret,
    },
    models::{
        authentication_data::{AuthenticationData, NewAuthenticationData},
        email_job::{EmailJob, EmailJobKind},
        user::{CreateUser, User},
    },
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";
const CODE_SENT: &str = "Please check email for code";

/// Identity path selected by `auth_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Email,
    Socials,
}

impl AuthType {
    fn from_body(body: &Value) -> ApiResult<Self> {
        match body.get("auth_type").and_then(Value::as_str).map(str::trim) {
            None | Some("") => Err(ApiError::BadRequest("Please provide auth_type".to_string())),
            Some("email") => Ok(AuthType::Email),
            Some("socials") => Ok(AuthType::Socials),
            Some(other) => Err(ApiError::BadRequest(format!(
                "auth_type must be 'email' or 'socials', got '{}'",
                other
            ))),
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    serde_json::from_value(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

fn field_error(field: &str, message: impl Into<String>) -> ApiError {
    ApiError::ValidationError(vec![ValidationErrorDetail {
        field: field.to_string(),
        message: message.into(),
    }])
}

fn required<'a>(value: &'a Option<String>, field: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| field_error(field, "This field is required."))
}

/// Register request
///
/// `password` is required for `email`, `fb_token` for `socials`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        email(message = "Enter a valid email address"),
        length(max = 254, message = "Email must be at most 254 characters")
    )]
    pub email: String,

    #[validate(length(min = 1, max = 150, message = "First name must be 1-150 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 150, message = "Last name must be 1-150 characters"))]
    pub last_name: String,

    pub date_of_birth: DateTime<Utc>,
    pub is_industry_professional: bool,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub fb_token: Option<String>,
}

/// Account details returned by registration
#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<DateTime<Utc>>,
    pub is_industry_professional: bool,
}

impl From<&User> for RegisteredUser {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            date_of_birth: user.date_of_birth,
            is_industry_professional: user.is_industry_professional,
        }
    }
}

/// Current user profile
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: RegisteredUser,
    pub is_2fa_enabled: bool,
}

/// Credentials for `/token` and `/token/code`
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub fb_token: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// First-factor response: tokens, or a pointer to the emailed code
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Tokens(TokenPair),
    Challenge { detail: String },
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailBody {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TwoFactorRequest {
    pub is_2fa_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorResponse {
    pub is_2fa_enabled: bool,

    /// Provisioning URL for authenticator apps, set when enabling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otpauth_url: Option<String>,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /v1/users
/// Content-Type: application/json
///
/// {
///   "auth_type": "email",
///   "email": "testq@gmail.com",
///   "first_name": "Staszek",
///   "last_name": "Kowalski",
///   "date_of_birth": "1990-04-01T00:00:00Z",
///   "is_industry_professional": false,
///   "password": "Sup3r-secret"
/// }
/// ```
///
/// A verification email is queued for the new account.
///
/// # Errors
///
/// - `400 Bad Request`: Missing `auth_type`, invalid fields, weak password, bad social token
/// - `409 Conflict`: Email or Facebook account already registered
/// - `503 Service Unavailable`: Social login not configured
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let auth_type = AuthType::from_body(&body)?;
    let req: RegisterRequest = parse_body(body)?;
    req.validate()?;

    let email = req.email.trim().to_string();

    let (password_hash, fb_user_id) = match auth_type {
        AuthType::Email => {
            let password = required(&req.password, "password")?;
            password::validate_password_strength(password, &email)
                .map_err(|msg| field_error("password", msg))?;
            (Some(password::hash_password(password)?), None)
        }
        AuthType::Socials => {
            let token = req
                .fb_token
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| ApiError::BadRequest("A Facebook token should be provided".to_string()))?;
            let fb_user_id = state.social.facebook_user_id(token).await?;

            if User::find_by_fb_user_id(&state.db, &fb_user_id).await?.is_some() {
                return Err(ApiError::Conflict(
                    "A user with that Facebook account already exists".to_string(),
                ));
            }
            (None, Some(fb_user_id))
        }
    };

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            password_hash,
            date_of_birth: Some(req.date_of_birth),
            is_industry_professional: req.is_industry_professional,
            totp_secret: TotpSecret::generate().as_base32().to_string(),
            fb_user_id,
            ..Default::default()
        },
    )
    .await?;

    EmailJob::enqueue(&mut *tx, EmailJobKind::VerifyEmail, user.id).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, auth_type = ?auth_type, "User registered");

    Ok((StatusCode::CREATED, Json(RegisteredUser::from(&user))))
}

/// Current user's profile
///
/// # Endpoint
///
/// ```text
/// GET /v1/users
/// Authorization: Bearer <access token>
/// ```
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<UserProfile>> {
    let user = current_user(&state.db, &auth).await?;

    Ok(Json(UserProfile {
        user: RegisteredUser::from(&user),
        is_2fa_enabled: user.is_2fa_enabled,
    }))
}

/// Checks the first factor for either identity path
///
/// Unknown accounts, wrong passwords and inactive users all produce the same
/// 401. An unknown email still spends one password hash.
async fn authenticate(state: &AppState, auth_type: AuthType, req: &TokenRequest) -> ApiResult<User> {
    let rejected = || ApiError::Unauthorized(NO_ACTIVE_ACCOUNT.to_string());

    let user = match auth_type {
        AuthType::Email => {
            let email = required(&req.email, "email")?;
            let password = required(&req.password, "password")?;

            let Some(user) = User::find_by_email(&state.db, email).await? else {
                password::hash_dummy(password);
                return Err(rejected());
            };

            let matches = match user.password_hash.as_deref() {
                Some(hash) => password::verify_password(password, hash)?,
                None => false,
            };
            if !matches {
                return Err(rejected());
            }
            user
        }
        AuthType::Socials => {
            let token = req
                .fb_token
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(rejected)?;
            let fb_user_id = match state.social.facebook_user_id(token).await {
                Ok(id) => id,
                Err(SocialError::InvalidToken | SocialError::Rejected(_)) => return Err(rejected()),
                Err(e) => return Err(e.into()),
            };

            User::find_by_fb_user_id(&state.db, &fb_user_id)
                .await?
                .ok_or_else(rejected)?
        }
    };

    if !user.is_active {
        return Err(rejected());
    }

    if state.config.auth.require_verified_email && !user.is_email_verified {
        return Err(ApiError::Forbidden("Please verify email first".to_string()));
    }

    Ok(user)
}

/// Audits the login and issues tokens
async fn complete_login(state: &AppState, user: &User, client: ClientInfo) -> ApiResult<TokenPair> {
    AuthenticationData::record(
        &state.db,
        NewAuthenticationData {
            user_id: user.id,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            city: None,
        },
    )
    .await?;
    User::update_last_login(&state.db, user.id).await?;

    let pair = jwt::create_token_pair(user.id, state.jwt_secret(), &state.config.jwt.lifetimes())?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(pair)
}

/// First authentication factor
///
/// # Endpoint
///
/// ```text
/// POST /v1/users/token
///
/// {"auth_type": "email", "email": "testq@gmail.com", "password": "..."}
/// {"auth_type": "socials", "fb_token": "EAAB..."}
/// ```
///
/// # Response
///
/// Without 2FA: `{"access": "eyJ...", "refresh": "eyJ..."}`.
/// With 2FA: `{"detail": "Please check email for code"}`.
///
/// # Errors
///
/// - `400 Bad Request`: Missing `auth_type` or credentials
/// - `401 Unauthorized`: No active account matches
/// - `403 Forbidden`: Email not verified (when verification is required)
pub async fn token(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<Value>,
) -> ApiResult<Json<LoginResponse>> {
    let auth_type = AuthType::from_body(&body)?;
    let req: TokenRequest = parse_body(body)?;
    let user = authenticate(&state, auth_type, &req).await?;

    if user.is_2fa_enabled {
        EmailJob::enqueue(&state.db, EmailJobKind::TwoFactorCode, user.id).await?;
        tracing::info!(user_id = %user.id, "Two-factor code requested");
        return Ok(Json(LoginResponse::Challenge {
            detail: CODE_SENT.to_string(),
        }));
    }

    let pair = complete_login(&state, &user, client).await?;
    Ok(Json(LoginResponse::Tokens(pair)))
}

/// Second authentication factor
///
/// Same body as `/token` plus `code`. The code is only checked for accounts
/// with 2FA enabled.
///
/// # Errors
///
/// - `400 Bad Request`: "Code is incorrect"
/// - `401 Unauthorized`: No active account matches
/// - `429 Too Many Requests`: Too many attempts from this client
pub async fn token_code(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<Value>,
) -> ApiResult<Json<TokenPair>> {
    let auth_type = AuthType::from_body(&body)?;
    let req: TokenRequest = parse_body(body)?;
    let code = required(&req.code, "code")?.to_string();
    let user = authenticate(&state, auth_type, &req).await?;

    if user.is_2fa_enabled && !user.totp()?.verify(&code, &user.email)? {
        tracing::info!(user_id = %user.id, "Incorrect two-factor code");
        return Err(ApiError::BadRequest("Code is incorrect".to_string()));
    }

    let pair = complete_login(&state, &user, client).await?;
    Ok(Json(pair))
}

/// Exchanges a refresh token for a new access token
///
/// # Endpoint
///
/// ```text
/// POST /v1/users/token/refresh
///
/// {"refresh": "eyJ..."}
/// ```
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh, state.jwt_secret())?;

    // Deactivated accounts stop getting access tokens
    current_user(&state.db, &AuthContext::new(claims.sub)).await?;

    let access = Claims::with_expiration(
        claims.sub,
        TokenType::Access,
        state.config.jwt.lifetimes().access,
    );

    Ok(Json(RefreshResponse {
        access: jwt::create_token(&access, state.jwt_secret())?,
    }))
}

/// Whether an account exists for an email
///
/// # Endpoint
///
/// ```text
/// GET /v1/users/email?email=testq@gmail.com
/// ```
///
/// 200 if it exists, 404 if not, 400 without `email`.
pub async fn email_exists(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<StatusCode> {
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Please provide email".to_string()))?;

    if User::email_exists(&state.db, email).await? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound("Email doesn't exist".to_string()))
    }
}

/// Queues another verification email
///
/// # Endpoint
///
/// ```text
/// POST /v1/users/email/verify
///
/// {"email": "testq@gmail.com"}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: No email, or already verified
/// - `404 Not Found`: Unknown email
pub async fn send_verification(
    State(state): State<AppState>,
    Json(body): Json<EmailBody>,
) -> ApiResult<StatusCode> {
    let email = body
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email wasn't supplied".to_string()))?;

    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.is_email_verified {
        return Err(ApiError::BadRequest("Email already verified".to_string()));
    }

    EmailJob::enqueue(&state.db, EmailJobKind::VerifyEmail, user.id).await?;
    Ok(StatusCode::OK)
}

/// Verification link target
///
/// # Endpoint
///
/// ```text
/// GET /v1/users/email/verify/:uid/:token
/// ```
///
/// `uid` is the URL-safe base64 user ID from the email. Any malformed,
/// expired or already-used link is a 404.
pub async fn verify_email(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let invalid = || ApiError::NotFound("Invalid verification link".to_string());

    let user_id = decode_uid(&uid).ok_or_else(invalid)?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(invalid)?;

    if !state.email_tokens.check_token(&user.token_subject(), &token) {
        return Err(invalid());
    }

    User::mark_email_verified(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "Email verified");

    Ok(StatusCode::OK)
}

/// Enables or disables two-factor authentication
///
/// # Endpoint
///
/// ```text
/// PUT /v1/users/2fa
/// Authorization: Bearer <access token>
///
/// {"is_2fa_enabled": true}
/// ```
///
/// Enabling generates a fresh TOTP secret and returns its `otpauth://` URL.
///
/// # Errors
///
/// - `400 Bad Request`: "Please verify email first"
pub async fn set_two_factor(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<TwoFactorRequest>,
) -> ApiResult<Json<TwoFactorResponse>> {
    let user = current_user(&state.db, &auth).await?;

    if !req.is_2fa_enabled {
        User::disable_two_factor(&state.db, user.id).await?;
        tracing::info!(user_id = %user.id, "Two-factor authentication disabled");
        return Ok(Json(TwoFactorResponse {
            is_2fa_enabled: false,
            otpauth_url: None,
        }));
    }

    if !user.is_email_verified {
        return Err(ApiError::BadRequest("Please verify email first".to_string()));
    }

    let secret = TotpSecret::generate();
    User::enable_two_factor(&state.db, user.id, &secret).await?;
    tracing::info!(user_id = %user.id, "Two-factor authentication enabled");

    Ok(Json(TwoFactorResponse {
        is_2fa_enabled: true,
        otpauth_url: Some(secret.otpauth_url(&user.email)?),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration(extra: Value) -> Value {
        let mut body = json!({
            "email": "testq@gmail.com",
            "first_name": "Staszek",
            "last_name": "Kowalski",
            "date_of_birth": "1990-04-01T00:00:00Z",
            "is_industry_professional": false,
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        body
    }

    #[test]
    fn test_auth_type_from_body() {
        assert_eq!(
            AuthType::from_body(&json!({"auth_type": "email"})).unwrap(),
            AuthType::Email
        );
        assert_eq!(
            AuthType::from_body(&json!({"auth_type": "socials"})).unwrap(),
            AuthType::Socials
        );

        for body in [json!({}), json!({"auth_type": ""}), json!({"auth_type": 3})] {
            assert!(matches!(
                AuthType::from_body(&body),
                Err(ApiError::BadRequest(msg)) if msg == "Please provide auth_type"
            ));
        }
        assert!(matches!(
            AuthType::from_body(&json!({"auth_type": "google"})),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_register_request_validation() {
        let req: RegisterRequest =
            parse_body(registration(json!({"auth_type": "email", "password": "x"}))).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.password.as_deref(), Some("x"));

        let req: RegisterRequest = parse_body(registration(json!({"email": "not-an-email"}))).unwrap();
        assert!(req.validate().is_err());

        assert!(matches!(
            parse_body::<RegisterRequest>(json!({"email": "testq@gmail.com"})),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(required(&Some(" a@b.c ".to_string()), "email").unwrap(), "a@b.c");

        match required(&Some("  ".to_string()), "code") {
            Err(ApiError::ValidationError(details)) => {
                assert_eq!(details[0].field, "code");
                assert_eq!(details[0].message, "This field is required.");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(required(&None, "password").is_err());
    }

    #[test]
    fn test_login_response_shapes() {
        let tokens = LoginResponse::Tokens(TokenPair {
            access: "a".to_string(),
            refresh: "r".to_string(),
        });
        assert_eq!(
            serde_json::to_value(tokens).unwrap(),
            json!({"access": "a", "refresh": "r"})
        );

        let challenge = LoginResponse::Challenge {
            detail: CODE_SENT.to_string(),
        };
        assert_eq!(
            serde_json::to_value(challenge).unwrap(),
            json!({"detail": "Please check email for code"})
        );
    }

    #[test]
    fn test_profile_shape() {
        let profile = UserProfile {
            user: RegisteredUser {
                email: "testq@gmail.com".to_string(),
                first_name: "Staszek".to_string(),
                last_name: "Kowalski".to_string(),
                date_of_birth: None,
                is_industry_professional: true,
            },
            is_2fa_enabled: false,
        };

        let value = serde_json::to_value(profile).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&"is_2fa_enabled"));
        assert!(!keys.contains(&"password_hash"));
    }

    #[test]
    fn test_two_factor_response_omits_url_when_disabled() {
        let value = serde_json::to_value(TwoFactorResponse {
            is_2fa_enabled: false,
            otpauth_url: None,
        })
        .unwrap();
        assert_eq!(value, json!({"is_2fa_enabled": false}));
    }
}
