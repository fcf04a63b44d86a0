/// Router tests that need no database
///
/// Every request here is answered before the handler touches the pool:
/// parameter checks, authentication, throttling and geocoding misses.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{access_token, get_request, json_request, offline_app, send};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_register_requires_auth_type() {
    let app = offline_app(&[]);

    let (status, _, body) = send(
        &app,
        json_request("POST", "/v1/users", json!({"email": "testq@gmail.com"}), None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide auth_type");
}

#[tokio::test]
async fn test_register_rejects_weak_password() {
    let app = offline_app(&[]);
    let body = json!({
        "auth_type": "email",
        "email": "testq@gmail.com",
        "first_name": "Staszek",
        "last_name": "Kowalski",
        "date_of_birth": "1990-04-01T00:00:00Z",
        "is_industry_professional": false,
        "password": "12345678"
    });

    let (status, _, body) = send(&app, json_request("POST", "/v1/users", body, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "password");
}

#[tokio::test]
async fn test_register_with_unknown_social_token() {
    let app = offline_app(&[]);
    let body = json!({
        "auth_type": "socials",
        "email": "testq@gmail.com",
        "first_name": "Staszek",
        "last_name": "Kowalski",
        "date_of_birth": "1990-04-01T00:00:00Z",
        "is_industry_professional": false,
        "fb_token": "not-a-real-token"
    });

    let (status, _, body) = send(&app, json_request("POST", "/v1/users", body, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid social token");
}

#[tokio::test]
async fn test_token_requires_credentials() {
    let app = offline_app(&[]);

    let (status, _, body) = send(
        &app,
        json_request("POST", "/v1/users/token", json!({"auth_type": "email"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "email");

    let (status, _, body) = send(&app, json_request("POST", "/v1/users/token", json!({}), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide auth_type");
}

#[tokio::test]
async fn test_social_login_without_token_is_unauthorized() {
    let app = offline_app(&[]);

    let (status, _, body) = send(
        &app,
        json_request("POST", "/v1/users/token", json!({"auth_type": "socials"}), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No active account found with the given credentials");

    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/v1/users/token",
            json!({"auth_type": "socials", "fb_token": "not-a-real-token"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_code_is_rate_limited() {
    let app = offline_app(&[("TWO_FACTOR_RATE_PER_MINUTE", "2")]);
    let body = json!({"auth_type": "email", "email": "testq@gmail.com", "password": "x"});

    // Missing code is rejected by the handler, but still counts
    for _ in 0..2 {
        let (status, headers, _) =
            send(&app, json_request("POST", "/v1/users/token/code", body.clone(), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "2");
    }

    let (status, headers, body) =
        send(&app, json_request("POST", "/v1/users/token/code", body, None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.get("retry-after").is_some());
    assert_eq!(body["error"], "rate_limit_exceeded");
}

#[tokio::test]
async fn test_token_code_limit_ignores_spoofed_forwarded_for() {
    let app = offline_app(&[("TWO_FACTOR_RATE_PER_MINUTE", "2")]);
    let body = json!({"auth_type": "email", "email": "testq@gmail.com", "password": "x"});

    let mut statuses = Vec::new();
    for i in 0..4 {
        let request = Request::builder()
            .method("POST")
            .uri("/v1/users/token/code")
            .header("content-type", "application/json")
            .header("x-forwarded-for", format!("10.0.0.{}", i))
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        statuses.push(status);
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::BAD_REQUEST,
            StatusCode::BAD_REQUEST,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}

#[tokio::test]
async fn test_profile_requires_authentication() {
    let app = offline_app(&[]);

    let (status, _, body) = send(&app, get_request("/v1/users", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication credentials were not provided");

    let (status, _, _) = send(&app, get_request("/v1/users", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = offline_app(&[]);
    let access = access_token(Uuid::new_v4());

    let (status, _, _) = send(
        &app,
        json_request("POST", "/v1/users/token/refresh", json!({"refresh": access}), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_email_endpoints_require_email() {
    let app = offline_app(&[]);

    let (status, _, body) = send(&app, get_request("/v1/users/email", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide email");

    let (status, _, body) =
        send(&app, json_request("POST", "/v1/users/email/verify", json!({}), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email wasn't supplied");
}

#[tokio::test]
async fn test_malformed_verification_link_is_not_found() {
    let app = offline_app(&[]);

    let (status, _, _) = send(&app, get_request("/v1/users/email/verify/abc/abc", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_parameter_errors() {
    let app = offline_app(&[]);

    let (status, _, body) = send(&app, get_request("/v1/properties", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide address");

    let (status, _, _) = send(
        &app,
        get_request("/v1/properties?address=Camden&price_min=cheap", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &app,
        get_request("/v1/properties?address=Camden&bedrooms_min=4&bedrooms_max=2", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "bedrooms_min can't be greater than bedrooms_max");

    let (status, _, _) = send(
        &app,
        get_request("/v1/properties?address=Camden&days_old=2d", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_unknown_address_is_not_found() {
    // The offline app's geocoder resolves nothing
    let app = offline_app(&[]);

    let (status, _, body) = send(&app, get_request("/v1/properties?address=Atlantis", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No area found for this address");
}

#[tokio::test]
async fn test_writes_require_authentication() {
    let app = offline_app(&[]);
    let id = Uuid::new_v4();

    let requests = [
        json_request("POST", "/v1/properties", json!({}), None),
        json_request("PATCH", &format!("/v1/properties/{}", id), json!({}), None),
        json_request("DELETE", &format!("/v1/properties/{}", id), json!({}), None),
        json_request("POST", "/v1/agents", json!({}), None),
        json_request("PUT", "/v1/users/2fa", json!({"is_2fa_enabled": true}), None),
    ];

    for request in requests {
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let app = offline_app(&[]);

    let (status, headers, body) = send(&app, get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
}

#[tokio::test]
async fn test_empty_property_update_is_rejected() {
    let app = offline_app(&[]);
    let token = access_token(Uuid::new_v4());

    let (status, _, body) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/v1/properties/{}", Uuid::new_v4()),
            json!({}),
            Some(&token),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No fields to update");
}
