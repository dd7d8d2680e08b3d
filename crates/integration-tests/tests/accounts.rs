//! Sign-in, sign-up and sign-out against the fake API.

#![allow(clippy::unwrap_used)]

use redseam_integration_tests::{
    CONFLICT_EMAIL, FakeApi, TAKEN_USERNAME, TEST_EMAIL, TEST_PASSWORD, TEST_TOKEN,
};
use redseam_storefront::forms::{AvatarUpload, SignInForm, SignUpForm, fields};
use redseam_storefront::services::auth::AuthService;
use redseam_storefront::session::{TOKEN_COOKIE, USER_COOKIE};
use redseam_storefront::{ApiError, SessionCookies};
use secrecy::{ExposeSecret, SecretString};

fn sign_in_form(email: &str, password: &str) -> SignInForm {
    SignInForm {
        email: email.to_string(),
        password: SecretString::from(password),
    }
}

fn sign_up_form(username: &str, email: &str) -> SignUpForm {
    SignUpForm {
        username: username.to_string(),
        email: email.to_string(),
        password: SecretString::from("hunter2"),
        confirm_password: SecretString::from("hunter2"),
        avatar: None,
    }
}

#[tokio::test]
async fn test_sign_in_stores_token_and_user() {
    let api = FakeApi::start().await.unwrap();
    let session = SessionCookies::new();
    let auth = AuthService::new(api.client(), session.clone());

    let user = auth
        .sign_in(&sign_in_form(TEST_EMAIL, TEST_PASSWORD))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.username.as_deref(), Some("shopper"));
    assert!(auth.is_signed_in());
    assert_eq!(session.token().unwrap().expose_secret(), TEST_TOKEN);
    assert_eq!(auth.current_user(), Some(user));
    assert!(session.get(TOKEN_COOKIE).is_some());
    assert!(session.get(USER_COOKIE).is_some());

    // The stored token works for the cart.
    let cart = api.cart(&session);
    cart.fetch_cart().await;
    assert!(cart.error().is_none());
}

#[tokio::test]
async fn test_sign_in_with_wrong_password() {
    let api = FakeApi::start().await.unwrap();
    let session = SessionCookies::new();
    let auth = AuthService::new(api.client(), session.clone());

    let err = auth
        .sign_in(&sign_in_form(TEST_EMAIL, "wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::InvalidCredentials));
    assert!(!auth.is_signed_in());
    assert!(session.get(USER_COOKIE).is_none());
}

#[tokio::test]
async fn test_sign_in_field_errors_from_server() {
    let api = FakeApi::start().await.unwrap();
    let auth = AuthService::new(api.client(), SessionCookies::new());

    let err = auth
        .sign_in(&sign_in_form("unverified@example.com", TEST_PASSWORD))
        .await
        .unwrap_err();

    let ApiError::Form(errors) = err else {
        panic!("expected field errors, got {err:?}");
    };
    assert_eq!(
        errors.get(fields::EMAIL),
        Some("Your email address is not verified.")
    );
}

#[tokio::test]
async fn test_invalid_sign_in_form_is_not_sent() {
    let api = FakeApi::start().await.unwrap();
    let auth = AuthService::new(api.client(), SessionCookies::new());

    let err = auth.sign_in(&sign_in_form("nobody", "pw")).await.unwrap_err();

    assert!(matches!(err, ApiError::Form(_)));
    assert_eq!(api.request_count(), 0);
}

#[tokio::test]
async fn test_sign_up_sends_multipart_form() {
    let api = FakeApi::start().await.unwrap();
    let session = SessionCookies::new();
    let auth = AuthService::new(api.client(), session.clone());
    let mut form = sign_up_form("newbie", "newbie@example.com");
    form.avatar = Some(AvatarUpload {
        file_name: "me.png".to_string(),
        mime_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    });

    auth.sign_up(&form).await.unwrap();

    assert!(!auth.is_signed_in());
    let request = api.requests().pop().unwrap();
    let body = request.body.unwrap();
    assert_eq!(body["username"], "newbie");
    assert_eq!(body["email"], "newbie@example.com");
    assert_eq!(body["avatar"]["file_name"], "me.png");
    assert_eq!(body["avatar"]["content_type"], "image/png");
    assert_eq!(body["avatar"]["len"], 4);
    assert!(body.get("password_confirmation").is_some());
}

#[tokio::test]
async fn test_sign_up_maps_server_field_errors() {
    let api = FakeApi::start().await.unwrap();
    let auth = AuthService::new(api.client(), SessionCookies::new());

    let err = auth
        .sign_up(&sign_up_form(TAKEN_USERNAME, "taken@example.com"))
        .await
        .unwrap_err();

    let ApiError::Form(errors) = err else {
        panic!("expected field errors, got {err:?}");
    };
    assert_eq!(
        errors.get(fields::USERNAME),
        Some("The username has already been taken.")
    );
    assert_eq!(
        errors.get(fields::CONFIRM_PASSWORD),
        Some("The password confirmation does not match.")
    );
}

#[tokio::test]
async fn test_sign_up_conflict() {
    let api = FakeApi::start().await.unwrap();
    let auth = AuthService::new(api.client(), SessionCookies::new());

    let err = auth
        .sign_up(&sign_up_form("someone", CONFLICT_EMAIL))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Conflict));
    assert_eq!(
        err.to_string(),
        "Username or email already exists. Please try different ones."
    );
}

#[tokio::test]
async fn test_sign_up_server_failure_hides_html() {
    let api = FakeApi::start().await.unwrap();
    let auth = AuthService::new(api.client(), SessionCookies::new());

    let err = auth
        .sign_up(&sign_up_form("boom", "boom@example.com"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert_eq!(err.to_string(), "Server error. Please try again later.");
}

#[tokio::test]
async fn test_sign_out_forgets_session() {
    let api = FakeApi::start().await.unwrap();
    let session = SessionCookies::new();
    let auth = AuthService::new(api.client(), session.clone());
    auth.sign_in(&sign_in_form(TEST_EMAIL, TEST_PASSWORD))
        .await
        .unwrap();

    auth.sign_out();

    assert!(!auth.is_signed_in());
    assert!(auth.current_user().is_none());
    let cart = api.cart(&session);
    cart.fetch_cart().await;
    assert_eq!(cart.cart_count(), 0);
}
