//! Form input and field-level validation.
//!
//! Sign-in, sign-up and checkout inputs are validated locally before any
//! request is sent. The API's own 422 responses are folded into the same
//! [`FormErrors`] shape so callers render both kinds identically.

use std::collections::BTreeMap;
use std::fmt;

use redseam_core::Email;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::api::types::{CheckoutRequest, User};

/// Minimum length for usernames and passwords.
pub const MIN_CREDENTIAL_LENGTH: usize = 3;

/// Largest avatar accepted at sign-up (5 MB).
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Avatar content types accepted at sign-up.
pub const AVATAR_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/jpg", "image/webp"];

/// Form field names shared by client validation and server error mapping.
pub mod fields {
    pub const USERNAME: &str = "username";
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const CONFIRM_PASSWORD: &str = "confirm_password";
    pub const AVATAR: &str = "avatar";
    pub const NAME: &str = "name";
    pub const SURNAME: &str = "surname";
    pub const ADDRESS: &str = "address";
    pub const ZIP_CODE: &str = "zip_code";
}

/// Validation messages keyed by form field, one message per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<String, String>);

impl FormErrors {
    /// No errors.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record `message` for `field`, keeping the first message per field.
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    /// Message for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Build from a server validation object such as
    /// `{"email": ["The email has already been taken."]}`.
    ///
    /// `mapping` pairs server keys with form field names; keys not listed are
    /// ignored. Array values contribute their first element.
    #[must_use]
    pub fn from_server(errors: &Value, mapping: &[(&str, &str)]) -> Self {
        let mut out = Self::new();
        for (server_key, field) in mapping {
            if let Some(message) = errors.get(server_key).and_then(first_message) {
                out.insert(field, message);
            }
        }
        out
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

/// First human-readable message in a server error value.
fn first_message(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.first().and_then(first_message),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    }
}

// =============================================================================
// Sign-in
// =============================================================================

/// Sign-in form.
#[derive(Debug, Clone)]
pub struct SignInForm {
    pub email: String,
    pub password: SecretString,
}

impl SignInForm {
    /// Validate fields locally.
    ///
    /// # Errors
    ///
    /// Returns every failing field with its message.
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        if self.email.is_empty() {
            errors.insert(fields::EMAIL, "Email is required");
        } else if !looks_like_email(&self.email) {
            errors.insert(fields::EMAIL, "Please enter a valid email address");
        }

        check_password(&mut errors, fields::PASSWORD, &self.password);

        errors.into_result()
    }
}

// =============================================================================
// Sign-up
// =============================================================================

/// Avatar image attached to a sign-up.
#[derive(Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for AvatarUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AvatarUpload {
    /// Check size and content type.
    ///
    /// # Errors
    ///
    /// Returns the user-facing message for the first failed check.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.bytes.len() > MAX_AVATAR_BYTES {
            return Err("Image size should be less than 5MB");
        }
        if !AVATAR_MIME_TYPES.contains(&self.mime_type.as_str()) {
            return Err("Please select a valid image file (JPEG, PNG, WebP)");
        }
        Ok(())
    }

    /// Guess the content type from the file extension.
    #[must_use]
    pub fn mime_for_file_name(file_name: &str) -> Option<&'static str> {
        let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            "webp" => Some("image/webp"),
            _ => None,
        }
    }
}

/// Sign-up form.
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub avatar: Option<AvatarUpload>,
}

impl SignUpForm {
    /// Server keys mapped onto form fields for 422 responses.
    pub const SERVER_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("username", fields::USERNAME),
        ("email", fields::EMAIL),
        ("password", fields::PASSWORD),
        ("password_confirmation", fields::CONFIRM_PASSWORD),
        ("avatar", fields::AVATAR),
    ];

    /// Validate fields locally.
    ///
    /// # Errors
    ///
    /// Returns every failing field with its message.
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        if self.username.trim().is_empty() {
            errors.insert(fields::USERNAME, "Username is required");
        } else if self.username.chars().count() < MIN_CREDENTIAL_LENGTH {
            errors.insert(fields::USERNAME, "Username must be at least 3 characters");
        }

        check_email(&mut errors, &self.email, "Please enter a valid email");
        check_password(&mut errors, fields::PASSWORD, &self.password);

        let confirm = self.confirm_password.expose_secret();
        if confirm.is_empty() {
            errors.insert(fields::CONFIRM_PASSWORD, "Please confirm your password");
        } else if confirm != self.password.expose_secret() {
            errors.insert(fields::CONFIRM_PASSWORD, "Passwords do not match");
        }

        if let Some(avatar) = &self.avatar
            && let Err(message) = avatar.validate()
        {
            errors.insert(fields::AVATAR, message);
        }

        errors.into_result()
    }
}

// =============================================================================
// Checkout
// =============================================================================

/// Checkout order details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutForm {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub address: String,
    pub zip_code: String,
}

impl CheckoutForm {
    /// Empty form with the email pre-filled from the signed-in user.
    #[must_use]
    pub fn prefilled(user: Option<&User>) -> Self {
        Self {
            email: user.and_then(|u| u.email.clone()).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Validate fields locally.
    ///
    /// # Errors
    ///
    /// Returns every failing field with its message.
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        if self.name.trim().is_empty() {
            errors.insert(fields::NAME, "Name is required");
        }
        if self.surname.trim().is_empty() {
            errors.insert(fields::SURNAME, "Surname is required");
        }
        check_email(&mut errors, &self.email, "Please enter a valid email address");
        if self.address.trim().is_empty() {
            errors.insert(fields::ADDRESS, "Address is required");
        }

        let zip = self.zip_code.trim();
        if zip.is_empty() {
            errors.insert(fields::ZIP_CODE, "Zip code is required");
        } else if !zip.chars().all(|c| c.is_ascii_digit()) {
            errors.insert(fields::ZIP_CODE, "Please enter a valid zip code");
        }

        errors.into_result()
    }

    /// Request body for `POST /cart/checkout`.
    #[must_use]
    pub fn to_request(&self) -> CheckoutRequest {
        CheckoutRequest {
            name: self.name.clone(),
            surname: self.surname.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            zip_code: self.zip_code.clone(),
        }
    }
}

/// Sign-in's looser check: some whitespace-free run shaped `x@y.z`. The
/// server has the final say on which account it names.
fn looks_like_email(email: &str) -> bool {
    email.split_whitespace().any(|token| {
        let Some((at, _)) = token.char_indices().skip(1).find(|(_, c)| *c == '@') else {
            return false;
        };
        token
            .rfind('.')
            .is_some_and(|dot| dot > at + 1 && dot + 1 < token.len())
    })
}

fn check_email(errors: &mut FormErrors, email: &str, invalid_message: &str) {
    if email.trim().is_empty() {
        errors.insert(fields::EMAIL, "Email is required");
    } else if Email::parse(email).is_err() {
        errors.insert(fields::EMAIL, invalid_message);
    }
}

fn check_password(errors: &mut FormErrors, field: &str, password: &SecretString) {
    let password = password.expose_secret();
    if password.is_empty() {
        errors.insert(field, "Password is required");
    } else if password.chars().count() < MIN_CREDENTIAL_LENGTH {
        errors.insert(field, "Password must be at least 3 characters");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign_up() -> SignUpForm {
        SignUpForm {
            username: "shopper".to_string(),
            email: "shopper@example.com".to_string(),
            password: SecretString::from("hunter2"),
            confirm_password: SecretString::from("hunter2"),
            avatar: None,
        }
    }

    fn checkout() -> CheckoutForm {
        CheckoutForm {
            name: "Nino".to_string(),
            surname: "Beridze".to_string(),
            email: "nino@example.com".to_string(),
            address: "1 Rustaveli Ave".to_string(),
            zip_code: "0108".to_string(),
        }
    }

    #[test]
    fn test_sign_in_requires_fields() {
        let form = SignInForm {
            email: String::new(),
            password: SecretString::from(""),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get(fields::EMAIL), Some("Email is required"));
        assert_eq!(errors.get(fields::PASSWORD), Some("Password is required"));
    }

    #[test]
    fn test_sign_in_short_password() {
        let form = SignInForm {
            email: "a@b.co".to_string(),
            password: SecretString::from("ab"),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get(fields::PASSWORD),
            Some("Password must be at least 3 characters")
        );
    }

    #[test]
    fn test_sign_in_email_rule_is_loose() {
        for email in ["a@b.co", "first@last@example.com", "x@sub.domain.io", "me@host.c"] {
            assert!(looks_like_email(email), "{email}");
        }
        for email in ["not-an-email", "@example.com", "a@.com", "a@b.", "a@b", "a @b.c"] {
            assert!(!looks_like_email(email), "{email}");
        }

        // Accepted for sign-in even though sign-up would refuse it.
        let form = SignInForm {
            email: "first@last@example.com".to_string(),
            password: SecretString::from("secret"),
        };
        assert!(form.validate().is_ok());
        assert!(Email::parse("first@last@example.com").is_err());
    }

    #[test]
    fn test_sign_up_valid() {
        assert!(sign_up().validate().is_ok());
    }

    #[test]
    fn test_sign_up_username_and_confirmation() {
        let mut form = sign_up();
        form.username = "  ".to_string();
        form.confirm_password = SecretString::from("different");
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get(fields::USERNAME), Some("Username is required"));
        assert_eq!(
            errors.get(fields::CONFIRM_PASSWORD),
            Some("Passwords do not match")
        );

        form.username = "ab".to_string();
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get(fields::USERNAME),
            Some("Username must be at least 3 characters")
        );
    }

    #[test]
    fn test_sign_up_avatar_checks() {
        let mut form = sign_up();
        form.avatar = Some(AvatarUpload {
            file_name: "me.gif".to_string(),
            mime_type: "image/gif".to_string(),
            bytes: vec![0; 16],
        });
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get(fields::AVATAR),
            Some("Please select a valid image file (JPEG, PNG, WebP)")
        );

        form.avatar = Some(AvatarUpload {
            file_name: "me.png".to_string(),
            mime_type: "image/png".to_string(),
            bytes: vec![0; MAX_AVATAR_BYTES + 1],
        });
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get(fields::AVATAR),
            Some("Image size should be less than 5MB")
        );
    }

    #[test]
    fn test_avatar_mime_guess() {
        assert_eq!(AvatarUpload::mime_for_file_name("a.JPG"), Some("image/jpeg"));
        assert_eq!(AvatarUpload::mime_for_file_name("a.webp"), Some("image/webp"));
        assert_eq!(AvatarUpload::mime_for_file_name("a.gif"), None);
        assert_eq!(AvatarUpload::mime_for_file_name("noext"), None);
    }

    #[test]
    fn test_checkout_valid() {
        assert!(checkout().validate().is_ok());
    }

    #[test]
    fn test_checkout_zip_must_be_digits() {
        let mut form = checkout();
        form.zip_code = "01-08".to_string();
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get(fields::ZIP_CODE),
            Some("Please enter a valid zip code")
        );
    }

    #[test]
    fn test_checkout_blank_fields() {
        let errors = CheckoutForm::default().validate().unwrap_err();
        assert_eq!(errors.len(), 5);
        assert_eq!(errors.get(fields::NAME), Some("Name is required"));
        assert_eq!(errors.get(fields::ZIP_CODE), Some("Zip code is required"));
    }

    #[test]
    fn test_checkout_prefill_from_user() {
        let user = User {
            id: None,
            username: Some("nino".to_string()),
            email: Some("nino@example.com".to_string()),
            avatar: None,
        };
        let form = CheckoutForm::prefilled(Some(&user));
        assert_eq!(form.email, "nino@example.com");
        assert!(form.name.is_empty());
        assert!(CheckoutForm::prefilled(None).email.is_empty());
    }

    #[test]
    fn test_from_server_takes_first_message() {
        let errors = serde_json::json!({
            "username": ["The username has already been taken.", "Too short"],
            "password_confirmation": "Mismatch",
            "unrelated": ["ignored"]
        });
        let form_errors = FormErrors::from_server(&errors, SignUpForm::SERVER_FIELDS);
        assert_eq!(
            form_errors.get(fields::USERNAME),
            Some("The username has already been taken.")
        );
        assert_eq!(form_errors.get(fields::CONFIRM_PASSWORD), Some("Mismatch"));
        assert_eq!(form_errors.len(), 2);
    }

    #[test]
    fn test_display_joins_fields() {
        let mut errors = FormErrors::new();
        errors.insert(fields::NAME, "Name is required");
        errors.insert(fields::ADDRESS, "Address is required");
        assert_eq!(
            errors.to_string(),
            "address: Address is required; name: Name is required"
        );
    }
}
