//! Authentication service.
//!
//! Signs users in and up through the commerce API and keeps the resulting
//! token and profile in the cookie session.

use tracing::instrument;

use crate::api::ApiClient;
use crate::api::types::User;
use crate::error::{ApiError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::forms::{SignInForm, SignUpForm};
use crate::session::SessionCookies;

/// Authentication service.
///
/// Cheap to clone; clones share the API client and cookie session.
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
    session: SessionCookies,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(client: ApiClient, session: SessionCookies) -> Self {
        Self { client, session }
    }

    /// Whether the session holds a bearer token.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.session.token().is_some()
    }

    /// Profile of the signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.session.user()
    }

    /// Sign in with email and password.
    ///
    /// On success the token and profile returned by the API are stored as
    /// cookies for seven days.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Form` if the form fails validation or the server
    /// rejects individual fields, and `ApiError::InvalidCredentials` if the
    /// credentials are refused.
    #[instrument(skip_all, fields(email = %form.email))]
    pub async fn sign_in(&self, form: &SignInForm) -> Result<Option<User>> {
        form.validate().map_err(ApiError::Form)?;

        let response = self.client.login(form).await?;

        if let Some(token) = response.token.as_deref() {
            self.session.set_token(token);
        }
        if let Some(user) = &response.user {
            self.session
                .set_user(user)
                .map_err(|e| ApiError::Validation(format!("Unreadable user profile: {e}")))?;
            set_sentry_user(user.id.map(|id| id.to_string()), user.email.as_deref());
        }

        add_breadcrumb("auth", "Signed in", None);
        tracing::info!("User signed in");
        Ok(response.user)
    }

    /// Create an account. Does not sign the user in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Form` for local or server field errors,
    /// `ApiError::Conflict` if the username or email is taken, or another
    /// error carrying the server's message.
    #[instrument(skip_all, fields(username = %form.username))]
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<()> {
        form.validate().map_err(ApiError::Form)?;
        self.client.register(form).await?;
        add_breadcrumb("auth", "Signed up", None);
        tracing::info!("Account created");
        Ok(())
    }

    /// Forget the token and profile.
    pub fn sign_out(&self) {
        self.session.clear_auth();
        clear_sentry_user();
        add_breadcrumb("auth", "Signed out", None);
        tracing::info!("User signed out");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use url::Url;

    use super::*;
    use crate::config::ApiConfig;
    use crate::forms::fields;

    fn service(session: SessionCookies) -> AuthService {
        let config = ApiConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        AuthService::new(ApiClient::new(&config).unwrap(), session)
    }

    #[tokio::test]
    async fn test_sign_in_validates_before_sending() {
        let auth = service(SessionCookies::new());
        let form = SignInForm {
            email: "not-an-email".to_string(),
            password: SecretString::from("pw"),
        };
        let Err(ApiError::Form(errors)) = auth.sign_in(&form).await else {
            panic!("expected form errors");
        };
        assert!(errors.get(fields::EMAIL).is_some());
        assert!(errors.get(fields::PASSWORD).is_some());
    }

    #[test]
    fn test_sign_out_clears_session() {
        let session = SessionCookies::from_cookie_header("token=abc; theme=dark");
        let auth = service(session.clone());
        assert!(auth.is_signed_in());

        auth.sign_out();

        assert!(!auth.is_signed_in());
        assert_eq!(session.get("theme").as_deref(), Some("dark"));
    }
}
