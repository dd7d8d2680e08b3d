//! Unified error handling with Sentry integration.
//!
//! Every operation that talks to the commerce API returns `Result<T, ApiError>`.
//! Background refreshes log and swallow their errors; operations a user just
//! triggered hand the error back so the caller can show a message.

use redseam_core::CartKeyError;
use thiserror::Error;

use crate::forms::FormErrors;

/// Shown for any 5xx response.
pub const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again later.";

/// Shown for 401 responses.
pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required. Please log in.";

/// Shown for 403 responses.
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied. You do not have permission.";

/// Errors returned by the storefront client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure (connection refused, DNS, TLS, body read).
    #[error("Network error. Please check your connection and try again. ({0})")]
    Http(reqwest::Error),

    /// Request exceeded its timeout.
    #[error("Request timed out. Please check your connection and try again.")]
    Timeout,

    /// Non-2xx response that is not an authentication failure.
    #[error("{message}")]
    Network {
        /// HTTP status code.
        status: u16,
        /// Server-provided or synthesized message.
        message: String,
    },

    /// 401/403 response.
    #[error("{message}")]
    Auth {
        /// HTTP status code.
        status: u16,
        /// User-facing message.
        message: String,
    },

    /// Malformed or incomplete payload from the server.
    #[error("{0}")]
    Validation(String),

    /// Cart line or catalog resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No bearer token in the cookie session for a call that needs one.
    #[error("Authentication token not found")]
    MissingToken,

    /// Quantity outside the accepted range.
    #[error("Quantity must be at least 1 (got {0})")]
    InvalidQuantity(u32),

    /// Checkout attempted with no lines in the cart.
    #[error("Your cart is empty")]
    EmptyCart,

    /// Client-side or server-side (422) field validation failed.
    #[error("Validation failed: {0}")]
    Form(FormErrors),

    /// Sign-in rejected.
    #[error("Email or password is incorrect. Please try again.")]
    InvalidCredentials,

    /// Sign-up rejected because the username or email is taken.
    #[error("Username or email already exists. Please try different ones.")]
    Conflict,

    /// Cart line key text could not be decoded.
    #[error(transparent)]
    Key(#[from] CartKeyError),

    /// Endpoint URL could not be built from the configured base.
    #[error("Invalid API URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

impl ApiError {
    /// Whether this falls in the network class: transport failure, timeout,
    /// or a non-auth non-2xx status.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout | Self::Network { .. })
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } | Self::Auth { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Set the Sentry user context after sign-in.
pub fn set_sentry_user(user_id: Option<String>, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: user_id,
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("key", "42-Red-M")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            ApiError::MissingToken.to_string(),
            "Authentication token not found"
        );
        assert_eq!(
            ApiError::NotFound("42-Red-M".to_string()).to_string(),
            "Not found: 42-Red-M"
        );
        let err = ApiError::Network {
            status: 500,
            message: SERVER_ERROR_MESSAGE.to_string(),
        };
        assert_eq!(err.to_string(), SERVER_ERROR_MESSAGE);
    }

    #[test]
    fn test_network_class() {
        assert!(ApiError::Timeout.is_network());
        assert!(
            ApiError::Network {
                status: 502,
                message: String::new(),
            }
            .is_network()
        );
        assert!(
            !ApiError::Auth {
                status: 401,
                message: AUTH_REQUIRED_MESSAGE.to_string(),
            }
            .is_network()
        );
        assert!(!ApiError::MissingToken.is_network());
    }

    #[test]
    fn test_status() {
        let err = ApiError::Auth {
            status: 403,
            message: ACCESS_DENIED_MESSAGE.to_string(),
        };
        assert_eq!(err.status(), Some(403));
        assert_eq!(ApiError::EmptyCart.status(), None);
    }
}
