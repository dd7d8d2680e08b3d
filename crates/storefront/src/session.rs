//! Cookie-backed session state.
//!
//! The commerce API authenticates with a bearer token that the storefront
//! keeps in a `token` cookie; the signed-in user's profile rides along in a
//! `user` cookie as URL-encoded JSON. [`SessionCookies`] is an in-memory cookie
//! jar with the same lookup semantics a browser page would use, shared by the
//! API client, the cart store and the auth service.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::api::types::User;

/// Cookie holding the bearer token.
pub const TOKEN_COOKIE: &str = "token";

/// Cookie holding the signed-in user profile.
pub const USER_COOKIE: &str = "user";

/// Lifetime of the auth cookies set at sign-in.
pub const AUTH_COOKIE_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// One stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
    /// Expiry as seconds since the Unix epoch; `None` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl CookieEntry {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Shared, cloneable cookie jar.
#[derive(Clone, Default)]
pub struct SessionCookies {
    inner: Arc<RwLock<Vec<CookieEntry>>>,
}

impl SessionCookies {
    /// Empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jar seeded from a `Cookie` header value such as `token=abc; theme=dark`.
    ///
    /// Pairs without `=` are skipped. Seeded cookies never expire.
    #[must_use]
    pub fn from_cookie_header(header: &str) -> Self {
        let entries = header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| CookieEntry {
                name: name.to_string(),
                value: value.to_string(),
                expires_at: None,
            })
            .collect();
        Self::restore(entries)
    }

    /// Jar holding previously snapshotted entries.
    #[must_use]
    pub fn restore(entries: Vec<CookieEntry>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(entries)),
        }
    }

    /// Live entries, for persisting between processes.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CookieEntry> {
        let now = unix_now();
        self.read()
            .iter()
            .filter(|entry| entry.is_live(now))
            .cloned()
            .collect()
    }

    /// Live cookies rendered as a `Cookie` header value.
    #[must_use]
    pub fn cookie_header(&self) -> String {
        self.snapshot()
            .iter()
            .map(|entry| format!("{}={}", entry.name, entry.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Cookie value by name.
    ///
    /// Lookup splits `"; " + header` on `"; {name}="` and only answers when
    /// that yields exactly two parts, so a name that appears twice reads as
    /// absent. The value runs up to the next `;`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let haystack = format!("; {}", self.cookie_header());
        let needle = format!("; {name}=");
        let parts: Vec<&str> = haystack.split(needle.as_str()).collect();
        match parts.as_slice() {
            [_, tail] => tail.split(';').next().map(str::to_string),
            _ => None,
        }
    }

    /// Set a cookie, replacing any previous value under the same name.
    pub fn set(&self, name: &str, value: &str, max_age: Option<Duration>) {
        let expires_at = max_age.map(|age| unix_now().saturating_add(age.as_secs()));
        let mut entries = self.write();
        entries.retain(|entry| entry.name != name);
        entries.push(CookieEntry {
            name: name.to_string(),
            value: value.to_string(),
            expires_at,
        });
    }

    /// Drop a cookie.
    pub fn remove(&self, name: &str) {
        self.write().retain(|entry| entry.name != name);
    }

    /// Bearer token, if signed in. An empty cookie counts as absent.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.get(TOKEN_COOKIE)
            .filter(|token| !token.is_empty())
            .map(SecretString::from)
    }

    /// Store the bearer token for [`AUTH_COOKIE_LIFETIME`].
    pub fn set_token(&self, token: &str) {
        self.set(TOKEN_COOKIE, token, Some(AUTH_COOKIE_LIFETIME));
    }

    /// Signed-in user profile. An unreadable cookie is logged and ignored.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        let raw = self.get(USER_COOKIE)?;
        let decoded = match urlencoding::decode(&raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "User cookie is not valid percent-encoding");
                return None;
            }
        };
        match serde_json::from_str(&decoded) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse user from cookie");
                None
            }
        }
    }

    /// Store the user profile for [`AUTH_COOKIE_LIFETIME`].
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be serialized.
    pub fn set_user(&self, user: &User) -> serde_json::Result<()> {
        let json = serde_json::to_string(user)?;
        self.set(
            USER_COOKIE,
            &urlencoding::encode(&json),
            Some(AUTH_COOKIE_LIFETIME),
        );
        Ok(())
    }

    /// Forget the token and user profile.
    pub fn clear_auth(&self) {
        let mut entries = self.write();
        entries.retain(|entry| entry.name != TOKEN_COOKIE && entry.name != USER_COOKIE);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<CookieEntry>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<CookieEntry>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SessionCookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.read().iter().map(|e| e.name.clone()).collect();
        f.debug_struct("SessionCookies")
            .field("names", &names)
            .finish_non_exhaustive()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
