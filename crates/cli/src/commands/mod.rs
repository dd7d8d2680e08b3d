//! Command implementations and the state they share.

#![allow(clippy::print_stdout)]

pub mod account;
pub mod cart;
pub mod catalog;

use std::io::ErrorKind;
use std::path::PathBuf;

use redseam_storefront::services::auth::AuthService;
use redseam_storefront::session::CookieEntry;
use redseam_storefront::{ApiClient, CartStore, SessionCookies, StorefrontConfig};

/// Errors raised while loading or saving the session file.
#[derive(Debug, thiserror::Error)]
pub enum SessionFileError {
    #[error("Failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Session file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Clients and session for one CLI invocation.
pub struct Context {
    pub config: StorefrontConfig,
    pub client: ApiClient,
    pub session: SessionCookies,
    session_file: PathBuf,
}

impl Context {
    /// Build clients and load the cookie session from `session_file`.
    ///
    /// A missing file means signed out.
    pub async fn open(
        config: &StorefrontConfig,
        session_file: PathBuf,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let client = ApiClient::new(&config.api)?;

        let session = match tokio::fs::read_to_string(&session_file).await {
            Ok(text) => {
                let entries: Vec<CookieEntry> =
                    serde_json::from_str(&text).map_err(|source| SessionFileError::Corrupt {
                        path: session_file.clone(),
                        source,
                    })?;
                SessionCookies::restore(entries)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => SessionCookies::new(),
            Err(source) => {
                return Err(SessionFileError::Io {
                    path: session_file,
                    source,
                }
                .into());
            }
        };

        Ok(Self {
            config: config.clone(),
            client,
            session,
            session_file,
        })
    }

    /// Write the live cookies back to the session file.
    pub async fn save(&self) -> Result<(), SessionFileError> {
        let json = serde_json::to_string_pretty(&self.session.snapshot()).map_err(|source| {
            SessionFileError::Corrupt {
                path: self.session_file.clone(),
                source,
            }
        })?;
        tokio::fs::write(&self.session_file, json)
            .await
            .map_err(|source| SessionFileError::Io {
                path: self.session_file.clone(),
                source,
            })
    }

    pub fn cart(&self) -> CartStore {
        CartStore::new(
            self.client.clone(),
            self.session.clone(),
            self.config.delivery_fee,
        )
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.client.clone(), self.session.clone())
    }
}
