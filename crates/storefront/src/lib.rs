//! RedSeam Storefront library.
//!
//! Typed async client for the RedSeam commerce API. The pieces fit together
//! like this:
//!
//! - [`api::ApiClient`] speaks HTTP to the remote API and maps responses to
//!   typed values or [`error::ApiError`]
//! - [`session::SessionCookies`] holds the `token` and `user` cookies the API
//!   client authenticates with
//! - [`cart::CartStore`] mirrors the remote cart in memory, keyed by
//!   [`redseam_core::CartLineKey`]
//! - [`catalog`] covers product listing queries and pagination
//! - [`services::auth::AuthService`] signs users in, up and out
//! - [`forms`] validates user input before it reaches the API

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod forms;
pub mod services;
pub mod session;

pub use api::ApiClient;
pub use cart::CartStore;
pub use config::StorefrontConfig;
pub use error::{ApiError, Result};
pub use session::SessionCookies;
