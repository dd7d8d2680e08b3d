//! Account services built on the API client.
//!
//! - [`auth`] - Sign-in, sign-up and sign-out against the commerce API

pub mod auth;
