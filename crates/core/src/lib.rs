//! RedSeam Core - Shared types library.
//!
//! This crate provides common types used across all RedSeam components:
//! - `storefront` - Client library for the remote commerce API
//! - `cli` - Command-line front end over the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and cart line keys

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
