//! Core types for RedSeam.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart_key;
pub mod email;
pub mod id;
pub mod price;

pub use cart_key::{CartKeyError, CartLineKey};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
