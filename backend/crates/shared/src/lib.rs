//! Shared Kernel - Domain-crossing minimal core
//!
//! This crate contains the vocabulary every other crate agrees on:
//! - The error classification and the problem-details error type
//! - Typed numeric identifiers for store-assigned keys
//!
//! Nothing in here knows about credentials, tokens or databases.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
