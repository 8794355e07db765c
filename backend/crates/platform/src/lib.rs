//! Platform Crate - Technical Infrastructure
//!
//! Primitives the credential core consumes as opaque capabilities:
//! - Password hashing (Argon2id, peppered, NFKC-normalized)
//! - Password length policy shared by the HTTP boundary

pub mod password;
