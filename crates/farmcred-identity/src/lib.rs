//! # farmcred-identity
//!
//! National identity (NIN) and bank verification number (BVN) checks against
//! the external verification APIs, plus the local format rules applied before
//! any request leaves the process.

pub mod client;
pub mod error;
pub mod format;

pub use client::{IdentityCheck, IdentityClient, IdentityConfig, IdentityKind};
pub use error::IdentityError;
pub use format::{is_valid_identity_number, is_valid_nigerian_phone, normalize_nigerian_phone};
