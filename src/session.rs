//! Credential domain models: redacted secrets, stored pairs, and the legacy user record.

pub mod credentials;
pub mod secret;

pub use credentials::*;
pub use secret::*;
