//! Registry credentials handed back to callers, plus the redacting secret wrapper they carry.

pub mod authenticator;
pub mod secret;

pub use authenticator::*;
pub use secret::*;
