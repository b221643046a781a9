//! Router Module Index
//!
//! Routes are split by access level so the authentication layer is applied
//! once, at the module boundary, instead of per handler.

/// Routes reachable without a token.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
pub mod authenticated;
