//! Token Module
//!
//! Signs and verifies the access/refresh token pair.

pub mod claims;
pub mod issuer;

pub use claims::{AccessClaims, RefreshClaims, TokenSubject, REFRESH_TOKEN_TYPE};
pub use issuer::{TokenError, TokenIssuer};
