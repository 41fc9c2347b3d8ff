//! Credential primitives for storeapi.
//!
//! Passwords are stored as salted Argon2id hashes. Bearer tokens are HS256
//! JWTs bound to a subject and a purpose, so an account-confirmation link can
//! never be replayed as an access token.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{TokenError, TokenPurpose, TokenService};
