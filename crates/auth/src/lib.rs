//! `facturo-auth`: authentication boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows how to
//! model users, hash and verify passwords, and issue/validate bearer tokens.

pub mod claims;
pub mod jwt;
pub mod password;
pub mod user;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtIssuer, JwtValidator, TokenError, DEFAULT_TOKEN_TTL_SECS};
pub use password::{Argon2PasswordHasher, PasswordError, PasswordHasher};
pub use user::{NewUser, User, UserChanges, UserProfile, validate_email, validate_user_name};
