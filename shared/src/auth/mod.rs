//! # Authentication and Authorization Module
//!
//! Credential primitives and principal resolution shared by every service
//! in this workspace.
//!
//! ## Module Structure
//!
//! ```text
//! auth/
//! ├── jwt.rs        - access/ID token signing and verification
//! ├── password.rs   - Argon2id password hashing
//! ├── api_key.rs    - PBKDF2-HMAC-SHA256 API-key hashing
//! └── middleware.rs - Principal resolution (JWT / API key / session)
//! ```
//!
//! ## Overview
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`JwtService`] | Sign and verify access/ID tokens ([RFC 7519](https://tools.ietf.org/html/rfc7519)) |
//! | [`PasswordHasher`] | Argon2id password hashing ([OWASP guidance](https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html)) |
//! | [`api_key`] | API-key generation/verification |
//! | [`PrincipalResolver`] / [`Principal`] | Ordered-matcher credential resolution |

pub mod api_key;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtService, TokenType};
pub use middleware::{
    ApiKeyCandidate, ApiKeyPrincipal, Principal, PrincipalApiKeyStore, PrincipalResolver,
    PrincipalSessionStore, PrincipalUserStore, UserPrincipal,
};
pub use password::PasswordHasher;
