//! PasswordHasher trait definition.
//!
//! Keeps the concrete hashing scheme (argon2id in agrilink-infra) out of
//! the service layer.

use agrilink_types::error::IdentityError;

/// Password hashing seam.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing PHC string.
    fn hash(&self, password: &str) -> Result<String, IdentityError>;

    /// Verify a plaintext password against a stored hash.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, IdentityError>;
}
