//! Credential hashing with Argon2id. The raw password is hashed with a fresh
//! per-user salt; the PHC-format hash string and the salt are what gets
//! stored, never the raw value.

use crate::error::{CrudkitError, Result};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hash a raw password with a freshly generated salt.
/// Returns `(hash, salt)`, both in their string forms.
pub fn hash_password(raw: &str) -> Result<(String, String)> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|err| CrudkitError::Password(err.to_string()))?;
    Ok((hash.to_string(), salt.as_str().to_string()))
}

/// Verify a raw password against a stored PHC hash string.
/// Constant-time; a mismatch is `Ok(false)`, not an error.
pub fn verify_password(raw: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| CrudkitError::Password(err.to_string()))?;
    match Argon2::default().verify_password(raw.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(CrudkitError::Password(err.to_string())),
    }
}
