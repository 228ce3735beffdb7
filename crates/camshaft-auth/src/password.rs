// Credential hashing
//
// Argon2id with a fresh random salt per hash. The encoded hash string
// carries its own parameters and salt, so verification needs no shared
// configuration with the writer.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("could not derive password hash: {0}")]
    Derive(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Derive the Argon2id hash to store for `password`
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Derive(err.to_string()))
}

/// Check `password` against a stored hash
///
/// A wrong password is `Ok(false)`; only an unparseable stored hash is an
/// error, since that means the users table holds something we never wrote.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(stored).map_err(|err| PasswordError::MalformedHash(err.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
