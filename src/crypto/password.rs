use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{AppError, Result};

/// Argon2id memory cost in KiB (19 MiB).
const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

fn hasher() -> Result<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| AppError::Hashing(format!("Invalid Argon2 parameters: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password into a PHC string (algorithm, parameters and salt
/// included), so [`verify_password`] needs nothing else.
pub fn hash_password(password: &str) -> Result<String> {
    let secret = Zeroizing::new(password.as_bytes().to_vec());
    let salt = SaltString::generate(&mut OsRng);

    let phc = hasher()?
        .hash_password(&secret, &salt)
        .map_err(|e| AppError::Hashing(format!("Argon2 hash error: {}", e)))?
        .to_string();

    tracing::debug!("🔒 Password hashed");
    Ok(phc)
}

/// Checks a password against a stored PHC string.
///
/// A mismatch is `Ok(false)`; a hash that cannot be parsed is an error.
pub fn verify_password(password: &str, phc: &str) -> Result<bool> {
    let secret = Zeroizing::new(password.as_bytes().to_vec());
    let parsed = PasswordHash::new(phc)
        .map_err(|e| AppError::Hashing(format!("Stored hash is malformed: {}", e)))?;

    // Parameters are read from the PHC string, not from `hasher()`.
    Ok(hasher()?.verify_password(&secret, &parsed).is_ok())
}
