use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

/// Salted password hash as persisted on the user row.
///
/// `hash` is the argon2 PHC string; `salt` is the salt it was derived with,
/// kept in its own column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub hash: String,
    pub salt: String,
}

/// Hash `plain` with a freshly generated salt.
pub fn generate_credential(plain: &str) -> anyhow::Result<Credential> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(Credential {
        hash,
        salt: salt.as_str().to_owned(),
    })
}

/// Re-derive the hash of `plain` from the stored salt and parameters and
/// compare it with the stored one. The digest comparison is constant-time.
pub fn verify_password(plain: &str, stored: &Credential) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(&stored.hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;

    if parsed.salt.map(|s| s.as_str()) != Some(stored.salt.as_str()) {
        warn!("stored salt does not match hash");
        return Ok(false);
    }

    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// [`generate_credential`] on the blocking pool. Must be awaited before the
/// write that persists the result.
pub async fn derive_credential(plain: String) -> anyhow::Result<Credential> {
    tokio::task::spawn_blocking(move || generate_credential(&plain)).await?
}

/// [`verify_password`] on the blocking pool.
pub async fn check_password(plain: String, stored: Credential) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, &stored)).await?
}
