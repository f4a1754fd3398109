use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::{
    config::{ConfigError, PasswordConfig},
    error::{AppError, AppResult},
};

/// Salted Argon2id hashing with configurable cost.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    // hash of a random secret at the configured cost, checked against on
    // unknown-email logins
    decoy: String,
}

impl PasswordHasher {
    pub fn new(cfg: PasswordConfig) -> Result<Self, ConfigError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| ConfigError::Invalid {
                var: "ARGON2_MEMORY_KIB",
                reason: e.to_string(),
            })?;
        let mut hasher = Self {
            params,
            decoy: String::new(),
        };
        hasher.decoy = hasher
            .hash(SaltString::generate(&mut OsRng).as_str())
            .map_err(|e| ConfigError::Invalid {
                var: "ARGON2_MEMORY_KIB",
                reason: e.to_string(),
            })?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                AppError::Internal("password hashing failed".into())
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
    ///
    /// Verification uses the parameters embedded in the stored hash, so raising
    /// the cost does not lock out existing users.
    pub fn verify(&self, plain: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            AppError::Internal("stored password hash is malformed".into())
        })?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Spends the same work as [`verify`](Self::verify) without a real hash,
    /// so a missing account costs as much as a wrong password.
    pub fn verify_decoy(&self, plain: &str) {
        let _ = self.verify(plain, &self.decoy);
    }
}
