use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

fn argon2_failure(op: &'static str, e: password_hash::Error) -> anyhow::Error {
    error!(error = %e, op, "argon2 failure");
    anyhow::anyhow!("argon2 {op}: {e}")
}

/// PHC string with a fresh random salt; stored in `users.password_hash`.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| argon2_failure("hash", e))
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| argon2_failure("parse", e))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(argon2_failure("verify", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_password_verifies() {
        let hash = hash_password("testpass123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(!hash.contains("testpass123"));
        assert!(verify_password("testpass123", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("newpw123").unwrap();
        let b = hash_password("newpw123").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("newpw123", &a).unwrap());
        assert!(verify_password("newpw123", &b).unwrap());
    }

    #[test]
    fn old_password_fails_after_change() {
        let hash = hash_password("newpw123").unwrap();
        assert!(!verify_password("testpass123", &hash).unwrap());
    }

    #[test]
    fn corrupt_stored_hash_is_an_error() {
        let err = verify_password("testpass123", "plaintext-in-db").unwrap_err();
        assert!(err.to_string().contains("argon2 parse"));
    }
}
