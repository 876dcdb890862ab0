//! Password hashing (DESIGN.md's Open Question decision #3, spec §9): the
//! teacher source never specifies a scheme (`driver.c`'s `STATE_GET_PASSWORD`
//! handler literally has `/* TODO: Verify password hash */` and accepts
//! anything). This driver hashes with SHA-256 over the password bytes plus
//! a fixed per-install pepper (`amlp-config::Config::password_pepper`),
//! following the teacher's preference for a standard hashing crate
//! (`sha1` is already in the stack for the WebSocket handshake; `sha2` is
//! its natural sibling) over a hand-rolled KDF.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `pepper || password`. Order matches the pepper
/// acting as a fixed prefix salt; both sides of a comparison must use the
/// same pepper, which is exactly what `Config::password_pepper` supplies.
pub fn hash_password(password: &str, pepper: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pepper.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

pub fn verify_password(password: &str, pepper: &str, expected_hash: &str) -> bool {
    hash_password(password, pepper) == expected_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_password_and_pepper_hash_identically() {
        let a = hash_password("hunter2", "pepper");
        let b = hash_password("hunter2", "pepper");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_peppers_produce_different_hashes() {
        assert_ne!(hash_password("hunter2", "pepper-a"), hash_password("hunter2", "pepper-b"));
    }

    #[test]
    fn verify_round_trips() {
        let hash = hash_password("correct horse", "pepper");
        assert!(verify_password("correct horse", "pepper", &hash));
        assert!(!verify_password("wrong", "pepper", &hash));
    }
}
