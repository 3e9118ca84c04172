//! Credential verification
//!
//! Passwords are never stored or compared in plaintext. The default
//! verifier stores `sha256$<hex>` digests salted with the user's
//! identification.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SHA256_PREFIX: &str = "sha256$";

/// Pluggable password hashing/verification
pub trait CredentialVerifier: Send + Sync {
    /// Produce the value stored in `users.password_hash`
    fn hash(&self, identification: &str, password: &str) -> String;

    /// Check a login attempt against the stored value
    fn verify(&self, identification: &str, password: &str, stored: &str) -> bool;
}

/// Salted SHA-256 verifier
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Verifier;

impl Sha256Verifier {
    fn digest(identification: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(identification.as_bytes());
        hasher.update(b":");
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl CredentialVerifier for Sha256Verifier {
    fn hash(&self, identification: &str, password: &str) -> String {
        format!("{}{}", SHA256_PREFIX, Self::digest(identification, password))
    }

    fn verify(&self, identification: &str, password: &str, stored: &str) -> bool {
        let Some(expected) = stored.strip_prefix(SHA256_PREFIX) else {
            return false;
        };
        let actual = Self::digest(identification, password);
        expected.as_bytes().ct_eq(actual.as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let verifier = Sha256Verifier;
        let stored = verifier.hash("1020304050", "s3cret!");

        assert!(stored.starts_with("sha256$"));
        assert!(!stored.contains("s3cret!"));
        assert!(verifier.verify("1020304050", "s3cret!", &stored));
        assert!(!verifier.verify("1020304050", "wrong", &stored));
    }

    #[test]
    fn test_salted_by_identification() {
        let verifier = Sha256Verifier;
        assert_ne!(
            verifier.hash("1001", "password"),
            verifier.hash("1002", "password")
        );
        // A hash stored for one user does not open another
        let stored = verifier.hash("1001", "password");
        assert!(!verifier.verify("1002", "password", &stored));
    }

    #[test]
    fn test_plaintext_never_matches() {
        let verifier = Sha256Verifier;
        assert!(!verifier.verify("1001", "password", "password"));
    }

    #[test]
    fn test_truncated_or_altered_digest_rejected() {
        let verifier = Sha256Verifier;
        let stored = verifier.hash("1001", "password");

        let truncated = &stored[..stored.len() - 1];
        assert!(!verifier.verify("1001", "password", truncated));
        assert!(!verifier.verify("1001", "password", "sha256$"));

        let mut altered = stored.clone();
        let last = if altered.ends_with('0') { '1' } else { '0' };
        altered.pop();
        altered.push(last);
        assert!(!verifier.verify("1001", "password", &altered));
    }
}
