use rand::RngCore;
use sha2::{Digest, Sha256};

/// Turns a plaintext credential into the opaque string stored on the record.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, secret: &str) -> String;
    fn verify(&self, secret: &str, stored: &str) -> bool;
}

/// Salted SHA-256, stored as `hex(salt)$hex(digest)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

const SALT_LEN: usize = 16;

fn digest(salt: &[u8], secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl CredentialHasher for Sha256Hasher {
    fn hash(&self, secret: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        format!("{}${}", hex::encode(salt), digest(&salt, secret))
    }

    fn verify(&self, secret: &str, stored: &str) -> bool {
        let Some((salt_hex, expected)) = stored.split_once('$') else {
            return false;
        };
        match hex::decode(salt_hex) {
            Ok(salt) => digest(&salt, secret) == expected,
            Err(_) => false,
        }
    }
}
