//! Salted password hashes.

use rand::RngCore;
use ring::{constant_time, digest};

const SALT_LEN: usize = 16;


/// A fresh random salt, base64 encoded.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    base64::encode(salt)
}

/// SHA-512 over `username|password|salt`, base64 encoded.
pub fn hash(username: &str, password: &str, salt: &str) -> String {
    let input = format!("{}|{}|{}", username, password, salt);
    let digest = digest::digest(&digest::SHA512, input.as_bytes());
    base64::encode(digest.as_ref())
}

pub fn verify(username: &str, password: &str, salt: &str, expected_hash: &str) -> bool {
    let actual = hash(username, password, salt);
    constant_time::verify_slices_are_equal(actual.as_bytes(), expected_hash.as_bytes()).is_ok()
}
