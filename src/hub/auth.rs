//! Password hashing, session tokens and signup validation.
//!
//! Stored hashes have the form `sha256$<iterations>$<salt hex>$<digest hex>`.

use sha2::{Digest, Sha256};

use crate::config::AuthSection;
use crate::errors::HubError;

const SCHEME: &str = "sha256";
const ITERATIONS: u32 = 10_000;

fn digest(salt: &[u8], password: &str, iterations: u32) -> [u8; 32] {
    let mut out: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();
    for _ in 1..iterations {
        out = Sha256::new()
            .chain_update(salt)
            .chain_update(out)
            .finalize()
            .into();
    }
    out
}

pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4();
    let hash = digest(salt.as_bytes(), password, ITERATIONS);
    format!(
        "{SCHEME}${ITERATIONS}${}${}",
        hex::encode(salt.as_bytes()),
        hex::encode(hash)
    )
}

/// `false` for a wrong password or a malformed stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let actual = digest(&salt, password, iterations);
    // Compare without short-circuiting on the first mismatch.
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// A fresh opaque bearer token.
pub fn new_session_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Sessions are stored by token digest so a leaked database does not leak
/// usable tokens.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Check a signup request, returning the normalized `(email, name)`.
pub fn validate_signup(
    email: &str,
    password: &str,
    name: &str,
    rules: &AuthSection,
) -> Result<(String, String), HubError> {
    let email = email.trim().to_lowercase();
    let name = name.trim().to_string();
    if email.is_empty() || password.is_empty() || name.is_empty() {
        return Err(HubError::invalid("Email, password, and name are required"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(HubError::invalid("Invalid email address"));
    };
    if local.is_empty() || domain.is_empty() {
        return Err(HubError::invalid("Invalid email address"));
    }
    if !rules.allows_domain(domain) {
        return Err(HubError::invalid(format!(
            "Signup is only allowed with these email domains: {}",
            rules.allowed_email_domains.join(", ")
        )));
    }
    if password.chars().count() < rules.min_password_len {
        return Err(HubError::invalid(format!(
            "Password must be at least {} characters",
            rules.min_password_len
        )));
    }
    Ok((email, name))
}

/// Loose `local@domain.tld` shape check used for invitations.
pub fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !email.contains(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    }
}
