//! Registered users and password hashing
use super::error::{LedgerError, LedgerResult};
use super::timestamp;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MIN_PASSWORD_LEN: usize = 4;
const SALT_LEN: usize = 16;

/// `hex(SHA-256(password ++ salt))`
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn validate_password(password: &str) -> LedgerResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LedgerError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    user_id: u64,
    username: String,
    hashed_password: String,
    salt: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    registration_date: DateTime<Utc>,
}

impl User {
    pub fn new(user_id: u64, username: &str, password: &str) -> LedgerResult<Self> {
        if username.trim().is_empty() {
            return Err(LedgerError::EmptyUsername);
        }
        validate_password(password)?;
        let salt = generate_salt();
        Ok(Self {
            user_id,
            username: username.to_string(),
            hashed_password: hash_password(password, &salt),
            salt,
            registration_date: Utc::now(),
        })
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn registration_date(&self) -> DateTime<Utc> {
        self.registration_date
    }

    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(password, &self.salt) == self.hashed_password
    }

    /// Replaces the hash, keeping the existing salt.
    pub fn change_password(&mut self, new_password: &str) -> LedgerResult<()> {
        validate_password(new_password)?;
        self.hashed_password = hash_password(new_password, &self.salt);
        Ok(())
    }
}
