use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use crate::error::{Error, Result};

const ARGON2_MEMORY: u32 = 64 * 1024; // 64KB
const ARGON2_ITERATIONS: u32 = 1;
const ARGON2_PARALLELISM: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

const TOKEN_PREFIX: &str = "enroll";
const LOOKUP_LENGTH: usize = 8;
const SECRET_BYTES: usize = 12;
const SECRET_LENGTH: usize = SECRET_BYTES * 2;

/// Issues and checks bearer tokens of the form `enroll_<lookup>_<secret>`.
///
/// Only an argon2id hash of the full token is stored; the lookup part is kept
/// in clear to find the row.
pub struct TokenGenerator {
    argon2: Argon2<'static>,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenGenerator {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("invalid argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Returns (raw_token, lookup, hash)
    pub fn generate(&self) -> Result<(String, String, String)> {
        let lookup = uuid::Uuid::new_v4().simple().to_string()[..LOOKUP_LENGTH].to_string();
        let mut secret = [0u8; SECRET_BYTES];
        rand::thread_rng().fill(&mut secret);

        let raw_token = format!("{TOKEN_PREFIX}_{lookup}_{}", hex::encode(secret));
        let hash = self.hash(&raw_token)?;
        Ok((raw_token, lookup, hash))
    }

    pub fn hash(&self, token: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(token.as_bytes(), &salt)
            .map_err(|e| Error::Config(format!("failed to hash token: {e}")))?;
        Ok(hash.to_string())
    }

    pub fn verify(&self, token: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Config(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(token.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Config(format!("failed to verify token: {e}"))),
        }
    }
}

/// Splits a raw token into (lookup, secret).
pub fn parse_token(token: &str) -> Result<(String, String)> {
    let rest = token
        .strip_prefix(TOKEN_PREFIX)
        .and_then(|r| r.strip_prefix('_'))
        .ok_or(Error::InvalidTokenFormat)?;

    let (lookup, secret) = rest.split_once('_').ok_or(Error::InvalidTokenFormat)?;

    if lookup.len() != LOOKUP_LENGTH || secret.len() != SECRET_LENGTH || secret.contains('_') {
        return Err(Error::InvalidTokenFormat);
    }

    Ok((lookup.to_string(), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation_format() {
        let generator = TokenGenerator::new();
        let (token, lookup, _hash) = generator.generate().unwrap();

        assert!(token.starts_with("enroll_"));
        assert_eq!(lookup.len(), 8);

        let parts: Vec<&str> = token.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], lookup);
        assert_eq!(parts[2].len(), 24);
    }

    #[test]
    fn test_generated_token_parses() {
        let generator = TokenGenerator::new();
        let (token, lookup, _) = generator.generate().unwrap();
        let (parsed_lookup, _) = parse_token(&token).unwrap();
        assert_eq!(parsed_lookup, lookup);
    }

    #[test]
    fn test_token_verification() {
        let generator = TokenGenerator::new();
        let (token, _, hash) = generator.generate().unwrap();

        assert!(generator.verify(&token, &hash).unwrap());

        let wrong_token = format!("{}00000", &token[..token.len() - 5]);
        assert!(!generator.verify(&wrong_token, &hash).unwrap());
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_parse_token_rejects_bad_shapes() {
        assert!(parse_token("enroll_12345678_123456789012345678901234").is_ok());
        assert!(parse_token("invalid_12345678_123456789012345678901234").is_err());
        assert!(parse_token("enroll_12345678").is_err());
        assert!(parse_token("enroll_1234_123456789012345678901234").is_err());
        assert!(parse_token("enrollx12345678_123456789012345678901234").is_err());
    }
}
