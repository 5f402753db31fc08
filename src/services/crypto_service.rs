//! Password hashing and token generation for the local auth backend.

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use zeroize::Zeroizing;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::types::errors::CryptoError;

/// Salt length in bytes for PBKDF2.
const SALT_LENGTH: usize = 16;

/// Derived hash length in bytes.
const HASH_LENGTH: usize = 32;

/// Random bytes behind each reset token.
const TOKEN_LENGTH: usize = 32;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

/// A salted password hash as stored in `auth_users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
}

/// Trait defining the cryptographic operations the auth backend needs.
pub trait CryptoServiceTrait {
    /// Hashes a password with a fresh random salt.
    fn hash_password(&self, password: &str) -> Result<PasswordHash, CryptoError>;

    /// Verifies a password against a stored salt and hash in constant time.
    fn verify_password(&self, password: &str, salt: &[u8], hash: &[u8]) -> bool;

    /// Generates an unguessable URL-safe token.
    fn generate_token(&self) -> Result<String, CryptoError>;
}

/// `ring`-backed implementation of [`CryptoServiceTrait`].
pub struct CryptoService {
    rng: SystemRandom,
    iterations: NonZeroU32,
}

impl CryptoService {
    /// Creates a CryptoService deriving hashes with the given PBKDF2 iteration count.
    pub fn new(iterations: u32) -> Result<Self, CryptoError> {
        let iterations = NonZeroU32::new(iterations)
            .ok_or_else(|| CryptoError::KeyDerivation("Invalid iteration count".to_string()))?;
        Ok(Self {
            rng: SystemRandom::new(),
            iterations,
        })
    }

    fn random_bytes(&self, length: usize) -> Result<Vec<u8>, CryptoError> {
        let mut bytes = vec![0u8; length];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| CryptoError::RandomGeneration("System RNG failed".to_string()))?;
        Ok(bytes)
    }
}

impl CryptoServiceTrait for CryptoService {
    fn hash_password(&self, password: &str) -> Result<PasswordHash, CryptoError> {
        let salt = self.random_bytes(SALT_LENGTH)?;

        // Wiped on drop; only the copy handed to the caller survives.
        let mut derived = Zeroizing::new(vec![0u8; HASH_LENGTH]);
        pbkdf2::derive(
            PBKDF2_ALG,
            self.iterations,
            &salt,
            password.as_bytes(),
            &mut derived,
        );

        Ok(PasswordHash {
            salt,
            hash: derived.to_vec(),
        })
    }

    fn verify_password(&self, password: &str, salt: &[u8], hash: &[u8]) -> bool {
        pbkdf2::verify(PBKDF2_ALG, self.iterations, salt, password.as_bytes(), hash).is_ok()
    }

    fn generate_token(&self) -> Result<String, CryptoError> {
        let bytes = Zeroizing::new(self.random_bytes(TOKEN_LENGTH)?);
        Ok(URL_SAFE_NO_PAD.encode(bytes.as_slice()))
    }
}
