//! Credential tokens.
//!
//! A token is 16 random bytes rendered as URL-safe base64 without padding,
//! which always yields 22 characters. Only the SHA-256 hash of the plaintext
//! is ever stored.

use std::fmt;
use std::time::{Duration, SystemTime};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Random bytes per token.
pub const TOKEN_BYTES: usize = 16;

/// Length of the encoded plaintext.
pub const TOKEN_LENGTH: usize = 22;

pub type TokenHash = [u8; 32];

/// Purpose a token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Authentication,
    Activation,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Authentication => "authentication",
            TokenScope::Activation => "activation",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored form of an issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub hash: TokenHash,
    pub user_id: i64,
    pub expiry: SystemTime,
    pub scope: TokenScope,
}

impl Token {
    /// Issue a fresh token. Returns the plaintext (handed to the client once)
    /// alongside the record to store.
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> (String, Token) {
        let bytes: [u8; TOKEN_BYTES] = rand::random();
        let plaintext = URL_SAFE_NO_PAD.encode(bytes);
        let token = Token::from_plaintext(&plaintext, user_id, SystemTime::now() + ttl, scope);
        (plaintext, token)
    }

    /// Build the stored record for an existing plaintext.
    pub fn from_plaintext(plaintext: &str, user_id: i64, expiry: SystemTime, scope: TokenScope) -> Self {
        Self {
            hash: hash_plaintext(plaintext),
            user_id,
            expiry,
            scope,
        }
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expiry <= now
    }
}

pub fn hash_plaintext(plaintext: &str) -> TokenHash {
    let digest = Sha256::digest(plaintext.as_bytes());
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&digest);
    hash
}

/// Same constraints as generation: exact length, canonical encoding.
pub fn is_well_formed(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LENGTH
        && URL_SAFE_NO_PAD
            .decode(plaintext)
            .is_ok_and(|bytes| bytes.len() == TOKEN_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed() {
        for _ in 0..32 {
            let (plaintext, token) = Token::generate(1, Duration::from_secs(60), TokenScope::Authentication);
            assert_eq!(plaintext.len(), TOKEN_LENGTH);
            assert!(is_well_formed(&plaintext), "{plaintext}");
            assert_eq!(token.hash, hash_plaintext(&plaintext));
            assert!(!token.is_expired_at(SystemTime::now()));
        }
    }

    #[test]
    fn generated_tokens_differ() {
        let (a, _) = Token::generate(1, Duration::from_secs(60), TokenScope::Authentication);
        let (b, _) = Token::generate(1, Duration::from_secs(60), TokenScope::Authentication);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_malformed_plaintext() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("short"));
        // right length, but '+' and '/' are outside the URL-safe alphabet
        assert!(!is_well_formed("abcdefghij+/abcdefghij"));
        // 23 characters
        assert!(!is_well_formed("AAAAAAAAAAAAAAAAAAAAAAA"));
        // non-zero trailing bits are not a canonical encoding
        assert!(!is_well_formed("AAAAAAAAAAAAAAAAAAAAAB"));
        assert!(is_well_formed("AAAAAAAAAAAAAAAAAAAAAA"));
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = SystemTime::now();
        let token = Token::from_plaintext("AAAAAAAAAAAAAAAAAAAAAA", 1, now, TokenScope::Activation);
        assert!(token.is_expired_at(now));
        assert!(!token.is_expired_at(now - Duration::from_secs(1)));
    }

    #[test]
    fn scope_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TokenScope::Authentication).unwrap(), "\"authentication\"");
        assert_eq!(TokenScope::Activation.to_string(), "activation");
    }
}
