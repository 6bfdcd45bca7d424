//! Invite code codec.
//!
//! Defines the wire format of the bearer secret: a fixed-length string
//! drawn from an unambiguous base-57 alphabet (base-62 with `0 O 1 l I`
//! removed), generated from a cryptographically secure RNG.
//!
//! # Security
//!
//! - 12 characters over 57 symbols is ~70 bits of entropy; the birthday
//!   collision probability at 10^6 issued codes is on the order of 1e-9.
//! - The alphabet is URL-safe, so codes can be embedded in links without
//!   escaping.
//! - Format validation happens here, before any storage lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Characters allowed in an invite code.
///
/// Base-62 with visually confusable glyphs removed: no `0`/`O`, no
/// `1`/`l`/`I`. 57 symbols total.
const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Fixed length of every invite code.
pub const CODE_LEN: usize = 12;

/// A well-formed invite code.
///
/// Construction goes through [`InviteCode::generate`] or
/// [`InviteCode::parse`], so holding an `InviteCode` implies the string
/// already passed the length/alphabet pre-check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InviteCode(String);

impl InviteCode {
    /// Generate a new random invite code.
    ///
    /// Uses the thread-local CSPRNG. Infallible in practice; RNG
    /// exhaustion aborts the process, which is the intended behavior for
    /// a failed entropy source.
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        let code: String = (0..CODE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Validate a raw string as an invite code.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidCodeFormat` if the length or alphabet
    /// does not match. The error carries no detail about which check
    /// failed.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.len() != CODE_LEN {
            return Err(CoreError::InvalidCodeFormat);
        }
        if !raw.bytes().all(|b| ALPHABET.contains(&b)) {
            return Err(CoreError::InvalidCodeFormat);
        }
        Ok(Self(raw.to_string()))
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InviteCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InviteCode> for String {
    fn from(code: InviteCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_length_and_alphabet() {
        for _ in 0..100 {
            let code = InviteCode::generate();
            assert_eq!(code.as_str().len(), CODE_LEN);
            assert!(code.as_str().bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_no_ambiguous_characters() {
        for _ in 0..1000 {
            let code = InviteCode::generate();
            for forbidden in ['0', 'O', '1', 'l', 'I'] {
                assert!(!code.as_str().contains(forbidden));
            }
        }
    }

    #[test]
    fn test_generate_uniqueness() {
        // Birthday bound at this length/alphabet makes a collision in
        // 10_000 draws effectively impossible.
        let codes: HashSet<String> = (0..10_000)
            .map(|_| InviteCode::generate().as_str().to_string())
            .collect();
        assert_eq!(codes.len(), 10_000);
    }

    #[test]
    fn test_parse_valid() {
        let code = InviteCode::generate();
        let reparsed = InviteCode::parse(code.as_str()).unwrap();
        assert_eq!(code, reparsed);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(InviteCode::parse("abc").is_err());
        assert!(InviteCode::parse("").is_err());
        assert!(InviteCode::parse(&"a".repeat(CODE_LEN + 1)).is_err());
    }

    #[test]
    fn test_parse_rejects_ambiguous_glyphs() {
        assert!(InviteCode::parse("O00000000000").is_err());
        assert!(InviteCode::parse("llllllllllll").is_err());
        assert!(InviteCode::parse("IIIIIIIIIIII").is_err());
    }

    #[test]
    fn test_parse_rejects_non_alphanumeric() {
        assert!(InviteCode::parse("abc/def?ghij").is_err());
        assert!(InviteCode::parse("abcdefghijk ").is_err());
        // Multi-byte input must not panic the byte-level checks.
        assert!(InviteCode::parse("abcdefghijké").is_err());
    }

    #[test]
    fn test_url_safety() {
        let code = InviteCode::generate();
        assert!(
            code.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let code = InviteCode::generate();
        let json = serde_json::to_string(&code).unwrap();
        let back: InviteCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }

    #[test]
    fn test_serde_rejects_malformed() {
        let result: Result<InviteCode, _> = serde_json::from_str("\"not valid!\"");
        assert!(result.is_err());
    }
}
