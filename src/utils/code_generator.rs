//! Short code generation.
//!
//! Codes are drawn uniformly with replacement from a fixed 62-character
//! alphabet. Collisions are resolved by the stores, not here.

use rand::Rng;

/// Length of every short code issued by the stores.
pub const SHORT_CODE_LENGTH: usize = 8;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random alphanumeric code of exactly `length` characters.
///
/// Uses the thread-local RNG; not suitable where unpredictability matters.
///
/// # Examples
///
/// ```ignore
/// let code = generate_code(SHORT_CODE_LENGTH);
/// assert_eq!(code.len(), 8);
/// assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();

    (0..length)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_charset_has_62_distinct_symbols() {
        let distinct: HashSet<_> = CHARSET.iter().collect();
        assert_eq!(CHARSET.len(), 62);
        assert_eq!(distinct.len(), 62);
    }

    #[test]
    fn test_generate_code_has_requested_length() {
        assert_eq!(generate_code(SHORT_CODE_LENGTH).len(), 8);
        assert_eq!(generate_code(1).len(), 1);
        assert_eq!(generate_code(32).len(), 32);
    }

    #[test]
    fn test_generate_code_zero_length() {
        assert!(generate_code(0).is_empty());
    }

    #[test]
    fn test_generate_code_alphanumeric_only() {
        for _ in 0..100 {
            let code = generate_code(SHORT_CODE_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_generate_code_produces_unique_codes() {
        let codes: HashSet<String> = (0..1000)
            .map(|_| generate_code(SHORT_CODE_LENGTH))
            .collect();

        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn test_generate_code_uses_all_character_classes() {
        let sample: String = (0..200).map(|_| generate_code(SHORT_CODE_LENGTH)).collect();

        assert!(sample.chars().any(|c| c.is_ascii_lowercase()));
        assert!(sample.chars().any(|c| c.is_ascii_uppercase()));
        assert!(sample.chars().any(|c| c.is_ascii_digit()));
    }
}
