//! State-key tokenization.
//!
//! State keys are colon-separated: a domain prefix (or a leading address for
//! the currency domain), sub-identifiers, and a trailing kind marker, e.g.
//! `storage:<contract>:<data_key>:data`. Parsers enforce the expected token
//! count; a mismatch is a key-shape violation that aborts Prepare.

use shared_types::StateKey;

use crate::error::EngineError;

/// Splits a prefixed key into exactly `parts` tokens.
///
/// `tokens[0]` must equal `prefix`; sub-identifiers follow in order.
pub fn parse_state_key<'a>(
    key: &'a StateKey,
    prefix: &str,
    parts: usize,
) -> Result<Vec<&'a str>, EngineError> {
    let tokens: Vec<&str> = key.as_str().split(':').collect();
    if tokens.len() != parts || tokens[0] != prefix {
        return Err(EngineError::KeyShape {
            key: key.as_str().to_string(),
            expected: parts,
            found: tokens.len(),
        });
    }
    Ok(tokens)
}

/// Splits a suffix-marked key (currency domain shapes like
/// `<address>:account`) into exactly `parts` tokens.
pub fn parse_suffixed_key<'a>(
    key: &'a StateKey,
    suffix: &str,
    parts: usize,
) -> Result<Vec<&'a str>, EngineError> {
    let tokens: Vec<&str> = key.as_str().split(':').collect();
    if tokens.len() != parts || tokens[parts - 1] != suffix {
        return Err(EngineError::KeyShape {
            key: key.as_str().to_string(),
            expected: parts,
            found: tokens.len(),
        });
    }
    Ok(tokens)
}

/// Whether the key's first token equals `prefix`.
pub fn has_prefix(key: &StateKey, prefix: &str) -> bool {
    key.as_str().split(':').next() == Some(prefix)
}

/// Whether the key's last token equals `suffix`.
pub fn has_suffix(key: &StateKey, suffix: &str) -> bool {
    key.as_str().rsplit(':').next() == Some(suffix)
}

/// Token count of the key.
pub fn part_count(key: &StateKey) -> usize {
    key.as_str().split(':').count()
}
