//! Base-62 text encoding for 64-bit hash blocks.
//!
//! The alphabet is digits, then uppercase, then lowercase. Encoding produces
//! the shortest representation (no leading zeros), and zero encodes as `"0"`.

use crate::error::CodecError;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const BASE: u64 = 62;

/// Longest encoding of a u64 (`u64::MAX` is 11 base-62 digits).
const MAX_DIGITS: usize = 11;

/// Encode an unsigned 64-bit integer as base-62 text.
pub fn encode(mut value: u64) -> String {
    if value == 0 {
        return (ALPHABET[0] as char).to_string();
    }

    let mut digits = Vec::with_capacity(MAX_DIGITS);
    while value > 0 {
        digits.push(ALPHABET[(value % BASE) as usize]);
        value /= BASE;
    }
    digits.reverse();

    digits.into_iter().map(char::from).collect()
}

/// Decode base-62 text back into an unsigned 64-bit integer.
pub fn decode(text: &str) -> Result<u64, CodecError> {
    if text.is_empty() {
        return Err(CodecError::Empty);
    }

    let mut value: u64 = 0;
    for (position, digit) in text.chars().enumerate() {
        let index = digit_value(digit).ok_or(CodecError::InvalidDigit { digit, position })?;
        value = value
            .checked_mul(BASE)
            .and_then(|v| v.checked_add(index))
            .ok_or(CodecError::Overflow)?;
    }

    Ok(value)
}

/// Map a character to its position in the alphabet.
fn digit_value(c: char) -> Option<u64> {
    let v = match c {
        '0'..='9' => c as u64 - '0' as u64,
        'A'..='Z' => c as u64 - 'A' as u64 + 10,
        'a'..='z' => c as u64 - 'a' as u64 + 36,
        _ => return None,
    };
    Some(v)
}
