//! Reversible short identifiers
//!
//! Numeric ids are exposed as base-62 strings when the site enables short ids.
//! Decoding is lenient: anything that is not a short id is returned unchanged,
//! so handlers can accept both forms.

const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const BASE: u64 = 62;

/// Longest base-62 rendering of a u64
const MAX_SHORT_LEN: usize = 11;

/// Encode a numeric id. Non-numeric input is returned unchanged.
pub fn encode(id: &str) -> String {
    let Ok(mut n) = id.parse::<u64>() else {
        return id.to_string();
    };
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::with_capacity(MAX_SHORT_LEN);
    while n > 0 {
        out.push(ALPHABET[(n % BASE) as usize]);
        n /= BASE;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_else(|_| id.to_string())
}

/// Decode a short id back to its numeric form.
///
/// Long numeric ids and strings that are not valid short ids pass through.
pub fn decode(id: &str) -> String {
    if id.is_empty() || id.len() > MAX_SHORT_LEN {
        return id.to_string();
    }
    let mut n: u64 = 0;
    for b in id.bytes() {
        let Some(digit) = digit_value(b) else {
            return id.to_string();
        };
        n = match n.checked_mul(BASE).and_then(|v| v.checked_add(digit)) {
            Some(v) => v,
            None => return id.to_string(),
        };
    }
    n.to_string()
}

/// Encode only when the flag is set
pub fn encode_if(enabled: bool, id: &str) -> String {
    if enabled {
        encode(id)
    } else {
        id.to_string()
    }
}

/// Encode a list of ids only when the flag is set
pub fn encode_all(enabled: bool, ids: &[String]) -> Vec<String> {
    ids.iter().map(|id| encode_if(enabled, id)).collect()
}

fn digit_value(b: u8) -> Option<u64> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u64),
        b'a'..=b'z' => Some((b - b'a') as u64 + 10),
        b'A'..=b'Z' => Some((b - b'A') as u64 + 36),
        _ => None,
    }
}
