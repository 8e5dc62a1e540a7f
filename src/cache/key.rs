//! Cache Key Builder
//!
//! Keys are always `prefix:part1:part2:...`; building them here is what makes
//! namespace-wide invalidation possible.

use super::namespace::Namespace;

/// Separator between the namespace prefix and each key part.
pub const KEY_DELIMITER: char = ':';

// == Build Key ==
/// Joins the namespace prefix and the given parts with [`KEY_DELIMITER`].
///
/// ```
/// use namespace_cache::cache::{build_key, Namespace};
///
/// assert_eq!(build_key(Namespace::Weather, &["19020"]), "weather:19020");
/// ```
pub fn build_key<S: AsRef<str>>(namespace: Namespace, parts: &[S]) -> String {
    let prefix = namespace.prefix();
    let capacity = prefix.len() + parts.iter().map(|p| p.as_ref().len() + 1).sum::<usize>();

    let mut key = String::with_capacity(capacity);
    key.push_str(prefix);
    for part in parts {
        key.push(KEY_DELIMITER);
        key.push_str(part.as_ref());
    }
    key
}

// == Hash String ==
/// Compacts an arbitrary string into a short key fragment.
///
/// 32-bit rolling hash (`h = h * 31 + unit`, wrapping) over UTF-16 code
/// units, absolute value rendered in base 36. Not cryptographic; collisions
/// only cost an extra recompute or a shared entry.
pub fn hash_string(s: &str) -> String {
    let hash = s
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    to_base36(hash.unsigned_abs())
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(7);
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}
