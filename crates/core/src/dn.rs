//! Distinguished-name helpers.
//!
//! Only what the migration pipeline needs: splitting a DN into its RDNs,
//! extracting the leaf RDN value, normalizing for comparison and building
//! target DNs. Values are escaped with `ldap3::dn_escape`.

use ldap3::dn_escape;

/// Split `s` on `sep`, ignoring separators escaped with a backslash.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Undo RFC 4514 escaping (`\,` and `\2c` forms).
fn unescape_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            match hex {
                Some(b) => {
                    out.push(b);
                    i += 3;
                }
                None => {
                    out.push(bytes[i + 1]);
                    i += 2;
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// The RDNs of `dn`, leaf first. Empty for an empty DN.
pub fn rdns(dn: &str) -> Vec<&str> {
    if dn.trim().is_empty() {
        return Vec::new();
    }
    split_unescaped(dn, ',')
}

/// Value of the leaf RDN's first attribute-value assertion, unescaped.
///
/// `uid=jdoe,ou=people,dc=example,dc=com` yields `jdoe`. Returns `None` for
/// an empty DN or a leaf component that is not `type=value`.
pub fn leaf_rdn_value(dn: &str) -> Option<String> {
    let leaf = *rdns(dn).first()?;
    let ava = *split_unescaped(leaf, '+').first()?;
    let (attr, value) = ava.split_once('=')?;
    let value = value.trim();
    if attr.trim().is_empty() || value.is_empty() {
        return None;
    }
    Some(unescape_value(value))
}

/// Canonical form used for storage: whitespace around components trimmed
/// and attribute types lowercased. Values keep their case.
pub fn normalize(dn: &str) -> String {
    rdns(dn)
        .into_iter()
        .map(|rdn| {
            split_unescaped(rdn, '+')
                .into_iter()
                .map(|ava| match ava.split_once('=') {
                    Some((attr, value)) => {
                        format!("{}={}", attr.trim().to_ascii_lowercase(), value.trim())
                    }
                    None => ava.trim().to_string(),
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Case-insensitive comparison key for a DN.
pub fn comparison_key(dn: &str) -> String {
    normalize(dn).to_lowercase()
}

/// Whether `dn` equals `base` or lies anywhere beneath it.
pub fn is_within(dn: &str, base: &str) -> bool {
    let dn = comparison_key(dn);
    let base = comparison_key(base);
    if base.is_empty() {
        return true;
    }
    dn == base || dn.ends_with(&format!(",{base}"))
}

/// Join DN fragments with commas, skipping empty fragments.
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| p.as_ref().trim().trim_matches(','))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Build `attr=value,<parent>` with `value` escaped.
pub fn child(attr: &str, value: &str, parent: &str) -> String {
    let leaf = format!("{}={}", attr, dn_escape(value));
    join(&[leaf.as_str(), parent])
}
