//! Length-prefixed key encoding for LMDB storage.
//!
//! All keys are encoded as: [len1][bytes1][len2][bytes2]...
//! with a 2-byte big-endian length per part.
//! - No delimiters, no escaping, any bytes allowed
//! - A key built from the first N parts is a prefix of every longer key
//!
//! Flags have no length bound but LMDB keys do (511 bytes by default), so state
//! keys carry a SHA-256 digest of the flag key instead of the flag itself.

use byteorder::{BigEndian, ByteOrder};
use sha2::{Digest, Sha256};

use crate::error::{PermError, Result};
use crate::holder::HolderKey;

const LEN: usize = 2;

fn push_part(key: &mut Vec<u8>, part: &[u8]) -> Result<()> {
    let len = u16::try_from(part.len())
        .map_err(|_| PermError::Store(format!("key part of {} bytes exceeds {}", part.len(), u16::MAX)))?;
    let mut prefix = [0u8; LEN];
    BigEndian::write_u16(&mut prefix, len);
    key.extend_from_slice(&prefix);
    key.extend_from_slice(part);
    Ok(())
}

/// Build a length-prefixed key from parts
///
/// # Example
/// ```
/// let key = flagperm::keys::build_key(&["user", "ab12"]).unwrap();
/// assert_eq!(key, b"\x00\x04user\x00\x04ab12");
/// ```
pub fn build_key(parts: &[&str]) -> Result<Vec<u8>> {
    let total: usize = parts.iter().map(|p| LEN + p.len()).sum();
    let mut key = Vec::with_capacity(total);
    for part in parts {
        push_part(&mut key, part.as_bytes())?;
    }
    Ok(key)
}

/// Parse a length-prefixed key into parts; stops at the first malformed part
pub fn parse_key(bytes: &[u8]) -> Vec<&str> {
    let mut parts = Vec::with_capacity(3);
    let mut i = 0;
    while i + LEN <= bytes.len() {
        let len = BigEndian::read_u16(&bytes[i..i + LEN]) as usize;
        let start = i + LEN;
        let Some(part) = bytes.get(start..start + len).and_then(|b| std::str::from_utf8(b).ok()) else {
            break;
        };
        parts.push(part);
        i = start + len;
    }
    parts
}

/// Holder key: [type][id]
pub fn holder_key(holder: &HolderKey) -> Result<Vec<u8>> {
    build_key(&[holder.holder_type.as_str(), &holder.id])
}

/// State key: [type][id][sha256(flag)]
pub fn state_key(holder: &HolderKey, flag_key: &str) -> Result<Vec<u8>> {
    let mut key = holder_key(holder)?;
    push_part(&mut key, &Sha256::digest(flag_key.as_bytes()))?;
    Ok(key)
}
