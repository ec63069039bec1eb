//! Permission flags
//!
//! A flag is a dot-delimited permission path with an optional `:cooldown:limit`
//! suffix, e.g. `mod.ban.*:30:5`. Flags are immutable values: the raw string is
//! kept as given and every derived field is computed once at parse time.
//!
//! - `?` as a segment matches exactly one arbitrary segment
//! - a trailing `*` segment matches one or more remaining segments
//! - the bare path `*` matches everything

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::checks;
use crate::constants::{ANY_SEGMENT, SEGMENT_SEPARATOR, SUFFIX_SEPARATOR, WILDCARD};
use crate::error::{Grammar, PermError, Result};
use crate::set::unique;

/// Parsed permission flag held by (or required of) a holder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Flag {
    raw: String,
    segments: Vec<String>,
    wildcard: bool,
    cooldown: u64,
    limit: u64,
}

impl Flag {
    /// Parse and validate a raw flag string
    pub fn parse(raw: &str) -> Result<Self> {
        checks::flag(raw)?;

        let mut parts = raw.split(SUFFIX_SEPARATOR);
        let path = parts.next().unwrap_or_default();
        let cooldown = parse_suffix(parts.next(), raw)?;
        let limit = parse_suffix(parts.next(), raw)?;

        let segments: Vec<String> = path.split(SEGMENT_SEPARATOR).map(str::to_string).collect();
        let wildcard = segments.last().is_some_and(|s| s == WILDCARD);

        Ok(Flag { raw: raw.to_string(), segments, wildcard, cooldown, limit })
    }

    /// The raw string, which is also the canonical form used for equality
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Path component without the cooldown/limit suffix
    pub fn path(&self) -> &str {
        self.raw.split(SUFFIX_SEPARATOR).next().unwrap_or_default()
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the path is `*` or ends with `.*`
    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Cooldown in seconds, 0 meaning none
    #[inline]
    pub fn cooldown(&self) -> u64 {
        self.cooldown
    }

    #[inline]
    pub fn has_cooldown(&self) -> bool {
        self.cooldown > 0
    }

    /// Lifetime usage limit, 0 meaning none
    #[inline]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    #[inline]
    pub fn has_limit(&self) -> bool {
        self.limit > 0
    }

    /// True when any segment is `?` or `*`
    pub fn has_wildcards(&self) -> bool {
        self.segments.iter().any(|s| s == WILDCARD || s == ANY_SEGMENT)
    }
}

fn parse_suffix(part: Option<&str>, raw: &str) -> Result<u64> {
    match part {
        None => Ok(0),
        Some(digits) => digits.parse().map_err(|_| PermError::grammar(Grammar::Flag, raw)),
    }
}

/// Parse a raw flag string, failing with a grammar error
pub fn parse_flag(raw: &str) -> Result<Flag> {
    Flag::parse(raw)
}

/// Non-failing probe: does `raw` parse as a flag?
pub fn is_valid_flag(raw: &str) -> bool {
    !raw.is_empty() && Flag::parse(raw).is_ok()
}

/// Parse a batch of raw strings.
///
/// With `ignore_invalid` unparseable entries are dropped (and logged) instead of
/// failing the whole batch. With `remove_duplicate` the first occurrence wins.
pub fn flag_array<S: AsRef<str>>(raw: &[S], ignore_invalid: bool, remove_duplicate: bool) -> Result<Vec<Flag>> {
    let mut valid = Vec::with_capacity(raw.len());
    for r in raw {
        let r: &str = r.as_ref();
        match Flag::parse(r) {
            Ok(f) => valid.push(f),
            Err(e) if ignore_invalid => warn!(value = r, error = %e, "dropping invalid flag"),
            Err(e) => return Err(e),
        }
    }
    Ok(if remove_duplicate { unique(valid) } else { valid })
}

impl PartialEq for Flag {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Flag {}

impl Hash for Flag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for Flag {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Flag {
    type Err = PermError;
    fn from_str(s: &str) -> Result<Self> {
        Flag::parse(s)
    }
}

impl TryFrom<String> for Flag {
    type Error = PermError;
    fn try_from(s: String) -> Result<Self> {
        Flag::parse(&s)
    }
}

impl TryFrom<&str> for Flag {
    type Error = PermError;
    fn try_from(s: &str) -> Result<Self> {
        Flag::parse(s)
    }
}

impl From<Flag> for String {
    fn from(f: Flag) -> String {
        f.raw
    }
}

/// Permission definition key: no wildcards, no suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StrictFlag {
    raw: String,
    segments: Vec<String>,
}

impl StrictFlag {
    pub fn parse(raw: &str) -> Result<Self> {
        checks::strict_flag(raw)?;
        Ok(StrictFlag {
            raw: raw.to_string(),
            segments: raw.split(SEGMENT_SEPARATOR).map(str::to_string).collect(),
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The same path as a regular flag, for use as a required flag
    pub fn to_flag(&self) -> Flag {
        Flag {
            raw: self.raw.clone(),
            segments: self.segments.clone(),
            wildcard: false,
            cooldown: 0,
            limit: 0,
        }
    }
}

/// Parse a raw strict flag string
pub fn parse_strict_flag(raw: &str) -> Result<StrictFlag> {
    StrictFlag::parse(raw)
}

impl PartialEq<Flag> for StrictFlag {
    fn eq(&self, other: &Flag) -> bool {
        self.raw == other.raw
    }
}

impl PartialEq<StrictFlag> for Flag {
    fn eq(&self, other: &StrictFlag) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Display for StrictFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for StrictFlag {
    type Err = PermError;
    fn from_str(s: &str) -> Result<Self> {
        StrictFlag::parse(s)
    }
}

impl TryFrom<String> for StrictFlag {
    type Error = PermError;
    fn try_from(s: String) -> Result<Self> {
        StrictFlag::parse(&s)
    }
}

impl From<StrictFlag> for String {
    fn from(f: StrictFlag) -> String {
        f.raw
    }
}
