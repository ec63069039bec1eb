//! Grammar probes and argument validators
//!
//! Every validator returns `Ok(())` or the error naming the offending input,
//! so callers can chain them with `?` before touching any state.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{DISCORD_ID_PATTERN, FLAG_PATTERN, OBJECT_ID_PATTERN, STRICT_FLAG_PATTERN};
use crate::error::{Grammar, PermError, Result};

static FLAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(FLAG_PATTERN).expect("invalid flag regex"));
static STRICT_FLAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(STRICT_FLAG_PATTERN).expect("invalid strict flag regex"));
static OBJECT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(OBJECT_ID_PATTERN).expect("invalid object id regex"));
static DISCORD_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DISCORD_ID_PATTERN).expect("invalid discord id regex"));

#[inline]
fn matching(re: &Regex, kind: Grammar, value: &str) -> Result<()> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(PermError::grammar(kind, value))
    }
}

/// Validate a permission flag string
pub fn flag(value: &str) -> Result<()> {
    matching(&FLAG_RE, Grammar::Flag, value)
}

/// Validate a strict (definition key) flag string
pub fn strict_flag(value: &str) -> Result<()> {
    matching(&STRICT_FLAG_RE, Grammar::StrictFlag, value)
}

/// Validate a 24 character lowercase hex object id
pub fn object_id(value: &str) -> Result<()> {
    matching(&OBJECT_ID_RE, Grammar::ObjectId, value)
}

/// Validate a 16-20 digit external platform id
pub fn discord_id(value: &str) -> Result<()> {
    matching(&DISCORD_ID_RE, Grammar::DiscordId, value)
}

pub fn not_empty<T>(items: &[T], name: &str) -> Result<()> {
    if items.is_empty() {
        return Err(PermError::Check(format!("{} cannot be empty", name)));
    }
    Ok(())
}

pub fn min(n: u64, min: u64, name: &str) -> Result<()> {
    if n < min {
        return Err(PermError::Check(format!("{} cannot be less than {}", name, min)));
    }
    Ok(())
}

pub fn max(n: u64, max: u64, name: &str) -> Result<()> {
    if n > max {
        return Err(PermError::Check(format!("{} cannot be greater than {}", name, max)));
    }
    Ok(())
}

pub fn in_range(n: u64, lo: u64, hi: u64, name: &str) -> Result<()> {
    min(n, lo, name)?;
    max(n, hi, name)
}

pub fn one_of<T: PartialEq + std::fmt::Display>(value: &T, options: &[T], name: &str) -> Result<()> {
    if options.contains(value) {
        return Ok(());
    }
    let opts = options.iter().map(|o| o.to_string()).collect::<Vec<_>>().join(",");
    Err(PermError::Check(format!("{} must be one of {}", name, opts)))
}
