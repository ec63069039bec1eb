//! Wildcard matching of granted flags against required flags

use crate::constants::{ANY_SEGMENT, WILDCARD};
use crate::flag::Flag;
use crate::set::PermissionSet;

#[inline]
fn segment_matches(granted: &str, required: &str) -> bool {
    granted == ANY_SEGMENT || granted == required
}

/// Does `granted` satisfy `required`?
///
/// `?` in the granted path matches exactly one segment; a trailing `*` matches
/// one or more remaining segments; the bare `*` matches everything. Wildcards on
/// the required side are compared literally.
pub fn matches(granted: &Flag, required: &Flag) -> bool {
    if granted.path() == WILDCARD {
        return true;
    }
    let g = granted.segments();
    let r = required.segments();
    if granted.is_wildcard() {
        let prefix = &g[..g.len() - 1];
        return r.len() > prefix.len() && prefix.iter().zip(r).all(|(g, r)| segment_matches(g, r));
    }
    g.len() == r.len() && g.iter().zip(r).all(|(g, r)| segment_matches(g, r))
}

/// Number of concrete (not `?` or `*`) leading segments
pub fn specificity(flag: &Flag) -> usize {
    flag.segments()
        .iter()
        .take_while(|s| s.as_str() != ANY_SEGMENT && s.as_str() != WILDCARD)
        .count()
}

/// The most specific granted flag satisfying `required`.
///
/// Ranked by concrete leading segments, then non-wildcard over wildcard, then
/// insertion order.
pub fn best_match<'a>(set: &'a PermissionSet, required: &Flag) -> Option<&'a Flag> {
    let mut best: Option<(&Flag, (usize, bool))> = None;
    for granted in set.iter().filter(|g| matches(g, required)) {
        let rank = (specificity(granted), !granted.is_wildcard());
        match best {
            Some((_, top)) if rank <= top => {}
            _ => best = Some((granted, rank)),
        }
    }
    best.map(|(f, _)| f)
}
