//! Ordered, deduplicated flag collections

use std::collections::HashSet;
use std::hash::Hash;

use crate::flag::Flag;

/// Keep the first occurrence of every element, preserving order
pub fn unique<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

/// Elements of `a` not present in `b`, in `a`'s order
pub fn difference<T: PartialEq + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    a.iter().filter(|e| !b.contains(e)).cloned().collect()
}

/// Everything a holder has for the duration of one check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    flags: Vec<Flag>,
    seen: HashSet<Flag>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a flag; returns false if an equal flag was already present
    pub fn insert(&mut self, flag: Flag) -> bool {
        if !self.seen.insert(flag.clone()) {
            return false;
        }
        self.flags.push(flag);
        true
    }

    pub fn extend<I: IntoIterator<Item = Flag>>(&mut self, flags: I) {
        for f in flags {
            self.insert(f);
        }
    }

    /// Stored flags followed by additional ones, deduplicated
    pub fn merged(stored: Vec<Flag>, additional: &[Flag]) -> Self {
        let mut set = Self::new();
        set.extend(stored);
        set.extend(additional.iter().cloned());
        set
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        self.seen.contains(flag)
    }

    /// Flags in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Flag> {
        self.flags.iter()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn into_vec(self) -> Vec<Flag> {
        self.flags
    }
}

impl FromIterator<Flag> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a Flag;
    type IntoIter = std::slice::Iter<'a, Flag>;
    fn into_iter(self) -> Self::IntoIter {
        self.flags.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flag::parse_flag;

    fn f(s: &str) -> Flag {
        parse_flag(s).unwrap()
    }

    #[test]
    fn first_occurrence_wins() {
        let set = PermissionSet::merged(vec![f("a.b"), f("c"), f("a.b")], &[f("c"), f("d.*")]);
        let order: Vec<_> = set.iter().map(Flag::as_str).collect();
        assert_eq!(order, ["a.b", "c", "d.*"]);
        assert!(set.contains(&f("d.*")));
        assert!(!set.contains(&f("a.b:30")));
    }

    #[test]
    fn suffix_makes_flags_distinct() {
        let set: PermissionSet = [f("x"), f("x:30"), f("x:30:2")].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn helpers() {
        assert_eq!(unique(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert_eq!(difference(&[1, 2, 3, 4], &[2, 4]), vec![1, 3]);
    }
}
