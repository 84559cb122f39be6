//! Nested collection differ.
//!
//! Lists of scalars (members, tag values, account IDs) are compared as sets:
//! the remote API does not preserve their order. Nested object lists are
//! diffed per sub-list, keyed by the object's natural key, so an item that is
//! present on both sides is never reported as changed.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::Hash;

use serde::Serialize;

/// Items to add and remove so that `observed` becomes `desired`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListDiff<T> {
    pub to_add: Vec<T>,
    pub to_remove: Vec<T>,
}

impl<T> ListDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

impl<T> Default for ListDiff<T> {
    fn default() -> Self {
        Self {
            to_add: Vec::new(),
            to_remove: Vec::new(),
        }
    }
}

/// Set difference in both directions.
///
/// Duplicates are collapsed; output keeps the order items first appear in
/// the respective input.
pub fn diff_lists<T>(desired: &[T], observed: &[T]) -> ListDiff<T>
where
    T: Eq + Hash + Clone,
{
    let desired_set: HashSet<&T> = desired.iter().collect();
    let observed_set: HashSet<&T> = observed.iter().collect();

    ListDiff {
        to_add: only_in(desired, &observed_set),
        to_remove: only_in(observed, &desired_set),
    }
}

fn only_in<T>(items: &[T], other: &HashSet<&T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| !other.contains(item) && seen.insert(*item))
        .cloned()
        .collect()
}

/// Order-independent equality.
pub fn same_set<T>(a: &[T], b: &[T]) -> bool
where
    T: Eq + Hash,
{
    let a: HashSet<&T> = a.iter().collect();
    let b: HashSet<&T> = b.iter().collect();
    a == b
}

/// Human-readable description of what an update changes.
///
/// Produced for every update, including variants whose wire protocol only
/// accepts the full desired payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    /// Scalar fields whose value changes.
    pub fields: Vec<String>,
    /// List diffs keyed by field path, e.g. `asset_groups[prod].account_ids`.
    pub lists: BTreeMap<String, ListDiff<String>>,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.lists.is_empty()
    }

    /// Record a scalar field if the two values differ.
    pub fn scalar<V: PartialEq + ?Sized>(&mut self, field: &str, desired: &V, observed: &V) {
        if desired != observed {
            self.fields.push(field.to_string());
        }
    }

    /// Record a list diff under `path`; empty diffs are dropped.
    pub fn list(&mut self, path: impl Into<String>, desired: &[String], observed: &[String]) {
        let diff = diff_lists(desired, observed);
        if !diff.is_empty() {
            self.lists.insert(path.into(), diff);
        }
    }

    /// Diff a list of keyed objects carrying several independent sub-lists.
    ///
    /// `sub_lists` extracts `(sub-list name, items)` pairs from one object.
    /// Objects only on one side show up with all their items added or
    /// removed.
    pub fn keyed<'a, O, K, S>(
        &mut self,
        field: &str,
        desired: &'a [O],
        observed: &'a [O],
        key: K,
        sub_lists: S,
    ) where
        K: Fn(&O) -> &str,
        S: Fn(&'a O) -> Vec<(&'static str, &'a [String])>,
    {
        let desired_keys: Vec<String> = desired.iter().map(|o| key(o).to_string()).collect();
        let observed_keys: Vec<String> = observed.iter().map(|o| key(o).to_string()).collect();
        self.list(field, &desired_keys, &observed_keys);

        let mut seen = HashSet::new();
        let keys: Vec<&str> = desired
            .iter()
            .chain(observed)
            .map(|o| key(o))
            .filter(|k| seen.insert(*k))
            .collect();

        for k in keys {
            let want = desired
                .iter()
                .find(|&o| key(o) == k)
                .map(&sub_lists)
                .unwrap_or_default();
            let have = observed
                .iter()
                .find(|&o| key(o) == k)
                .map(&sub_lists)
                .unwrap_or_default();

            let mut seen_names = HashSet::new();
            let names: Vec<&'static str> = want
                .iter()
                .chain(&have)
                .map(|(name, _)| *name)
                .filter(|name| seen_names.insert(*name))
                .collect();

            for name in names {
                self.list(
                    format!("{field}[{k}].{name}"),
                    sub_list(&want, name),
                    sub_list(&have, name),
                );
            }
        }
    }
}

fn sub_list<'a>(lists: &[(&'static str, &'a [String])], name: &str) -> &'a [String] {
    lists
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, items)| *items)
        .unwrap_or(&[])
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no changes");
        }
        let mut parts: Vec<String> = self.fields.clone();
        for (path, diff) in &self.lists {
            let mut part = format!("{path}:");
            if !diff.to_add.is_empty() {
                part.push_str(&format!(" +[{}]", diff.to_add.join(", ")));
            }
            if !diff.to_remove.is_empty() {
                part.push_str(&format!(" -[{}]", diff.to_remove.join(", ")));
            }
            parts.push(part);
        }
        f.write_str(&parts.join("; "))
    }
}
