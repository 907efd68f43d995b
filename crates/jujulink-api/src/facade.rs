//! Facade version negotiation.
//!
//! After login the controller advertises which facades it serves and at
//! which versions. Every outgoing operation names a facade and optionally
//! a desired version; [`resolve`] decides which version goes on the wire,
//! or that the operation must fail locally.

use std::collections::BTreeMap;

/// The facade every login goes through. Never subject to resolution.
pub const ADMIN_FACADE: &str = "Admin";

/// Version of the Admin facade spoken by the modern generation.
pub const ADMIN_FACADE_VERSION: u32 = 3;

/// Facade name → supported versions, as advertised at login.
///
/// Versions are kept sorted and deduplicated, so the last entry is the
/// highest supported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacadeTable {
    facades: BTreeMap<String, Vec<u32>>,
}

impl FacadeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the versions supported for `name`, merging with any already known.
    pub fn insert(&mut self, name: impl Into<String>, versions: impl IntoIterator<Item = u32>) {
        let entry = self.facades.entry(name.into()).or_default();
        entry.extend(versions);
        entry.sort_unstable();
        entry.dedup();
    }

    pub fn is_empty(&self) -> bool {
        self.facades.is_empty()
    }

    pub fn len(&self) -> usize {
        self.facades.len()
    }

    pub fn versions(&self, name: &str) -> Option<&[u32]> {
        self.facades.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u32])> {
        self.facades.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Pick the version to use against this table.
    ///
    /// * no `desired`: the highest advertised version;
    /// * `desired` advertised: that version;
    /// * otherwise (or facade absent): `None`, i.e. not supported.
    pub fn resolve(&self, name: &str, desired: Option<u32>) -> Option<u32> {
        let versions = self.facades.get(name)?;
        match desired {
            None => versions.last().copied(),
            Some(v) => versions.binary_search(&v).ok().map(|_| v),
        }
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<u32>)> for FacadeTable {
    fn from_iter<I: IntoIterator<Item = (S, Vec<u32>)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, versions) in iter {
            table.insert(name, versions);
        }
        table
    }
}

/// Resolve against an optional table.
///
/// Before login there is no table; every facade is assumed allowed at the
/// desired version (or 0).
pub fn resolve(table: Option<&FacadeTable>, name: &str, desired: Option<u32>) -> Option<u32> {
    match table {
        None => Some(desired.unwrap_or(0)),
        Some(table) => table.resolve(name, desired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FacadeTable {
        [("A", vec![2, 0, 1])].into_iter().collect()
    }

    #[test]
    fn resolves_highest_when_no_version_requested() {
        assert_eq!(table().resolve("A", None), Some(2));
    }

    #[test]
    fn resolves_requested_version_only_if_advertised() {
        let t = table();
        assert_eq!(t.resolve("A", Some(1)), Some(1));
        assert_eq!(t.resolve("A", Some(5)), None);
        assert_eq!(t.resolve("B", None), None);
    }

    #[test]
    fn no_table_allows_everything() {
        assert_eq!(resolve(None, "Anything", None), Some(0));
        assert_eq!(resolve(None, "Anything", Some(4)), Some(4));
    }

    #[test]
    fn insert_merges_and_sorts() {
        let mut t = FacadeTable::new();
        t.insert("Client", [1, 3]);
        t.insert("Client", [2, 1]);
        assert_eq!(t.versions("Client"), Some(&[1, 2, 3][..]));
        assert_eq!(t.len(), 1);
    }
}
