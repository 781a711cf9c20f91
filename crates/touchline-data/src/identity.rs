//! Identity stitching.
//!
//! An [`IdentityMap`] records which anonymous identifiers have been observed
//! for each resolved identity. Path building needs the reverse direction, so
//! the map is inverted once into an [`AnonymousIndex`] per invocation.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Stable identity id → anonymous ids observed for that identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityMap {
    identities: BTreeMap<String, BTreeSet<String>>,
}

impl IdentityMap {
    /// Create an empty identity map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `anonymous_id` belongs to `identity_id`.
    pub fn insert(&mut self, identity_id: impl Into<String>, anonymous_id: impl Into<String>) {
        self.identities
            .entry(identity_id.into())
            .or_default()
            .insert(anonymous_id.into());
    }

    /// Builder-style variant of [`insert`](Self::insert) for several anonymous ids.
    pub fn with_identity<I, S>(mut self, identity_id: &str, anonymous_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for anonymous_id in anonymous_ids {
            self.insert(identity_id, anonymous_id);
        }
        self
    }

    /// Anonymous ids merged under an identity.
    pub fn anonymous_ids(&self, identity_id: &str) -> Option<&BTreeSet<String>> {
        self.identities.get(identity_id)
    }

    /// Number of identities.
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Iterate identities in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.identities.iter()
    }

    /// Build the anonymous id → identity id index.
    ///
    /// When an anonymous id is claimed by several identities the first one in
    /// identity-id order wins.
    pub fn inverted_index(&self) -> AnonymousIndex {
        let mut owners = HashMap::new();
        for (identity_id, anonymous_ids) in &self.identities {
            for anonymous_id in anonymous_ids {
                owners
                    .entry(anonymous_id.clone())
                    .or_insert_with(|| identity_id.clone());
            }
        }
        AnonymousIndex { owners }
    }

    /// Parse an identity map from JSON (`{"identity": ["anon", ...]}`).
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load an identity map from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

/// Anonymous id → owning identity id.
#[derive(Debug, Clone, Default)]
pub struct AnonymousIndex {
    owners: HashMap<String, String>,
}

impl AnonymousIndex {
    /// Owning identity of an anonymous id, if any.
    pub fn resolve(&self, anonymous_id: &str) -> Option<&str> {
        self.owners.get(anonymous_id).map(String::as_str)
    }

    /// Number of indexed anonymous ids.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_index_resolves_owner() {
        let map = IdentityMap::new()
            .with_identity("user_1", ["anon_a", "anon_b"])
            .with_identity("user_2", ["anon_c"]);

        let index = map.inverted_index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.resolve("anon_a"), Some("user_1"));
        assert_eq!(index.resolve("anon_c"), Some("user_2"));
        assert_eq!(index.resolve("anon_z"), None);
    }

    #[test]
    fn test_shared_anonymous_id_goes_to_first_identity() {
        let map = IdentityMap::new()
            .with_identity("user_b", ["shared"])
            .with_identity("user_a", ["shared"]);

        assert_eq!(map.inverted_index().resolve("shared"), Some("user_a"));
    }

    #[test]
    fn test_from_json() {
        let map = IdentityMap::from_json_str(r#"{"user_1": ["anon_a", "anon_b"]}"#).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.anonymous_ids("user_1").map(BTreeSet::len), Some(2));
        assert!(IdentityMap::from_json_str("[1, 2]").is_err());
    }
}
