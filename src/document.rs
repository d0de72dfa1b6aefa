//! In-memory keystore document: the alias -> entry map plus metadata.
//!
//! Its JSON encoding is the plaintext the AEAD layer seals. Records are kept
//! in a `BTreeMap` and written as a list sorted by alias, so the same document
//! always serializes to the same bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use zeroize::Zeroizing;

use crate::entry::KeyEntry;
use crate::error::{KeystoreError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    size: u64,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    #[serde(with = "record_list")]
    records: BTreeMap<String, KeyEntry>,
}

impl Document {
    /// Creates an empty document with `created == updated == now`.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            size: 0,
            created: now,
            updated: now,
            records: BTreeMap::new(),
        }
    }

    /// Inserts or replaces the entry under its alias, bumping the updated
    /// timestamp. Replacement is atomic from the caller's perspective.
    pub fn put(&mut self, entry: KeyEntry) {
        self.records.insert(entry.alias().to_string(), entry);
        self.touch();
    }

    pub fn get(&self, alias: &str) -> Result<&KeyEntry> {
        self.records
            .get(alias)
            .ok_or_else(|| KeystoreError::NotFound(alias.to_string()))
    }

    pub fn remove(&mut self, alias: &str) -> Result<KeyEntry> {
        let removed = self
            .records
            .remove(alias)
            .ok_or_else(|| KeystoreError::NotFound(alias.to_string()))?;
        self.touch();
        Ok(removed)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.records.contains_key(alias)
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    pub fn aliases(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &KeyEntry> {
        self.records.values()
    }

    fn touch(&mut self) {
        self.size = self.records.len() as u64;
        self.updated = Utc::now();
    }

    /// Serializes to the canonical JSON encoding sealed by the AEAD layer.
    pub(crate) fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| KeystoreError::Io(std::io::Error::other(e)))?;
        Ok(Zeroizing::new(bytes))
    }

    /// Deserializes a decrypted document, checking that the recorded size
    /// matches the record list.
    pub(crate) fn from_bytes(data: &[u8]) -> Result<Self> {
        let document: Document = serde_json::from_slice(data)
            .map_err(|e| KeystoreError::InvalidFormat(format!("bad document encoding: {e}")))?;
        if document.size != document.records.len() as u64 {
            return Err(KeystoreError::InvalidFormat(
                "document size does not match record count".into(),
            ));
        }
        Ok(document)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Records are a list on the wire, keyed by alias in memory.
mod record_list {
    use super::*;

    pub fn serialize<S: Serializer>(
        records: &BTreeMap<String, KeyEntry>,
        s: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let list: Vec<&KeyEntry> = records.values().collect();
        list.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<BTreeMap<String, KeyEntry>, D::Error> {
        let list = Vec::<KeyEntry>::deserialize(d)?;
        let mut map = BTreeMap::new();
        for entry in list {
            let alias = entry.alias().to_string();
            if map.insert(alias.clone(), entry).is_some() {
                return Err(serde::de::Error::custom(format!("duplicate alias: {alias}")));
            }
        }
        Ok(map)
    }
}
