//! The record type held per alias.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::{KeystoreError, Result};

/// Kind of key material an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Opaque symmetric key material in `value`.
    Secret,
    /// Asymmetric material in `private_key` (and optionally `public_key`).
    Keypair,
}

/// One named piece of key material plus free-form attributes.
///
/// The alias is the sole identity of an entry within a document. Attributes
/// are never interpreted by the keystore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    alias: String,
    #[serde(rename = "type")]
    kind: EntryKind,
    algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_opt")]
    value: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_opt")]
    public_key: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_opt")]
    private_key: Option<Vec<u8>>,
    #[serde(with = "attr_list")]
    attributes: BTreeMap<String, String>,
}

impl KeyEntry {
    /// Creates an entry holding symmetric key material.
    pub fn secret(alias: &str, algorithm: &str, value: Vec<u8>) -> Result<Self> {
        let entry = Self {
            alias: alias.to_string(),
            kind: EntryKind::Secret,
            algorithm: algorithm.to_string(),
            value: Some(value),
            public_key: None,
            private_key: None,
            attributes: BTreeMap::new(),
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Creates an entry holding a private key and, optionally, its public half.
    pub fn keypair(
        alias: &str,
        algorithm: &str,
        private_key: Vec<u8>,
        public_key: Option<Vec<u8>>,
    ) -> Result<Self> {
        let entry = Self {
            alias: alias.to_string(),
            kind: EntryKind::Keypair,
            algorithm: algorithm.to_string(),
            value: None,
            public_key,
            private_key: Some(private_key),
            attributes: BTreeMap::new(),
        };
        entry.validate()?;
        Ok(entry)
    }

    /// An entry needs an alias and at least one of key material or a private key.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.alias.is_empty() {
            return Err(KeystoreError::InvalidEntry("alias must not be empty".into()));
        }
        if self.value.is_none() && self.private_key.is_none() {
            return Err(KeystoreError::InvalidEntry(
                "entry must hold key material or a private key".into(),
            ));
        }
        Ok(())
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub(crate) fn set_alias(&mut self, alias: &str) {
        self.alias = alias.to_string();
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn public_key(&self) -> Option<&[u8]> {
        self.public_key.as_deref()
    }

    pub fn private_key(&self) -> Option<&[u8]> {
        self.private_key.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }
}

/// Optional byte fields are hex strings on the wire.
mod hex_opt {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<Vec<u8>>, s: S) -> std::result::Result<S::Ok, S::Error> {
        match v {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(d)?;
        s.map(|s| hex::decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Attributes are a list of `{name, value}` objects on the wire, sorted by
/// name so the encoding is canonical.
mod attr_list {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Attribute {
        name: String,
        value: String,
    }

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, String>,
        s: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let list: Vec<Attribute> = map
            .iter()
            .map(|(name, value)| Attribute {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        list.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<BTreeMap<String, String>, D::Error> {
        let list = Vec::<Attribute>::deserialize(d)?;
        let mut map = BTreeMap::new();
        for attr in list {
            if map.insert(attr.name.clone(), attr.value).is_some() {
                return Err(serde::de::Error::custom(format!(
                    "duplicate attribute: {}",
                    attr.name
                )));
            }
        }
        Ok(map)
    }
}
