//! Persisted machine-state format.
//!
//! The shareable form is a nested map: top-level keys `"arm"`, `"memory"`,
//! `"neon"`, and (when any status word is non-zero) `"spec"`. Each bank is
//! a sparse object mapping decimal-string word indices to values, with an
//! optional `"offsetW"` addressing offset and, for memory, an optional
//! `"sizeW"` word count. A missing bank key means "reset that bank to its
//! defaults" on restore.

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sparse content of one bank.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BankSnapshot {
    #[serde(rename = "offsetW", default, skip_serializing_if = "Option::is_none")]
    pub offset_words: Option<u32>,
    #[serde(rename = "sizeW", default, skip_serializing_if = "Option::is_none")]
    pub size_words: Option<u32>,
    /// Non-zero words keyed by decimal external index.
    #[serde(flatten)]
    pub words: BTreeMap<String, u32>,
}

impl BankSnapshot {
    pub fn insert(&mut self, index: u32, value: u32) {
        self.words.insert(index.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.offset_words.is_none() && self.size_words.is_none()
    }

    /// Parse the sparse map into `(index, value)` pairs.
    pub fn word_entries(&self) -> Result<Vec<(u32, u32)>> {
        let mut entries = Vec::with_capacity(self.words.len());
        for (key, value) in &self.words {
            let index: u32 = key.parse().map_err(|_| {
                CoreError::InvalidSnapshot(format!("bad word index '{key}'"))
            })?;
            entries.push((index, *value));
        }
        Ok(entries)
    }
}

/// Full machine state in its persisted shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arm: Option<BankSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<BankSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neon: Option<BankSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<BankSnapshot>,
}

impl MachineSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
