//! Metadata Map
//!
//! Free-form `key => value` pairs attached to runs and benchmarks. Keys and
//! values are non-empty strings, iteration order is the key order.
//!
//! Keys listed in [`keys::RESERVED`] are written by the harness itself; every
//! other key belongs to the program being benchmarked.

use crate::messages::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys filled in by the harness
pub mod keys {
    /// Number of logical CPUs
    pub const CPU_COUNT: &str = "cpu_count";
    /// CPU model name as reported by the OS
    pub const CPU_MODEL_NAME: &str = "cpu_model_name";
    /// CPUs the worker was pinned to, formatted as a CPU list
    pub const CPU_AFFINITY: &str = "cpu_affinity";
    /// Operating system and architecture
    pub const PLATFORM: &str = "platform";
    /// Host name
    pub const HOSTNAME: &str = "hostname";
    /// UTC timestamp of the run
    pub const DATE: &str = "date";
    /// Loop count of the run
    pub const LOOPS: &str = "loops";
    /// Inner loop count of the run
    pub const INNER_LOOPS: &str = "inner_loops";
    /// Version of the harness that produced the run
    pub const STEADYBENCH_VERSION: &str = "steadybench_version";

    /// Every reserved key
    pub const RESERVED: &[&str] = &[
        CPU_COUNT,
        CPU_MODEL_NAME,
        CPU_AFFINITY,
        PLATFORM,
        HOSTNAME,
        DATE,
        LOOPS,
        INNER_LOOPS,
        STEADYBENCH_VERSION,
    ];
}

/// Ordered map of non-empty string keys to non-empty string values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` belongs to the harness namespace
    pub fn is_reserved(key: &str) -> bool {
        keys::RESERVED.contains(&key)
    }

    /// Insert a pair, returning the previous value for `key`
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, ModelError> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() {
            return Err(ModelError::EmptyMetadata("key".to_string()));
        }
        if value.is_empty() {
            return Err(ModelError::EmptyMetadata(format!("value of {key:?}")));
        }
        Ok(self.0.insert(key, value))
    }

    /// Insert a pair only when `key` is not present yet
    pub fn insert_missing(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ModelError> {
        let key = key.into();
        if !self.0.contains_key(&key) {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Value stored for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no pairs
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every pair of `other` whose key is absent here
    pub fn merge_missing(&mut self, other: &Metadata) {
        for (key, value) in &other.0 {
            self.0
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

impl TryFrom<BTreeMap<String, String>> for Metadata {
    type Error = ModelError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut metadata = Metadata::new();
        for (key, value) in map {
            metadata.insert(key, value)?;
        }
        Ok(metadata)
    }
}

impl From<Metadata> for BTreeMap<String, String> {
    fn from(metadata: Metadata) -> Self {
        metadata.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut metadata = Metadata::new();
        assert_eq!(metadata.insert("cpu_count", "8").unwrap(), None);
        assert_eq!(metadata.insert("cpu_count", "4").unwrap(), Some("8".into()));
        assert_eq!(metadata.get("cpu_count"), Some("4"));
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn test_rejects_empty_strings() {
        let mut metadata = Metadata::new();
        assert!(matches!(
            metadata.insert("", "x"),
            Err(ModelError::EmptyMetadata(_))
        ));
        assert!(matches!(
            metadata.insert("key", ""),
            Err(ModelError::EmptyMetadata(_))
        ));
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_insert_missing_keeps_existing() {
        let mut metadata = Metadata::new();
        metadata.insert("hostname", "user-supplied").unwrap();
        metadata.insert_missing("hostname", "collected").unwrap();
        metadata.insert_missing("platform", "linux-x86_64").unwrap();
        assert_eq!(metadata.get("hostname"), Some("user-supplied"));
        assert_eq!(metadata.get("platform"), Some("linux-x86_64"));
    }

    #[test]
    fn test_iteration_is_key_ordered() {
        let mut metadata = Metadata::new();
        metadata.insert("b", "2").unwrap();
        metadata.insert("a", "1").unwrap();
        let keys: Vec<&str> = metadata.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_reserved_keys() {
        assert!(Metadata::is_reserved(keys::CPU_MODEL_NAME));
        assert!(Metadata::is_reserved("loops"));
        assert!(!Metadata::is_reserved("workload"));
    }

    #[test]
    fn test_deserialize_rejects_empty_value() {
        let result: Result<Metadata, _> = serde_json::from_str(r#"{"key": ""}"#);
        assert!(result.is_err());
    }
}
