use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logical name of the clip every edit starts from
pub const MAIN_VIDEO: &str = "main_video";

/// Logical asset name -> filesystem path, as seen by generated code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    entries: BTreeMap<String, String>,
}

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset. Re-adding a name points it at the new path; names are never removed.
    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.entries.insert(name.into(), path.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn main_video(&self) -> Option<&str> {
        self.get(MAIN_VIDEO)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// JSON object form handed to the child process
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }

    /// Manifest paths that appear literally in `code`.
    /// Generated code is expected to go through `assets[...]` instead.
    pub fn hardcoded_paths<'a>(&'a self, code: &str) -> Vec<&'a str> {
        self.entries
            .values()
            .map(String::as_str)
            .filter(|path| !path.is_empty() && code.contains(path))
            .collect()
    }
}

/// Asset names double as file stems under the upload directory
pub fn is_valid_asset_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
