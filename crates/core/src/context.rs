//! Context variables: the mutable variable bag threaded through rendering,
//! pipelines and planners.
//!
//! Keys are compared case-insensitively everywhere. Enumeration follows
//! insertion order, and overwriting a key keeps its original slot and
//! spelling. The distinguished [`INPUT`] key carries implicit positional
//! content between functions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The key holding implicit positional content.
pub const INPUT: &str = "input";

/// An ordered, case-insensitive map from variable name to string value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct ContextVariables {
    /// Folded name -> (original spelling, value).
    entries: IndexMap<String, (String, String)>,
}

impl ContextVariables {
    /// Create a context whose `input` is set to `input`.
    pub fn new(input: impl Into<String>) -> Self {
        let mut vars = Self::default();
        vars.set(INPUT, input);
        vars
    }

    /// Create an empty context (no `input` key at all).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get a variable by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&fold(name)).map(|(_, value)| value.as_str())
    }

    /// Set a variable, replacing any existing value regardless of casing.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref();
        match self.entries.get_mut(&fold(name)) {
            Some((_, existing)) => *existing = value.into(),
            None => {
                self.entries.insert(fold(name), (name.to_string(), value.into()));
            }
        }
    }

    /// Set a variable only if it is not already present.
    pub fn set_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.set(name, value);
        }
    }

    /// Remove a variable, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .shift_remove(&fold(name))
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&fold(name))
    }

    /// The current `input` value, or an empty string.
    pub fn input(&self) -> &str {
        self.get(INPUT).unwrap_or("")
    }

    /// Replace the `input` value.
    pub fn update(&mut self, input: impl Into<String>) {
        self.set(INPUT, input);
    }

    /// Copy every variable of `other` into this context, overriding on conflict.
    pub fn merge(&mut self, other: &ContextVariables) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Unicode-aware lowercase, so `Ünit` and `ünit` name the same variable.
fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl From<Vec<(String, String)>> for ContextVariables {
    fn from(pairs: Vec<(String, String)>) -> Self {
        let mut vars = Self::default();
        for (name, value) in pairs {
            vars.set(name, value);
        }
        vars
    }
}

impl From<ContextVariables> for Vec<(String, String)> {
    fn from(vars: ContextVariables) -> Self {
        vars.entries.into_values().collect()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ContextVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Self::default();
        for (name, value) in iter {
            vars.set(name, value);
        }
        vars
    }
}

impl PartialEq for ContextVariables {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for ContextVariables {}
