//! Symbol table accumulated over a search run.
//!
//! Keys are symbol names, values are arbitrary JSON (scalar, object, or array).
//! A workspace never loses an individual key in place: shrinking happens only by
//! building a smaller replacement (see [`Workspace::from_map`]), which is how
//! alias coalescing drops synonyms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mapping from symbol name to structured value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workspace {
    entries: BTreeMap<String, Value>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a workspace from an existing map (used for replacement workspaces).
    pub fn from_map(entries: BTreeMap<String, Value>) -> Self {
        Self { entries }
    }

    /// Single-symbol fragment, the usual shape of a proposal.
    pub fn single(symbol: impl Into<String>, value: Value) -> Self {
        let mut ws = Self::new();
        ws.set(symbol, value);
        ws
    }

    pub fn get(&self, symbol: &str) -> Option<&Value> {
        self.entries.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    pub fn set(&mut self, symbol: impl Into<String>, value: Value) {
        self.entries.insert(symbol.into(), value);
    }

    /// Right-biased union: keys of `other` win on collision, everything else is kept.
    ///
    /// Pure: neither operand is modified.
    pub fn merge(&self, other: &Workspace) -> Workspace {
        let mut entries = self.entries.clone();
        for (symbol, value) in &other.entries {
            entries.insert(symbol.clone(), value.clone());
        }
        Workspace { entries }
    }

    pub fn all(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for Workspace {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Render a value the way it is reported as an answer: strings unquoted, everything else as JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ws(pairs: &[(&str, Value)]) -> Workspace {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn merge_is_right_biased_and_total() {
        let base = ws(&[("a", json!(1)), ("b", json!(2))]);
        let update = ws(&[("b", json!(20)), ("c", json!(3))]);

        let merged = base.merge(&update);

        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(20)));
        assert_eq!(merged.get("c"), Some(&json!(3)));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn merge_leaves_operands_untouched() {
        let base = ws(&[("a", json!(1))]);
        let update = ws(&[("a", json!(2))]);
        let _ = base.merge(&update);
        assert_eq!(base.get("a"), Some(&json!(1)));
        assert_eq!(update.get("a"), Some(&json!(2)));
    }

    #[test]
    fn merge_with_empty_fragment_is_identity() {
        let base = ws(&[("a", json!({"nested": [1, 2]})), ("b", json!("x"))]);
        assert_eq!(base.merge(&Workspace::new()), base);
    }

    #[test]
    fn merge_is_commutative_on_disjoint_keys() {
        let left = ws(&[("a", json!(1))]);
        let right = ws(&[("b", json!(2))]);
        assert_eq!(left.merge(&right), right.merge(&left));
    }

    #[test]
    fn render_value_unquotes_strings_only() {
        assert_eq!(render_value(&json!("42")), "42");
        assert_eq!(render_value(&json!(42)), "42");
        assert_eq!(render_value(&json!({"k": 1})), r#"{"k":1}"#);
    }
}
