//! Structured cell styles.
//!
//! A style string is a `;`-separated list of tokens. A token is either a
//! bare class name (`rounded`) or a property (`fillColor=#ffffff`):
//!
//! ```text
//! "rounded;dashed;fillColor=#000000;"
//!        │
//!        ▼  parse
//! StyleData { classes: ["rounded", "dashed"], styles: {fillColor: "#000000"} }
//!        │
//!        ▼  diff against the previous StyleData
//! StyleDiff { added_classes, removed_classes, changed_styles }
//! ```
//!
//! The structured form is what gets replicated, so a single class or
//! property change becomes a small document edit instead of a string rewrite.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Decomposed style: ordered classes plus a property map.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct StyleData {
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
}

impl StyleData {
    /// Parses a style string. Whitespace-only tokens are dropped, every
    /// other token is kept as written. A repeated property keeps its last
    /// value and a repeated class is kept once.
    pub fn parse(style: &str) -> Self {
        let mut data = StyleData::default();
        for token in style.split(';') {
            match token.split_once('=') {
                Some((key, value)) => {
                    data.styles.insert(key.to_string(), value.to_string());
                }
                None if token.trim().is_empty() => {}
                None => data.add_class(token),
            }
        }
        data
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.styles.is_empty()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Appends `class` unless it is already present.
    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    /// Removes `class` if present. Returns whether anything changed.
    pub fn remove_class(&mut self, class: &str) -> bool {
        let before = self.classes.len();
        self.classes.retain(|c| c != class);
        before != self.classes.len()
    }

    /// Computes the structural difference from `self` (old) to `new`.
    pub fn diff(&self, new: &StyleData) -> StyleDiff {
        let added_classes = new
            .classes
            .iter()
            .filter(|c| !self.has_class(c))
            .cloned()
            .collect();
        let removed_classes = self
            .classes
            .iter()
            .filter(|c| !new.has_class(c))
            .cloned()
            .collect();

        let mut changed_styles = BTreeMap::new();
        for (name, value) in &new.styles {
            if self.styles.get(name) != Some(value) {
                changed_styles.insert(name.clone(), Some(value.clone()));
            }
        }
        for name in self.styles.keys() {
            if !new.styles.contains_key(name) {
                changed_styles.insert(name.clone(), None);
            }
        }

        StyleDiff {
            added_classes,
            removed_classes,
            changed_styles,
        }
    }

    /// Applies a diff in place: removals first, then additions, then
    /// property changes.
    pub fn apply(&mut self, diff: &StyleDiff) {
        for class in &diff.removed_classes {
            self.remove_class(class);
        }
        for class in &diff.added_classes {
            self.add_class(class);
        }
        for (name, value) in &diff.changed_styles {
            match value {
                Some(value) => {
                    self.styles.insert(name.clone(), value.clone());
                }
                None => {
                    self.styles.remove(name);
                }
            }
        }
    }
}

/// Formats the style string: every class followed by `;`, then every
/// `key=value;` in key order.
impl fmt::Display for StyleData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in &self.classes {
            write!(f, "{class};")?;
        }
        for (key, value) in &self.styles {
            write!(f, "{key}={value};")?;
        }
        Ok(())
    }
}

/// Structural difference between two [`StyleData`] values.
///
/// `changed_styles` maps a property to its new value, or to `None` when the
/// property was removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleDiff {
    pub added_classes: Vec<String>,
    pub removed_classes: Vec<String>,
    pub changed_styles: BTreeMap<String, Option<String>>,
}

impl StyleDiff {
    pub fn is_empty(&self) -> bool {
        self.added_classes.is_empty()
            && self.removed_classes.is_empty()
            && self.changed_styles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(classes: &[&str], styles: &[(&str, &str)]) -> StyleData {
        StyleData {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            styles: styles
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_parse_classes_and_properties() {
        let data = StyleData::parse("rounded;fillColor=#ffffff");
        assert_eq!(data, style(&["rounded"], &[("fillColor", "#ffffff")]));
    }

    #[test]
    fn test_parse_drops_blank_tokens() {
        let data = StyleData::parse(";;  ;shadow; ;");
        assert_eq!(data, style(&["shadow"], &[]));
    }

    #[test]
    fn test_parse_keeps_token_bytes() {
        let data = StyleData::parse(" a;fillColor= #fff ");
        assert_eq!(data, style(&[" a"], &[("fillColor", " #fff ")]));
        assert_eq!(data.to_string(), " a;fillColor= #fff ;");
    }

    #[test]
    fn test_parse_last_property_wins() {
        let data = StyleData::parse("strokeWidth=1;strokeWidth=3");
        assert_eq!(data.styles.get("strokeWidth").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_parse_keeps_equals_in_value() {
        let data = StyleData::parse("label=a=b");
        assert_eq!(data.styles.get("label").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(StyleData::parse("").is_empty());
    }

    #[test]
    fn test_format_classes_then_sorted_properties() {
        let data = style(&["b", "a"], &[("z", "1"), ("m", "2")]);
        assert_eq!(data.to_string(), "b;a;m=2;z=1;");
    }

    #[test]
    fn test_structured_round_trip_is_stable() {
        let inputs = [
            "rounded;fillColor=#ffffff",
            "z=1;a;b=2;a;;c",
            "shape=ellipse;perimeter=ellipsePerimeter;whiteSpace=wrap",
            "dashed",
        ];
        for input in inputs {
            let first = StyleData::parse(input);
            let again = StyleData::parse(&first.to_string());
            assert_eq!(first, again, "unstable for {input:?}");
        }
    }

    #[test]
    fn test_diff_reports_minimal_changes() {
        let old = style(&["a", "b"], &[("x", "1")]);
        let new = style(&["b", "c"], &[("x", "2"), ("y", "3")]);

        let diff = old.diff(&new);
        assert_eq!(diff.added_classes, vec!["c".to_string()]);
        assert_eq!(diff.removed_classes, vec!["a".to_string()]);
        assert_eq!(diff.changed_styles.get("x"), Some(&Some("2".to_string())));
        assert_eq!(diff.changed_styles.get("y"), Some(&Some("3".to_string())));
        assert_eq!(diff.changed_styles.len(), 2);

        let mut patched = old.clone();
        patched.apply(&diff);
        assert_eq!(patched, new);
    }

    #[test]
    fn test_diff_reports_removed_property() {
        let old = style(&[], &[("x", "1"), ("y", "2")]);
        let new = style(&[], &[("y", "2")]);
        let diff = old.diff(&new);
        assert_eq!(diff.changed_styles.get("x"), Some(&None));
        assert_eq!(diff.changed_styles.len(), 1);
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let s = style(&["a"], &[("x", "1")]);
        assert!(s.diff(&s.clone()).is_empty());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let old = style(&["a"], &[]);
        let new = style(&["a", "b"], &[("k", "v")]);
        let diff = old.diff(&new);

        let mut once = old.clone();
        once.apply(&diff);
        let mut twice = once.clone();
        twice.apply(&diff);
        assert_eq!(once, twice);
    }
}
