use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Location of a node in the document: a root-level map name followed by
/// nested map keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath(Vec<String>);

impl DocPath {
    /// The root-level map called `name`.
    pub fn top(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `self` equals `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &DocPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Owned projection of a document node, and the shape of a write.
///
/// `Map` and `Array` become shared collections that peers edit in place.
/// A `Value` is stored atomically, so a concurrent write to the same key
/// replaces it as a whole.
#[derive(Clone, Debug, PartialEq)]
pub enum SharedValue {
    Value(Value),
    Map(BTreeMap<String, SharedValue>),
    Array(Vec<Value>),
}

impl SharedValue {
    pub fn empty_map() -> Self {
        SharedValue::Map(BTreeMap::new())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SharedValue::Value(_) => "value",
            SharedValue::Map(_) => "map",
            SharedValue::Array(_) => "array",
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            SharedValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, SharedValue>> {
        match self {
            SharedValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            SharedValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// `true` for a `null` leaf, which readers treat like an absent key.
    pub fn is_null(&self) -> bool {
        matches!(self, SharedValue::Value(Value::Null))
    }

    /// Plain JSON projection of the subtree.
    pub fn to_json(&self) -> Value {
        match self {
            SharedValue::Value(v) => v.clone(),
            SharedValue::Map(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            SharedValue::Array(a) => Value::Array(a.clone()),
        }
    }
}

impl From<Value> for SharedValue {
    fn from(value: Value) -> Self {
        SharedValue::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_display_and_prefix() {
        let cells = DocPath::top("cells");
        let cell = cells.child("abc");
        assert_eq!(cell.to_string(), "/cells/abc");
        assert_eq!(DocPath::default().to_string(), "/");
        assert!(cell.starts_with(&cells));
        assert!(!cells.starts_with(&cell));
    }

    #[test]
    fn test_to_json_projects_nested_nodes() {
        let mut styles = BTreeMap::new();
        styles.insert("fillColor".to_string(), SharedValue::from(json!("#fff")));
        let mut style = BTreeMap::new();
        style.insert("classes".to_string(), SharedValue::Array(vec![json!("rounded")]));
        style.insert("styles".to_string(), SharedValue::Map(styles));
        let mut cell = BTreeMap::new();
        cell.insert("style".to_string(), SharedValue::Map(style));
        cell.insert("vertex".to_string(), SharedValue::from(json!(true)));

        assert_eq!(
            SharedValue::Map(cell).to_json(),
            json!({
                "style": {"classes": ["rounded"], "styles": {"fillColor": "#fff"}},
                "vertex": true
            })
        );
    }
}
