use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Cache key: resource name followed by scope and filter parameters,
/// e.g. `["events", "list", {"status": "draft"}]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
    pub fn root(resource: &str) -> Self {
        Self(vec![Value::String(resource.to_string())])
    }

    /// Extend the key with another segment.
    /// Parameters that cannot be represented as JSON become `null`.
    pub fn child<T: Serialize + ?Sized>(&self, part: &T) -> Self {
        let mut parts = self.0.clone();
        parts.push(serde_json::to_value(part).unwrap_or(Value::Null));
        Self(parts)
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0.iter().zip(prefix.0.iter()).all(|(a, b)| a == b)
    }

    /// Canonical string form used as the storage key.
    /// Object members serialize in sorted order, so equal keys hash equally.
    pub(crate) fn hash_key(&self) -> String {
        Value::Array(self.0.clone()).to_string()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefix_matching() {
        let all = QueryKey::root("events");
        let lists = all.child("list");
        let list = lists.child(&json!({"status": "draft"}));
        let detail = all.child("detail").child("e-1");

        assert!(list.starts_with(&all));
        assert!(list.starts_with(&lists));
        assert!(!detail.starts_with(&lists));
        assert!(!all.starts_with(&list));
        assert!(!QueryKey::root("users").starts_with(&all));
    }

    #[test]
    fn test_hash_key_ignores_member_order() {
        let a = QueryKey::root("r").child(&json!({"eventId": "e", "page": 1}));
        let b = QueryKey::root("r").child(&json!({"page": 1, "eventId": "e"}));
        assert_eq!(a.hash_key(), b.hash_key());
        assert_eq!(QueryKey::root("auth").child("user").to_string(), r#"["auth","user"]"#);
    }
}
