//! Runtime node results and the single type-conformance check used
//! throughout the core.

use crate::id::ResultKind;
use std::collections::HashMap;

/// The result produced by a node, tagged with enough structure to check it
/// against a [`ResultKind`] without a reflective type system.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Scalar(serde_json::Value),
    List(Vec<NodeValue>),
    Map(HashMap<String, NodeValue>),
    /// A bundle whose entries are exposed as virtual sibling nodes.
    Bundle(HashMap<String, NodeValue>),
    Unit,
}

impl NodeValue {
    /// Look up an entry of a `Map`/`Bundle` value by key, as `KeyedItem`
    /// nodes do.
    pub fn get(&self, key: &str) -> Option<&NodeValue> {
        match self {
            NodeValue::Map(m) | NodeValue::Bundle(m) => m.get(key),
            _ => None,
        }
    }

    /// Entries of a `Bundle` value, as bundle-result propagation needs.
    pub fn bundle_entries(&self) -> Option<&HashMap<String, NodeValue>> {
        match self {
            NodeValue::Bundle(m) => Some(m),
            _ => None,
        }
    }

    /// Check this value against a declared [`ResultKind`], recursing into
    /// `List`/`Map`/`Optional` exactly as the spec's `NodeContext::lookup`
    /// requires. This is the single validation path both `NodeContext` and
    /// `NodeProcessor` use — standardising the inconsistent checks the
    /// source runtime performed in different places.
    pub fn conforms_to(&self, kind: &ResultKind) -> bool {
        match (kind, self) {
            (ResultKind::Any, _) => true,
            (ResultKind::Unit, NodeValue::Unit) => true,
            (ResultKind::Scalar, NodeValue::Scalar(_)) => true,
            (ResultKind::Bundle, NodeValue::Bundle(_)) => true,
            (ResultKind::List(elem), NodeValue::List(items)) => {
                items.iter().all(|v| v.conforms_to(elem))
            }
            (ResultKind::Map(elem), NodeValue::Map(entries)) => {
                entries.values().all(|v| v.conforms_to(elem))
            }
            (ResultKind::Optional(inner), v) => v.conforms_to(inner),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_conforms_to_scalar_only() {
        let v = NodeValue::Scalar(serde_json::json!(1));
        assert!(v.conforms_to(&ResultKind::Scalar));
        assert!(!v.conforms_to(&ResultKind::Bundle));
        assert!(v.conforms_to(&ResultKind::Any));
    }

    #[test]
    fn list_conformance_recurses() {
        let v = NodeValue::List(vec![
            NodeValue::Scalar(serde_json::json!(1)),
            NodeValue::Scalar(serde_json::json!(2)),
        ]);
        assert!(v.conforms_to(&ResultKind::List(Box::new(ResultKind::Scalar))));
        assert!(!v.conforms_to(&ResultKind::List(Box::new(ResultKind::Bundle))));
    }

    #[test]
    fn optional_unwraps_inner_kind() {
        let v = NodeValue::Scalar(serde_json::json!(null));
        assert!(v.conforms_to(&ResultKind::Optional(Box::new(ResultKind::Scalar))));
    }
}
