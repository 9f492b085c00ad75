//! Statement and query vocabulary understood by a graph gateway
//!
//! Every mutation carries its own bound parameters, so a `GraphWrite` is a
//! self-contained unit of work. All mutations have merge semantics: running
//! the same statement twice leaves the store as running it once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed property values stored on nodes and relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Property bag, ordered by key so serialized bags are stable
pub type Properties = BTreeMap<String, PropertyValue>;

/// A single idempotent mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Strip labels from a node. Matching no node is a no-op.
    RemoveLabels { uuid: String, labels: Vec<String> },

    /// Ensure a node exists, add labels, and set the given properties on it.
    /// Properties not named here are left untouched.
    MergeNode {
        uuid: String,
        labels: Vec<String>,
        properties: Properties,
    },

    /// Ensure an identifier issued by `authority` exists and identifies a node.
    MergeIdentifier {
        authority: String,
        value: String,
        identifies: String,
    },

    /// Ensure exactly one relationship of `rel_type` exists between two
    /// nodes and replace its whole property bag.
    MergeRelationship {
        from: String,
        to: String,
        rel_type: String,
        properties: Properties,
    },

    /// Delete every outgoing relationship of `from` whose target carries
    /// `target_label`.
    DeleteRelationships { from: String, target_label: String },
}

/// Ordered batch of statements executed atomically by a gateway
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphWrite {
    statements: Vec<Statement>,
}

impl GraphWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement (builder style)
    pub fn with(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Execution statistics for a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// True if any statement in the batch changed the store
    pub contains_updates: bool,
}

/// Read queries a gateway can answer.
///
/// Rows come back as JSON objects; the field names are documented per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Relationships from a content node to keyphrase nodes, ordered by
    /// keyphrase uuid.
    ///
    /// Row: `{uuid, prefLabel, labels, relationship, properties}`
    Annotations { content_uuid: String },

    /// Number of relationships into keyphrase nodes whose `lifecycle`
    /// property equals the given tag or is unset.
    ///
    /// Row: `{count}`
    CountMentions { lifecycle: String },

    /// Keyphrases mentioned by content published strictly after
    /// `published_after` (epoch seconds), by mention count descending.
    ///
    /// Row: `{keyphrase, count}`
    PopularKeyphrases { published_after: i64, limit: usize },

    /// Concepts mentioned by the same content items as a keyphrase, by
    /// co-occurrence count descending.
    ///
    /// Row: `{cooccurrence, conceptUuid, conceptLabel, conceptTypes}`
    CoOccurrences { keyphrase_uuid: String, limit: usize },

    /// A single node. Row: `{uuid, prefLabel, labels}`
    Node { uuid: String },
}

/// One result row
pub type Row = serde_json::Map<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_values_serialize_untagged() {
        let mut props = Properties::new();
        props.insert("lifecycle".to_string(), "keyphrase".into());
        props.insert("annotatedDateEpoch".to_string(), 1_469_000_000i64.into());
        props.insert("relevanceScore".to_string(), 0.9.into());

        let json = serde_json::to_string(&props).unwrap();
        assert_eq!(
            json,
            r#"{"annotatedDateEpoch":1469000000,"lifecycle":"keyphrase","relevanceScore":0.9}"#
        );

        let back: Properties = serde_json::from_str(&json).unwrap();
        assert_eq!(back["annotatedDateEpoch"].as_i64(), Some(1_469_000_000));
        assert_eq!(back["relevanceScore"].as_f64(), Some(0.9));
        assert_eq!(back["lifecycle"].as_str(), Some("keyphrase"));
    }

    #[test]
    fn integer_scores_widen_to_float() {
        let value: PropertyValue = serde_json::from_str("1").unwrap();
        assert_eq!(value, PropertyValue::Int(1));
        assert_eq!(value.as_f64(), Some(1.0));
    }

    #[test]
    fn graph_write_preserves_statement_order() {
        let write = GraphWrite::new()
            .with(Statement::RemoveLabels {
                uuid: "a".into(),
                labels: vec!["Keyphrase".into()],
            })
            .with(Statement::DeleteRelationships {
                from: "c".into(),
                target_label: "Keyphrase".into(),
            });

        assert_eq!(write.len(), 2);
        assert!(matches!(write.statements()[0], Statement::RemoveLabels { .. }));
        assert!(matches!(
            write.statements()[1],
            Statement::DeleteRelationships { .. }
        ));
        assert!(GraphWrite::new().is_empty());
    }
}
