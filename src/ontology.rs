//! Ontology vocabulary: node labels, type URIs and the type hierarchy
//!
//! Labels are what the graph store carries on nodes; type URIs are what the
//! wire payloads and HTTP responses carry. `OntologyTypeMapper` converts
//! between the two and picks the most specific type of a label set.

use std::collections::HashMap;
use thiserror::Error;

/// Node labels used by this service
pub mod label {
    pub const THING: &str = "Thing";
    pub const CONCEPT: &str = "Concept";
    pub const KEYPHRASE: &str = "Keyphrase";
    pub const CONTENT: &str = "Content";
    pub const CES_IDENTIFIER: &str = "CesIdentifier";
}

/// Type URI marking a concept as a keyphrase
pub const KEYPHRASE_ONTOLOGY: &str = "http://www.ft.com/ontology/extraction/KeyPhrase";

/// Predicate URI of the content → concept relationship
pub const MENTIONS_PREDICATE: &str = "http://www.ft.com/ontology/annotation/mentions";

/// Relationship type stored for the mentions predicate
pub const MENTIONS_RELATIONSHIP: &str = "MENTIONS";

pub const RELEVANCE_SCORING_SYSTEM: &str = "http://api.ft.com/scoringsystem/FT-RELEVANCE-SYSTEM";
pub const CONFIDENCE_SCORING_SYSTEM: &str = "http://api.ft.com/scoringsystem/FT-CONFIDENCE-SYSTEM";

/// Prefix of canonical concept URIs returned by reads
pub const THING_URI_PREFIX: &str = "http://api.ft.com/things/";

/// Lifecycle tag placed on every relationship this service writes
pub const LIFECYCLE: &str = "keyphrase";

/// Predicate URI for a stored relationship type, if it is one we know.
pub fn predicate_for_relationship(rel_type: &str) -> Option<&'static str> {
    match rel_type {
        MENTIONS_RELATIONSHIP => Some(MENTIONS_PREDICATE),
        _ => None,
    }
}

/// Errors from type resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeMappingError {
    #[error("no types supplied")]
    NoTypes,

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("types do not form a single hierarchy: {0:?}")]
    NotHierarchy(Vec<String>),
}

/// Resolves node labels to ontology types
pub trait TypeMapper: Send + Sync {
    /// URI of the most specific type in `labels`.
    ///
    /// Every label must be known and all of them must lie on one path of
    /// the hierarchy.
    fn most_specific_type(&self, labels: &[String]) -> Result<String, TypeMappingError>;

    /// URIs of the known labels, most general first. Unknown labels are skipped.
    fn type_uris(&self, labels: &[String]) -> Vec<String>;
}

struct TypeEntry {
    parent: Option<&'static str>,
    uri: &'static str,
}

/// Static type hierarchy rooted at `Thing`
pub struct OntologyTypeMapper {
    types: HashMap<&'static str, TypeEntry>,
}

impl OntologyTypeMapper {
    pub fn new() -> Self {
        let entries: [(&'static str, Option<&'static str>, &'static str); 19] = [
            (label::THING, None, "http://www.ft.com/ontology/core/Thing"),
            (label::CONCEPT, Some(label::THING), "http://www.ft.com/ontology/concept/Concept"),
            (label::CONTENT, Some(label::THING), "http://www.ft.com/ontology/content/Content"),
            (label::KEYPHRASE, Some(label::CONCEPT), KEYPHRASE_ONTOLOGY),
            ("Classification", Some(label::CONCEPT), "http://www.ft.com/ontology/classification/Classification"),
            ("Person", Some(label::CONCEPT), "http://www.ft.com/ontology/person/Person"),
            ("Organisation", Some(label::CONCEPT), "http://www.ft.com/ontology/organisation/Organisation"),
            ("Company", Some("Organisation"), "http://www.ft.com/ontology/company/Company"),
            ("PublicCompany", Some("Company"), "http://www.ft.com/ontology/company/PublicCompany"),
            ("PrivateCompany", Some("Company"), "http://www.ft.com/ontology/company/PrivateCompany"),
            ("Brand", Some("Classification"), "http://www.ft.com/ontology/product/Brand"),
            ("Subject", Some("Classification"), "http://www.ft.com/ontology/Subject"),
            ("Section", Some("Classification"), "http://www.ft.com/ontology/Section"),
            ("Genre", Some("Classification"), "http://www.ft.com/ontology/Genre"),
            ("Topic", Some(label::CONCEPT), "http://www.ft.com/ontology/Topic"),
            ("Location", Some(label::CONCEPT), "http://www.ft.com/ontology/Location"),
            ("SpecialReport", Some("Classification"), "http://www.ft.com/ontology/SpecialReport"),
            ("AlphavilleSeries", Some("Classification"), "http://www.ft.com/ontology/AlphavilleSeries"),
            ("FinancialInstrument", Some(label::CONCEPT), "http://www.ft.com/ontology/FinancialInstrument"),
        ];

        let types = entries
            .into_iter()
            .map(|(name, parent, uri)| (name, TypeEntry { parent, uri }))
            .collect();

        Self { types }
    }

    /// Ancestors of a known label, nearest first
    fn ancestors(&self, name: &str) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut current = self.types.get(name).and_then(|e| e.parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.types.get(parent).and_then(|e| e.parent);
        }
        out
    }

    fn depth(&self, name: &str) -> usize {
        self.ancestors(name).len()
    }
}

impl Default for OntologyTypeMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMapper for OntologyTypeMapper {
    fn most_specific_type(&self, labels: &[String]) -> Result<String, TypeMappingError> {
        if labels.is_empty() {
            return Err(TypeMappingError::NoTypes);
        }
        if let Some(unknown) = labels.iter().find(|l| !self.types.contains_key(l.as_str())) {
            return Err(TypeMappingError::UnknownType(unknown.clone()));
        }

        let deepest = labels
            .iter()
            .max_by_key(|l| self.depth(l))
            .ok_or(TypeMappingError::NoTypes)?;
        let lineage = self.ancestors(deepest);

        let on_one_path = labels
            .iter()
            .all(|l| l == deepest || lineage.contains(&l.as_str()));
        if !on_one_path {
            return Err(TypeMappingError::NotHierarchy(labels.to_vec()));
        }

        self.types
            .get(deepest.as_str())
            .map(|e| e.uri.to_string())
            .ok_or_else(|| TypeMappingError::UnknownType(deepest.clone()))
    }

    fn type_uris(&self, labels: &[String]) -> Vec<String> {
        let mut known: Vec<&String> = labels
            .iter()
            .filter(|l| self.types.contains_key(l.as_str()))
            .collect();
        known.sort_by_key(|l| (self.depth(l), l.as_str()));
        known.dedup();
        known
            .into_iter()
            .filter_map(|l| self.types.get(l.as_str()).map(|e| e.uri.to_string()))
            .collect()
    }
}
