//! Annotation data types, shaped like the concept-suggestion wire format

use super::error::{AnnotationError, AnnotationResult};
use crate::ontology::{CONFIDENCE_SCORING_SYSTEM, KEYPHRASE_ONTOLOGY, RELEVANCE_SCORING_SYSTEM};
use serde::{Deserialize, Deserializer, Serialize};

/// Producers send `null` for empty arrays and strings; read it as the default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One feed-delivered batch of candidate annotations for a content item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "uuid", default, deserialize_with = "null_as_default")]
    pub content_uuid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub suggestions: Vec<Annotation>,
}

impl Suggestion {
    /// Decode a suggestion message body
    pub fn from_json(body: &str) -> AnnotationResult<Self> {
        serde_json::from_str(body).map_err(AnnotationError::Decode)
    }

    /// Annotations whose concept is classified as a keyphrase
    pub fn keyphrases(&self) -> impl Iterator<Item = &Annotation> {
        self.suggestions.iter().filter(|a| a.concept.is_keyphrase())
    }
}

/// A candidate link from a content item to a concept
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "thing", default, deserialize_with = "null_as_default")]
    pub concept: Concept,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub provenances: Vec<Provenance>,
}

/// The concept being linked to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub pref_label: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
}

impl Concept {
    /// True if any of the concept's type URIs carries the keyphrase ontology
    pub fn is_keyphrase(&self) -> bool {
        self.types.iter().any(|t| t.contains(KEYPHRASE_ONTOLOGY))
    }
}

/// Who produced an annotation, when, and how confidently
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub scores: Vec<Score>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_time: Option<String>,
}

impl Provenance {
    /// Agent role, treating an empty string as absent
    pub fn agent_role(&self) -> Option<&str> {
        self.agent_role.as_deref().filter(|s| !s.is_empty())
    }

    /// Annotation time, treating an empty string as absent
    pub fn at_time(&self) -> Option<&str> {
        self.at_time.as_deref().filter(|s| !s.is_empty())
    }
}

/// A single scored measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    #[serde(default, deserialize_with = "null_as_default")]
    pub scoring_system: ScoringSystem,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: f64,
}

impl Score {
    pub fn new(scoring_system: ScoringSystem, value: f64) -> Self {
        Self {
            scoring_system,
            value,
        }
    }
}

/// Scoring system of a score, decoded from its URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScoringSystem {
    Relevance,
    Confidence,
    Other(String),
}

impl Default for ScoringSystem {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for ScoringSystem {
    fn from(uri: String) -> Self {
        match uri.as_str() {
            RELEVANCE_SCORING_SYSTEM => Self::Relevance,
            CONFIDENCE_SCORING_SYSTEM => Self::Confidence,
            _ => Self::Other(uri),
        }
    }
}

impl From<ScoringSystem> for String {
    fn from(system: ScoringSystem) -> Self {
        match system {
            ScoringSystem::Relevance => RELEVANCE_SCORING_SYSTEM.to_string(),
            ScoringSystem::Confidence => CONFIDENCE_SCORING_SYSTEM.to_string(),
            ScoringSystem::Other(uri) => uri,
        }
    }
}

/// Keyphrase ranked by mentions in a time window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularKeyphrase {
    #[serde(rename = "keyphrase")]
    pub name: String,
    pub count: i64,
}

/// A concept co-mentioned with a keyphrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoOccurrence {
    #[serde(rename = "cooccurrence")]
    pub count: i64,
    #[serde(rename = "conceptId")]
    pub concept_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub concept_types: Vec<String>,
    /// URI of the most specific type of the concept
    #[serde(rename = "conceptType")]
    pub concept_type: String,
}

/// Co-occurring concepts for one keyphrase, most frequent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoOccurrences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyphrase_label: Option<String>,
    pub keyphrase_uuid: String,
    pub co_occurrences: Vec<CoOccurrence>,
}
