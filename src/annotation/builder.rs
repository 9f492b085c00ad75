//! Graph write builder
//!
//! Turns validated annotations into the ordered, idempotent statements the
//! gateway executes, and builds the read-side queries of the service.

use super::codec::{extract_identifier, fold_scores, to_epoch};
use super::error::AnnotationResult;
use super::types::{Annotation, Concept, Provenance};
use crate::ontology::{label, LIFECYCLE, MENTIONS_RELATIONSHIP};
use crate::storage::{GraphWrite, Properties, Query, Statement};

/// Maximum number of entries returned by the popular-keyphrase query
pub const POPULAR_LIMIT: usize = 25;

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Clear-then-set upsert of a keyphrase node.
///
/// The first statement strips any previous classification from the node,
/// the second re-applies it with the current label, so reclassifying a
/// concept never leaves stale labels behind.
pub fn build_keyphrase_upsert(concept: &Concept) -> AnnotationResult<GraphWrite> {
    let uuid = extract_identifier(&concept.id)?;

    let mut properties = Properties::new();
    properties.insert("uuid".to_string(), uuid.into());
    properties.insert("prefLabel".to_string(), concept.pref_label.clone().into());

    Ok(GraphWrite::new()
        .with(Statement::RemoveLabels {
            uuid: uuid.to_string(),
            labels: labels(&[label::CONCEPT, label::KEYPHRASE]),
        })
        .with(Statement::MergeNode {
            uuid: uuid.to_string(),
            labels: labels(&[label::THING, label::CONCEPT, label::KEYPHRASE]),
            properties,
        }))
}

/// Upsert of the content node, the concept node, the concept's identifier
/// and the single mentions relationship carrying provenance.
///
/// Only the first provenance entry is read.
pub fn build_annotation_upsert(content_uuid: &str, annotation: &Annotation) -> AnnotationResult<GraphWrite> {
    let concept_uuid = extract_identifier(&annotation.concept.id)?;
    let properties = mention_properties(annotation.provenances.first())?;

    Ok(GraphWrite::new()
        .with(Statement::MergeNode {
            uuid: concept_uuid.to_string(),
            labels: labels(&[label::THING]),
            properties: Properties::new(),
        })
        .with(Statement::MergeNode {
            uuid: content_uuid.to_string(),
            labels: labels(&[label::THING]),
            properties: Properties::new(),
        })
        .with(Statement::MergeIdentifier {
            authority: label::CES_IDENTIFIER.to_string(),
            value: concept_uuid.to_string(),
            identifies: concept_uuid.to_string(),
        })
        .with(Statement::MergeRelationship {
            from: content_uuid.to_string(),
            to: concept_uuid.to_string(),
            rel_type: MENTIONS_RELATIONSHIP.to_string(),
            properties,
        }))
}

/// Property bag of the mentions relationship. Absent values are omitted.
fn mention_properties(provenance: Option<&Provenance>) -> AnnotationResult<Properties> {
    let mut properties = Properties::new();
    properties.insert("lifecycle".to_string(), LIFECYCLE.into());

    let Some(provenance) = provenance else {
        return Ok(properties);
    };

    if let Some(agent_role) = provenance.agent_role() {
        properties.insert("annotatedBy".to_string(), extract_identifier(agent_role)?.into());
    }
    if let Some(at_time) = provenance.at_time() {
        properties.insert("annotatedDateEpoch".to_string(), to_epoch(at_time)?.into());
        properties.insert("annotatedDate".to_string(), at_time.into());
    }

    let scores = fold_scores(&provenance.scores);
    if let Some(relevance) = scores.relevance_if_present() {
        properties.insert("relevanceScore".to_string(), relevance.into());
    }
    if let Some(confidence) = scores.confidence_if_present() {
        properties.insert("confidenceScore".to_string(), confidence.into());
    }

    Ok(properties)
}

/// Remove every keyphrase relationship of a content item.
pub fn build_delete(content_uuid: &str) -> GraphWrite {
    GraphWrite::new().with(Statement::DeleteRelationships {
        from: content_uuid.to_string(),
        target_label: label::KEYPHRASE.to_string(),
    })
}

pub fn read_query(content_uuid: &str) -> Query {
    Query::Annotations {
        content_uuid: content_uuid.to_string(),
    }
}

pub fn count_query() -> Query {
    Query::CountMentions {
        lifecycle: LIFECYCLE.to_string(),
    }
}

/// Popular keyphrases for content published after `cutoff` (epoch seconds)
pub fn popular_query(cutoff: i64) -> Query {
    Query::PopularKeyphrases {
        published_after: cutoff,
        limit: POPULAR_LIMIT,
    }
}

pub fn cooccurrence_query(keyphrase_uuid: &str, limit: usize) -> Query {
    Query::CoOccurrences {
        keyphrase_uuid: keyphrase_uuid.to_string(),
        limit,
    }
}

pub fn node_query(uuid: &str) -> Query {
    Query::Node {
        uuid: uuid.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::error::AnnotationError;
    use crate::annotation::types::{Score, ScoringSystem};
    use crate::storage::PropertyValue;

    const CONCEPT_UUID: &str = "aaaaaaaa-0000-0000-0000-000000000000";
    const AGENT_UUID: &str = "0edd3c31-1fd0-4ef6-9230-8d545be3880a";

    fn concept() -> Concept {
        Concept {
            id: format!("http://api.ft.com/things/{}", CONCEPT_UUID),
            pref_label: "interest rates".into(),
            types: vec!["http://www.ft.com/ontology/extraction/KeyPhrase".into()],
            predicate: None,
        }
    }

    fn full_provenance() -> Provenance {
        Provenance {
            scores: vec![
                Score::new(ScoringSystem::Relevance, 0.9),
                Score::new(ScoringSystem::Confidence, 0.8),
            ],
            agent_role: Some(format!("http://api.ft.com/things/{}", AGENT_UUID)),
            at_time: Some("2016-01-01T19:43:47.314Z".into()),
        }
    }

    fn relationship_properties(write: &GraphWrite) -> &Properties {
        match write.statements().last() {
            Some(Statement::MergeRelationship { properties, .. }) => properties,
            other => panic!("expected relationship merge last, got {:?}", other),
        }
    }

    #[test]
    fn keyphrase_upsert_clears_then_sets() {
        let write = build_keyphrase_upsert(&concept()).unwrap();
        assert_eq!(write.len(), 2);

        match &write.statements()[0] {
            Statement::RemoveLabels { uuid, labels } => {
                assert_eq!(uuid, CONCEPT_UUID);
                assert_eq!(labels, &vec!["Concept".to_string(), "Keyphrase".to_string()]);
            }
            other => panic!("unexpected first statement {:?}", other),
        }
        match &write.statements()[1] {
            Statement::MergeNode { uuid, labels, properties } => {
                assert_eq!(uuid, CONCEPT_UUID);
                assert!(labels.contains(&"Keyphrase".to_string()));
                assert_eq!(properties["prefLabel"], PropertyValue::from("interest rates"));
            }
            other => panic!("unexpected second statement {:?}", other),
        }
    }

    #[test]
    fn annotation_upsert_carries_full_provenance() {
        let annotation = Annotation {
            concept: concept(),
            provenances: vec![full_provenance()],
        };
        let write = build_annotation_upsert("c1", &annotation).unwrap();
        assert_eq!(write.len(), 4);

        match &write.statements()[2] {
            Statement::MergeIdentifier { authority, value, identifies } => {
                assert_eq!(authority, "CesIdentifier");
                assert_eq!(value, CONCEPT_UUID);
                assert_eq!(identifies, CONCEPT_UUID);
            }
            other => panic!("unexpected identifier statement {:?}", other),
        }

        let props = relationship_properties(&write);
        assert_eq!(props["lifecycle"], PropertyValue::from("keyphrase"));
        assert_eq!(props["annotatedBy"], PropertyValue::from(AGENT_UUID));
        assert_eq!(props["annotatedDate"], PropertyValue::from("2016-01-01T19:43:47.314Z"));
        assert_eq!(props["annotatedDateEpoch"], PropertyValue::Int(1_451_677_427));
        assert_eq!(props["relevanceScore"], PropertyValue::Float(0.9));
        assert_eq!(props["confidenceScore"], PropertyValue::Float(0.8));
    }

    #[test]
    fn annotation_upsert_without_provenance_only_tags_lifecycle() {
        let annotation = Annotation {
            concept: concept(),
            provenances: Vec::new(),
        };
        let write = build_annotation_upsert("c1", &annotation).unwrap();
        let props = relationship_properties(&write);
        assert_eq!(props.len(), 1);
        assert!(props.contains_key("lifecycle"));
    }

    #[test]
    fn partial_provenance_omits_missing_fields() {
        let annotation = Annotation {
            concept: concept(),
            provenances: vec![Provenance {
                scores: vec![Score::new(ScoringSystem::Confidence, 0.3)],
                agent_role: None,
                at_time: None,
            }],
        };
        let write = build_annotation_upsert("c1", &annotation).unwrap();
        let props = relationship_properties(&write);
        assert_eq!(props["confidenceScore"], PropertyValue::Float(0.3));
        assert!(!props.contains_key("relevanceScore"));
        assert!(!props.contains_key("annotatedBy"));
        assert!(!props.contains_key("annotatedDate"));
    }

    #[test]
    fn only_first_provenance_is_read() {
        let mut second = full_provenance();
        second.scores = vec![Score::new(ScoringSystem::Relevance, 0.1)];
        let annotation = Annotation {
            concept: concept(),
            provenances: vec![full_provenance(), second],
        };
        let write = build_annotation_upsert("c1", &annotation).unwrap();
        assert_eq!(relationship_properties(&write)["relevanceScore"], PropertyValue::Float(0.9));
    }

    #[test]
    fn same_inputs_build_same_write() {
        let annotation = Annotation {
            concept: concept(),
            provenances: vec![full_provenance()],
        };
        assert_eq!(
            build_annotation_upsert("c1", &annotation).unwrap(),
            build_annotation_upsert("c1", &annotation).unwrap()
        );
    }

    #[test]
    fn malformed_concept_id_is_rejected() {
        let mut bad = concept();
        bad.id = "http://api.ft.com/things/not-a-uuid".into();
        let annotation = Annotation {
            concept: bad.clone(),
            provenances: Vec::new(),
        };
        assert!(matches!(
            build_annotation_upsert("c1", &annotation),
            Err(AnnotationError::MalformedUri(_))
        ));
        assert!(matches!(build_keyphrase_upsert(&bad), Err(AnnotationError::MalformedUri(_))));
    }

    #[test]
    fn malformed_agent_role_is_rejected() {
        let mut provenance = full_provenance();
        provenance.agent_role = Some("http://api.ft.com/things/agent".into());
        let annotation = Annotation {
            concept: concept(),
            provenances: vec![provenance],
        };
        assert!(matches!(
            build_annotation_upsert("c1", &annotation),
            Err(AnnotationError::MalformedUri(_))
        ));
    }

    #[test]
    fn malformed_annotation_time_is_rejected() {
        let mut provenance = full_provenance();
        provenance.at_time = Some("01/01/2016".into());
        let annotation = Annotation {
            concept: concept(),
            provenances: vec![provenance],
        };
        assert!(matches!(
            build_annotation_upsert("c1", &annotation),
            Err(AnnotationError::MalformedTimestamp { .. })
        ));
    }

    #[test]
    fn delete_targets_keyphrase_relationships() {
        let write = build_delete("c1");
        assert_eq!(
            write.statements(),
            &[Statement::DeleteRelationships {
                from: "c1".into(),
                target_label: "Keyphrase".into(),
            }]
        );
    }

    #[test]
    fn popular_query_is_capped() {
        assert_eq!(
            popular_query(42),
            Query::PopularKeyphrases {
                published_after: 42,
                limit: POPULAR_LIMIT,
            }
        );
    }
}
