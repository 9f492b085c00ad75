//! Annotation service
//!
//! Orchestrates validation, statement building and gateway calls for the
//! keyphrase annotations of a content item. Every call is an independent
//! round trip to the store.

use super::builder::{
    build_annotation_upsert, build_delete, build_keyphrase_upsert, cooccurrence_query, count_query,
    node_query, popular_query, read_query,
};
use super::error::{AnnotationError, AnnotationResult};
use super::types::{
    Annotation, CoOccurrence, CoOccurrences, Concept, PopularKeyphrase, Provenance, Score, ScoringSystem,
};
use super::validate::validate;
use crate::ontology::{predicate_for_relationship, OntologyTypeMapper, TypeMapper, THING_URI_PREFIX};
use crate::storage::{GraphGateway, Properties, Row, StorageError};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationRow {
    uuid: String,
    #[serde(default)]
    pref_label: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    relationship: String,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

#[derive(Debug, Deserialize)]
struct PopularRow {
    keyphrase: String,
    count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoOccurrenceRow {
    cooccurrence: i64,
    concept_uuid: String,
    #[serde(default)]
    concept_label: Option<String>,
    #[serde(default)]
    concept_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRow {
    #[serde(default)]
    pref_label: Option<String>,
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> AnnotationResult<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(serde_json::Value::Object(row))
                .map_err(|e| AnnotationError::StoreUnavailable(StorageError::Serialization(e)))
        })
        .collect()
}

fn require_content_id(content_uuid: &str) -> AnnotationResult<()> {
    if content_uuid.is_empty() {
        return Err(AnnotationError::EmptyContentId);
    }
    Ok(())
}

/// Service for keyphrase annotations over a graph gateway
#[derive(Clone)]
pub struct AnnotationService {
    gateway: Arc<dyn GraphGateway>,
    type_mapper: Arc<dyn TypeMapper>,
}

impl AnnotationService {
    /// Create a service using the default ontology type mapper
    pub fn new(gateway: Arc<dyn GraphGateway>) -> Self {
        Self::with_type_mapper(gateway, Arc::new(OntologyTypeMapper::new()))
    }

    pub fn with_type_mapper(gateway: Arc<dyn GraphGateway>, type_mapper: Arc<dyn TypeMapper>) -> Self {
        Self { gateway, type_mapper }
    }

    /// Ensure store schema and uniqueness constraints exist
    pub async fn initialise(&self) -> AnnotationResult<()> {
        self.gateway.ensure_constraints().await?;
        info!("graph store constraints ensured");
        Ok(())
    }

    /// Store liveness
    pub async fn check(&self) -> AnnotationResult<()> {
        self.gateway.check().await.map_err(|e| {
            warn!(error = %e, "graph store check failed");
            AnnotationError::from(e)
        })
    }

    /// Upsert one keyphrase annotation for a content item.
    ///
    /// Both batches are built before the store is touched, so malformed
    /// identifiers or timestamps never leave a partial write behind.
    #[instrument(skip(self, annotation), fields(concept = %annotation.concept.id))]
    pub async fn write(&self, content_uuid: &str, annotation: &Annotation) -> AnnotationResult<()> {
        require_content_id(content_uuid)?;
        if let Err(e) = validate(annotation) {
            warn!(error = %e, "rejecting annotation");
            return Err(e);
        }

        let keyphrase = build_keyphrase_upsert(&annotation.concept)?;
        let mention = build_annotation_upsert(content_uuid, annotation)?;

        for batch in [&keyphrase, &mention] {
            debug!(statements = batch.len(), "executing graph write");
            if let Err(e) = self.gateway.execute_batch(batch).await {
                error!(error = %e, "graph write failed");
                return Err(e.into());
            }
        }

        info!("annotation written");
        Ok(())
    }

    /// First keyphrase annotation of a content item, by concept uuid
    pub async fn read(&self, content_uuid: &str) -> AnnotationResult<Option<Annotation>> {
        Ok(self.read_all(content_uuid).await?.into_iter().next())
    }

    /// Every keyphrase annotation of a content item, ordered by concept uuid
    #[instrument(skip(self))]
    pub async fn read_all(&self, content_uuid: &str) -> AnnotationResult<Vec<Annotation>> {
        require_content_id(content_uuid)?;
        let rows = self.gateway.execute_query(&read_query(content_uuid)).await?;
        let rows: Vec<AnnotationRow> = decode_rows(rows)?;
        debug!(found = rows.len(), "read annotations");
        Ok(rows.into_iter().map(|row| self.to_annotation(row)).collect())
    }

    fn to_annotation(&self, row: AnnotationRow) -> Annotation {
        let concept = Concept {
            id: format!("{}{}", THING_URI_PREFIX, row.uuid),
            pref_label: row.pref_label.unwrap_or_default(),
            types: self.type_mapper.type_uris(&row.labels),
            predicate: predicate_for_relationship(&row.relationship).map(str::to_string),
        };

        let props = &row.properties;
        let mut scores = Vec::new();
        if let Some(value) = props.get("relevanceScore").and_then(|v| v.as_f64()) {
            scores.push(Score::new(ScoringSystem::Relevance, value));
        }
        if let Some(value) = props.get("confidenceScore").and_then(|v| v.as_f64()) {
            scores.push(Score::new(ScoringSystem::Confidence, value));
        }
        let agent_role = props
            .get("annotatedBy")
            .and_then(|v| v.as_str())
            .map(|uuid| format!("{}{}", THING_URI_PREFIX, uuid));
        let at_time = props
            .get("annotatedDate")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let provenances = if scores.is_empty() && agent_role.is_none() && at_time.is_none() {
            Vec::new()
        } else {
            vec![Provenance {
                scores,
                agent_role,
                at_time,
            }]
        };

        Annotation { concept, provenances }
    }

    /// Remove every keyphrase annotation of a content item.
    ///
    /// Returns false when there was nothing to remove.
    #[instrument(skip(self))]
    pub async fn delete(&self, content_uuid: &str) -> AnnotationResult<bool> {
        require_content_id(content_uuid)?;
        let stats = self.gateway.execute_batch(&build_delete(content_uuid)).await.map_err(|e| {
            error!(error = %e, "delete failed");
            AnnotationError::from(e)
        })?;
        info!(found = stats.contains_updates, "annotations deleted");
        Ok(stats.contains_updates)
    }

    /// Number of keyphrase mentions in the store
    pub async fn count(&self) -> AnnotationResult<i64> {
        let rows: Vec<CountRow> = decode_rows(self.gateway.execute_query(&count_query()).await?)?;
        Ok(rows.first().map(|r| r.count).unwrap_or(0))
    }

    /// Most mentioned keyphrases in content published within the last
    /// `window_seconds`
    pub async fn get_popular(&self, window_seconds: i64) -> AnnotationResult<Vec<PopularKeyphrase>> {
        let cutoff = Utc::now().timestamp() - window_seconds;
        self.popular_since(cutoff).await
    }

    /// Most mentioned keyphrases in content published strictly after `cutoff`
    pub async fn popular_since(&self, cutoff: i64) -> AnnotationResult<Vec<PopularKeyphrase>> {
        let rows: Vec<PopularRow> = decode_rows(self.gateway.execute_query(&popular_query(cutoff)).await?)?;
        Ok(rows
            .into_iter()
            .map(|r| PopularKeyphrase {
                name: r.keyphrase,
                count: r.count,
            })
            .collect())
    }

    /// Concepts co-mentioned with a keyphrase, most frequent first.
    ///
    /// Fails as a whole if any concept's type cannot be resolved.
    #[instrument(skip(self))]
    pub async fn get_co_occurrence(&self, keyphrase_uuid: &str, limit: usize) -> AnnotationResult<Option<CoOccurrences>> {
        let rows: Vec<CoOccurrenceRow> = decode_rows(
            self.gateway
                .execute_query(&cooccurrence_query(keyphrase_uuid, limit))
                .await?,
        )?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut co_occurrences = Vec::with_capacity(rows.len());
        for row in rows {
            let concept_type = self
                .type_mapper
                .most_specific_type(&row.concept_types)
                .map_err(|source| {
                    warn!(concept = %row.concept_uuid, error = %source, "type resolution failed");
                    AnnotationError::TypeResolution {
                        concept_uuid: row.concept_uuid.clone(),
                        source,
                    }
                })?;
            co_occurrences.push(CoOccurrence {
                count: row.cooccurrence,
                concept_uuid: row.concept_uuid,
                concept_label: row.concept_label,
                concept_types: row.concept_types,
                concept_type,
            });
        }

        let nodes: Vec<NodeRow> = decode_rows(self.gateway.execute_query(&node_query(keyphrase_uuid)).await?)?;
        let keyphrase_label = nodes.into_iter().next().and_then(|n| n.pref_label);

        Ok(Some(CoOccurrences {
            keyphrase_label,
            keyphrase_uuid: keyphrase_uuid.to_string(),
            co_occurrences,
        }))
    }
}
