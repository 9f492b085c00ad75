//! SQLite-backed graph gateway
//!
//! Nodes are keyed by uuid and carry a label set plus a JSON property bag.
//! Relationships are keyed by `(source, target, type)`, which is what makes
//! `MergeRelationship` an upsert rather than an insert. Statements run on a
//! blocking thread so async callers never stall the runtime on disk IO.

use super::statement::{BatchStats, GraphWrite, Properties, Query, Row, Statement};
use super::traits::{GraphGateway, OpenGateway, StorageError, StorageResult};
use crate::ontology::label;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite-backed graph gateway
///
/// Thread-safe via an internal mutex on the connection.
#[derive(Clone)]
pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGateway {
    /// Create tables and indexes. Every statement is idempotent.
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Nodes: identity plus free-form properties
            CREATE TABLE IF NOT EXISTS nodes (
                uuid TEXT PRIMARY KEY,
                properties_json TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS node_labels (
                uuid TEXT NOT NULL,
                label TEXT NOT NULL,
                PRIMARY KEY (uuid, label),
                FOREIGN KEY (uuid) REFERENCES nodes(uuid) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_node_labels_label
                ON node_labels(label, uuid);

            -- Identifiers issued by an authority for a node
            CREATE TABLE IF NOT EXISTS identifiers (
                authority TEXT NOT NULL,
                value TEXT NOT NULL,
                node_uuid TEXT NOT NULL,
                PRIMARY KEY (authority, value, node_uuid),
                FOREIGN KEY (node_uuid) REFERENCES nodes(uuid) ON DELETE CASCADE
            );

            -- At most one relationship per (source, target, type)
            CREATE TABLE IF NOT EXISTS relationships (
                source_uuid TEXT NOT NULL,
                target_uuid TEXT NOT NULL,
                rel_type TEXT NOT NULL,
                properties_json TEXT NOT NULL DEFAULT '{}',
                PRIMARY KEY (source_uuid, target_uuid, rel_type),
                FOREIGN KEY (source_uuid) REFERENCES nodes(uuid) ON DELETE CASCADE,
                FOREIGN KEY (target_uuid) REFERENCES nodes(uuid) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_relationships_target
                ON relationships(target_uuid);

            PRAGMA foreign_keys = ON;

            -- Concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Unavailable(e.to_string()))?
    }

    // === Mutations ===

    fn apply_batch(conn: &mut Connection, statements: &[Statement]) -> StorageResult<BatchStats> {
        let tx = conn.transaction()?;
        let mut changed = 0;
        for statement in statements {
            changed += Self::apply(&tx, statement)?;
        }
        tx.commit()?;
        Ok(BatchStats {
            contains_updates: changed > 0,
        })
    }

    /// Apply one statement, returning the number of rows it changed
    fn apply(conn: &Connection, statement: &Statement) -> StorageResult<usize> {
        match statement {
            Statement::RemoveLabels { uuid, labels } => {
                let mut changed = 0;
                for l in labels {
                    changed += conn.execute(
                        "DELETE FROM node_labels WHERE uuid = ?1 AND label = ?2",
                        params![uuid, l],
                    )?;
                }
                Ok(changed)
            }

            Statement::MergeNode {
                uuid,
                labels,
                properties,
            } => {
                let mut changed = conn.execute(
                    "INSERT INTO nodes (uuid, properties_json) VALUES (?1, '{}')
                     ON CONFLICT(uuid) DO NOTHING",
                    params![uuid],
                )?;
                for l in labels {
                    changed += conn.execute(
                        "INSERT OR IGNORE INTO node_labels (uuid, label) VALUES (?1, ?2)",
                        params![uuid, l],
                    )?;
                }
                if !properties.is_empty() {
                    let current: String = conn.query_row(
                        "SELECT properties_json FROM nodes WHERE uuid = ?1",
                        params![uuid],
                        |row| row.get(0),
                    )?;
                    let mut merged: Properties = serde_json::from_str(&current)?;
                    merged.extend(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                    changed += conn.execute(
                        "UPDATE nodes SET properties_json = ?2 WHERE uuid = ?1",
                        params![uuid, serde_json::to_string(&merged)?],
                    )?;
                }
                Ok(changed)
            }

            Statement::MergeIdentifier {
                authority,
                value,
                identifies,
            } => Ok(conn.execute(
                "INSERT OR IGNORE INTO identifiers (authority, value, node_uuid) VALUES (?1, ?2, ?3)",
                params![authority, value, identifies],
            )?),

            Statement::MergeRelationship {
                from,
                to,
                rel_type,
                properties,
            } => Ok(conn.execute(
                r#"
                INSERT INTO relationships (source_uuid, target_uuid, rel_type, properties_json)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(source_uuid, target_uuid, rel_type) DO UPDATE SET
                    properties_json = excluded.properties_json
                "#,
                params![from, to, rel_type, serde_json::to_string(properties)?],
            )?),

            Statement::DeleteRelationships { from, target_label } => Ok(conn.execute(
                r#"
                DELETE FROM relationships
                WHERE source_uuid = ?1
                  AND target_uuid IN (SELECT uuid FROM node_labels WHERE label = ?2)
                "#,
                params![from, target_label],
            )?),
        }
    }

    // === Queries ===

    fn run_query(conn: &Connection, query: &Query) -> StorageResult<Vec<Row>> {
        match query {
            Query::Annotations { content_uuid } => Self::annotations(conn, content_uuid),
            Query::CountMentions { lifecycle } => Self::count_mentions(conn, lifecycle),
            Query::PopularKeyphrases {
                published_after,
                limit,
            } => Self::popular_keyphrases(conn, *published_after, *limit),
            Query::CoOccurrences {
                keyphrase_uuid,
                limit,
            } => Self::cooccurrences(conn, keyphrase_uuid, *limit),
            Query::Node { uuid } => Self::node(conn, uuid),
        }
    }

    fn labels_of(conn: &Connection, uuid: &str) -> StorageResult<Vec<String>> {
        let mut stmt = conn.prepare("SELECT label FROM node_labels WHERE uuid = ?1 ORDER BY label")?;
        let labels = stmt
            .query_map(params![uuid], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(labels)
    }

    fn pref_label(properties_json: &str) -> StorageResult<Option<String>> {
        let props: Properties = serde_json::from_str(properties_json)?;
        Ok(props
            .get("prefLabel")
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    fn annotations(conn: &Connection, content_uuid: &str) -> StorageResult<Vec<Row>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT r.target_uuid, r.rel_type, r.properties_json, n.properties_json
            FROM relationships r
            JOIN nodes n ON n.uuid = r.target_uuid
            WHERE r.source_uuid = ?1
              AND EXISTS (SELECT 1 FROM node_labels l WHERE l.uuid = r.target_uuid AND l.label = ?2)
            ORDER BY r.target_uuid, r.rel_type
            "#,
        )?;
        let found = stmt
            .query_map(params![content_uuid, label::KEYPHRASE], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(found.len());
        for (uuid, rel_type, rel_props, node_props) in found {
            let properties: Properties = serde_json::from_str(&rel_props)?;
            rows.push(object(json!({
                "uuid": uuid,
                "prefLabel": Self::pref_label(&node_props)?,
                "labels": Self::labels_of(conn, &uuid)?,
                "relationship": rel_type,
                "properties": properties,
            })));
        }
        Ok(rows)
    }

    fn count_mentions(conn: &Connection, lifecycle: &str) -> StorageResult<Vec<Row>> {
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM relationships r
            WHERE EXISTS (SELECT 1 FROM node_labels l WHERE l.uuid = r.target_uuid AND l.label = ?1)
              AND (json_extract(r.properties_json, '$.lifecycle') = ?2
                   OR json_extract(r.properties_json, '$.lifecycle') IS NULL)
            "#,
            params![label::KEYPHRASE, lifecycle],
            |row| row.get(0),
        )?;
        Ok(vec![object(json!({ "count": count }))])
    }

    fn popular_keyphrases(conn: &Connection, published_after: i64, limit: usize) -> StorageResult<Vec<Row>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT json_extract(k.properties_json, '$.prefLabel') AS keyphrase,
                   COUNT(*) AS mentions
            FROM relationships r
            JOIN nodes c ON c.uuid = r.source_uuid
            JOIN nodes k ON k.uuid = r.target_uuid
            WHERE EXISTS (SELECT 1 FROM node_labels l WHERE l.uuid = c.uuid AND l.label = ?1)
              AND EXISTS (SELECT 1 FROM node_labels l WHERE l.uuid = k.uuid AND l.label = ?2)
              AND json_extract(c.properties_json, '$.publishedDateEpoch') > ?3
            GROUP BY keyphrase
            HAVING keyphrase IS NOT NULL
            ORDER BY mentions DESC, keyphrase ASC
            LIMIT ?4
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![label::CONTENT, label::KEYPHRASE, published_after, to_limit(limit)],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(keyphrase, count)| object(json!({ "keyphrase": keyphrase, "count": count })))
            .collect())
    }

    fn cooccurrences(conn: &Connection, keyphrase_uuid: &str, limit: usize) -> StorageResult<Vec<Row>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT x.uuid,
                   json_extract(x.properties_json, '$.prefLabel') AS concept_label,
                   COUNT(DISTINCT occ.source_uuid || '|' || occ.rel_type) AS cooccurrence
            FROM relationships kr
            JOIN relationships occ ON occ.source_uuid = kr.source_uuid
            JOIN nodes x ON x.uuid = occ.target_uuid
            WHERE kr.target_uuid = ?1
              AND occ.target_uuid <> ?1
              AND EXISTS (SELECT 1 FROM node_labels l WHERE l.uuid = ?1 AND l.label = ?2)
              AND EXISTS (SELECT 1 FROM node_labels l WHERE l.uuid = kr.source_uuid AND l.label = ?3)
              AND EXISTS (SELECT 1 FROM node_labels l WHERE l.uuid = x.uuid AND l.label = ?4)
            GROUP BY x.uuid
            ORDER BY cooccurrence DESC, x.uuid ASC
            LIMIT ?5
            "#,
        )?;
        let found = stmt
            .query_map(
                params![
                    keyphrase_uuid,
                    label::KEYPHRASE,
                    label::CONTENT,
                    label::CONCEPT,
                    to_limit(limit)
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(found.len());
        for (uuid, concept_label, count) in found {
            rows.push(object(json!({
                "cooccurrence": count,
                "conceptUuid": uuid,
                "conceptLabel": concept_label,
                "conceptTypes": Self::labels_of(conn, &uuid)?,
            })));
        }
        Ok(rows)
    }

    fn node(conn: &Connection, uuid: &str) -> StorageResult<Vec<Row>> {
        let props: Option<String> = conn
            .query_row(
                "SELECT properties_json FROM nodes WHERE uuid = ?1",
                params![uuid],
                |row| row.get(0),
            )
            .optional()?;

        match props {
            Some(props) => Ok(vec![object(json!({
                "uuid": uuid,
                "prefLabel": Self::pref_label(&props)?,
                "labels": Self::labels_of(conn, uuid)?,
            }))]),
            None => Ok(Vec::new()),
        }
    }
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl OpenGateway for SqliteGateway {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

#[async_trait]
impl GraphGateway for SqliteGateway {
    async fn execute_batch(&self, batch: &GraphWrite) -> StorageResult<BatchStats> {
        let statements = batch.statements().to_vec();
        self.with_conn(move |conn| Self::apply_batch(conn, &statements)).await
    }

    async fn execute_query(&self, query: &Query) -> StorageResult<Vec<Row>> {
        let query = query.clone();
        self.with_conn(move |conn| Self::run_query(conn, &query)).await
    }

    async fn check(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn ensure_constraints(&self) -> StorageResult<()> {
        self.with_conn(|conn| Self::init_schema(conn)).await
    }
}
