//! Identifier and provenance codec
//!
//! Pure functions used by the write builder: pull the uuid out of a
//! URI-shaped reference, turn an RFC 3339 timestamp into epoch seconds, and
//! fold a list of scores into relevance/confidence values.

use super::error::{AnnotationError, AnnotationResult};
use super::types::{Score, ScoringSystem};
use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;

static UUID_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r".*/([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})$")
        .expect("uuid suffix pattern is valid")
});

/// Value of a score that was not supplied. Real scores are never negative.
pub const ABSENT_SCORE: f64 = -1.0;

/// Extract the trailing uuid of a URI such as `http://api.ft.com/things/<uuid>`.
pub fn extract_identifier(uri: &str) -> AnnotationResult<&str> {
    UUID_SUFFIX
        .captures(uri)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| AnnotationError::MalformedUri(uri.to_string()))
}

/// Convert an RFC 3339 timestamp to seconds since the epoch.
pub fn to_epoch(timestamp: &str) -> AnnotationResult<i64> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.timestamp())
        .map_err(|source| AnnotationError::MalformedTimestamp {
            value: timestamp.to_string(),
            source,
        })
}

/// Relevance and confidence folded out of a score list
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldedScores {
    pub relevance: f64,
    pub confidence: f64,
}

impl FoldedScores {
    pub fn relevance_if_present(&self) -> Option<f64> {
        present(self.relevance)
    }

    pub fn confidence_if_present(&self) -> Option<f64> {
        present(self.confidence)
    }
}

fn present(value: f64) -> Option<f64> {
    if value == ABSENT_SCORE {
        None
    } else {
        Some(value)
    }
}

/// Fold scores in one pass. Later entries for the same system overwrite
/// earlier ones; unknown systems are ignored.
pub fn fold_scores(scores: &[Score]) -> FoldedScores {
    let mut folded = FoldedScores {
        relevance: ABSENT_SCORE,
        confidence: ABSENT_SCORE,
    };
    for score in scores {
        match score.scoring_system {
            ScoringSystem::Relevance => folded.relevance = score.value,
            ScoringSystem::Confidence => folded.confidence = score.value,
            ScoringSystem::Other(_) => {}
        }
    }
    folded
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "aaaaaaaa-0000-0000-0000-000000000000";

    #[test]
    fn extracts_uuid_suffix() {
        let uri = format!("http://api.ft.com/things/{}", UUID);
        assert_eq!(extract_identifier(&uri).unwrap(), UUID);

        let other_host = format!("http://www.ft.com/thing/deep/path/{}", UUID);
        assert_eq!(extract_identifier(&other_host).unwrap(), UUID);
    }

    #[test]
    fn rejects_uris_without_uuid_suffix() {
        for uri in [
            "",
            UUID,
            "http://api.ft.com/things/not-a-uuid",
            "http://api.ft.com/things/AAAAAAAA-0000-0000-0000-000000000000",
            "http://api.ft.com/things/aaaaaaaa-0000-0000-0000-000000000000/extra",
            "http://api.ft.com/things/aaaaaaaa00000000000000000000000000",
        ] {
            assert!(
                matches!(extract_identifier(uri), Err(AnnotationError::MalformedUri(_))),
                "expected {:?} to be rejected",
                uri
            );
        }
    }

    #[test]
    fn converts_rfc3339_to_epoch() {
        assert_eq!(to_epoch("2016-01-01T19:43:47.314Z").unwrap(), 1_451_677_427);
        assert_eq!(to_epoch("2016-01-01T20:43:47+01:00").unwrap(), 1_451_677_427);
    }

    #[test]
    fn reports_malformed_timestamps() {
        let err = to_epoch("yesterday").unwrap_err();
        assert!(matches!(err, AnnotationError::MalformedTimestamp { ref value, .. } if value == "yesterday"));
        assert!(to_epoch("2016-01-01").is_err());
    }

    #[test]
    fn fold_defaults_to_sentinel() {
        let folded = fold_scores(&[]);
        assert_eq!(folded.relevance, ABSENT_SCORE);
        assert_eq!(folded.confidence, ABSENT_SCORE);
        assert_eq!(folded.relevance_if_present(), None);
    }

    #[test]
    fn fold_keeps_zero_distinct_from_absent() {
        let folded = fold_scores(&[Score::new(ScoringSystem::Relevance, 0.0)]);
        assert_eq!(folded.relevance_if_present(), Some(0.0));
        assert_eq!(folded.confidence_if_present(), None);
    }

    #[test]
    fn fold_is_order_independent_across_systems() {
        let a = fold_scores(&[
            Score::new(ScoringSystem::Relevance, 0.9),
            Score::new(ScoringSystem::Confidence, 0.8),
        ]);
        let b = fold_scores(&[
            Score::new(ScoringSystem::Confidence, 0.8),
            Score::new(ScoringSystem::Relevance, 0.9),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.relevance, 0.9);
        assert_eq!(a.confidence, 0.8);
    }

    #[test]
    fn fold_last_writer_wins_for_repeats() {
        let folded = fold_scores(&[
            Score::new(ScoringSystem::Relevance, 0.1),
            Score::new(ScoringSystem::Relevance, 0.7),
        ]);
        assert_eq!(folded.relevance, 0.7);
    }

    #[test]
    fn fold_ignores_unknown_systems() {
        let scores = vec![
            Score::new(ScoringSystem::Relevance, 0.4),
            Score::new(ScoringSystem::Other("http://example.org/x".into()), 0.99),
        ];
        assert_eq!(fold_scores(&scores), fold_scores(&scores[..1]));
    }
}
