//! Record repository.
//!
//! Recordings live in a top-level collection (default `recordings`). Field
//! layout per document:
//!
//! | field                | type                                   |
//! |----------------------|----------------------------------------|
//! | `title`              | string                                 |
//! | `download`           | string, source media URL               |
//! | `spaces_folder`      | string, destination prefix             |
//! | `speaker_list`       | array of `{timestamp, speaker}` maps, array of `[timestamp, speaker]` arrays, or a map |
//! | `uploaded_to_spaces` | bool, the processed flag               |
//! | `failure_count`      | integer                                |
//! | `last_error`         | string                                 |
//! | `last_failed_at`     | timestamp                              |
//!
//! Firestore maps carry no order, so the map form of `speaker_list` is
//! ordered by timestamp.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use sclip_models::{parse_timestamp, ClaimFilter, Record, RecordId, SpeakerTimeline, TimelineEntry};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::metrics::record_quarantined_skip;
use crate::types::{
    CollectionSelector, Cursor, Document, FieldFilter, FieldReference, Filter, Order,
    StructuredQuery, ToFirestoreValue, Value,
};

/// Default collection holding recordings.
pub const DEFAULT_COLLECTION: &str = "recordings";

/// Documents fetched per claim query page.
const CLAIM_PAGE_SIZE: i32 = 20;

/// Longest `last_error` stored on a document.
const MAX_ERROR_LEN: usize = 1000;

pub mod fields {
    pub const TITLE: &str = "title";
    pub const DOWNLOAD: &str = "download";
    pub const SPACES_FOLDER: &str = "spaces_folder";
    pub const SPEAKER_LIST: &str = "speaker_list";
    pub const UPLOADED_TO_SPACES: &str = "uploaded_to_spaces";
    pub const PROCESSED_AT: &str = "processed_at";
    pub const FAILURE_COUNT: &str = "failure_count";
    pub const LAST_ERROR: &str = "last_error";
    pub const LAST_FAILED_AT: &str = "last_failed_at";
}

/// Repository for recording documents.
#[derive(Clone)]
pub struct RecordRepository {
    client: FirestoreClient,
    collection: String,
}

impl RecordRepository {
    pub fn new(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// Create from environment variables (`RECORDS_COLLECTION` picks the collection).
    pub async fn from_env() -> FirestoreResult<Self> {
        let client = FirestoreClient::from_env().await?;
        let collection = std::env::var("RECORDS_COLLECTION")
            .ok()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        Ok(Self::new(client, collection))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Return the unprocessed record the filter prefers, or `None` when
    /// nothing is eligible.
    ///
    /// Pages are read in document name order. The first admitted record that
    /// never failed ends the scan; otherwise every page is read and the
    /// record with the fewest, oldest failures wins.
    pub async fn claim_next(&self, filter: &ClaimFilter) -> FirestoreResult<Option<Record>> {
        let mut cursor: Option<String> = None;
        let mut best: Option<Record> = None;

        loop {
            let docs = self
                .client
                .run_query(self.claim_query(cursor.as_deref()))
                .await?;
            let page_len = docs.len();

            let mut page = Vec::with_capacity(page_len);
            for doc in &docs {
                let Some(record) = document_to_record(doc) else {
                    warn!(collection = %self.collection, "Skipping document without a name");
                    continue;
                };

                if filter.is_quarantined(&record) {
                    info!(
                        record_id = %record.id,
                        failures = record.failure_count,
                        "Skipping quarantined record"
                    );
                    record_quarantined_skip();
                    continue;
                }
                page.push(record);
            }

            if let Some(candidate) = filter.select(best.iter().chain(page.iter())) {
                if candidate.failure_count == 0 {
                    return Ok(Some(candidate.clone()));
                }
                best = Some(candidate.clone());
            }

            if page_len < CLAIM_PAGE_SIZE as usize {
                break;
            }
            cursor = docs.last().and_then(|d| d.name.clone());
            if cursor.is_none() {
                break;
            }
        }

        if let Some(record) = &best {
            debug!(
                record_id = %record.id,
                failures = record.failure_count,
                "Only previously failed records remain"
            );
        }
        Ok(best)
    }

    /// Set the processed flag. Fails with `NotFound` if the record vanished.
    pub async fn commit_processed(&self, id: &RecordId) -> FirestoreResult<()> {
        let mut update = HashMap::new();
        update.insert(fields::UPLOADED_TO_SPACES.to_string(), true.to_firestore_value());
        update.insert(fields::PROCESSED_AT.to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                &self.collection,
                id.as_str(),
                update,
                &[fields::UPLOADED_TO_SPACES, fields::PROCESSED_AT],
                true,
            )
            .await?;

        info!(record_id = %id, "Record marked processed");
        Ok(())
    }

    /// Store failure bookkeeping for an aborted record.
    pub async fn record_failure(
        &self,
        id: &RecordId,
        failure_count: u32,
        message: &str,
    ) -> FirestoreResult<()> {
        let message: String = message.chars().take(MAX_ERROR_LEN).collect();

        let mut update = HashMap::new();
        update.insert(fields::FAILURE_COUNT.to_string(), failure_count.to_firestore_value());
        update.insert(fields::LAST_ERROR.to_string(), message.to_firestore_value());
        update.insert(fields::LAST_FAILED_AT.to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document(
                &self.collection,
                id.as_str(),
                update,
                &[fields::FAILURE_COUNT, fields::LAST_ERROR, fields::LAST_FAILED_AT],
                true,
            )
            .await?;

        debug!(record_id = %id, failure_count, "Recorded failure");
        Ok(())
    }

    /// Check the store is reachable and credentials work.
    pub async fn ping(&self) -> FirestoreResult<()> {
        self.client.get_document("_health", "_check").await?;
        Ok(())
    }

    fn claim_query(&self, start_after: Option<&str>) -> StructuredQuery {
        StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: self.collection.clone(),
                all_descendants: None,
            }],
            r#where: Some(Filter {
                field_filter: FieldFilter {
                    field: FieldReference {
                        field_path: fields::UPLOADED_TO_SPACES.to_string(),
                    },
                    op: "EQUAL".to_string(),
                    value: Value::BooleanValue(false),
                },
            }),
            order_by: Some(vec![Order {
                field: FieldReference {
                    field_path: "__name__".to_string(),
                },
                direction: "ASCENDING".to_string(),
            }]),
            start_at: start_after.map(|name| Cursor {
                values: vec![Value::ReferenceValue(name.to_string())],
                before: Some(false),
            }),
            limit: Some(CLAIM_PAGE_SIZE),
        }
    }
}

/// Convert a document into a record.
///
/// Missing or mistyped fields become empty values so the pipeline can reject
/// the record with a precise error instead of the claim skipping it.
pub fn document_to_record(doc: &Document) -> Option<Record> {
    let id = doc.id()?;

    Some(Record {
        id: RecordId::from(id),
        title: doc.get::<String>(fields::TITLE),
        source_url: doc.get::<String>(fields::DOWNLOAD).unwrap_or_default(),
        destination_folder: doc.get::<String>(fields::SPACES_FOLDER).unwrap_or_default(),
        timeline: doc
            .field(fields::SPEAKER_LIST)
            .map(value_to_timeline)
            .unwrap_or_default(),
        processed: doc.get::<bool>(fields::UPLOADED_TO_SPACES).unwrap_or(false),
        failure_count: doc.get::<u32>(fields::FAILURE_COUNT).unwrap_or(0),
        last_error: doc.get::<String>(fields::LAST_ERROR),
        last_failed_at: doc.get(fields::LAST_FAILED_AT),
    })
}

fn value_to_timeline(value: &Value) -> SpeakerTimeline {
    match value {
        Value::ArrayValue(array) => SpeakerTimeline::new(
            array
                .values
                .iter()
                .flatten()
                .filter_map(value_to_entry)
                .collect(),
        ),
        Value::MapValue(map) => {
            let mut entries: Vec<TimelineEntry> = map
                .fields
                .iter()
                .flatten()
                .filter_map(|(timestamp, speaker)| match speaker {
                    Value::StringValue(s) => Some(TimelineEntry::new(timestamp.clone(), s.clone())),
                    _ => None,
                })
                .collect();
            // Unparseable timestamps sort first so segmentation reports them
            entries.sort_by(|a, b| {
                let ka = (parse_timestamp(&a.timestamp).ok(), &a.timestamp);
                let kb = (parse_timestamp(&b.timestamp).ok(), &b.timestamp);
                ka.cmp(&kb)
            });
            SpeakerTimeline::new(entries)
        }
        _ => SpeakerTimeline::default(),
    }
}

fn value_to_entry(value: &Value) -> Option<TimelineEntry> {
    match value {
        Value::MapValue(map) => {
            let fields = map.fields.as_ref()?;
            let get = |key: &str| match fields.get(key) {
                Some(Value::StringValue(s)) => Some(s.clone()),
                _ => None,
            };
            Some(TimelineEntry::new(get("timestamp")?, get("speaker")?))
        }
        Value::ArrayValue(array) => match array.values.as_deref()? {
            [Value::StringValue(ts), Value::StringValue(speaker)] => {
                Some(TimelineEntry::new(ts.clone(), speaker.clone()))
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FirestoreConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS: &str = "/v1/projects/test-project/databases/(default)/documents";

    async fn repo(server: &MockServer) -> RecordRepository {
        let host = server.uri().trim_start_matches("http://").to_string();
        let client = FirestoreClient::new(FirestoreConfig::emulator("test-project", host))
            .await
            .unwrap();
        RecordRepository::new(client, "recordings")
    }

    fn doc_json(id: &str, failure_count: u32) -> serde_json::Value {
        json!({
            "document": {
                "name": format!("projects/test-project/databases/(default)/documents/recordings/{}", id),
                "fields": {
                    "title": {"stringValue": format!("Debatt {}", id)},
                    "download": {"stringValue": format!("https://media.example/{}.mp4", id)},
                    "spaces_folder": {"stringValue": format!("riksdagen/{}", id)},
                    "speaker_list": {"arrayValue": {"values": [
                        {"mapValue": {"fields": {
                            "timestamp": {"stringValue": "00:00:00"},
                            "speaker": {"stringValue": "Talman"}
                        }}},
                        {"arrayValue": {"values": [
                            {"stringValue": "00:05:00"},
                            {"stringValue": "Anna Berg (S)"}
                        ]}}
                    ]}},
                    "uploaded_to_spaces": {"booleanValue": false},
                    "failure_count": {"integerValue": failure_count.to_string()}
                }
            },
            "readTime": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_document_to_record() {
        let doc: Document = serde_json::from_value(doc_json("rec-1", 2)["document"].clone()).unwrap();
        let record = document_to_record(&doc).unwrap();

        assert_eq!(record.id.as_str(), "rec-1");
        assert_eq!(record.source_url, "https://media.example/rec-1.mp4");
        assert_eq!(record.destination_folder, "riksdagen/rec-1");
        assert_eq!(record.failure_count, 2);
        assert!(!record.processed);
        assert_eq!(
            record.timeline.entries(),
            &[
                TimelineEntry::new("00:00:00", "Talman"),
                TimelineEntry::new("00:05:00", "Anna Berg (S)"),
            ]
        );
    }

    #[test]
    fn test_map_timeline_is_ordered_by_time() {
        let mut fields = HashMap::new();
        for (ts, speaker) in [("00:12:00", "A"), ("05:00", "B"), ("00:00:00", "A")] {
            fields.insert(ts.to_string(), Value::StringValue(speaker.to_string()));
        }
        let timeline = value_to_timeline(&Value::MapValue(crate::types::MapValue {
            fields: Some(fields),
        }));
        let order: Vec<&str> = timeline.iter().map(|e| e.timestamp.as_str()).collect();
        assert_eq!(order, vec!["00:00:00", "05:00", "00:12:00"]);
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let doc = Document {
            name: Some("projects/p/databases/(default)/documents/recordings/bare".to_string()),
            ..Default::default()
        };
        let record = document_to_record(&doc).unwrap();
        assert!(record.source_url.is_empty());
        assert!(record.timeline.is_empty());
        assert_eq!(record.failure_count, 0);
    }

    #[tokio::test]
    async fn test_claim_next_returns_first_admitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:runQuery", DOCS)))
            .and(body_partial_json(json!({
                "structuredQuery": {
                    "where": {"fieldFilter": {
                        "field": {"fieldPath": "uploaded_to_spaces"},
                        "op": "EQUAL",
                        "value": {"booleanValue": false}
                    }}
                }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([doc_json("rec-1", 5), doc_json("rec-2", 0)])),
            )
            .mount(&server)
            .await;

        let repo = repo(&server).await;
        let filter = ClaimFilter::new().with_max_failures(Some(3));
        let record = repo.claim_next(&filter).await.unwrap().unwrap();
        assert_eq!(record.id.as_str(), "rec-2");

        let mut exclude_both = filter.clone();
        exclude_both.exclude(RecordId::from("rec-2"));
        assert!(repo.claim_next(&exclude_both).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_next_passes_over_failing_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:runQuery", DOCS)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([doc_json("rec-0", 7), doc_json("rec-1", 2)])),
            )
            .mount(&server)
            .await;

        let repo = repo(&server).await;
        let record = repo.claim_next(&ClaimFilter::new()).await.unwrap().unwrap();
        assert_eq!(record.id.as_str(), "rec-1");
        assert_eq!(record.failure_count, 2);
    }

    #[tokio::test]
    async fn test_claim_next_empty_collection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}:runQuery", DOCS)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"readTime": "2024-01-01T00:00:00Z"}])),
            )
            .mount(&server)
            .await;

        let repo = repo(&server).await;
        assert!(repo.claim_next(&ClaimFilter::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_processed_missing_record() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/recordings/gone", DOCS)))
            .and(query_param("currentDocument.exists", "true"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let repo = repo(&server).await;
        let err = repo.commit_processed(&RecordId::from("gone")).await.unwrap_err();
        assert!(matches!(err, crate::error::FirestoreError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_record_failure_writes_bookkeeping() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/recordings/rec-1", DOCS)))
            .and(query_param("updateMask.fieldPaths", "failure_count"))
            .and(body_partial_json(json!({
                "fields": {
                    "failure_count": {"integerValue": "3"},
                    "last_error": {"stringValue": "fetch failed"}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/databases/(default)/documents/recordings/rec-1",
                "fields": {}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let repo = repo(&server).await;
        repo.record_failure(&RecordId::from("rec-1"), 3, "fetch failed")
            .await
            .unwrap();
    }
}
