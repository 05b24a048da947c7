#[cfg(test)]
mod tests {
    use chrono::{Duration, SecondsFormat, Utc};
    use uuid::Uuid;

    use keepsake_core::{KeepsakeError, SourceType};
    use keepsake_memory::{
        CreateOutcome, Database, EmbeddingStore, FragmentStore, MemoryService, NewEmbedding,
    };

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::open(&dir.path().join("test.db")).unwrap()
    }

    fn service_over(db: Database) -> MemoryService {
        MemoryService::new(
            FragmentStore::new(db.clone(), Duration::hours(24)),
            EmbeddingStore::new(db, Duration::days(365)),
        )
    }

    /// A storage-format timestamp `hours` in the past, for backdating rows.
    fn past_ts(hours: i64) -> String {
        (Utc::now() - Duration::hours(hours)).to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    // ── Fragments (short-term tier) ────────────────────────────

    mod fragments {
        use super::*;

        #[test]
        fn test_expiry_fixed_at_creation_from_ttl() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let store = FragmentStore::new(db, Duration::minutes(90));

            let session = Uuid::new_v4();
            let frag = store
                .create(session, Uuid::new_v4(), "likes volcanoes", None)
                .unwrap();
            assert_eq!(frag.expires_at - frag.created_at, Duration::minutes(90));

            // Same invariant holds after a storage roundtrip.
            let listed = store.list_by_session(session, 10).unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(
                listed[0].expires_at - listed[0].created_at,
                Duration::minutes(90)
            );
        }

        #[test]
        fn test_create_rejects_empty_content() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let err = service
                .create_fragment(Uuid::new_v4(), Uuid::new_v4(), "", None)
                .unwrap_err();
            match err {
                KeepsakeError::Validation { field, .. } => assert_eq!(field, "content"),
                other => panic!("expected validation error, got {other}"),
            }
        }

        #[test]
        fn test_create_rejects_out_of_range_importance() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let session = Uuid::new_v4();
            let child = Uuid::new_v4();

            for bad in [-0.1, 1.5, f64::NAN] {
                let err = service
                    .create_fragment(session, child, "hi", Some(bad))
                    .unwrap_err();
                assert!(
                    matches!(err, KeepsakeError::Validation { ref field, .. } if field == "importance_score"),
                    "importance {bad} should be rejected, got {err}"
                );
            }
        }

        #[test]
        fn test_default_importance_is_half() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let frag = service
                .create_fragment(Uuid::new_v4(), Uuid::new_v4(), "hello", None)
                .unwrap();
            assert_eq!(frag.importance_score, 0.5);
        }

        #[test]
        fn test_session_listing_newest_first_with_limit() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let session = Uuid::new_v4();
            let child = Uuid::new_v4();

            let mut ids = Vec::new();
            for (content, hours_ago) in [("first", 3), ("second", 2), ("third", 1)] {
                let frag = service
                    .create_fragment(session, child, content, None)
                    .unwrap();
                db.conn()
                    .execute(
                        "UPDATE memory_fragment SET created_at = ?1 WHERE fragment_id = ?2",
                        rusqlite::params![past_ts(hours_ago), frag.fragment_id.to_string()],
                    )
                    .unwrap();
                ids.push(frag.fragment_id);
            }

            let listed = service.fragments_by_session(session, None).unwrap();
            assert_eq!(listed.len(), 3);
            assert_eq!(listed[0].fragment_id, ids[2]);
            assert_eq!(listed[2].fragment_id, ids[0]);

            let capped = service.fragments_by_session(session, Some(2)).unwrap();
            assert_eq!(capped.len(), 2);
            assert_eq!(capped[0].fragment_id, ids[2]);
        }

        #[test]
        fn test_session_listing_keeps_expired_rows() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let session = Uuid::new_v4();

            let frag = service
                .create_fragment(session, Uuid::new_v4(), "old news", None)
                .unwrap();
            db.conn()
                .execute(
                    "UPDATE memory_fragment SET expires_at = ?1 WHERE fragment_id = ?2",
                    rusqlite::params![past_ts(2), frag.fragment_id.to_string()],
                )
                .unwrap();

            // Expired but not yet swept, so the session view still has it.
            let listed = service.fragments_by_session(session, None).unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].fragment_id, frag.fragment_id);
        }

        #[test]
        fn test_child_listing_excludes_expired_rows() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let child = Uuid::new_v4();

            let keep = service
                .create_fragment(Uuid::new_v4(), child, "current", None)
                .unwrap();
            let gone = service
                .create_fragment(Uuid::new_v4(), child, "stale", None)
                .unwrap();
            db.conn()
                .execute(
                    "UPDATE memory_fragment SET expires_at = ?1 WHERE fragment_id = ?2",
                    rusqlite::params![past_ts(2), gone.fragment_id.to_string()],
                )
                .unwrap();

            let listed = service.fragments_by_child(child, None).unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].fragment_id, keep.fragment_id);
        }

        #[test]
        fn test_child_listing_orders_importance_then_recency() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let child = Uuid::new_v4();

            let seed = |content: &str, importance: f64, hours_ago: i64| {
                let frag = service
                    .create_fragment(Uuid::new_v4(), child, content, Some(importance))
                    .unwrap();
                db.conn()
                    .execute(
                        "UPDATE memory_fragment SET created_at = ?1 WHERE fragment_id = ?2",
                        rusqlite::params![past_ts(hours_ago), frag.fragment_id.to_string()],
                    )
                    .unwrap();
                frag.fragment_id
            };

            let low_old = seed("low old", 0.5, 3);
            let low_new = seed("low new", 0.5, 1);
            let high = seed("high", 0.9, 5);

            let listed = service.fragments_by_child(child, None).unwrap();
            let order: Vec<_> = listed.iter().map(|f| f.fragment_id).collect();
            assert_eq!(order, vec![high, low_new, low_old]);
        }

        #[test]
        fn test_sessions_are_isolated() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let child = Uuid::new_v4();
            let session_a = Uuid::new_v4();
            let session_b = Uuid::new_v4();

            service
                .create_fragment(session_a, child, "in a", None)
                .unwrap();
            service
                .create_fragment(session_b, child, "in b", None)
                .unwrap();

            let listed = service.fragments_by_session(session_a, None).unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].content, "in a");
        }
    }

    // ── Embeddings (long-term tier) ────────────────────────────

    mod embeddings {
        use super::*;

        fn make_new(child_id: Uuid, hash: &str, vector: Vec<f32>) -> NewEmbedding {
            NewEmbedding {
                child_id,
                content_hash: hash.to_string(),
                content_preview: format!("preview of {hash}"),
                embedding_vector: vector,
                source_type: SourceType::ChatMessage,
                source_id: "msg-1".to_string(),
                relevance_score: Some(0.5),
            }
        }

        #[test]
        fn test_create_and_get_roundtrip() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let child = Uuid::new_v4();

            let (created, outcome) = service
                .create_embedding(make_new(child, "hash-a", vec![0.1, 0.2, 0.3]))
                .unwrap();
            assert_eq!(outcome, CreateOutcome::Inserted);

            let fetched = service.embedding(created.embedding_id).unwrap();
            assert_eq!(fetched.child_id, child);
            assert_eq!(fetched.content_hash, "hash-a");
            assert_eq!(fetched.content_preview, "preview of hash-a");
            assert_eq!(fetched.embedding_vector, vec![0.1, 0.2, 0.3]);
            assert_eq!(fetched.source_type, SourceType::ChatMessage);
            assert_eq!(fetched.relevance_score, 0.5);
            assert_eq!(fetched.access_count, 0);
            assert!(fetched.last_accessed_at.is_none());
        }

        #[test]
        fn test_expiry_fixed_at_creation_from_ttl() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let store = EmbeddingStore::new(db, Duration::days(30));

            let (row, _) = store
                .create(make_new(Uuid::new_v4(), "hash-a", vec![1.0]))
                .unwrap();
            assert_eq!(row.expires_at - row.created_at, Duration::days(30));
        }

        #[test]
        fn test_duplicate_hash_resolves_to_existing_row() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let child = Uuid::new_v4();

            let (first, first_outcome) = service
                .create_embedding(make_new(child, "hash-a", vec![1.0, 0.0]))
                .unwrap();
            assert_eq!(first_outcome, CreateOutcome::Inserted);

            // Same pair again, different payload. The original row wins.
            let mut dup = make_new(child, "hash-a", vec![0.0, 1.0]);
            dup.content_preview = "different preview".to_string();
            let (second, second_outcome) = service.create_embedding(dup).unwrap();

            assert_eq!(second_outcome, CreateOutcome::Deduplicated);
            assert_eq!(second.embedding_id, first.embedding_id);
            assert_eq!(second.content_preview, "preview of hash-a");

            let count: i64 = db
                .conn()
                .query_row(
                    "SELECT count(*) FROM memory_embedding WHERE child_id = ?1",
                    rusqlite::params![child.to_string()],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 1);
        }

        #[test]
        fn test_distinct_children_share_a_hash() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let (_, a) = service
                .create_embedding(make_new(Uuid::new_v4(), "shared", vec![1.0]))
                .unwrap();
            let (_, b) = service
                .create_embedding(make_new(Uuid::new_v4(), "shared", vec![1.0]))
                .unwrap();

            // No cross-child dedupe.
            assert_eq!(a, CreateOutcome::Inserted);
            assert_eq!(b, CreateOutcome::Inserted);
        }

        #[test]
        fn test_create_rejects_empty_fields() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let child = Uuid::new_v4();

            let mut no_hash = make_new(child, "h", vec![1.0]);
            no_hash.content_hash = String::new();
            let mut no_preview = make_new(child, "h", vec![1.0]);
            no_preview.content_preview = String::new();
            let mut no_source = make_new(child, "h", vec![1.0]);
            no_source.source_id = String::new();
            let no_vector = make_new(child, "h", vec![]);

            for (new, field) in [
                (no_hash, "content_hash"),
                (no_preview, "content_preview"),
                (no_source, "source_id"),
                (no_vector, "embedding_vector"),
            ] {
                let err = service.create_embedding(new).unwrap_err();
                assert!(
                    matches!(err, KeepsakeError::Validation { field: ref f, .. } if f == field),
                    "expected validation on {field}, got {err}"
                );
            }
        }

        #[test]
        fn test_create_rejects_out_of_range_relevance() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let mut new = make_new(Uuid::new_v4(), "h", vec![1.0]);
            new.relevance_score = Some(1.2);
            let err = service.create_embedding(new).unwrap_err();
            assert!(matches!(err, KeepsakeError::Validation { .. }));
        }

        #[test]
        fn test_preview_truncated_to_limit() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let mut new = make_new(Uuid::new_v4(), "h", vec![1.0]);
            new.content_preview = "x".repeat(300);
            let (row, _) = service.create_embedding(new).unwrap();
            assert_eq!(row.content_preview.chars().count(), 256);
        }

        #[test]
        fn test_vector_dimensions_fixed_per_child() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let child = Uuid::new_v4();

            service
                .create_embedding(make_new(child, "first", vec![1.0, 0.0, 0.0]))
                .unwrap();

            let err = service
                .create_embedding(make_new(child, "second", vec![1.0, 0.0]))
                .unwrap_err();
            assert!(
                matches!(err, KeepsakeError::Validation { ref field, .. } if field == "embedding_vector")
            );

            // Another child is free to use a different dimension.
            service
                .create_embedding(make_new(Uuid::new_v4(), "second", vec![1.0, 0.0]))
                .unwrap();
        }

        #[test]
        fn test_get_missing_is_not_found() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let id = Uuid::new_v4();
            let err = service.embedding(id).unwrap_err();
            assert!(matches!(err, KeepsakeError::NotFound(got) if got == id));
        }

        #[test]
        fn test_embedding_exists() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let child = Uuid::new_v4();

            assert!(!service.embedding_exists(child, "hash-a").unwrap());
            service
                .create_embedding(make_new(child, "hash-a", vec![1.0]))
                .unwrap();
            assert!(service.embedding_exists(child, "hash-a").unwrap());
            // Scoped to the child, not global.
            assert!(!service.embedding_exists(Uuid::new_v4(), "hash-a").unwrap());
        }

        #[test]
        fn test_child_listing_orders_relevance_then_recency_nulls_last() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let child = Uuid::new_v4();

            let seed = |hash: &str, relevance: f64| {
                let mut new = make_new(child, hash, vec![1.0]);
                new.relevance_score = Some(relevance);
                service.create_embedding(new).unwrap().0.embedding_id
            };
            let top = seed("top", 0.9);
            let accessed_new = seed("accessed-new", 0.4);
            let accessed_old = seed("accessed-old", 0.4);
            let never = seed("never", 0.4);

            for (id, ts) in [(accessed_new, past_ts(1)), (accessed_old, past_ts(48))] {
                db.conn()
                    .execute(
                        "UPDATE memory_embedding SET last_accessed_at = ?1 WHERE embedding_id = ?2",
                        rusqlite::params![ts, id.to_string()],
                    )
                    .unwrap();
            }

            let listed = service.embeddings_by_child(child, None).unwrap();
            let order: Vec<_> = listed.iter().map(|e| e.embedding_id).collect();
            assert_eq!(order, vec![top, accessed_new, accessed_old, never]);
        }

        #[test]
        fn test_child_listing_excludes_expired_rows() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let child = Uuid::new_v4();

            service
                .create_embedding(make_new(child, "keep", vec![1.0]))
                .unwrap();
            let (gone, _) = service
                .create_embedding(make_new(child, "gone", vec![1.0]))
                .unwrap();
            db.conn()
                .execute(
                    "UPDATE memory_embedding SET expires_at = ?1 WHERE embedding_id = ?2",
                    rusqlite::params![past_ts(2), gone.embedding_id.to_string()],
                )
                .unwrap();

            let listed = service.embeddings_by_child(child, None).unwrap();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].content_hash, "keep");
        }

        #[test]
        fn test_update_relevance_touches_access_time_not_count() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let (row, _) = service
                .create_embedding(make_new(Uuid::new_v4(), "h", vec![1.0]))
                .unwrap();
            let updated = service.update_relevance(row.embedding_id, 0.8).unwrap();

            assert_eq!(updated.relevance_score, 0.8);
            assert!(updated.last_accessed_at.is_some());
            assert_eq!(updated.access_count, 0);
        }

        #[test]
        fn test_update_relevance_rejects_bad_scores() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let (row, _) = service
                .create_embedding(make_new(Uuid::new_v4(), "h", vec![1.0]))
                .unwrap();
            for bad in [-0.5, 1.01, f64::NAN] {
                let err = service.update_relevance(row.embedding_id, bad).unwrap_err();
                assert!(
                    matches!(err, KeepsakeError::Validation { .. }),
                    "score {bad} should be rejected, got {err}"
                );
            }
            // Rejected scores leave the row untouched.
            let fetched = service.embedding(row.embedding_id).unwrap();
            assert_eq!(fetched.relevance_score, 0.5);
        }

        #[test]
        fn test_update_relevance_accepts_boundary_scores() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let (row, _) = service
                .create_embedding(make_new(Uuid::new_v4(), "h", vec![1.0]))
                .unwrap();
            let floor = service.update_relevance(row.embedding_id, 0.0).unwrap();
            assert_eq!(floor.relevance_score, 0.0);
            let ceiling = service.update_relevance(row.embedding_id, 1.0).unwrap();
            assert_eq!(ceiling.relevance_score, 1.0);
        }

        #[test]
        fn test_update_relevance_missing_is_not_found() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let err = service.update_relevance(Uuid::new_v4(), 0.5).unwrap_err();
            assert!(matches!(err, KeepsakeError::NotFound(_)));
        }

        #[test]
        fn test_record_access_increments_counter() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let (row, _) = service
                .create_embedding(make_new(Uuid::new_v4(), "h", vec![1.0]))
                .unwrap();
            service.record_access(row.embedding_id).unwrap();
            service.record_access(row.embedding_id).unwrap();

            let fetched = service.embedding(row.embedding_id).unwrap();
            assert_eq!(fetched.access_count, 2);
            assert!(fetched.last_accessed_at.is_some());
        }

        #[test]
        fn test_record_access_missing_is_not_found() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let err = service.record_access(Uuid::new_v4()).unwrap_err();
            assert!(matches!(err, KeepsakeError::NotFound(_)));
        }

        #[test]
        fn test_concurrent_access_counts_sum() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let store = EmbeddingStore::new(db, Duration::days(365));

            let (row, _) = store
                .create(make_new(Uuid::new_v4(), "h", vec![1.0]))
                .unwrap();

            let mut handles = Vec::new();
            for _ in 0..8 {
                let store = store.clone();
                let id = row.embedding_id;
                handles.push(std::thread::spawn(move || {
                    for _ in 0..5 {
                        store.record_access(id).unwrap();
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }

            // The increment runs inside SQLite, so no update is lost.
            let fetched = store.get(row.embedding_id).unwrap();
            assert_eq!(fetched.access_count, 40);
        }

        #[test]
        fn test_concurrent_creates_leave_one_row() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let store = EmbeddingStore::new(db.clone(), Duration::days(365));
            let child = Uuid::new_v4();

            let mut handles = Vec::new();
            for _ in 0..4 {
                let store = store.clone();
                let new = make_new(child, "raced", vec![1.0, 0.0]);
                handles.push(std::thread::spawn(move || store.create(new).unwrap().1));
            }
            let outcomes: Vec<CreateOutcome> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();

            let inserted = outcomes
                .iter()
                .filter(|o| **o == CreateOutcome::Inserted)
                .count();
            assert_eq!(inserted, 1, "exactly one create should insert");

            let count: i64 = db
                .conn()
                .query_row(
                    "SELECT count(*) FROM memory_embedding WHERE child_id = ?1",
                    rusqlite::params![child.to_string()],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 1);
        }
    }

    // ── Similarity search ──────────────────────────────────────

    mod search {
        use super::*;

        fn seed(
            service: &MemoryService,
            child: Uuid,
            hash: &str,
            vector: Vec<f32>,
            relevance: f64,
        ) -> Uuid {
            let new = NewEmbedding {
                child_id: child,
                content_hash: hash.to_string(),
                content_preview: format!("preview of {hash}"),
                embedding_vector: vector,
                source_type: SourceType::ChatMessage,
                source_id: "msg-1".to_string(),
                relevance_score: Some(relevance),
            };
            service.create_embedding(new).unwrap().0.embedding_id
        }

        #[test]
        fn test_results_ranked_by_similarity() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let child = Uuid::new_v4();

            let far = seed(&service, child, "far", vec![-1.0, 0.0], 0.5);
            let close = seed(&service, child, "close", vec![1.0, 0.05], 0.5);
            let mid = seed(&service, child, "mid", vec![0.5, 0.5], 0.5);

            let results = service.find_similar(child, &[1.0, 0.0], None).unwrap();
            let order: Vec<_> = results.iter().map(|e| e.embedding_id).collect();
            assert_eq!(order, vec![close, mid, far]);
        }

        #[test]
        fn test_search_never_crosses_children() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let mine = Uuid::new_v4();
            let theirs = Uuid::new_v4();

            let kept = seed(&service, mine, "mine", vec![0.2, 0.9], 0.5);
            // A perfect match stored for a different child.
            seed(&service, theirs, "theirs", vec![1.0, 0.0], 1.0);

            let results = service.find_similar(mine, &[1.0, 0.0], None).unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].embedding_id, kept);
        }

        #[test]
        fn test_search_excludes_expired_rows() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let child = Uuid::new_v4();

            let expired = seed(&service, child, "expired", vec![1.0, 0.0], 0.5);
            let current = seed(&service, child, "current", vec![0.9, 0.1], 0.5);
            db.conn()
                .execute(
                    "UPDATE memory_embedding SET expires_at = ?1 WHERE embedding_id = ?2",
                    rusqlite::params![past_ts(2), expired.to_string()],
                )
                .unwrap();

            let results = service.find_similar(child, &[1.0, 0.0], None).unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].embedding_id, current);
        }

        #[test]
        fn test_k_caps_result_count() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let child = Uuid::new_v4();

            for i in 0..5 {
                seed(
                    &service,
                    child,
                    &format!("hash-{i}"),
                    vec![1.0, i as f32 * 0.1],
                    0.5,
                );
            }

            let results = service.find_similar(child, &[1.0, 0.0], Some(2)).unwrap();
            assert_eq!(results.len(), 2);
        }

        #[test]
        fn test_default_k_is_ten() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));
            let child = Uuid::new_v4();

            for i in 0..12 {
                seed(
                    &service,
                    child,
                    &format!("hash-{i}"),
                    vec![1.0, i as f32 * 0.01],
                    0.5,
                );
            }

            let results = service.find_similar(child, &[1.0, 0.0], None).unwrap();
            assert_eq!(results.len(), 10);
        }

        #[test]
        fn test_empty_query_rejected() {
            let dir = tempfile::tempdir().unwrap();
            let service = service_over(open_db(&dir));

            let err = service.find_similar(Uuid::new_v4(), &[], None).unwrap_err();
            assert!(
                matches!(err, KeepsakeError::Validation { ref field, .. } if field == "query_vector")
            );
        }

        #[test]
        fn test_score_ties_break_on_relevance_then_recency() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let child = Uuid::new_v4();

            // Identical vectors, so every row ties on similarity.
            let v = vec![0.6, 0.8];
            let weak_old = seed(&service, child, "weak-old", v.clone(), 0.3);
            let strong = seed(&service, child, "strong", v.clone(), 0.9);
            let weak_new = seed(&service, child, "weak-new", v.clone(), 0.3);

            for (id, ts) in [(weak_old, past_ts(72)), (weak_new, past_ts(1))] {
                db.conn()
                    .execute(
                        "UPDATE memory_embedding SET last_accessed_at = ?1 WHERE embedding_id = ?2",
                        rusqlite::params![ts, id.to_string()],
                    )
                    .unwrap();
            }

            let results = service.find_similar(child, &v, None).unwrap();
            let order: Vec<_> = results.iter().map(|e| e.embedding_id).collect();
            assert_eq!(order, vec![strong, weak_new, weak_old]);
        }
    }

    // ── Retention sweeps ───────────────────────────────────────

    mod retention {
        use super::*;

        fn seed_embedding(service: &MemoryService, child: Uuid, hash: &str) -> Uuid {
            let new = NewEmbedding {
                child_id: child,
                content_hash: hash.to_string(),
                content_preview: "preview".to_string(),
                embedding_vector: vec![1.0],
                source_type: SourceType::CalendarDay,
                source_id: "day-1".to_string(),
                relevance_score: None,
            };
            service.create_embedding(new).unwrap().0.embedding_id
        }

        #[test]
        fn test_fragment_sweep_removes_only_expired() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let session = Uuid::new_v4();

            service
                .create_fragment(session, Uuid::new_v4(), "fresh", None)
                .unwrap();
            let stale = service
                .create_fragment(session, Uuid::new_v4(), "stale", None)
                .unwrap();
            db.conn()
                .execute(
                    "UPDATE memory_fragment SET expires_at = ?1 WHERE fragment_id = ?2",
                    rusqlite::params![past_ts(2), stale.fragment_id.to_string()],
                )
                .unwrap();

            assert_eq!(service.sweep_expired_fragments().unwrap(), 1);
            let remaining = service.fragments_by_session(session, None).unwrap();
            assert_eq!(remaining.len(), 1);
            assert_eq!(remaining[0].content, "fresh");

            // Nothing left to remove the second time around.
            assert_eq!(service.sweep_expired_fragments().unwrap(), 0);
        }

        #[test]
        fn test_embedding_sweep_removes_only_expired() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());
            let child = Uuid::new_v4();

            let keep = seed_embedding(&service, child, "keep");
            let gone = seed_embedding(&service, child, "gone");
            db.conn()
                .execute(
                    "UPDATE memory_embedding SET expires_at = ?1 WHERE embedding_id = ?2",
                    rusqlite::params![past_ts(2), gone.to_string()],
                )
                .unwrap();

            assert_eq!(service.sweep_expired_embeddings().unwrap(), 1);
            assert!(service.embedding(keep).is_ok());
            assert!(matches!(
                service.embedding(gone).unwrap_err(),
                KeepsakeError::NotFound(_)
            ));
            assert_eq!(service.sweep_expired_embeddings().unwrap(), 0);
        }

        #[test]
        fn test_combined_sweep_reports_both_tiers() {
            let dir = tempfile::tempdir().unwrap();
            let db = open_db(&dir);
            let service = service_over(db.clone());

            let frag = service
                .create_fragment(Uuid::new_v4(), Uuid::new_v4(), "stale", None)
                .unwrap();
            let emb = seed_embedding(&service, Uuid::new_v4(), "stale");
            db.conn()
                .execute(
                    "UPDATE memory_fragment SET expires_at = ?1 WHERE fragment_id = ?2",
                    rusqlite::params![past_ts(2), frag.fragment_id.to_string()],
                )
                .unwrap();
            db.conn()
                .execute(
                    "UPDATE memory_embedding SET expires_at = ?1 WHERE embedding_id = ?2",
                    rusqlite::params![past_ts(2), emb.to_string()],
                )
                .unwrap();

            let report = service.sweep_expired().unwrap();
            assert_eq!(report.fragments_removed, 1);
            assert_eq!(report.embeddings_removed, 1);
        }

        #[test]
        fn test_sweep_on_empty_store_is_a_noop() {
            let service = service_over(Database::open_in_memory().unwrap());

            let report = service.sweep_expired().unwrap();
            assert_eq!(report.fragments_removed, 0);
            assert_eq!(report.embeddings_removed, 0);
        }
    }
}
