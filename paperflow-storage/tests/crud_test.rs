//! Query-module round-trips: documents, review items, fields, audit
//! entries, and the idempotency cache.

use chrono::{Duration, Utc};
use uuid::Uuid;

use paperflow_core::models::*;
use paperflow_storage::queries::{audit_ops, cache_ops, document_ops, field_ops, review_ops};
use paperflow_storage::StorageEngine;

fn make_document(id: &str) -> Document {
    let now = Utc::now();
    Document {
        id: id.to_string(),
        stored_name: format!("{id}.pdf"),
        original_name: "invoice.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        status: DocumentStatus::Queued,
        task_id: None,
        error_message: None,
        created_at: now,
        updated_at: now,
    }
}

fn make_item(id: &str, document_id: &str) -> ReviewItem {
    ReviewItem {
        id: id.to_string(),
        document_id: document_id.to_string(),
        filename: format!("{document_id}.pdf"),
        status: ReviewStatus::Pending,
        priority: 42.5,
        sla_deadline: None,
        assigned_to: None,
        created_at: Utc::now(),
        claimed_at: None,
        completed_at: None,
        fields: vec![],
    }
}

fn make_field(item_id: &str, name: &str, value: &str, confidence: f64) -> ExtractedField {
    ExtractedField {
        id: Uuid::new_v4().to_string(),
        review_item_id: item_id.to_string(),
        field_name: name.to_string(),
        value: Some(value.to_string()),
        confidence,
        manually_corrected: false,
        corrected_at: None,
        corrected_by: None,
        locked: false,
    }
}

#[test]
fn document_insert_get_update_round_trip() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            let doc = make_document("doc-1");
            document_ops::insert_document(conn, &doc)?;

            let got = document_ops::get_document(conn, "doc-1")?.unwrap();
            assert_eq!(got.status, DocumentStatus::Queued);
            assert_eq!(got.original_name, "invoice.pdf");

            document_ops::update_status(conn, "doc-1", DocumentStatus::Processing, None)?;
            let got = document_ops::get_document(conn, "doc-1")?.unwrap();
            assert_eq!(got.status, DocumentStatus::Processing);
            assert!(got.updated_at >= doc.updated_at);

            document_ops::update_status(
                conn,
                "doc-1",
                DocumentStatus::Failed,
                Some("extractor exploded"),
            )?;
            let got = document_ops::get_document(conn, "doc-1")?.unwrap();
            assert_eq!(got.status, DocumentStatus::Failed);
            assert_eq!(got.error_message.as_deref(), Some("extractor exploded"));

            document_ops::set_task_id(conn, "doc-1", "task-99")?;
            let got = document_ops::get_document(conn, "doc-1")?.unwrap();
            assert_eq!(got.task_id.as_deref(), Some("task-99"));

            assert!(document_ops::get_document(conn, "missing")?.is_none());
            Ok(())
        })
        .unwrap();
}

#[test]
fn list_recent_orders_newest_first() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            for (i, id) in ["old", "mid", "new"].iter().enumerate() {
                let mut doc = make_document(id);
                doc.created_at = Utc::now() - Duration::hours(3 - i as i64);
                document_ops::insert_document(conn, &doc)?;
            }
            let docs = document_ops::list_recent(conn, 2, 0)?;
            assert_eq!(docs.len(), 2);
            assert_eq!(docs[0].id, "new");
            assert_eq!(docs[1].id, "mid");
            assert_eq!(document_ops::count_documents(conn)?, 3);
            Ok(())
        })
        .unwrap();
}

#[test]
fn upsert_preserves_identity_and_updates_priority() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            let item = make_item("item-1", "doc-1");
            review_ops::upsert_item(conn, &item)?;

            // Re-extraction attempts an insert with a new id for the same
            // document; only priority / sla_deadline may change.
            let mut replacement = make_item("item-2", "doc-1");
            replacement.priority = 77.0;
            replacement.sla_deadline = Some(Utc::now() + Duration::hours(24));
            review_ops::upsert_item(conn, &replacement)?;

            let got = review_ops::get_item_by_document(conn, "doc-1")?.unwrap();
            assert_eq!(got.id, "item-1", "identity must survive the upsert");
            assert_eq!(got.priority, 77.0);
            assert!(got.sla_deadline.is_some());
            assert!(review_ops::get_item(conn, "item-2")?.is_none());
            Ok(())
        })
        .unwrap();
}

#[test]
fn claim_is_conditional_on_pending() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            review_ops::upsert_item(conn, &make_item("item-1", "doc-1"))?;
            let now = Utc::now();
            let deadline = now + Duration::hours(24);

            let changed = review_ops::claim_item(conn, "item-1", "alice", now, deadline)?;
            assert_eq!(changed, 1);

            // Second claim sees zero rows.
            let changed = review_ops::claim_item(conn, "item-1", "bob", now, deadline)?;
            assert_eq!(changed, 0);

            let got = review_ops::get_item(conn, "item-1")?.unwrap();
            assert_eq!(got.status, ReviewStatus::InReview);
            assert_eq!(got.assigned_to.as_deref(), Some("alice"));
            assert!(got.claimed_at.is_some());
            assert!(got.sla_deadline.is_some());
            Ok(())
        })
        .unwrap();
}

#[test]
fn release_expired_resets_stale_claims_only() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            let now = Utc::now();
            let deadline = now + Duration::hours(24);

            review_ops::upsert_item(conn, &make_item("stale", "doc-1"))?;
            review_ops::upsert_item(conn, &make_item("fresh", "doc-2"))?;
            review_ops::claim_item(conn, "stale", "alice", now - Duration::minutes(90), deadline)?;
            review_ops::claim_item(conn, "fresh", "bob", now, deadline)?;

            let released = review_ops::release_expired(conn, now - Duration::minutes(30))?;
            assert_eq!(released, 1);

            let stale = review_ops::get_item(conn, "stale")?.unwrap();
            assert_eq!(stale.status, ReviewStatus::Pending);
            assert!(stale.assigned_to.is_none());
            assert!(stale.claimed_at.is_none());
            assert!(stale.sla_deadline.is_none());

            let fresh = review_ops::get_item(conn, "fresh")?.unwrap();
            assert_eq!(fresh.status, ReviewStatus::InReview);
            Ok(())
        })
        .unwrap();
}

#[test]
fn locked_fields_survive_unlocked_delete() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            review_ops::upsert_item(conn, &make_item("item-1", "doc-1"))?;

            let mut vendor = make_field("item-1", "vendor", "Acme", 0.9);
            vendor.locked = true;
            vendor.manually_corrected = true;
            field_ops::insert_field(conn, &vendor)?;
            field_ops::insert_field(conn, &make_field("item-1", "total", "100.0", 0.8))?;

            let deleted = field_ops::delete_unlocked_fields(conn, "item-1")?;
            assert_eq!(deleted, 1);

            let remaining = field_ops::fields_for_item(conn, "item-1")?;
            assert_eq!(remaining.len(), 1);
            assert_eq!(remaining[0].field_name, "vendor");
            assert!(remaining[0].locked);

            let locked = field_ops::locked_field_names(conn, "item-1")?;
            assert!(locked.contains("vendor"));
            Ok(())
        })
        .unwrap();
}

#[test]
fn correction_locks_and_second_write_is_refused() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            review_ops::upsert_item(conn, &make_item("item-1", "doc-1"))?;
            let field = make_field("item-1", "vendor", "Acme", 0.9);
            field_ops::insert_field(conn, &field)?;

            let changed =
                field_ops::apply_correction(conn, &field.id, "Acme GmbH", "alice", Utc::now())?;
            assert_eq!(changed, 1);

            let got = field_ops::get_field(conn, "item-1", "vendor")?.unwrap();
            assert_eq!(got.value.as_deref(), Some("Acme GmbH"));
            assert!(got.locked);
            assert!(got.manually_corrected);
            assert_eq!(got.corrected_by.as_deref(), Some("alice"));

            // Locked rows refuse further corrections at the SQL level.
            let changed =
                field_ops::apply_correction(conn, &field.id, "Evil Corp", "mallory", Utc::now())?;
            assert_eq!(changed, 0);
            let got = field_ops::get_field(conn, "item-1", "vendor")?.unwrap();
            assert_eq!(got.value.as_deref(), Some("Acme GmbH"));
            Ok(())
        })
        .unwrap();
}

#[test]
fn batch_field_fetch_groups_by_item() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            review_ops::upsert_item(conn, &make_item("item-1", "doc-1"))?;
            review_ops::upsert_item(conn, &make_item("item-2", "doc-2"))?;
            field_ops::insert_field(conn, &make_field("item-1", "vendor", "A", 0.9))?;
            field_ops::insert_field(conn, &make_field("item-1", "total", "1", 0.9))?;
            field_ops::insert_field(conn, &make_field("item-2", "vendor", "B", 0.9))?;

            let grouped = field_ops::fields_for_items(
                conn,
                &["item-1".to_string(), "item-2".to_string()],
            )?;
            assert_eq!(grouped["item-1"].len(), 2);
            assert_eq!(grouped["item-2"].len(), 1);
            assert!(field_ops::fields_for_items(conn, &[])?.is_empty());
            Ok(())
        })
        .unwrap();
}

#[test]
fn queue_page_filters_and_sorts() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            for (id, doc, priority) in [("a", "d1", 10.0), ("b", "d2", 90.0), ("c", "d3", 50.0)] {
                let mut item = make_item(id, doc);
                item.priority = priority;
                review_ops::upsert_item(conn, &item)?;
            }
            review_ops::claim_item(
                conn,
                "c",
                "alice",
                Utc::now(),
                Utc::now() + Duration::hours(1),
            )?;

            let all = review_ops::query_page(
                conn,
                &QueueFilter::default(),
                QueueSort::Priority,
                10,
                0,
            )?;
            assert_eq!(
                all.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
                vec!["b", "c", "a"]
            );

            let pending_only = QueueFilter {
                status: Some(ReviewStatus::Pending),
                ..QueueFilter::default()
            };
            assert_eq!(review_ops::count_matching(conn, &pending_only)?, 2);

            let high = QueueFilter {
                priority_min: Some(40.0),
                ..QueueFilter::default()
            };
            let high_items =
                review_ops::query_page(conn, &high, QueueSort::Priority, 10, 0)?;
            assert_eq!(high_items.len(), 2);

            let alices = QueueFilter {
                assigned_to: Some("alice".to_string()),
                ..QueueFilter::default()
            };
            let alice_items = review_ops::query_page(conn, &alices, QueueSort::Date, 10, 0)?;
            assert_eq!(alice_items.len(), 1);
            assert_eq!(alice_items[0].id, "c");

            // Pagination.
            let page2 = review_ops::query_page(
                conn,
                &QueueFilter::default(),
                QueueSort::Priority,
                2,
                2,
            )?;
            assert_eq!(page2.len(), 1);
            assert_eq!(page2[0].id, "a");
            Ok(())
        })
        .unwrap();
}

#[test]
fn audit_entries_round_trip_in_insert_order() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            review_ops::upsert_item(conn, &make_item("item-1", "doc-1"))?;
            let now = Utc::now();
            audit_ops::insert_entry(
                conn,
                "item-1",
                AuditAction::StartReview,
                None,
                None,
                None,
                Some("alice"),
                now,
            )?;
            audit_ops::insert_entry(
                conn,
                "item-1",
                AuditAction::Correction,
                Some("vendor"),
                Some("Acme"),
                Some("Acme GmbH"),
                Some("alice"),
                now,
            )?;

            let entries = audit_ops::entries_for_item(conn, "item-1")?;
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].action, AuditAction::StartReview);
            assert_eq!(entries[1].action, AuditAction::Correction);
            assert_eq!(entries[1].old_value.as_deref(), Some("Acme"));
            assert_eq!(entries[1].new_value.as_deref(), Some("Acme GmbH"));
            Ok(())
        })
        .unwrap();
}

#[test]
fn cache_insert_if_absent_keeps_first_row() {
    let storage = StorageEngine::open_in_memory().unwrap();
    storage
        .writer()
        .with_conn_sync(|conn| {
            let now = Utc::now();
            assert!(cache_ops::insert_if_absent(
                conn, "hash-1", "doc-1", "a.pdf", "{\"x\":1}", now
            )?);
            assert!(!cache_ops::insert_if_absent(
                conn, "hash-1", "doc-2", "b.pdf", "{\"x\":2}", now
            )?);

            let cached = cache_ops::get_by_hash(conn, "hash-1")?.unwrap();
            assert_eq!(cached.document_id, "doc-1");
            assert_eq!(cached.result_json, "{\"x\":1}");
            assert_eq!(cache_ops::count_rows(conn)?, 1);
            assert!(cache_ops::get_by_hash(conn, "hash-404")?.is_none());
            Ok(())
        })
        .unwrap();
}
