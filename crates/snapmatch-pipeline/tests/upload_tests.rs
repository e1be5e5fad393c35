//! Upload orchestrator integration tests against in-memory collaborators.

mod helpers;

use std::sync::Arc;

use helpers::{fast_upload_config, png_file, FlakyBlobStore, SaturatedGate};
use std::time::{Duration, Instant};
use snapmatch_core::models::{EventRecord, FileOutcome, SourceFile};
use snapmatch_db::{MemoryRecordStore, RecordStore};
use snapmatch_media::Normalizer;
use snapmatch_pipeline::{BatchProgress, Unpressured, UploadOrchestrator};
use snapmatch_storage::{BlobStore, MemoryBlobStore};

fn orchestrator(store: Arc<dyn BlobStore>) -> UploadOrchestrator {
    UploadOrchestrator::new(store, Normalizer::default(), fast_upload_config())
        .with_memory_gate(Arc::new(Unpressured))
}

#[tokio::test]
async fn scenario_mixed_batch() {
    // 3 valid files, 1 duplicate name, 1 oversized -> 3 stored,
    // 1 duplicate-skipped, 1 invalid.
    let store = Arc::new(MemoryBlobStore::new());
    let mut config = fast_upload_config();
    config.max_file_size_bytes = 64 * 1024;
    let orchestrator = UploadOrchestrator::new(store.clone(), Normalizer::default(), config)
        .with_memory_gate(Arc::new(Unpressured));

    let oversized = SourceFile::new("huge.jpg", "image/jpeg", vec![0u8; 128 * 1024]);
    let files = vec![
        png_file("one.jpg"),
        png_file("two.jpg"),
        png_file("three.jpg"),
        png_file("one.jpg"),
        oversized,
    ];

    let progress = BatchProgress::new();
    let result = orchestrator
        .submit_batch(files, "ev-mixed", &progress)
        .await
        .unwrap();

    assert_eq!(result.stored(), 3);
    assert_eq!(result.duplicates(), 1);
    assert_eq!(result.invalid(), 1);
    assert_eq!(result.failed(), 0);
    assert_eq!(store.len(), 3);

    for key in result.stored_keys() {
        assert!(key.starts_with("events/shared/ev-mixed/images/"));
        assert!(store.contains(&key));
    }
}

#[tokio::test]
async fn accounting_is_conserved() {
    let store = Arc::new(MemoryBlobStore::new());
    let orchestrator = orchestrator(store);

    let files = vec![
        png_file("a.jpg"),
        png_file("b.jpg"),
        png_file("a.jpg"),
        SourceFile::new("selfie-me.jpg", "image/jpeg", vec![1, 2, 3]),
        SourceFile::new("notes.txt", "text/plain", vec![1, 2, 3]),
    ];
    let submitted = files.len();

    let progress = BatchProgress::new();
    let result = orchestrator
        .submit_batch(files, "ev-acct", &progress)
        .await
        .unwrap();

    assert_eq!(
        submitted - result.duplicates() - result.invalid(),
        result.stored() + result.failed()
    );
}

#[tokio::test]
async fn transient_failures_retry_then_store() {
    let flaky = FlakyBlobStore::new(MemoryBlobStore::new());
    flaky.fail_puts_containing("fussy", 2);
    let orchestrator = orchestrator(Arc::new(flaky));

    let progress = BatchProgress::new();
    let result = orchestrator
        .submit_batch(vec![png_file("fussy.jpg")], "ev-retry", &progress)
        .await
        .unwrap();

    let report = &result.files[0];
    match &report.outcome {
        FileOutcome::Stored { attempts, .. } => assert_eq!(*attempts, 3),
        other => panic!("expected stored outcome, got {:?}", other),
    }
    let record = report.transfer.as_ref().unwrap();
    assert_eq!(record.attempts, 3);
    assert!(record.ended_at.is_some());
    assert!(record.bytes_transferred > 0);
}

#[tokio::test]
async fn exhausted_retries_fail_without_blocking_siblings() {
    let flaky = FlakyBlobStore::new(MemoryBlobStore::new());
    flaky.fail_puts_containing("doomed", u32::MAX);
    let orchestrator = orchestrator(Arc::new(flaky));

    let progress = BatchProgress::new();
    let result = orchestrator
        .submit_batch(
            vec![png_file("doomed.jpg"), png_file("fine.jpg")],
            "ev-fail",
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(result.failed(), 1);
    assert_eq!(result.stored(), 1);

    let doomed = result
        .files
        .iter()
        .find(|f| f.name == "doomed.jpg")
        .unwrap();
    assert_eq!(doomed.transfer.as_ref().unwrap().attempts, 5);
}

#[tokio::test]
async fn remote_duplicates_are_skipped() {
    let store = Arc::new(MemoryBlobStore::new());
    store
        .put(
            "events/shared/ev-dup/images/1700000000000-0-party.jpg",
            vec![1],
            "image/jpeg",
        )
        .await
        .unwrap();
    let orchestrator = orchestrator(store.clone());

    let progress = BatchProgress::new();
    let result = orchestrator
        .submit_batch(vec![png_file("party.jpg")], "ev-dup", &progress)
        .await
        .unwrap();

    assert_eq!(result.duplicates(), 1);
    assert_eq!(result.stored(), 0);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn remote_duplicates_detected_across_listing_pages() {
    // Page size smaller than the stored-object count, so duplicate
    // detection must walk the continuation tokens.
    let store = Arc::new(MemoryBlobStore::with_page_size(2));
    for i in 0..5 {
        store
            .put(
                &format!("events/shared/ev-pages/images/1700000000000-{}-photo{}.jpg", i, i),
                vec![1],
                "image/jpeg",
            )
            .await
            .unwrap();
    }
    let orchestrator = orchestrator(store.clone());

    let progress = BatchProgress::new();
    let result = orchestrator
        .submit_batch(
            vec![png_file("photo4.jpg"), png_file("fresh.jpg")],
            "ev-pages",
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(result.duplicates(), 1);
    assert_eq!(result.stored(), 1);
    assert_eq!(store.len(), 6);
}

#[tokio::test]
async fn memory_pressure_pauses_before_transfer() {
    let store = Arc::new(MemoryBlobStore::new());
    let mut config = fast_upload_config();
    config.memory_pause = Duration::from_millis(60);
    let orchestrator = UploadOrchestrator::new(store.clone(), Normalizer::default(), config)
        .with_memory_gate(Arc::new(SaturatedGate));

    let progress = BatchProgress::new();
    let started = Instant::now();
    let result = orchestrator
        .submit_batch(vec![png_file("slowed.jpg")], "ev-pressure", &progress)
        .await
        .unwrap();

    assert!(
        started.elapsed() >= Duration::from_millis(60),
        "expected a pressure pause before the transfer"
    );
    assert_eq!(result.stored(), 1, "pressure delays work, never drops it");
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let store = Arc::new(MemoryBlobStore::new());
    let orchestrator = orchestrator(store.clone());

    let progress = BatchProgress::new();
    let result = orchestrator
        .submit_batch(Vec::new(), "ev-empty", &progress)
        .await
        .unwrap();

    assert!(result.files.is_empty());
    assert_eq!(result.stored() + result.failed(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn normalization_failure_degrades_to_original_bytes() {
    // Declared JPEG but undecodable: conversion fails and the original
    // bytes must be stored anyway.
    let store = Arc::new(MemoryBlobStore::new());
    let orchestrator = orchestrator(store.clone());

    let raw = SourceFile::new("corrupt.jpg", "image/jpeg", vec![0xba, 0xad, 0xf0, 0x0d]);
    let progress = BatchProgress::new();
    let result = orchestrator
        .submit_batch(vec![raw], "ev-degrade", &progress)
        .await
        .unwrap();

    assert_eq!(result.stored(), 1);
    let key = &result.stored_keys()[0];
    assert_eq!(store.get(key).unwrap(), vec![0xba, 0xad, 0xf0, 0x0d]);
}

#[tokio::test]
async fn progress_reaches_totals_in_both_stages() {
    let store = Arc::new(MemoryBlobStore::new());
    let orchestrator = orchestrator(store);

    let progress = BatchProgress::new();
    orchestrator
        .submit_batch(
            vec![png_file("p1.jpg"), png_file("p2.jpg"), png_file("p3.jpg")],
            "ev-progress",
            &progress,
        )
        .await
        .unwrap();

    let normalize = progress.normalize.snapshot();
    let transfer = progress.transfer.snapshot();
    assert_eq!(normalize.current, normalize.total);
    assert_eq!(normalize.current, 3);
    assert_eq!(transfer.current, transfer.total);
    assert_eq!(transfer.bytes_done, transfer.bytes_total);
}

#[tokio::test]
async fn stored_bytes_accumulate_on_event_record() {
    let store = Arc::new(MemoryBlobStore::new());
    let records = Arc::new(MemoryRecordStore::new());
    records
        .put_event(&EventRecord::new("ev-bytes", "Gala"))
        .await
        .unwrap();

    let orchestrator = UploadOrchestrator::new(
        store.clone(),
        Normalizer::default(),
        fast_upload_config(),
    )
    .with_memory_gate(Arc::new(Unpressured))
    .with_record_store(records.clone());

    let progress = BatchProgress::new();
    let result = orchestrator
        .submit_batch(vec![png_file("counted.jpg")], "ev-bytes", &progress)
        .await
        .unwrap();

    let stored_size = store.get(&result.stored_keys()[0]).unwrap().len() as u64;
    let event = records.get_event("ev-bytes").await.unwrap().unwrap();
    assert_eq!(event.total_bytes, stored_size);
}
