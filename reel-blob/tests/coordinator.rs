mod common;

use common::{aborted_body, body, descriptor, harness, id};
use reel_blob::{
    ChunkResult, ChunkSubmission, FinalizeOutcome, JobDescriptor, Registration, UploadConfig,
    UploadCoordinator, UploadError,
};
use std::sync::atomic::Ordering;

async fn send(
    coordinator: &dyn UploadCoordinator,
    descriptor: &JobDescriptor,
    chunk: u32,
    data: &[u8],
) -> Result<ChunkResult, UploadError> {
    coordinator
        .ingest(
            descriptor.clone(),
            ChunkSubmission::new(descriptor.id.clone(), chunk, body(data)),
        )
        .await
}

#[tokio::test]
async fn out_of_order_chunks_complete_and_clean_up() {
    let h = harness(UploadConfig::default());
    let job1 = descriptor("job1", 2);

    let first = send(h.coordinator.as_ref(), &job1, 2, b"second").await.unwrap();
    assert!(matches!(
        first,
        ChunkResult::Partial {
            chunks_received: 1,
            total_chunks: 2
        }
    ));
    let queued = h.coordinator.get_queue_by_id(&id("job1")).await.unwrap().unwrap();
    assert_eq!(queued.received_chunks.iter().copied().collect::<Vec<_>>(), vec![2]);
    assert!(!queued.finished);

    let last = send(h.coordinator.as_ref(), &job1, 1, b"first-").await.unwrap();
    let ChunkResult::Complete { job } = last else {
        panic!("expected completion");
    };
    assert!(job.finished);

    assert_eq!(
        h.store.inner.bytes("uploads/job1/complete").unwrap().as_ref(),
        b"first-second"
    );
    assert!(!h.store.inner.contains("uploads/job1/1"));
    assert!(!h.store.inner.contains("uploads/job1/2"));
    assert_eq!(h.store.composes(), 1);
}

#[tokio::test]
async fn composed_object_follows_chunk_numbers_not_arrival() {
    let h = harness(UploadConfig::default());
    let d = descriptor("abc", 3);

    send(h.coordinator.as_ref(), &d, 3, b"C").await.unwrap();
    send(h.coordinator.as_ref(), &d, 1, b"A").await.unwrap();
    let done = send(h.coordinator.as_ref(), &d, 2, b"B").await.unwrap();

    assert!(done.is_complete());
    assert_eq!(h.store.inner.bytes("uploads/abc/complete").unwrap().as_ref(), b"ABC");
}

#[tokio::test]
async fn duplicate_chunk_is_idempotent_and_last_write_wins() {
    let h = harness(UploadConfig::default());
    let d = descriptor("dup", 2);

    send(h.coordinator.as_ref(), &d, 1, b"old").await.unwrap();
    let again = send(h.coordinator.as_ref(), &d, 1, b"new").await.unwrap();

    assert!(matches!(again, ChunkResult::Partial { chunks_received: 1, .. }));
    assert_eq!(h.store.inner.bytes("uploads/dup/1").unwrap().as_ref(), b"new");
}

#[tokio::test]
async fn chunk_beyond_total_is_a_queue_mismatch() {
    let h = harness(UploadConfig::default());
    let d = descriptor("short", 3);
    send(h.coordinator.as_ref(), &d, 1, b"x").await.unwrap();

    let err = send(h.coordinator.as_ref(), &d, 5, b"y").await.unwrap_err();
    assert!(matches!(
        err,
        UploadError::QueueMismatch {
            chunk_number: 5,
            total_chunks: 3
        }
    ));

    let job = h.coordinator.get_queue_by_id(&id("short")).await.unwrap().unwrap();
    assert_eq!(job.received_count(), 1);
    assert!(!h.store.inner.contains("uploads/short/5"));
}

#[tokio::test]
async fn long_display_name_creates_nothing() {
    let h = harness(UploadConfig::default());
    let d = JobDescriptor::new(id("named"), 1, "n".repeat(101), "video/mp4");

    let err = send(h.coordinator.as_ref(), &d, 1, b"x").await.unwrap_err();
    assert!(matches!(err, UploadError::Validation { ref message } if message == "File name too long."));
    assert!(h.coordinator.get_queue_by_id(&id("named")).await.unwrap().is_none());
    assert!(h.store.inner.keys().is_empty());
}

#[tokio::test]
async fn mismatched_submission_or_zero_chunk_is_rejected_before_mutation() {
    let h = harness(UploadConfig::default());
    let d = descriptor("mine", 2);

    let other = h
        .coordinator
        .ingest(d.clone(), ChunkSubmission::new(id("theirs"), 1, body(b"x")))
        .await
        .unwrap_err();
    assert!(matches!(other, UploadError::Validation { .. }));

    let zero = send(h.coordinator.as_ref(), &d, 0, b"x").await.unwrap_err();
    assert!(matches!(zero, UploadError::Validation { .. }));
    assert!(h.jobs.is_empty());
}

#[tokio::test]
async fn redelivery_to_finished_job_is_rejected_without_side_effects() {
    let h = harness(UploadConfig::default());
    let d = descriptor("done", 1);
    send(h.coordinator.as_ref(), &d, 1, b"only").await.unwrap();
    assert_eq!(h.store.composes(), 1);

    let err = send(h.coordinator.as_ref(), &d, 1, b"again").await.unwrap_err();
    assert!(matches!(err, UploadError::AlreadyFinished { .. }));
    assert_eq!(h.store.composes(), 1);
    assert!(!h.store.inner.contains("uploads/done/1"));
    assert_eq!(h.store.inner.bytes("uploads/done/complete").unwrap().as_ref(), b"only");
}

#[tokio::test]
async fn aborted_write_records_nothing() {
    let h = harness(UploadConfig::default());
    let d = descriptor("flaky", 2);

    let err = h
        .coordinator
        .ingest(d.clone(), ChunkSubmission::new(d.id.clone(), 1, aborted_body()))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::UploadIo { ref key, .. } if key == "uploads/flaky/1"));

    let job = h.coordinator.get_queue_by_id(&d.id).await.unwrap().unwrap();
    assert_eq!(job.received_count(), 0);
    assert!(!h.coordinator.probe(&d, 1).await.unwrap());
}

#[tokio::test]
async fn failed_compose_leaves_job_retryable() {
    let h = harness(UploadConfig::default());
    h.store.compose_failures_left.store(1, Ordering::SeqCst);
    let d = descriptor("retry", 2);

    send(h.coordinator.as_ref(), &d, 1, b"A").await.unwrap();
    let err = send(h.coordinator.as_ref(), &d, 2, b"B").await.unwrap_err();
    assert!(matches!(err, UploadError::Finalization { .. }));

    let job = h.coordinator.get_queue_by_id(&d.id).await.unwrap().unwrap();
    assert!(job.is_complete());
    assert!(!job.finished);
    assert!(h.store.inner.contains("uploads/retry/1"));
    assert!(h.store.inner.contains("uploads/retry/2"));

    let retried = send(h.coordinator.as_ref(), &d, 2, b"B").await.unwrap();
    assert!(retried.is_complete());
    assert_eq!(h.store.inner.bytes("uploads/retry/complete").unwrap().as_ref(), b"AB");
}

#[tokio::test]
async fn cleanup_failures_are_reported_not_fatal() {
    let h = harness(UploadConfig::default());
    h.store.compose_failures_left.store(1, Ordering::SeqCst);
    h.store.fail_deletes.store(true, Ordering::SeqCst);
    let d = descriptor("sticky", 2);

    send(h.coordinator.as_ref(), &d, 1, b"A").await.unwrap();
    send(h.coordinator.as_ref(), &d, 2, b"B").await.unwrap_err();

    let outcome = h.coordinator.finish(&d.id).await.unwrap();
    let FinalizeOutcome::Finalized(receipt) = outcome else {
        panic!("expected this call to finalize");
    };
    assert_eq!(receipt.key, "uploads/sticky/complete");
    assert_eq!(receipt.size_bytes, 2);
    assert_eq!(receipt.content_type, "video/mp4");
    assert_eq!(
        receipt.cleanup_failures,
        vec!["uploads/sticky/1".to_string(), "uploads/sticky/2".to_string()]
    );

    let job = h.coordinator.get_queue_by_id(&d.id).await.unwrap().unwrap();
    assert!(job.finished);
    assert!(matches!(
        h.coordinator.finish(&d.id).await.unwrap(),
        FinalizeOutcome::AlreadyFinalized
    ));
}

#[tokio::test]
async fn finish_requires_a_complete_known_job() {
    let h = harness(UploadConfig::default());
    let d = descriptor("half", 2);
    send(h.coordinator.as_ref(), &d, 1, b"A").await.unwrap();

    let err = h.coordinator.finish(&d.id).await.unwrap_err();
    assert!(matches!(err, UploadError::Validation { ref message } if message == "Not done uploading."));

    let missing = h.coordinator.finish(&id("nobody")).await.unwrap_err();
    assert!(matches!(missing, UploadError::NotFound { .. }));
    assert_eq!(h.store.composes(), 0);
}

#[tokio::test]
async fn probe_never_creates_a_job() {
    let h = harness(UploadConfig::default());
    let d = descriptor("peek", 2);

    assert!(!h.coordinator.probe(&d, 1).await.unwrap());
    assert!(h.jobs.is_empty());

    send(h.coordinator.as_ref(), &d, 1, b"A").await.unwrap();
    assert!(h.coordinator.probe(&d, 1).await.unwrap());
    assert!(!h.coordinator.probe(&d, 2).await.unwrap());
    assert!(!h.coordinator.probe(&d, 0).await.unwrap());
}

#[tokio::test]
async fn explicit_registration_requires_begin() {
    let h = harness(UploadConfig::new().with_registration(Registration::Explicit));
    let d = descriptor("planned", 1);

    let err = send(h.coordinator.as_ref(), &d, 1, b"A").await.unwrap_err();
    assert!(matches!(err, UploadError::NotFound { .. }));
    assert!(h.jobs.is_empty());

    let job = h.coordinator.begin(d.clone()).await.unwrap();
    assert_eq!(job.storage_location, "planned");
    assert!(send(h.coordinator.as_ref(), &d, 1, b"A").await.unwrap().is_complete());
}
