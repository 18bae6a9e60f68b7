//! Integration tests for how chunks are split into backend reads.

mod support;

use std::sync::Arc;

use evtstream::storage::ReadCall;
use evtstream::{ChunkIterator, RecordingStorage};
use support::hit_storage;

fn recorded(entries: Option<Vec<usize>>, buffer_len: usize, start: usize) -> Vec<ReadCall> {
    let storage = Arc::new(RecordingStorage::new(hit_storage(2, 10)));
    let mut builder = ChunkIterator::builder(storage.clone())
        .sources(["run0", "run1"])
        .groups("geds/hit")
        .field_mask(["channel"])
        .buffer_len(buffer_len);
    if let Some(entries) = entries {
        builder = builder.entry_list(entries);
    }
    let mut it = builder.build().unwrap();
    it.read(start).unwrap();
    storage.calls()
}

#[test]
fn test_contiguous_window_is_one_slice_per_source() {
    let calls = recorded(None, 8, 6);

    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].source, "run0");
    assert_eq!(calls[0].rows, vec![6, 7, 8, 9]);
    assert!(!calls[0].fancy);
    assert_eq!(calls[1].source, "run1");
    assert_eq!(calls[1].rows, vec![0, 1, 2, 3]);
    assert!(!calls[1].fancy);
    assert!(calls.iter().all(|c| c.fields == ["channel"]));
}

#[test]
fn test_sparse_runs_use_indices() {
    let calls = recorded(Some(vec![3, 4, 5, 9, 1, 12, 13, 0]), 8, 0);

    assert_eq!(calls.len(), 3);
    assert!(calls[0].fancy);
    assert_eq!(calls[0].rows, vec![3, 4, 5, 9, 1]);
    assert!(!calls[1].fancy);
    assert_eq!(calls[1].rows, vec![2, 3]);
    assert!(!calls[2].fancy);
    assert_eq!(calls[2].rows, vec![0]);
}

#[test]
fn test_no_reads_past_the_end() {
    assert!(recorded(None, 8, 20).is_empty());
    assert!(recorded(Some(vec![]), 8, 0).is_empty());
}

#[test]
fn test_recording_clear() {
    let storage = Arc::new(RecordingStorage::new(hit_storage(1, 10)));
    let mut it = ChunkIterator::builder(storage.clone())
        .sources("run0")
        .groups("geds/hit")
        .build()
        .unwrap();

    it.read(0).unwrap();
    assert_eq!(storage.calls().len(), 1);
    storage.clear();
    assert!(storage.calls().is_empty());
}
