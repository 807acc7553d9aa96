// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn fake_checkpoints_hand_out_sequential_ids() {
    let adapter = FakeCheckpointAdapter::new();
    let project = ProjectId::new("p");

    let first = adapter.create_checkpoint(&project, "one").await.unwrap();
    let second = adapter.create_checkpoint(&project, "two").await.unwrap();
    assert_eq!(first, "cp-1");
    assert_eq!(second, "cp-2");

    adapter.rollback(&project, &first).await.unwrap();
    assert_eq!(adapter.rollbacks(), vec![first]);
    assert_eq!(adapter.calls().len(), 3);
}

#[tokio::test]
async fn injected_failures() {
    let adapter = FakeCheckpointAdapter::new();
    let project = ProjectId::new("p");

    adapter.fail_create("disk full");
    let err = adapter.create_checkpoint(&project, "x").await.unwrap_err();
    assert_eq!(err.to_string(), "checkpoint failed: disk full");

    adapter.clear_create_failure();
    let id = adapter.create_checkpoint(&project, "x").await.unwrap();
    assert_eq!(id, "cp-1");

    adapter.fail_rollback("cp-1");
    assert!(adapter.rollback(&project, &id).await.is_err());
    assert_eq!(adapter.rollbacks(), vec![id]);
}

#[tokio::test]
async fn discard_all_forgets_only_that_project() {
    let adapter = FakeCheckpointAdapter::new();
    let a = ProjectId::new("a");
    let b = ProjectId::new("b");
    adapter.create_checkpoint(&a, "one").await.unwrap();
    adapter.create_checkpoint(&a, "two").await.unwrap();
    adapter.create_checkpoint(&b, "three").await.unwrap();

    assert_eq!(adapter.discard_all(&a).await.unwrap(), 2);
    assert_eq!(adapter.discard_all(&a).await.unwrap(), 0);
    assert_eq!(adapter.discard_all(&b).await.unwrap(), 1);
    assert_eq!(adapter.discarded(), vec![a.clone(), a, b]);
}
