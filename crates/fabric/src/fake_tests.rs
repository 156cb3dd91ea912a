// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::FabricPublisher;

#[tokio::test]
async fn records_published_messages_in_order() {
    let fabric = FakeFabric::new();
    fabric.publish("command.deploy.a", b"one".to_vec(), MessageProps::default()).await.unwrap();
    fabric.publish("status.wfl-x", b"two".to_vec(), MessageProps::default()).await.unwrap();

    let published = fabric.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].routing_key, "command.deploy.a");
    assert_eq!(published[1].payload, b"two");
}

#[tokio::test]
async fn filters_by_routing_prefix() {
    let fabric = FakeFabric::new();
    fabric.publish("command.deploy.a", b"x".to_vec(), MessageProps::default()).await.unwrap();
    fabric.publish("alert.critical.deployment", b"y".to_vec(), MessageProps::default()).await.unwrap();
    assert_eq!(fabric.published_to("alert.").len(), 1);
    assert_eq!(fabric.published_to("command.").len(), 1);
}

#[tokio::test]
async fn outage_fails_publishes_until_recovery() {
    let fabric = FakeFabric::new();
    fabric.set_available(false);
    let err = fabric
        .publish("command.deploy.a", b"x".to_vec(), MessageProps::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FabricError::Unavailable(_)));
    assert_eq!(fabric.publish_count(), 0);

    fabric.set_available(true);
    fabric.publish("command.deploy.a", b"x".to_vec(), MessageProps::default()).await.unwrap();
    assert_eq!(fabric.publish_count(), 1);
}

#[tokio::test]
async fn clones_share_state() {
    let fabric = FakeFabric::new();
    let clone = fabric.clone();
    clone.publish("workflow.lifecycle", b"z".to_vec(), MessageProps::default()).await.unwrap();
    assert_eq!(fabric.published().len(), 1);
}

#[tokio::test]
async fn take_published_drains() {
    let fabric = FakeFabric::new();
    fabric.publish("a.b", b"x".to_vec(), MessageProps::default()).await.unwrap();
    assert_eq!(fabric.take_published().len(), 1);
    assert!(fabric.published().is_empty());
}
