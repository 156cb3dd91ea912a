// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn routing_key_combines_severity_and_category() {
    let alert = Alert::new(
        AlertSeverity::Critical,
        AlertCategory::Deployment,
        "deployment failed",
        "workflow wfl-x failed on wave 2",
    );
    assert_eq!(alert.routing_key(), "alert.critical.deployment");
}

#[test]
fn dedup_key_covers_identity_tuple() {
    let a = Alert::new(AlertSeverity::Warning, AlertCategory::Deployment, "gate breach", "x")
        .servers(vec!["srv-1".into()])
        .service("api");
    let b = Alert::new(AlertSeverity::Critical, AlertCategory::Deployment, "gate breach", "y")
        .servers(vec!["srv-1".into()])
        .service("api");
    // Same tuple, different severity/message: still the same condition.
    assert_eq!(a.dedup_key(), b.dedup_key());

    let c = Alert::new(AlertSeverity::Warning, AlertCategory::Deployment, "gate breach", "x")
        .servers(vec!["srv-2".into()])
        .service("api");
    assert_ne!(a.dedup_key(), c.dedup_key());
}

#[test]
fn severity_orders_info_below_critical() {
    assert!(AlertSeverity::Info < AlertSeverity::Warning);
    assert!(AlertSeverity::Warning < AlertSeverity::Critical);
}
