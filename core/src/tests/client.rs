use gridseal_record::{RecordDraft, RecordId};

use super::{alice, devnet};
use crate::history::ActivityKind;
use crate::status::StatusKind;

#[tokio::test]
async fn test_availability_check() {
    let dev = devnet();
    assert!(dev.client.check_availability().await);
    assert_eq!(
        dev.client.status().current().message,
        "FHE system is available and ready!"
    );

    dev.chain.set_available(false).await;
    assert!(!dev.client.check_availability().await);
    let status = dev.client.status().current();
    assert_eq!(status.kind, StatusKind::Error);
    assert_eq!(status.message, "Availability check failed");
}

#[tokio::test]
async fn test_history_lists_newest_first() {
    let dev = devnet();
    let draft = RecordDraft::new("Plant A", 500, 7).unwrap();
    let id = dev.client.submit(&draft).await.unwrap();
    dev.client.reveal(&id).await.unwrap();

    let recent = dev.client.history().recent(5).await;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].kind, ActivityKind::Decrypted);
    assert_eq!(recent[0].message(), format!("Decrypted audit: {id}"));
    assert_eq!(recent[1].kind, ActivityKind::Created);
    assert_eq!(recent[1].message(), "Created audit: Plant A");
}

#[tokio::test]
async fn test_failed_operations_leave_no_history() {
    let dev = devnet();
    dev.chain.reject_next_signature().await;
    let draft = RecordDraft::new("Plant A", 500, 7).unwrap();
    assert!(dev.client.submit(&draft).await.is_err());
    assert!(dev.client.reveal(&RecordId::from("audit-404")).await.is_err());

    assert_eq!(dev.client.history().len().await, 0);
}

#[tokio::test]
async fn test_partial_refresh_reports_error_status() {
    let dev = devnet();
    let bad = RecordId::from("audit-2");
    dev.chain
        .seed_record(&alice(), RecordId::from("audit-1"), "Plant A", 500, 7, false)
        .await
        .unwrap();
    dev.chain
        .seed_record(&alice(), bad.clone(), "Plant B", 200, 3, false)
        .await
        .unwrap();
    dev.chain.fail_reads_of(&bad).await;

    let snapshot = dev.client.refresh().await.unwrap();
    assert_eq!(snapshot.records.len(), 1);

    let status = dev.client.status().current();
    assert_eq!(status.kind, StatusKind::Error);
    assert_eq!(status.message, "Some audits could not be loaded (1 skipped)");
}

#[tokio::test]
async fn test_reconnect_restores_access() {
    let dev = devnet();
    dev.session.disconnect();
    let draft = RecordDraft::new("Plant A", 500, 7).unwrap();
    assert!(dev.client.submit(&draft).await.is_err());

    dev.session.connect(alice());
    let id = dev.client.submit(&draft).await.unwrap();
    assert_eq!(dev.client.store().get(&id).unwrap().creator, alice());
}
