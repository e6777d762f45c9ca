use std::time::Duration;

use gridseal_record::{RecordDraft, ValidationError};

use super::{alice, devnet, devnet_with, test_config};
use crate::error::SubmitError;
use crate::local::CallCounts;
use crate::status::StatusKind;

fn plant_a() -> RecordDraft {
    RecordDraft::new("Plant A", 500, 7).unwrap()
}

#[tokio::test]
async fn test_submit_plant_a() {
    let dev = devnet();

    let id = dev.client.submit(&plant_a()).await.unwrap();

    let counts = dev.chain.counts();
    assert_eq!(counts.encrypt, 1);
    assert_eq!(counts.create_record, 1);

    {
        let state = dev.chain.state.lock().await;
        assert_eq!(state.ciphertexts.len(), 1);
        assert!(state.ciphertexts.values().all(|blob| !blob.is_empty()));
        let stored = &state.records[&id];
        assert_eq!(stored.aux_value, 0);
        assert_eq!(stored.label, "Energy Audit Data");
    }

    // Read-your-writes: the snapshot already holds the new record.
    let snapshot = dev.client.store().snapshot();
    assert_eq!(snapshot.records.len(), 1);
    let record = &snapshot.records[0];
    assert_eq!(record.id, id);
    assert_eq!(record.name, "Plant A");
    assert_eq!(record.creator, alice());
    assert_eq!(record.public_score, 7);
    assert!(!record.verified);
    assert_eq!(record.verified_value, None);

    let status = dev.client.status().current();
    assert_eq!(status.kind, StatusKind::Success);
    assert_eq!(status.message, "Audit created successfully!");
}

#[tokio::test]
async fn test_rejected_signature_leaves_store_unchanged() {
    let dev = devnet();
    dev.chain.reject_next_signature().await;

    let result = dev.client.submit(&plant_a()).await;
    assert_eq!(result, Err(SubmitError::Rejected));

    assert!(dev.client.store().snapshot().records.is_empty());
    assert_eq!(dev.chain.record_count().await, 0);

    let status = dev.client.status().current();
    assert_eq!(status.kind, StatusKind::Error);
    assert_eq!(status.message, "Transaction rejected by user");
}

#[tokio::test]
async fn test_invalid_draft_fails_before_any_call() {
    let dev = devnet();
    let draft = RecordDraft {
        name: "Plant A".to_string(),
        usage_amount: 500,
        public_score: 11,
    };

    let result = dev.client.submit(&draft).await;
    assert_eq!(
        result,
        Err(SubmitError::Validation(ValidationError::InvalidScore(
            "11".to_string()
        )))
    );
    assert_eq!(dev.chain.counts(), CallCounts::default());
}

#[tokio::test]
async fn test_submit_requires_connected_wallet() {
    let dev = devnet();
    dev.session.disconnect();

    let result = dev.client.submit(&plant_a()).await;
    assert_eq!(result, Err(SubmitError::NotConnected));
    assert_eq!(dev.chain.counts(), CallCounts::default());
    assert_eq!(
        dev.client.status().current().message,
        "Please connect wallet first"
    );
}

#[tokio::test]
async fn test_encryption_failure_sends_no_transaction() {
    let dev = devnet();
    dev.chain.fail_next_encryption().await;

    let result = dev.client.submit(&plant_a()).await;
    assert!(matches!(result, Err(SubmitError::Encryption(_))));
    assert_eq!(dev.chain.counts().create_record, 0);
    assert_eq!(dev.chain.record_count().await, 0);
}

#[tokio::test]
async fn test_chain_revert_is_chain_error() {
    let dev = devnet();
    dev.chain.revert_next("out of gas").await;

    let result = dev.client.submit(&plant_a()).await;
    assert!(matches!(result, Err(SubmitError::Chain(msg)) if msg.contains("out of gas")));
    assert!(
        dev.client
            .status()
            .current()
            .message
            .starts_with("Failed to create audit:")
    );
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_wait_is_bounded() {
    let mut config = test_config();
    config.ledger.confirmation_timeout_secs = 30;
    let dev = devnet_with(config);
    dev.chain.stall_confirmations(true).await;

    let result = dev.client.submit(&plant_a()).await;
    assert_eq!(result, Err(SubmitError::Timeout(Duration::from_secs(30))));
}

#[tokio::test]
async fn test_disconnect_mid_confirmation() {
    let dev = devnet();
    dev.chain.stall_confirmations(true).await;
    let mut status = dev.client.status().subscribe();
    let draft = plant_a();

    let (result, ()) = tokio::join!(dev.client.submit(&draft), async {
        status
            .wait_for(|s| s.message == "Waiting for transaction confirmation...")
            .await
            .unwrap();
        dev.session.disconnect();
    });

    assert_eq!(result, Err(SubmitError::Disconnected));
    assert_eq!(dev.client.status().current().kind, StatusKind::Error);
}

#[tokio::test]
async fn test_sequential_submissions_get_distinct_ids() {
    let dev = devnet();

    let first = dev.client.submit(&plant_a()).await.unwrap();
    let second = dev
        .client
        .submit(&RecordDraft::new("Warehouse", 120, 3).unwrap())
        .await
        .unwrap();
    assert_ne!(first, second);

    let snapshot = dev.client.store().snapshot();
    let ids: Vec<_> = snapshot.records.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![first, second]);
}
