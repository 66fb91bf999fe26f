//! Busy rejection, cancellation and stall handling
//!
//! A capture holds the session for its whole run. These tests start a run
//! that the simulated analyzer keeps waiting for data, then act on it from
//! the outside.

use std::sync::Arc;
use std::time::Duration;

use rsa_core::{IncompleteReason, RsaError};
use rsa_driver_mock::SimulatedAnalyzer;
use rsa_stream::{CancelHandle, IqStreamClient, StreamSettings, StreamState};

fn analyzer() -> SimulatedAnalyzer {
    SimulatedAnalyzer::builder()
        .sample_rate(10_000.0)
        .block_size(1000)
        .build()
}

async fn client(
    analyzer: &SimulatedAnalyzer,
    settings: StreamSettings,
) -> Arc<IqStreamClient<SimulatedAnalyzer>> {
    let client = IqStreamClient::with_settings(analyzer.clone(), settings);
    client.connect().await.unwrap();
    Arc::new(client)
}

fn small_buffer() -> StreamSettings {
    StreamSettings {
        client_buffer_request: 1000,
        ..StreamSettings::default()
    }
}

async fn wait_until_active(client: &IqStreamClient<SimulatedAnalyzer>) {
    for _ in 0..400 {
        if client.state().is_active() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("capture never started");
}

/// Test that configuration calls fail fast while a capture is running
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_busy_rejection_during_capture() {
    let analyzer = analyzer();
    let client = client(&analyzer, small_buffer()).await;
    analyzer.hold_data();

    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.capture_to_memory(500, false).await })
    };
    wait_until_active(&client).await;
    let bandwidth_before = analyzer.requested_bandwidth();
    let center_before = analyzer.center_frequency();

    let err = client.set_acquisition_bandwidth(1.0e6).await.unwrap_err();
    assert!(err.is_busy(), "{err}");
    let err = client.set_center_frequency(2.0e9).await.unwrap_err();
    assert!(err.is_busy(), "{err}");
    let err = client.capture_to_memory(10, false).await.unwrap_err();
    assert!(err.is_busy(), "{err}");
    let err = client
        .capture_to_file(10, "tempIQ", false)
        .await
        .unwrap_err();
    assert!(matches!(err, RsaError::DeviceBusy { .. }));

    analyzer.release_data();
    let capture = task.await.unwrap().unwrap();

    assert_eq!(capture.len(), 5000);
    assert_eq!(analyzer.requested_bandwidth(), bandwidth_before);
    assert_eq!(analyzer.center_frequency(), center_before);
    assert_eq!(client.state(), StreamState::Idle);
}

/// Test that the client is usable again once a run has finished
#[tokio::test]
async fn test_setters_succeed_after_capture() {
    let analyzer = analyzer();
    let client = client(&analyzer, small_buffer()).await;

    client.capture_to_memory(100, false).await.unwrap();
    client.set_center_frequency(2.0e9).await.unwrap();

    assert_eq!(analyzer.center_frequency(), 2.0e9);
}

/// Test that cancelling a run returns the partial capture and stops the device
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_mid_run() {
    let analyzer = analyzer();
    let client = client(&analyzer, small_buffer()).await;
    analyzer.hold_data();

    let cancel = CancelHandle::new();
    let task = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { client.capture_to_memory_with(1000, false, &cancel).await })
    };
    wait_until_active(&client).await;
    cancel.cancel();

    let err = task.await.unwrap().unwrap_err();
    analyzer.release_data();

    match err {
        RsaError::Incomplete { reason, capture } => {
            assert_eq!(reason, IncompleteReason::Cancelled);
            assert!(capture.is_partial());
            assert_eq!(capture.requested, 10_000);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!analyzer.running());
    assert!(!analyzer.streaming());
    assert_eq!(client.state(), StreamState::Idle);
}

/// Test that a handle cancelled up front ends the run before any data
#[tokio::test]
async fn test_cancel_before_start() {
    let analyzer = analyzer();
    let client = client(&analyzer, small_buffer()).await;
    let cancel = CancelHandle::new();
    cancel.cancel();

    let err = client
        .capture_to_memory_with(100, false, &cancel)
        .await
        .unwrap_err();

    match err {
        RsaError::Incomplete { reason, capture } => {
            assert_eq!(reason, IncompleteReason::Cancelled);
            assert!(capture.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(analyzer.blocks_delivered(), 0);
    assert!(!analyzer.running());
}

/// Test that a run with no data ends at the stall deadline
#[tokio::test]
async fn test_stall_deadline_ends_run() {
    let analyzer = analyzer();
    let settings = StreamSettings {
        stall_deadline_ms: 300,
        ..small_buffer()
    };
    let client = client(&analyzer, settings).await;
    analyzer.hold_data();

    let err = client.capture_to_memory(1000, false).await.unwrap_err();

    match err {
        RsaError::Incomplete { reason, capture } => {
            assert_eq!(reason, IncompleteReason::Stalled);
            assert!(capture.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(analyzer.timeouts_reported() >= 2);
    assert!(!analyzer.streaming());
    assert_eq!(client.state(), StreamState::Idle);
}
