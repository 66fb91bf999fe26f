//! In-memory streaming against the simulated analyzer
//!
//! These tests drive the full capture path: configuration, the drain loop,
//! status handling and cleanup on every exit.

use rsa_core::{
    AcquisitionConfiguration, DataType, Destination, ReturnStatus, RsaError, StatusConditions,
};
use rsa_driver_mock::{ErrorConfig, ErrorScenario, SimulatedAnalyzer};
use rsa_stream::{IqStreamClient, StreamSettings, StreamState};

fn analyzer(block_size: usize) -> SimulatedAnalyzer {
    SimulatedAnalyzer::builder()
        .sample_rate(10_000.0)
        .block_size(block_size)
        .build()
}

async fn client_with_buffer(
    analyzer: &SimulatedAnalyzer,
    buffer: usize,
) -> IqStreamClient<SimulatedAnalyzer> {
    let settings = StreamSettings {
        client_buffer_request: buffer,
        ..StreamSettings::default()
    };
    let client = IqStreamClient::with_settings(analyzer.clone(), settings);
    client.connect().await.unwrap();
    client
}

fn assert_stopped(analyzer: &SimulatedAnalyzer) {
    assert!(!analyzer.running(), "device left running");
    assert!(!analyzer.streaming(), "stream left enabled");
}

/// Test that a capture returns exactly the samples covering the duration
#[tokio::test]
async fn test_capture_length_matches_duration() {
    let analyzer = analyzer(1000);
    let client = client_with_buffer(&analyzer, 1000).await;

    let capture = client.capture_to_memory(1000, true).await.unwrap();

    assert_eq!(capture.len(), 10_000);
    assert_eq!(capture.requested, 10_000);
    assert!(!capture.is_partial());
    assert_eq!(capture.sample_rate, 10_000.0);
    assert!(capture.status.is_empty());
    assert_eq!(analyzer.blocks_delivered(), 10);
    assert_eq!(client.state(), StreamState::Idle);
    assert_stopped(&analyzer);
}

/// Test that the block size the device delivers does not change the data
#[tokio::test]
async fn test_block_size_does_not_change_samples() {
    let mut captures = Vec::new();
    for (block_size, blocks) in [(1000, 10), (10_000, 1), (3000, 4)] {
        let analyzer = analyzer(block_size);
        let client = client_with_buffer(&analyzer, 10_000).await;
        let capture = client.capture_to_memory(1000, false).await.unwrap();
        assert_eq!(capture.len(), 10_000);
        assert_eq!(analyzer.blocks_delivered(), blocks);
        captures.push(capture.samples);
    }
    assert_eq!(captures[0], captures[1]);
    assert_eq!(captures[0], captures[2]);
}

/// Test native call ordering: configuration before start, full stop after
#[tokio::test]
async fn test_call_ordering() {
    let analyzer = analyzer(1000);
    let client = client_with_buffer(&analyzer, 1000).await;
    analyzer.clear_calls();

    client.capture_to_memory(200, false).await.unwrap();

    let calls = analyzer.calls();
    let position = |name: &str| calls.iter().position(|c| *c == name).unwrap();
    let start = position("IQSTREAM_Start");
    for name in [
        "IQSTREAM_SetOutputConfiguration",
        "IQSTREAM_SetIQDataBufferSize",
        "IQSTREAM_ClearAcqStatus",
        "DEVICE_PrepareForRun",
        "IQSTREAM_GetAcqParameters",
        "DEVICE_Run",
    ] {
        assert!(position(name) < start, "{name} issued after start");
    }
    assert_eq!(
        &calls[calls.len() - 3..],
        &["IQSTREAM_Stop", "DEVICE_Stop", "IQSTREAM_GetEnable"]
    );
}

/// Test that readiness timeouts are retried rather than treated as errors
#[tokio::test]
async fn test_readiness_timeouts_are_not_fatal() {
    let analyzer = analyzer(1000);
    let client = client_with_buffer(&analyzer, 1000).await;
    analyzer.stall_readiness(3);

    let capture = client.capture_to_memory(300, true).await.unwrap();

    assert_eq!(capture.len(), 3000);
    assert_eq!(analyzer.timeouts_reported(), 3);
}

/// Test that strict mode raises after the full transfer and keeps the data
#[tokio::test]
async fn test_strict_fault_carries_full_capture() {
    let analyzer = analyzer(1000);
    let client = client_with_buffer(&analyzer, 1000).await;
    // Second block latches an input buffer overflow
    analyzer.push_status_words([0, 1 << 19]);

    let err = client.capture_to_memory(1000, true).await.unwrap_err();

    assert!(err.is_streaming_fault());
    match &err {
        RsaError::StreamingFault { report, .. } => {
            assert!(report.contains(StatusConditions::INPUT_BUFFER_OVERFLOW));
            assert!(report.data_lost());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let capture = err.into_capture().unwrap();
    assert_eq!(capture.len(), 10_000);
    assert_eq!(analyzer.blocks_delivered(), 10);
    assert_eq!(client.state(), StreamState::Idle);
    assert_stopped(&analyzer);
}

/// Test that per-block bits alone do not fail a strict capture
#[tokio::test]
async fn test_per_block_bits_do_not_fault() {
    let analyzer = analyzer(1000);
    let client = client_with_buffer(&analyzer, 1000).await;
    analyzer.push_status_words([1 << 0, 1 << 2]);

    let capture = client.capture_to_memory(300, true).await.unwrap();

    assert!(capture.status.is_empty());
}

/// Test that observational mode returns the data with the report attached
#[tokio::test]
async fn test_observational_mode_returns_report() {
    let analyzer = analyzer(1000);
    let client = client_with_buffer(&analyzer, 1000).await;
    analyzer.push_status_words([0, 1 << 19]);

    let capture = client.capture_to_memory(1000, false).await.unwrap();

    assert_eq!(capture.len(), 10_000);
    assert!(capture.status.data_lost());
}

/// Test that a native failure mid-run still stops the device
#[tokio::test]
async fn test_device_error_stops_device() {
    let analyzer = SimulatedAnalyzer::builder()
        .sample_rate(10_000.0)
        .block_size(1000)
        .error_config(ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "IQSTREAM_GetIQData",
            count: 2,
            status: ReturnStatus::ErrorTransfer,
        }))
        .build();
    let client = client_with_buffer(&analyzer, 1000).await;

    let err = client.capture_to_memory(1000, false).await.unwrap_err();

    assert!(matches!(
        err,
        RsaError::DeviceCall {
            operation: "IQSTREAM_GetIQData",
            status: ReturnStatus::ErrorTransfer,
        }
    ));
    assert!(!err.is_retryable());
    assert_eq!(client.state(), StreamState::Idle);
    assert_stopped(&analyzer);
    let calls = analyzer.calls();
    assert_eq!(
        &calls[calls.len() - 3..],
        &["IQSTREAM_Stop", "DEVICE_Stop", "IQSTREAM_GetEnable"]
    );
}

/// Test that INT16 output is scaled to the same values as float output
#[tokio::test]
async fn test_int16_capture_matches_float() {
    let float_analyzer = analyzer(1000);
    let float_client = client_with_buffer(&float_analyzer, 1000).await;
    let reference = float_client.capture_to_memory(100, false).await.unwrap();

    let int_analyzer = analyzer(1000);
    let int_client = client_with_buffer(&int_analyzer, 1000).await;
    int_client
        .configure_stream(
            AcquisitionConfiguration::client(40.0e6)
                .with_output(Destination::Client, DataType::Int16)
                .with_buffer_size(1000),
        )
        .await
        .unwrap();
    let scaled = int_client.capture_to_memory(100, false).await.unwrap();

    assert_eq!(int_analyzer.output_config(), (Destination::Client, DataType::Int16));
    assert_eq!(scaled.len(), reference.len());
    for (a, b) in scaled.samples.iter().zip(&reference.samples) {
        assert!((a - b).norm() < 1e-4, "{a} vs {b}");
    }
}

/// Test that the device-reported sample rate wins over the table
#[tokio::test]
async fn test_device_sample_rate_is_authoritative() {
    let analyzer = analyzer(1000);
    let client = client_with_buffer(&analyzer, 1000).await;

    let capture = client.capture_to_memory(100, false).await.unwrap();

    let resolved = client.resolved().unwrap();
    assert_eq!(resolved.sample_rate, 10_000.0);
    assert_eq!(resolved.bandwidth_hz, 40.0e6);
    assert_eq!(capture.sample_rate, 10_000.0);
    assert_eq!(capture.len(), 1000);
}

/// Test that a memory capture always streams to the client
#[tokio::test]
async fn test_memory_capture_overrides_file_destination() {
    let analyzer = analyzer(1000);
    let client = client_with_buffer(&analyzer, 1000).await;
    client
        .configure_stream(
            AcquisitionConfiguration::client(40.0e6)
                .with_output(Destination::FileSiq, DataType::Int32)
                .with_buffer_size(1000),
        )
        .await
        .unwrap();

    let capture = client.capture_to_memory(100, false).await.unwrap();

    assert_eq!(capture.len(), 1000);
    assert_eq!(analyzer.output_config(), (Destination::Client, DataType::Int32));
}

/// Test that a capture after disconnect surfaces the native status
#[tokio::test]
async fn test_capture_after_disconnect() {
    let analyzer = analyzer(1000);
    let client = client_with_buffer(&analyzer, 1000).await;
    client.disconnect().await.unwrap();

    let err = client.capture_to_memory(100, false).await.unwrap_err();

    assert!(matches!(
        err,
        RsaError::DeviceCall {
            status: ReturnStatus::ErrorNotConnected,
            ..
        }
    ));
    assert_eq!(client.state(), StreamState::Idle);
    assert!(client.resolved().is_none());
}

/// Test that a duration too long to hold in memory is refused before any device call
#[tokio::test]
async fn test_oversized_capture_is_refused() {
    let analyzer = SimulatedAnalyzer::builder().block_size(1000).build();
    let client = IqStreamClient::new(analyzer.clone());
    client.connect().await.unwrap();
    analyzer.clear_calls();

    let err = client.capture_to_memory(u32::MAX, false).await.unwrap_err();
    assert!(matches!(err, RsaError::Validation { .. }));
    let err = client
        .capture_to_file(u32::MAX, "tempIQ", false)
        .await
        .unwrap_err();
    assert!(matches!(err, RsaError::Validation { .. }));

    assert!(analyzer.calls().is_empty());
    assert_eq!(client.state(), StreamState::Idle);
}

/// Test that the memory limit follows the configured sample rate
#[tokio::test]
async fn test_capture_limit_uses_configured_rate() {
    let analyzer = SimulatedAnalyzer::new();
    let client = IqStreamClient::new(analyzer.clone());
    client.connect().await.unwrap();
    client
        .configure_stream(AcquisitionConfiguration::client(1.0e6))
        .await
        .unwrap();
    analyzer.clear_calls();

    // 5 minutes at 1.25 MSa/s is 3.75e8 pairs
    let err = client.capture_to_memory(300_000, false).await.unwrap_err();
    assert!(matches!(err, RsaError::Validation { .. }));
    assert!(analyzer.calls().is_empty());
}
