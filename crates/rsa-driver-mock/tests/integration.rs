//! Integration tests for the simulated analyzer
//!
//! These tests drive the analyzer through the `DeviceSession` trait the way
//! a client would, including real files written for disk destinations.

use rsa_core::{
    Complex32, DataType, Destination, DeviceSession, FilenameSuffix, IqBlock, ReturnStatus,
    RsaError,
};
use rsa_driver_mock::*;

async fn file_run(analyzer: &SimulatedAnalyzer) -> rsa_core::DiskFileInfo {
    analyzer.run().await.unwrap();
    analyzer.start_streaming().await.unwrap();
    while !analyzer.disk_write_status().await.unwrap().is_complete {}
    analyzer.stop_streaming().await.unwrap();
    let info = analyzer.disk_file_info().await.unwrap();
    analyzer.stop().await.unwrap();
    info
}

/// Test that split SIQ files are written with advancing index suffixes
#[tokio::test]
async fn test_split_files_with_index_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("capture");
    let analyzer = SimulatedAnalyzer::builder().sample_rate(10_000.0).build();
    analyzer.connect(0).await.unwrap();
    analyzer
        .set_output_config(Destination::FileSiqSplit.code(), DataType::Single.code())
        .await
        .unwrap();
    analyzer
        .set_disk_filename_base(base.to_str().unwrap())
        .await
        .unwrap();
    analyzer
        .set_disk_filename_suffix(FilenameSuffix::Index(3).control())
        .await
        .unwrap();
    analyzer.set_disk_file_length(10).await.unwrap();

    let first = file_run(&analyzer).await;
    assert_eq!(first.number_samples, 100);
    assert_eq!(first.filenames.len(), 2);
    assert!(first.filenames[0].ends_with("capture-00003.siqh"));
    assert!(first.filenames[1].ends_with("capture-00003.siqd"));
    let data = std::fs::read(&first.filenames[1]).unwrap();
    assert_eq!(data.len(), 100 * 2 * 4);

    let second = file_run(&analyzer).await;
    assert!(second.filenames[1].ends_with("capture-00004.siqd"));
    assert_eq!(analyzer.file_settings().1, FilenameSuffix::Index(5));
}

/// Test that TIQ files hold raw integer samples only
#[tokio::test]
async fn test_tiq_int16_file() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("iq");
    let analyzer = SimulatedAnalyzer::builder().sample_rate(10_000.0).build();
    analyzer.connect(0).await.unwrap();
    analyzer
        .set_output_config(Destination::FileTiq.code(), DataType::Int16.code())
        .await
        .unwrap();
    analyzer
        .set_disk_filename_base(base.to_str().unwrap())
        .await
        .unwrap();
    analyzer.set_disk_file_length(20).await.unwrap();

    let info = file_run(&analyzer).await;

    assert_eq!(info.filenames.len(), 1);
    assert!(info.filenames[0].ends_with("iq.tiq"));
    let data = std::fs::read(&info.filenames[0]).unwrap();
    assert_eq!(data.len(), 200 * 2 * 2);
}

/// Test that seeded noise is reproducible across analyzers
#[tokio::test]
async fn test_seeded_noise_is_reproducible() {
    let mut pulled = Vec::new();
    for _ in 0..2 {
        let analyzer = SimulatedAnalyzer::builder()
            .sample_rate(10_000.0)
            .noise(0.01, Some(7))
            .build();
        analyzer.connect(0).await.unwrap();
        analyzer.set_buffer_size_request(64).await.unwrap();
        analyzer.run().await.unwrap();
        analyzer.start_streaming().await.unwrap();

        let mut block = IqBlock::with_capacity(DataType::Single, 64);
        assert!(analyzer.wait_for_data_ready(10).await.unwrap());
        analyzer.pull_block(&mut block).await.unwrap();
        let mut samples = vec![Complex32::default(); 64];
        assert_eq!(block.deinterleave_into(&mut samples), 64);
        pulled.push(samples);
    }
    assert_eq!(pulled[0], pulled[1]);

    let clean = IqPattern::default().sample(1, 10_000.0);
    let noisy = pulled[0][1];
    assert_ne!((noisy.re, noisy.im), clean);
    assert!((noisy.re - clean.0).abs() < 0.011);
}

/// Test that a removed device fails every later call
#[tokio::test]
async fn test_disconnect_scenario() {
    let analyzer = SimulatedAnalyzer::builder()
        .error_config(ErrorConfig::scenario(ErrorScenario::Disconnect {
            after_calls: 1,
        }))
        .build();
    analyzer.connect(0).await.unwrap();

    for _ in 0..2 {
        assert!(matches!(
            analyzer.run().await,
            Err(RsaError::DeviceCall {
                status: ReturnStatus::ErrorDisconnectedDeviceRemoved,
                ..
            })
        ));
    }
    assert!(!analyzer.running());
}

/// Test that the call log records every native call in order
#[tokio::test]
async fn test_call_log() {
    let analyzer = SimulatedAnalyzer::new();
    analyzer.connect(1).await.unwrap();
    analyzer.set_center_frequency(2.0e9).await.unwrap();
    assert!(analyzer.set_center_frequency(1.0).await.is_err());

    assert_eq!(
        analyzer.calls(),
        vec!["DEVICE_Connect", "CONFIG_SetCenterFreq", "CONFIG_SetCenterFreq"]
    );
    assert_eq!(analyzer.center_frequency(), 2.0e9);

    analyzer.clear_calls();
    assert!(analyzer.calls().is_empty());
}
