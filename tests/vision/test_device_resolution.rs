// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use dual_caption_node::config::HostConfig;
use dual_caption_node::vision::device::resolve_device;
use dual_caption_node::vision::{
    BackendConfig, BackendId, CaptionError, CaptionHost, ComputeDevice, DevicePreference,
    HostDevices, ModelSource, Precision,
};

#[test]
fn test_auto_follows_gpu_probe() {
    assert_eq!(
        resolve_device(DevicePreference::Auto, true).unwrap(),
        ComputeDevice::Gpu
    );
    assert_eq!(
        resolve_device(DevicePreference::Auto, false).unwrap(),
        ComputeDevice::Cpu
    );
}

#[test]
fn test_cpu_request_ignores_gpu() {
    assert_eq!(
        resolve_device(DevicePreference::Cpu, true).unwrap(),
        ComputeDevice::Cpu
    );
}

#[test]
fn test_gpu_request_without_gpu_is_an_error() {
    let err = resolve_device(DevicePreference::Gpu, false).unwrap_err();
    assert!(matches!(err, CaptionError::DeviceUnavailable));
}

#[test]
fn test_precision_per_backend() {
    let gpu = HostDevices::resolve(DevicePreference::Gpu, true).unwrap();
    assert_eq!(gpu.precision(BackendId::Blip), Precision::Full);
    assert_eq!(gpu.precision(BackendId::Blip2), Precision::Half);

    let cpu = HostDevices::resolve(DevicePreference::Auto, false).unwrap();
    assert_eq!(cpu.precision(BackendId::Blip), Precision::Full);
    assert_eq!(cpu.precision(BackendId::Blip2), Precision::Full);
}

#[test]
fn test_backend_config_shares_device() {
    for device in [ComputeDevice::Cpu, ComputeDevice::Gpu] {
        let blip = BackendConfig::for_backend(BackendId::Blip, device);
        let blip2 = BackendConfig::for_backend(BackendId::Blip2, device);
        assert_eq!(blip.device, device);
        assert_eq!(blip2.device, device);
        assert_eq!(blip2.precision, Precision::for_backend(BackendId::Blip2, device));
    }
}

#[tokio::test]
async fn test_host_load_fails_fast_on_missing_gpu() {
    let config = HostConfig {
        device: DevicePreference::Gpu,
        blip: ModelSource::local("/nonexistent/blip"),
        blip2: ModelSource::local("/nonexistent/blip2"),
        ..HostConfig::default()
    };

    // The device check runs before any artifact is touched
    let err = CaptionHost::load_with_probe(&config, false).await.unwrap_err();
    assert!(matches!(err, CaptionError::DeviceUnavailable));
}

#[tokio::test]
async fn test_host_load_rejects_incomplete_blip_export() {
    let blip_dir = tempfile::tempdir().unwrap();
    let config = HostConfig {
        device: DevicePreference::Cpu,
        blip: ModelSource::local(blip_dir.path()),
        blip2: ModelSource::local("/nonexistent/blip2"),
        ..HostConfig::default()
    };

    // Directory exists but holds no graphs
    let err = CaptionHost::load_with_probe(&config, false).await.unwrap_err();
    match err {
        CaptionError::BackendLoad { backend, .. } => assert_eq!(backend, BackendId::Blip),
        other => panic!("unexpected error: {other:?}"),
    }
}
