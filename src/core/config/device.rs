//! Execution device selection for ONNX Runtime sessions.

use crate::core::errors::{GatewayError, GatewayResult};
#[cfg(feature = "cuda")]
use oar_ocr::core::config::OrtExecutionProvider;
use oar_ocr::core::config::OrtSessionConfig;

/// Parses a device string (`cpu`, `cuda`, `cuda:N`) into a session config.
///
/// Returns `None` for CPU, which uses the engine's default session.
pub fn parse_device_config(device: &str) -> GatewayResult<Option<OrtSessionConfig>> {
    let device_lower = device.trim().to_lowercase();

    if device_lower == "cpu" {
        return Ok(None);
    }

    if device_lower.starts_with("cuda") {
        let device_id = parse_cuda_device_id(&device_lower).ok_or_else(|| {
            GatewayError::Config(format!(
                "Invalid device format: {device}. Expected 'cuda' or 'cuda:N'"
            ))
        })?;
        return cuda_session_config(device, device_id).map(Some);
    }

    Err(GatewayError::Config(format!("Unsupported device: {device}")))
}

fn parse_cuda_device_id(device_lower: &str) -> Option<i32> {
    if device_lower == "cuda" {
        return Some(0);
    }
    device_lower
        .strip_prefix("cuda:")
        .and_then(|id| id.parse::<i32>().ok())
        .filter(|id| *id >= 0)
}

#[cfg(feature = "cuda")]
fn cuda_session_config(_device: &str, device_id: i32) -> GatewayResult<OrtSessionConfig> {
    Ok(OrtSessionConfig::new().with_execution_providers(vec![
        OrtExecutionProvider::CUDA {
            device_id: Some(device_id),
            gpu_mem_limit: None,
            arena_extend_strategy: None,
            cudnn_conv_algo_search: None,
            cudnn_conv_use_max_workspace: None,
        },
        OrtExecutionProvider::CPU,
    ]))
}

#[cfg(not(feature = "cuda"))]
fn cuda_session_config(device: &str, _device_id: i32) -> GatewayResult<OrtSessionConfig> {
    Err(GatewayError::Config(format!(
        "CUDA device '{device}' requested but CUDA feature is not enabled"
    )))
}
