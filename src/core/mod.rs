//! The core module of the gateway.
//!
//! This module contains the configuration and error types shared by the input
//! adapter, the recognition engine and the HTTP layer.

pub mod config;
pub mod errors;

pub use config::{
    ModelConfig, ModelOverrides, ModelVariant, OcrModelPaths, PipelineOptions, PipelineProfile,
    StructureModelPaths, parse_device_config,
};
pub use errors::{GatewayError, GatewayResult};
