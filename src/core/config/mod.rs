//! Configuration for the recognition pipelines.
//!
//! This module covers model lookup, the fixed per-endpoint pipeline profiles
//! and execution device selection.

pub mod device;
pub mod models;

pub use device::parse_device_config;
pub use models::{
    DEFAULT_LANGUAGE, ModelConfig, ModelOverrides, ModelVariant, OcrModelPaths, PipelineOptions,
    PipelineProfile, StructureModelPaths,
};
