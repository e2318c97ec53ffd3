//! Configuration types for the server and CLI.

use ocr_gateway::core::{GatewayResult, ModelConfig};
use ocr_gateway::engine::OarEngine;
use ocr_gateway::gateway::OcrGateway;
use ocr_gateway::input::{InputAdapter, InputLimits};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Everything needed to build an [`OcrGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub model: ModelConfig,
    pub limits: InputLimits,
    /// Concurrent engine calls (defaults to number of CPUs)
    pub workers: Option<usize>,
}

impl GatewayConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Creates the engine and gateway. With `preload`, pipelines are built
    /// now instead of on the first request.
    pub fn build(&self, preload: bool) -> GatewayResult<OcrGateway> {
        let engine = OarEngine::new(self.model.clone())?;
        if preload {
            let start = Instant::now();
            engine.warm_up()?;
            info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Models loaded"
            );
        }

        info!(
            model_dir = %self.model.model_dir.display(),
            language = %self.model.language,
            device = %self.model.device,
            workers = self.worker_count(),
            structure = self.model.has_structure_models(),
            "OCR engine configured"
        );

        let adapter = InputAdapter::new(self.limits)?;
        Ok(OcrGateway::new(
            adapter,
            Arc::new(engine),
            self.worker_count(),
        ))
    }
}

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub gateway: GatewayConfig,
    pub host: String,
    pub port: u16,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
    pub preload: bool,
}
