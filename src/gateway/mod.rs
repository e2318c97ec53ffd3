//! Request orchestration: input adapter, engine, formatter.

use crate::core::{GatewayError, GatewayResult, PipelineProfile};
use crate::engine::{PageStructure, RecognitionEngine};
use crate::input::{Accept, InputAdapter, InputSource, LoadedDocument};
use crate::response::{
    Envelope, PageTable, RecognitionItem, reconstructed_tables, structure_items,
    structure_tables, text_items,
};
use crate::table::TableReconstructor;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Serves recognition requests against a shared engine.
///
/// Engine calls are CPU bound and run on the blocking pool; at most
/// `workers` of them run at the same time.
#[derive(Clone)]
pub struct OcrGateway {
    adapter: InputAdapter,
    engine: Arc<dyn RecognitionEngine>,
    reconstructor: TableReconstructor,
    permits: Arc<Semaphore>,
}

impl OcrGateway {
    pub fn new(adapter: InputAdapter, engine: Arc<dyn RecognitionEngine>, workers: usize) -> Self {
        Self {
            adapter,
            engine,
            reconstructor: TableReconstructor::default(),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn with_reconstructor(mut self, reconstructor: TableReconstructor) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    pub fn engine(&self) -> &Arc<dyn RecognitionEngine> {
        &self.engine
    }

    pub fn supports_structure(&self) -> bool {
        self.engine.supports_structure()
    }

    /// OCR on an image (or every page of a PDF) with the general profile.
    pub async fn recognize_text(
        &self,
        source: InputSource,
    ) -> GatewayResult<Envelope<RecognitionItem>> {
        let start = Instant::now();
        let message = plain_message(&source);
        let document = self.adapter.load(source, Accept::Image).await?;
        let pages = document.page_count();

        let texts = self
            .run(move |engine| {
                engine.recognize_text(PipelineProfile::General, document.into_images())
            })
            .await?;
        let items = text_items(&texts);

        tracing::info!(
            pages,
            regions = items.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Text recognition completed"
        );
        Ok(Envelope::success(message, items))
    }

    /// Rebuilds tables from the text boxes of every PDF page.
    pub async fn extract_pdf_tables(
        &self,
        source: InputSource,
    ) -> GatewayResult<Envelope<PageTable>> {
        let start = Instant::now();
        let filename = source.upload_filename().map(str::to_string);
        let document = self.adapter.load(source, Accept::Pdf).await?;
        let pages = document.page_count();

        let texts = self
            .run(move |engine| {
                engine.recognize_text(PipelineProfile::Document, document.into_images())
            })
            .await?;
        let tables = reconstructed_tables(&texts, &self.reconstructor);

        tracing::info!(
            pages,
            tables = tables.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "PDF table extraction completed"
        );
        Ok(Envelope::success(
            tables_message(filename.as_deref(), tables.len()),
            tables,
        ))
    }

    /// PP-Structure analysis of every page.
    pub async fn analyze_structure(
        &self,
        source: InputSource,
    ) -> GatewayResult<Envelope<RecognitionItem>> {
        let start = Instant::now();
        let message = plain_message(&source);
        let structures = self.structure_pages(source).await?;

        let items: Vec<RecognitionItem> = structures
            .iter()
            .flat_map(|(page, structure)| structure_items(*page, structure))
            .collect();

        tracing::info!(
            pages = structures.len(),
            regions = items.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Structure analysis completed"
        );
        Ok(Envelope::success(message, items))
    }

    /// Tables recognised by PP-Structure on every page.
    pub async fn extract_structure_tables(
        &self,
        source: InputSource,
    ) -> GatewayResult<Envelope<PageTable>> {
        let start = Instant::now();
        let filename = source.upload_filename().map(str::to_string);
        let structures = self.structure_pages(source).await?;

        let tables: Vec<PageTable> = structures
            .iter()
            .flat_map(|(page, structure)| structure_tables(*page, structure))
            .collect();

        tracing::info!(
            pages = structures.len(),
            tables = tables.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Structure table extraction completed"
        );
        Ok(Envelope::success(
            tables_message(filename.as_deref(), tables.len()),
            tables,
        ))
    }

    async fn structure_pages(
        &self,
        source: InputSource,
    ) -> GatewayResult<Vec<(usize, PageStructure)>> {
        if !self.engine.supports_structure() {
            return Err(GatewayError::NotConfigured(
                "Structure analysis is not configured: no layout model available".to_string(),
            ));
        }

        let document: LoadedDocument = self.adapter.load(source, Accept::Any).await?;
        let mut structures = Vec::with_capacity(document.page_count());
        for page in document.pages {
            let number = page.page;
            let image = page.image;
            let structure = self
                .run(move |engine| engine.analyze_structure(image))
                .await?;
            tracing::debug!(page = number, regions = structure.regions.len(), "Page analysed");
            structures.push((number, structure));
        }
        Ok(structures)
    }

    /// Runs `job` on the blocking pool once a worker permit is available.
    async fn run<T, F>(&self, job: F) -> GatewayResult<T>
    where
        F: FnOnce(&dyn RecognitionEngine) -> GatewayResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(GatewayError::recognition)?;
        let engine = Arc::clone(&self.engine);
        tracing::debug!(engine = engine.name(), "Dispatching to engine");
        tokio::task::spawn_blocking(move || job(engine.as_ref())).await?
    }
}

fn plain_message(source: &InputSource) -> String {
    source
        .upload_filename()
        .map(str::to_string)
        .unwrap_or_else(|| "Success".to_string())
}

fn tables_message(filename: Option<&str>, count: usize) -> String {
    match filename {
        Some(name) => format!("Success: {name}, extracted {count} tables"),
        None => format!("Success: extracted {count} tables"),
    }
}
