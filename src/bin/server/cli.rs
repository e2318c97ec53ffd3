//! CLI mode: run one document through the gateway and print the envelope.

use crate::config::GatewayConfig;
use clap::ValueEnum;
use ocr_gateway::core::GatewayError;
use ocr_gateway::input::InputSource;
use ocr_gateway::response::{Envelope, PageTable, RecognitionItem};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// What to extract from the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Text lines (general OCR profile)
    Text,
    /// Tables rebuilt from text coordinates on each PDF page
    PdfTables,
    /// Layout regions, tables and formulas
    Structure,
    /// Tables recognised by PP-Structure
    StructureTables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
    Pretty,
}

/// Process a single document and print the result
pub async fn run(
    source: InputSource,
    mode: Mode,
    output: OutputFormat,
    config: &GatewayConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();
    info!("Initializing OCR engine...");
    let gateway = config.build(false)?;

    info!(source = %source.label(), mode = ?mode, "Processing document...");
    match mode {
        Mode::Text => {
            let envelope = gateway.recognize_text(source).await?;
            print_envelope(&envelope, output, start)?
        }
        Mode::PdfTables => {
            let envelope = gateway.extract_pdf_tables(source).await?;
            print_envelope(&envelope, output, start)?
        }
        Mode::Structure => {
            let envelope = gateway.analyze_structure(source).await?;
            print_envelope(&envelope, output, start)?
        }
        Mode::StructureTables => {
            let envelope = gateway.extract_structure_tables(source).await?;
            print_envelope(&envelope, output, start)?
        }
    }

    Ok(())
}

/// Rendering of a single envelope entry for terminal output.
trait Render {
    fn plain(&self) -> String;
    fn pretty(&self, index: usize) -> String;
}

impl Render for RecognitionItem {
    fn plain(&self) -> String {
        self.text.clone().unwrap_or_default()
    }

    fn pretty(&self, index: usize) -> String {
        let text = self
            .text
            .as_deref()
            .or(self.html.as_deref())
            .unwrap_or("<no text>");
        let confidence = self.confidence.unwrap_or(0.0) * 100.0;
        format!(
            "[{}] page {} {} \"{}\" ({:.1}%)\n    Position: [{:.1}, {:.1}] - [{:.1}, {:.1}]",
            index + 1,
            self.page,
            self.kind,
            text,
            confidence,
            self.bbox[0],
            self.bbox[1],
            self.bbox[2],
            self.bbox[3]
        )
    }
}

impl Render for PageTable {
    fn plain(&self) -> String {
        std::iter::once(&self.table.headers)
            .chain(self.table.rows.iter())
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn pretty(&self, index: usize) -> String {
        let mut out = format!(
            "[{}] page {}: {} rows x {} columns\n",
            index + 1,
            self.page,
            self.table.total_rows,
            self.table.total_cols
        );
        out.push_str(&format!("    {}\n", self.table.headers.join(" | ")));
        for row in &self.table.rows {
            out.push_str(&format!("    {}\n", row.join(" | ")));
        }
        out
    }
}

fn print_envelope<T: Serialize + Render>(
    envelope: &Envelope<T>,
    format: OutputFormat,
    start: Instant,
) -> Result<(), GatewayError> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string(envelope)
                .map_err(|e| GatewayError::Config(format!("Failed to serialize result: {e}")))?;
            println!("{json}");
        }
        OutputFormat::Text => {
            for entry in &envelope.data {
                println!("{}", entry.plain());
            }
        }
        OutputFormat::Pretty => {
            println!("\n=== OCR Results ===");
            println!("Message: {}", envelope.message);
            println!(
                "Processing time: {:.2}ms",
                start.elapsed().as_secs_f64() * 1000.0
            );
            println!("Entries: {}", envelope.data.len());
            println!();

            if envelope.data.is_empty() {
                println!("Nothing detected.");
            }
            for (index, entry) in envelope.data.iter().enumerate() {
                println!("{}", entry.pretty(index));
            }
        }
    }

    Ok(())
}
