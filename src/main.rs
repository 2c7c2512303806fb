mod assemble;
mod config;
mod contract;
mod error;
mod flatten;
mod numeric;
mod oracle;
mod pdf_text;
mod pipeline;

use pipeline::SourceDocument;
use std::path::Path;
use tracing::{info, warn};

const CONFIG_PATH: &str = ".config/sb_extract.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: sb_extract <shipping-bill.pdf | directory> ...");
        std::process::exit(2);
    }

    let cfg = config::Config::load_or_default(CONFIG_PATH)?;

    let documents = collect_documents(&args)?;
    if documents.is_empty() {
        return Err("no PDF documents found in the given paths".into());
    }
    info!(count = documents.len(), "shipping bills queued");

    let oracle = oracle::LlmOracle::connect(&cfg.llm).await?;
    let report = pipeline::run_batch(&documents, &oracle).await?;

    for failure in &report.failures {
        warn!(error = %failure, "dropped during batch");
    }

    let dataset = &report.dataset;
    info!(
        documents = report.documents_total,
        failed = report.failures.len(),
        rows = dataset.len(),
        invoices = dataset.invoice_count(),
        total_fob_inr = format!("{:.2}", dataset.total_fob_inr()),
        total_benefits = format!("{:.2}", dataset.total_benefits()),
        numeric_fallbacks = report.numeric_fallbacks,
        "batch metrics"
    );

    std::fs::write(&cfg.output_path, serde_json::to_string_pretty(dataset)?)?;
    info!(path = %cfg.output_path, "dataset written");

    Ok(())
}

/// Expand CLI arguments into the ordered document list. A directory argument
/// contributes its `*.pdf` files in name order; explicit files are taken
/// as given.
fn collect_documents(args: &[String]) -> error::Result<Vec<SourceDocument>> {
    let mut documents = Vec::new();

    for arg in args {
        let path = Path::new(arg);
        if path.is_dir() {
            let mut entries: Vec<_> = std::fs::read_dir(path)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
                })
                .collect();
            entries.sort();
            for entry in entries {
                documents.push(read_source(&entry)?);
            }
        } else {
            documents.push(read_source(path)?);
        }
    }

    Ok(documents)
}

fn read_source(path: &Path) -> error::Result<SourceDocument> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = std::fs::read(path)?;
    Ok(SourceDocument { name, bytes })
}
