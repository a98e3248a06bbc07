use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::Pipeline;

pub async fn handle_status(config: &Config, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let pipeline = Pipeline::new(config)?;

    let probe = pipeline.probe().await;
    let collection = pipeline.store().collection_info().await.ok();
    let store = pipeline.store().status().await;

    let status = StatusInfo {
        embedding_url: config.embedding.url.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: pipeline.embedder().dimension(),
        embedding_reachable: probe.is_reachable(),
        embedding_probe: probe.to_string(),
        store,
        collection,
        metrics: pipeline.monitor().summary(None, None),
        system: pipeline.monitor().system_info(),
    };

    print!("{}", formatter.format_status(&status));

    if !status.embedding_reachable || status.collection.is_none() {
        eprintln!();
        if !status.embedding_reachable {
            eprintln!(
                "Warning: embedding endpoint not reachable ({}). Ingest and query will use fallback vectors.",
                status.embedding_probe
            );
            eprintln!("      Set DOCRAG_EMBEDDING_URL or DOCRAG_EMBEDDING_TOKEN if needed.");
        }
        if status.collection.is_none() {
            eprintln!(
                "Warning: storage at {} could not be opened.",
                config.storage.path.display()
            );
        }
    }

    Ok(())
}
