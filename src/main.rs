use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use wci_ingest::commit::{BulkCommitter, InMemoryIncidentStore};
use wci_ingest::config::Config;
use wci_ingest::enrich::{EnrichmentAgent, HttpExtractionService};
use wci_ingest::logging;
use wci_ingest::pipeline::IngestPipeline;
use wci_ingest::staging::StagingStore;

#[derive(Parser)]
#[command(name = "wci_ingest")]
#[command(about = "Quarterly wildlife incident report ingestion pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and normalize an upload, print the staged batch as JSON
    Parse {
        /// Path to the .xlsx or .csv export
        file: PathBuf,
        /// Run LLM enrichment against the configured extraction service
        #[arg(long)]
        enrich: bool,
    },
    /// Full pipeline demo: parse, optionally enrich, approve everything and
    /// commit to the in-memory store
    Run {
        /// Path to the .xlsx or .csv export
        file: PathBuf,
        /// Run LLM enrichment against the configured extraction service
        #[arg(long)]
        enrich: bool,
    },
}

fn build_pipeline(config: &Config, staging: Arc<StagingStore>, enrich: bool) -> IngestPipeline {
    let agent = enrich.then(|| {
        EnrichmentAgent::new(
            Arc::new(HttpExtractionService::new(
                config.enrichment.endpoint.clone(),
            )),
            config.enrichment.max_in_flight,
            Duration::from_secs(config.enrichment.timeout_seconds),
        )
    });
    IngestPipeline::new(staging, agent)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    let staging = Arc::new(StagingStore::new(config.staging.session_ttl_minutes));

    match cli.command {
        Commands::Parse { file, enrich } => {
            println!("🔄 Parsing upload...");
            let pipeline = build_pipeline(&config, staging.clone(), enrich);
            let (session, summary) = pipeline.run_file(&file).await?;

            println!("\n📊 Upload summary:");
            println!("   Rows in file: {}", summary.total_rows);
            println!("   Data rows: {}", summary.data_rows);
            println!("   Candidates staged: {}", summary.candidates);
            println!("   With issues: {}", summary.with_issues);
            if enrich {
                println!(
                    "   Enriched: {} ({} failures)",
                    summary.enriched, summary.enrichment_failures
                );
            }

            let views = staging.snapshot(session)?;
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        Commands::Run { file, enrich } => {
            println!("🚀 Running full pipeline...");
            let pipeline = build_pipeline(&config, staging.clone(), enrich);
            let (session, summary) = pipeline.run_file(&file).await?;
            println!(
                "📥 Staged {} candidates ({} with issues)",
                summary.candidates, summary.with_issues
            );

            // Demo flow: approve the whole batch and commit
            let ids: Vec<_> = staging
                .snapshot(session)?
                .iter()
                .map(|view| view.candidate.id)
                .collect();
            staging.approve(session, &ids)?;
            info!(approved = ids.len(), "approved all staged candidates");

            let store = Arc::new(InMemoryIncidentStore::new());
            let committer = BulkCommitter::new(store.clone(), config.commit.chunk_size);
            let report = committer.commit(&staging, session).await?;

            println!("\n📊 Commit results:");
            println!("   Succeeded: {}", report.succeeded);
            println!("   Failed: {}", report.failed);
            for (id, reason) in &report.failures {
                println!("   - {}: {}", id, reason);
            }
        }
    }

    Ok(())
}
