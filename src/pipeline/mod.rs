//! Orchestrates one upload end to end: load → scan → parse → normalize →
//! optional enrichment → staging. Everything up to enrichment is a single
//! synchronous pass; enrichment is the only I/O-bound stage.

use crate::detect::AnimalDetector;
use crate::domain::{IncidentCandidate, IssueKind};
use crate::enrich::EnrichmentAgent;
use crate::error::Result;
use crate::normalize::DateNormalizer;
use crate::parser::RowParser;
use crate::sheet::{self, scanner::SheetStructureScanner};
use crate::staging::{SessionId, StagingStore};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default, Clone, Serialize)]
pub struct PipelineSummary {
    pub total_rows: usize,
    pub data_rows: usize,
    pub candidates: usize,
    pub with_issues: usize,
    pub enriched: usize,
    pub enrichment_failures: usize,
}

pub struct IngestPipeline {
    staging: Arc<StagingStore>,
    agent: Option<EnrichmentAgent>,
}

impl IngestPipeline {
    pub fn new(staging: Arc<StagingStore>, agent: Option<EnrichmentAgent>) -> Self {
        Self { staging, agent }
    }

    /// Runs the pipeline for an uploaded file and opens a staging session
    /// around the result.
    pub async fn run_file(&self, path: &Path) -> Result<(SessionId, PipelineSummary)> {
        let rows = sheet::load_rows(path)?;
        self.run_rows(rows).await
    }

    /// Same as [`run_file`](Self::run_file), starting from an already
    /// loaded cell grid.
    pub async fn run_rows(&self, rows: Vec<Vec<String>>) -> Result<(SessionId, PipelineSummary)> {
        let total_rows = rows.len();

        let scanned = SheetStructureScanner::scan(&rows);
        let data_rows = scanned.len();
        info!(total_rows, data_rows, "structure scan complete");

        let mut candidates = RowParser::parse_batch(&scanned);
        info!(candidates = candidates.len(), "row parsing complete");

        DateNormalizer::normalize_batch(&mut candidates);
        AnimalDetector::annotate_batch(&mut candidates);

        if let Some(agent) = &self.agent {
            agent.enrich_batch(&mut candidates).await;
        }

        let summary = summarize(total_rows, data_rows, &candidates);
        let session = self.staging.create_session(candidates);
        info!(session = %session, "upload staged for review");
        Ok((session, summary))
    }
}

fn summarize(
    total_rows: usize,
    data_rows: usize,
    candidates: &[IncidentCandidate],
) -> PipelineSummary {
    PipelineSummary {
        total_rows,
        data_rows,
        candidates: candidates.len(),
        with_issues: candidates.iter().filter(|c| !c.issues.is_empty()).count(),
        enriched: candidates.iter().filter(|c| c.ai_enriched).count(),
        enrichment_failures: candidates
            .iter()
            .filter(|c| c.has_issue(IssueKind::EnrichmentFailed))
            .count(),
    }
}
