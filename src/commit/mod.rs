//! Bulk commit of the approved subset. Records go to the storage
//! collaborator in bounded chunks; every record gets its own outcome and a
//! failure never rolls back or blocks the rest. No automatic retry — retry
//! policy belongs to the caller, which can resubmit just the failed subset
//! without duplicating anything already committed.

use crate::domain::IncidentCandidate;
use crate::error::Result;
use crate::staging::{SessionId, StagingStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed,
    Failed { reason: String },
}

/// Per-record result returned by the storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResult {
    pub candidate_id: Uuid,
    pub outcome: CommitOutcome,
}

/// Aggregate result of one commit pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CommitReport {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<(Uuid, String)>,
}

/// Port to the persistent storage collaborator.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Persists the given records, reporting an outcome per record. A
    /// transport-level error may be returned instead when the whole call
    /// failed to reach the store.
    async fn bulk_create(&self, records: &[IncidentCandidate]) -> Result<Vec<RecordResult>>;
}

/// In-memory store keyed by candidate id, for local runs and tests.
/// Writing an id that is already present is a no-op success, so a retried
/// commit can never duplicate a record.
pub struct InMemoryIncidentStore {
    records: Arc<Mutex<HashMap<Uuid, IncidentCandidate>>>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: Uuid) -> Option<IncidentCandidate> {
        self.records.lock().unwrap().get(&id).cloned()
    }
}

impl Default for InMemoryIncidentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn bulk_create(&self, records: &[IncidentCandidate]) -> Result<Vec<RecordResult>> {
        let mut stored = self.records.lock().unwrap();
        let results = records
            .iter()
            .map(|record| {
                stored.entry(record.id).or_insert_with(|| record.clone());
                debug!(candidate = %record.id, "stored incident");
                RecordResult {
                    candidate_id: record.id,
                    outcome: CommitOutcome::Committed,
                }
            })
            .collect();
        Ok(results)
    }
}

/// Submits the approved subset of a staging session and reports per-record
/// outcomes.
pub struct BulkCommitter {
    store: Arc<dyn IncidentStore>,
    chunk_size: usize,
}

impl BulkCommitter {
    pub fn new(store: Arc<dyn IncidentStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Commits every approved, not-yet-committed candidate of the session.
    /// Successes are flagged committed in staging; failures are reported and
    /// left staged so the caller can edit or resubmit them.
    pub async fn commit(&self, staging: &StagingStore, session: SessionId) -> Result<CommitReport> {
        let approved = staging.approved_uncommitted(session)?;
        info!(
            session = %session,
            records = approved.len(),
            "committing approved candidates"
        );

        let mut report = CommitReport::default();
        for chunk in approved.chunks(self.chunk_size) {
            match self.store.bulk_create(chunk).await {
                Ok(results) => {
                    let mut committed_ids = Vec::new();
                    for result in results {
                        match result.outcome {
                            CommitOutcome::Committed => {
                                committed_ids.push(result.candidate_id);
                                report.succeeded += 1;
                            }
                            CommitOutcome::Failed { reason } => {
                                warn!(candidate = %result.candidate_id, reason = %reason, "record failed to commit");
                                report.failed += 1;
                                report.failures.push((result.candidate_id, reason));
                            }
                        }
                    }
                    // Records above are already persisted; losing the staging
                    // flag (e.g. the session expired mid-commit) must not
                    // abort the remaining chunks or discard the report
                    if let Err(e) = staging.mark_committed(session, &committed_ids) {
                        warn!(
                            session = %session,
                            records = committed_ids.len(),
                            reason = %e.to_string(),
                            "committed records could not be flagged in staging"
                        );
                    }
                }
                Err(e) => {
                    // The chunk never reached the store; the remaining
                    // chunks still get their attempt
                    let reason = e.to_string();
                    warn!(reason = %reason, records = chunk.len(), "chunk failed to commit");
                    for candidate in chunk {
                        report.failed += 1;
                        report.failures.push((candidate.id, reason.clone()));
                    }
                }
            }
        }

        info!(
            session = %session,
            succeeded = report.succeeded,
            failed = report.failed,
            "commit pass finished"
        );
        Ok(report)
    }
}
