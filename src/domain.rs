use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Reporting window parsed from a quarterly header row.
/// Immutable once parsed; shared by reference with every row it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarterContext {
    pub quarter_number: u32,
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub raw_header: String,
}

impl QuarterContext {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// One data row as encountered during the structure scan, carrying the
/// quarter context that was active at that point (if any).
#[derive(Debug, Clone)]
pub struct RawRow {
    pub source_index: usize,
    pub cells: Vec<String>,
    pub context: Option<Arc<QuarterContext>>,
}

/// Qualitative trust level attached to a normalized date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateConfidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingDate,
    AmbiguousDate,
    DateOutOfRange,
    MissingLocation,
    MissingContext,
    EnrichmentFailed,
}

/// Fields a validation issue can concern and a reviewer can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateField {
    Date,
    Division,
    Description,
    Quarter,
    Enrichment,
    Animals,
    Quantity,
    Suspects,
    Vehicle,
    Source,
    Status,
    Keywords,
    Summary,
}

impl CandidateField {
    /// Fields living inside the enrichment block.
    pub fn is_enrichment_field(self) -> bool {
        matches!(
            self,
            CandidateField::Animals
                | CandidateField::Quantity
                | CandidateField::Suspects
                | CandidateField::Vehicle
                | CandidateField::Source
                | CandidateField::Status
                | CandidateField::Keywords
                | CandidateField::Summary
        )
    }
}

/// Non-fatal finding attached to a candidate for human review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub field: CandidateField,
    pub message: String,
}

/// Structured fields extracted from the free-text description.
/// All fields default to empty when the extraction response lacks them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub animals: String,
    pub quantity: String,
    pub suspects: String,
    pub vehicle: String,
    pub source: String,
    pub status: String,
    pub keywords: Vec<String>,
    pub summary: String,
}

/// A staged, not-yet-committed incident record produced by parsing,
/// normalization and optional enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentCandidate {
    pub id: Uuid,
    pub description: String,
    pub division: String,
    pub page_no: String,
    pub raw_date: String,
    pub normalized_date: Option<NaiveDate>,
    pub date_confidence: DateConfidence,
    pub issues: Vec<ValidationIssue>,
    pub quarter: Option<Arc<QuarterContext>>,
    pub enrichment: Option<Enrichment>,
    pub ai_enriched: bool,
    pub approved: bool,
    pub committed: bool,
    pub created_at: DateTime<Utc>,
}

impl IncidentCandidate {
    pub fn new(
        raw_date: String,
        division: String,
        page_no: String,
        description: String,
        quarter: Option<Arc<QuarterContext>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description,
            division,
            page_no,
            raw_date,
            normalized_date: None,
            date_confidence: DateConfidence::Low,
            issues: Vec::new(),
            quarter,
            enrichment: None,
            ai_enriched: false,
            approved: false,
            committed: false,
            created_at: Utc::now(),
        }
    }

    pub fn add_issue(&mut self, kind: IssueKind, field: CandidateField, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            kind,
            field,
            message: message.into(),
        });
    }

    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    /// Drops every issue tied to the given field. Used when a reviewer
    /// overwrites that field.
    pub fn clear_issues_for(&mut self, field: CandidateField) {
        self.issues.retain(|i| i.field != field);
    }
}
