//! Partitions raw rows into quarter-context blocks. A header row such as
//! `n°1 / 1st April - 30th June 2013` opens a context that applies to every
//! following row until the next header or end of input. The carried context
//! is an immutable value attached to each emitted row, never scan state a
//! later stage could observe mid-mutation.

use crate::domain::{QuarterContext, RawRow};
use crate::normalize::month_from_name;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rows with fewer non-empty cells than this are skipped without error.
const MIN_DATA_CELLS: usize = 2;

/// Ordinal marker at the start of a quarter header: `n°1`, `No.1`, `No 1`.
static QUARTER_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:n\s*°|nº|no\.?)\s*(\d+)\s*[/:,-]?\s*(.*)$").expect("valid regex")
});

/// `1st April - 30th June 2013` style range, ordinal suffixes optional.
static DATE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d{1,2})\s*(?:st|nd|rd|th)?\s+([a-z]+)\s*(?:-|–|—|to)\s*(\d{1,2})\s*(?:st|nd|rd|th)?\s+([a-z]+)\s+(\d{4})",
    )
    .expect("valid regex")
});

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("valid regex"));

/// Labels of the documented column-header row; rows made of these are skipped.
const COLUMN_LABELS: [&str; 7] = [
    "date",
    "division",
    "page no",
    "page no.",
    "page",
    "description",
    "document",
];

pub struct SheetStructureScanner;

impl SheetStructureScanner {
    /// Walks the rows once, in order, emitting each retained data row paired
    /// with the quarter context active when it was encountered.
    pub fn scan(rows: &[Vec<String>]) -> Vec<RawRow> {
        let mut scanned = Vec::new();
        let mut current: Option<Arc<QuarterContext>> = None;

        for (index, cells) in rows.iter().enumerate() {
            if let Some(context) = parse_quarter_header(cells) {
                debug!(
                    quarter = context.quarter_number,
                    start = %context.start,
                    end = %context.end,
                    "quarter header opens new context"
                );
                current = Some(Arc::new(context));
                continue;
            }

            if is_column_header(cells) {
                debug!(row = index, "skipping repeated column-header row");
                continue;
            }

            let non_empty = cells.iter().filter(|c| !c.trim().is_empty()).count();
            if non_empty < MIN_DATA_CELLS {
                debug!(row = index, non_empty, "skipping short row");
                continue;
            }

            scanned.push(RawRow {
                source_index: index,
                cells: cells.clone(),
                context: current.clone(),
            });
        }

        scanned
    }
}

/// Recognizes a quarter header in the first non-empty cell. The header must
/// carry an ordinal marker and at least a year; without a year the row is
/// treated as data, not a header.
pub fn parse_quarter_header(cells: &[String]) -> Option<QuarterContext> {
    let first = cells.iter().map(|c| c.trim()).find(|c| !c.is_empty())?;
    let captures = QUARTER_MARKER_RE.captures(first)?;

    let quarter_number: u32 = captures[1].parse().ok()?;
    let label = captures[2].trim().to_string();

    let (start, end) = parse_range(&label)?;

    Some(QuarterContext {
        quarter_number,
        label,
        start,
        end,
        raw_header: first.to_string(),
    })
}

/// Resolves the date-range expression of a header label to a concrete window.
/// Falls back to the whole calendar year when only a year is recognizable.
fn parse_range(label: &str) -> Option<(NaiveDate, NaiveDate)> {
    if let Some(captures) = DATE_RANGE_RE.captures(label) {
        let window = (|| {
            let year: i32 = captures[5].parse().ok()?;
            let start_day: u32 = captures[1].parse().ok()?;
            let end_day: u32 = captures[3].parse().ok()?;
            let start_month = month_from_name(&captures[2])?;
            let end_month = month_from_name(&captures[4])?;
            let start = NaiveDate::from_ymd_opt(year, start_month, start_day)?;
            let end = NaiveDate::from_ymd_opt(year, end_month, end_day)?;
            (start <= end).then_some((start, end))
        })();
        if window.is_some() {
            return window;
        }
        warn!(label, "header range did not resolve to valid dates; trying year fallback");
    }

    let year: i32 = YEAR_RE.captures(label)?[1].parse().ok()?;
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

fn is_column_header(cells: &[String]) -> bool {
    let labelled = cells
        .iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| COLUMN_LABELS.contains(&c.as_str()))
        .count();
    labelled >= 2
}
