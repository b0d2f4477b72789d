//! Spreadsheet loading. Turns an uploaded `.xlsx` or `.csv` file into the
//! raw cell grid the structure scanner works on. An unreadable or
//! unsupported file is the one fatal condition in the whole pipeline.

pub mod scanner;

use crate::error::{IngestError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::info;

/// Reads the first worksheet (or the CSV body) into ordered rows of cell text.
pub fn load_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let rows = match extension.as_deref() {
        Some("xlsx") => load_xlsx(path)?,
        Some("csv") => load_csv(path)?,
        other => {
            return Err(IngestError::UnsupportedFormat(format!(
                "expected .xlsx or .csv, got '{}'",
                other.unwrap_or("<none>")
            )))
        }
    };

    info!(rows = rows.len(), file = %path.display(), "loaded upload");
    Ok(rows)
}

fn load_xlsx(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestError::UnsupportedFormat("workbook has no sheets".to_string()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn load_csv(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.trim().to_string()).collect());
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Page numbers arrive as floats from Excel; keep them integral
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn csv_rows_are_loaded_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "n°1 / 1st April - 30th June 2013,,,").unwrap();
        writeln!(file, "08.01.2013,Mumbai,5,Ivory tusks seized").unwrap();
        drop(file);

        let rows = load_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "08.01.2013");
        assert_eq!(rows[1][3], "Ivory tusks seized");
    }

    #[test]
    fn unsupported_extension_is_fatal() {
        let err = load_rows(Path::new("report.pdf")).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    }

    #[test]
    fn missing_csv_is_fatal() {
        let err = load_rows(Path::new("does-not-exist.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Csv(_)));
    }
}
