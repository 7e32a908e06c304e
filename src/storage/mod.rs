// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::extractors::priority::ResolvedResult;
use crate::pipeline::RunSummary;
use crate::utils::error::StorageError;

const FILENAME_HEADER: &str = "Filename";
const EPS_HEADER: &str = "EPS";

/// How EPS numbers are written to the result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EpsFormat {
    /// Shortest exact representation with a leading minus for losses, e.g. `-1.5`.
    #[default]
    Plain,
    /// Two decimals, losses in parentheses, e.g. `(1.50)`.
    Accounting,
}

impl EpsFormat {
    pub fn format(&self, value: f64) -> String {
        match self {
            EpsFormat::Plain => value.to_string(),
            EpsFormat::Accounting if value < 0.0 => format!("({:.2})", value.abs()),
            EpsFormat::Accounting => format!("{:.2}", value),
        }
    }
}

/// Persists the resolved EPS figures.
pub trait ResultSink {
    fn write(&self, results: &ResolvedResult) -> Result<PathBuf, StorageError>;
}

/// Writes a two-column CSV (`Filename`, `EPS`), replacing any existing file.
pub struct CsvResultSink {
    path: PathBuf,
    format: EpsFormat,
}

impl CsvResultSink {
    pub fn new<P: AsRef<Path>>(path: P, format: EpsFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
        }
    }
}

impl ResultSink for CsvResultSink {
    fn write(&self, results: &ResolvedResult) -> Result<PathBuf, StorageError> {
        ensure_parent_dir(&self.path)?;

        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record([FILENAME_HEADER, EPS_HEADER])?;
        for entry in results.iter() {
            writer.write_record([entry.document.as_str(), self.format.format(entry.value).as_str()])?;
        }
        writer.flush()?;

        tracing::info!("Saved {} EPS rows to {}", results.len(), self.path.display());
        Ok(self.path.clone())
    }
}

#[cfg(test)]
#[derive(Debug, serde::Deserialize)]
struct ResultRow {
    #[serde(rename = "Filename")]
    filename: String,
    #[serde(rename = "EPS")]
    eps: String,
}

/// Reads a result table written by [`CsvResultSink`], in either number format.
/// File names are taken verbatim; only the EPS column is trimmed.
#[cfg(test)]
pub fn read_results<P: AsRef<Path>>(path: P) -> Result<ResolvedResult, StorageError> {
    use crate::extractors::eps::parse_eps_value;

    let mut reader = csv::ReaderBuilder::new().from_path(path.as_ref())?;

    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize::<ResultRow>().enumerate() {
        let row = record?;
        let value = parse_eps_value(&row.eps).map_err(|e| StorageError::MalformedRow {
            row: idx + 1,
            reason: e.to_string(),
        })?;
        rows.push((row.filename, value));
    }

    Ok(rows.into_iter().collect())
}

/// Saves the run summary as pretty JSON next to the results.
pub fn save_run_summary<P: AsRef<Path>>(summary: &RunSummary, path: P) -> Result<PathBuf, StorageError> {
    let file_path = path.as_ref().to_path_buf();
    ensure_parent_dir(&file_path)?;

    let metadata = serde_json::json!({
        "input_dir": summary.input_dir.display().to_string(),
        "output_path": summary.output_path.display().to_string(),
        "documents_discovered": summary.documents_discovered,
        "documents_skipped": summary.documents_skipped,
        "documents_without_candidates": summary.documents_without_candidates,
        "documents_resolved": summary.documents_resolved,
        "candidates": summary.candidates,
        "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
    });

    let metadata_str = serde_json::to_string_pretty(&metadata)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;

    fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

    tracing::info!("Saved run summary to {}", file_path.display());
    Ok(file_path)
}

fn ensure_parent_dir(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(StorageError::IoError)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResolvedResult {
        vec![
            ("b-8k.html".to_string(), 2.34),
            ("a-8k.html".to_string(), -1.5),
            ("c-8k.htm".to_string(), 0.0),
            ("d, inc.html".to_string(), 45.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_plain_round_trip_keeps_sign_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("eps.csv");

        let sink = CsvResultSink::new(&path, EpsFormat::Plain);
        sink.write(&sample()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Filename,EPS\n"), "header missing: {}", written);
        assert!(written.contains("a-8k.html,-1.5\n"));
        assert!(written.contains("\"d, inc.html\",45\n"));

        assert_eq!(read_results(&path).unwrap(), sample());
    }

    #[test]
    fn test_accounting_format_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eps.csv");

        CsvResultSink::new(&path, EpsFormat::Accounting).write(&sample()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("a-8k.html,(1.50)\n"));
        assert!(written.contains("b-8k.html,2.34\n"));
        assert_eq!(read_results(&path).unwrap(), sample());
    }

    #[test]
    fn test_write_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eps.csv");
        fs::write(&path, "stale contents that are much longer than the new table\n".repeat(20)).unwrap();

        let single: ResolvedResult = vec![("only.html".to_string(), 0.07)].into_iter().collect();
        CsvResultSink::new(&path, EpsFormat::Plain).write(&single).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "Filename,EPS\nonly.html,0.07\n");
    }

    #[test]
    fn test_empty_result_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eps.csv");
        CsvResultSink::new(&path, EpsFormat::Plain).write(&ResolvedResult::default()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Filename,EPS\n");
    }

    #[test]
    fn test_padded_file_names_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eps.csv");
        let padded: ResolvedResult = vec![
            (" leading.html".to_string(), 1.25),
            ("trailing.html ".to_string(), -0.4),
        ]
        .into_iter()
        .collect();

        CsvResultSink::new(&path, EpsFormat::Plain).write(&padded).unwrap();
        assert_eq!(read_results(&path).unwrap(), padded);
    }

    #[test]
    fn test_eps_column_tolerates_padding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eps.csv");
        fs::write(&path, "Filename,EPS
x.html, (0.75) 
").unwrap();

        let expected: ResolvedResult = vec![("x.html".to_string(), -0.75)].into_iter().collect();
        assert_eq!(read_results(&path).unwrap(), expected);
    }

    #[test]
    fn test_malformed_row_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eps.csv");
        fs::write(&path, "Filename,EPS\nx.html,n/a\n").unwrap();

        let err = read_results(&path).unwrap_err();
        assert!(matches!(err, StorageError::MalformedRow { row: 1, .. }));
    }

    #[test]
    fn test_run_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary {
            input_dir: PathBuf::from("/filings"),
            output_path: PathBuf::from("/out/eps.csv"),
            documents_discovered: 4,
            documents_skipped: 1,
            documents_without_candidates: 1,
            documents_resolved: 2,
            candidates: 7,
        };

        let path = save_run_summary(&summary, dir.path().join("run").join("summary.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["documents_resolved"], 2);
        assert_eq!(json["candidates"], 7);
        assert_eq!(json["output_path"], "/out/eps.csv");
        assert!(json["extraction_timestamp"].is_string());
    }

    #[test]
    fn test_unwritable_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as the output file.
        let err = CsvResultSink::new(dir.path(), EpsFormat::Plain)
            .write(&sample())
            .unwrap_err();
        assert!(matches!(err, StorageError::CsvError(_) | StorageError::IoError(_)));
    }
}
