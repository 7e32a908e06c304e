// src/pipeline.rs
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::extractors::eps::{Candidate, EpsMatcher, MatchMode};
use crate::extractors::priority::{resolve, ResolvedResult};
use crate::filings::{self, document_id, TextSource, DEFAULT_EXTENSIONS};
use crate::storage::ResultSink;
use crate::utils::error::AppError;
use crate::utils::match_debug;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    /// Extensions (without the dot) of the files treated as filings.
    pub extensions: Vec<String>,
    pub match_mode: MatchMode,
    /// Upper bound on documents retrieved and matched at the same time.
    pub jobs: usize,
    /// When set, a highlighted HTML view of every document's matches is written here.
    pub debug_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new<P: AsRef<Path>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            match_mode: MatchMode::default(),
            jobs: 4,
            debug_dir: None,
        }
    }
}

/// Counters describing one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub input_dir: PathBuf,
    pub output_path: PathBuf,
    pub documents_discovered: usize,
    pub documents_skipped: usize,
    pub documents_without_candidates: usize,
    pub documents_resolved: usize,
    pub candidates: usize,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub results: ResolvedResult,
}

#[derive(Debug)]
enum DocumentOutcome {
    Skipped,
    Matched(Vec<Candidate>),
}

pub struct ExtractionPipeline {
    config: PipelineConfig,
    matcher: EpsMatcher,
    source: Arc<dyn TextSource>,
    sink: Box<dyn ResultSink>,
}

impl ExtractionPipeline {
    pub fn new(config: PipelineConfig, source: Arc<dyn TextSource>, sink: Box<dyn ResultSink>) -> Self {
        let matcher = EpsMatcher::new(config.match_mode);
        Self { config, matcher, source, sink }
    }

    /// Discovers filings, matches them, resolves one EPS per document and
    /// hands the result to the sink. Only an unreadable input directory or a
    /// failing sink abort the run.
    pub async fn run(&self) -> Result<RunOutcome, AppError> {
        tracing::info!("Scanning {} for filings", self.config.input_dir.display());
        let filings = filings::discover_filings(&self.config.input_dir, &self.config.extensions)?;

        let mut summary = RunSummary {
            input_dir: self.config.input_dir.clone(),
            documents_discovered: filings.len(),
            ..RunSummary::default()
        };

        let outcomes = self.match_documents(filings).await?;

        // Outcomes are in discovery order, candidates within a document in pattern order.
        let mut candidates = Vec::new();
        for outcome in outcomes {
            match outcome {
                DocumentOutcome::Skipped => summary.documents_skipped += 1,
                DocumentOutcome::Matched(found) if found.is_empty() => {
                    summary.documents_without_candidates += 1
                }
                DocumentOutcome::Matched(found) => candidates.extend(found),
            }
        }
        summary.candidates = candidates.len();

        let results = resolve(&candidates);
        summary.documents_resolved = results.len();
        if results.is_empty() {
            tracing::warn!("No EPS figures resolved from {} filings", summary.documents_discovered);
        }

        summary.output_path = self.sink.write(&results)?;

        tracing::info!(
            "Processing finished. Discovered: {}, Resolved: {}, No EPS: {}, Skipped: {}",
            summary.documents_discovered,
            summary.documents_resolved,
            summary.documents_without_candidates,
            summary.documents_skipped
        );

        Ok(RunOutcome { summary, results })
    }

    async fn match_documents(&self, filings: Vec<PathBuf>) -> Result<Vec<DocumentOutcome>, AppError> {
        let semaphore = Arc::new(Semaphore::new(self.config.jobs.max(1)));
        let mut join_set: JoinSet<(usize, DocumentOutcome)> = JoinSet::new();
        let total = filings.len();

        for (index, path) in filings.into_iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| AppError::Processing(format!("Worker pool closed: {}", e)))?;
            let source = Arc::clone(&self.source);
            let matcher = self.matcher.clone();
            let debug_dir = self.config.debug_dir.clone();

            join_set.spawn_blocking(move || {
                // A panic while reading or matching one filing only costs that filing.
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    process_document(source.as_ref(), &matcher, &path, debug_dir.as_deref())
                }))
                .unwrap_or_else(|_| {
                    tracing::error!("Skipping {}: document task panicked", document_id(&path));
                    DocumentOutcome::Skipped
                });
                drop(permit);
                (index, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            let indexed = joined.map_err(|e| AppError::Processing(format!("Document task failed: {}", e)))?;
            outcomes.push(indexed);
        }

        // Tasks finish in any order; restore discovery order before prioritization.
        outcomes.sort_by_key(|(index, _)| *index);
        Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
    }
}

fn process_document(
    source: &dyn TextSource,
    matcher: &EpsMatcher,
    path: &Path,
    debug_dir: Option<&Path>,
) -> DocumentOutcome {
    let document = match source.retrieve(path) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("Skipping {}: {}", document_id(path), e);
            return DocumentOutcome::Skipped;
        }
    };

    let candidates = match debug_dir {
        None => matcher.extract_candidates(&document.id, &document.text),
        Some(dir) => {
            let hits = matcher.find_matches(&document.text);
            if let Err(e) = match_debug::save_match_html(dir, &document.id, &document.text, &hits) {
                tracing::warn!("Failed to create match debug HTML for {}: {}", document.id, e);
            }
            hits.into_iter()
                .map(|hit| Candidate::from_match(&document.id, hit))
                .collect()
        }
    };

    if candidates.is_empty() {
        tracing::info!("{}: no EPS figures found", document.id);
    } else {
        tracing::info!("{}: {} EPS candidates", document.id, candidates.len());
    }

    DocumentOutcome::Matched(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filings::{Document, FilingTextSource};
    use crate::storage::{read_results, CsvResultSink, EpsFormat};
    use crate::utils::error::FilingError;
    use std::fs;

    // Fails for one chosen file name, otherwise reads from disk.
    struct FlakySource {
        broken: &'static str,
        inner: FilingTextSource,
    }

    impl TextSource for FlakySource {
        fn retrieve(&self, path: &Path) -> Result<Document, FilingError> {
            if document_id(path) == self.broken {
                return Err(FilingError::DocumentUnreadable {
                    path: path.to_path_buf(),
                    reason: "corrupt markup".to_string(),
                });
            }
            self.inner.retrieve(path)
        }
    }

    fn write_fixtures(dir: &Path) {
        fs::write(dir.join("a.html"), "<p>Basic EPS $1.20</p><p>Diluted EPS $1.18</p>").unwrap();
        fs::write(
            dir.join("b.html"),
            "<p>Net loss per share of -0.35</p><p>Loss per share (diluted) -0.40</p>",
        )
        .unwrap();
        fs::write(dir.join("c.html"), "<p>Quarterly revenue rose</p>").unwrap();
        fs::write(dir.join("d.txt"), "EPS: 2.34").unwrap();
        fs::write(dir.join("broken.html"), "<p>EPS 9.99</p>").unwrap();
        fs::write(dir.join("notes.md"), "EPS 7.77").unwrap();
    }

    fn pipeline(input: &Path, output: &Path, jobs: usize) -> ExtractionPipeline {
        let mut config = PipelineConfig::new(input);
        config.jobs = jobs;
        let source = Arc::new(FlakySource {
            broken: "broken.html",
            inner: FilingTextSource::new(),
        });
        let sink = Box::new(CsvResultSink::new(output, EpsFormat::Plain));
        ExtractionPipeline::new(config, source, sink)
    }

    #[test]
    fn test_run_resolves_each_document_once() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_fixtures(input.path());
        let output = out.path().join("eps.csv");

        let outcome = tokio_test::block_on(pipeline(input.path(), &output, 4).run()).unwrap();

        let summary = &outcome.summary;
        assert_eq!(summary.documents_discovered, 5);
        assert_eq!(summary.documents_skipped, 1);
        assert_eq!(summary.documents_without_candidates, 1);
        assert_eq!(summary.documents_resolved, 3);
        assert_eq!(summary.candidates, 10);
        assert_eq!(summary.output_path, output);

        let order: Vec<&str> = outcome.results.iter().map(|e| e.document.as_str()).collect();
        assert_eq!(order, vec!["a.html", "b.html", "d.txt"]);
        assert_eq!(outcome.results.get("a.html"), Some(1.20));
        assert_eq!(outcome.results.get("b.html"), Some(-0.35));
        assert_eq!(outcome.results.get("d.txt"), Some(2.34));
        assert_eq!(outcome.results.get("c.html"), None);
        assert_eq!(outcome.results.get("broken.html"), None);

        assert_eq!(read_results(&output).unwrap(), outcome.results);
    }

    #[test]
    fn test_parallel_and_sequential_runs_agree() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_fixtures(input.path());

        let sequential = tokio_test::block_on(pipeline(input.path(), &out.path().join("seq.csv"), 1).run()).unwrap();
        let parallel = tokio_test::block_on(pipeline(input.path(), &out.path().join("par.csv"), 8).run()).unwrap();

        assert_eq!(sequential.results, parallel.results);
        assert_eq!(
            fs::read_to_string(out.path().join("seq.csv")).unwrap(),
            fs::read_to_string(out.path().join("par.csv")).unwrap()
        );
    }

    // Panics on one chosen file name.
    struct PanickingSource {
        inner: FilingTextSource,
    }

    impl TextSource for PanickingSource {
        fn retrieve(&self, path: &Path) -> Result<Document, FilingError> {
            if document_id(path) == "bad.html" {
                panic!("parser blew up");
            }
            self.inner.retrieve(path)
        }
    }

    #[test]
    fn test_panicking_document_is_skipped() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(input.path().join("a.html"), "<p>EPS 1.00</p>").unwrap();
        fs::write(input.path().join("bad.html"), "<p>EPS 5.00</p>").unwrap();
        fs::write(input.path().join("c.html"), "<p>Loss per share -0.12</p>").unwrap();
        let output = out.path().join("eps.csv");

        let pipeline = ExtractionPipeline::new(
            PipelineConfig::new(input.path()),
            Arc::new(PanickingSource { inner: FilingTextSource::new() }),
            Box::new(CsvResultSink::new(&output, EpsFormat::Plain)),
        );
        let outcome = tokio_test::block_on(pipeline.run()).unwrap();

        assert_eq!(outcome.summary.documents_discovered, 3);
        assert_eq!(outcome.summary.documents_skipped, 1);
        assert_eq!(outcome.results.get("a.html"), Some(1.0));
        assert_eq!(outcome.results.get("c.html"), Some(-0.12));
        assert_eq!(outcome.results.get("bad.html"), None);
        assert_eq!(read_results(&output).unwrap(), outcome.results);
    }

    #[test]
    fn test_unreadable_input_dir_is_fatal() {
        let out = tempfile::tempdir().unwrap();
        let missing = out.path().join("no-such-dir");

        let result = tokio_test::block_on(pipeline(&missing, &out.path().join("eps.csv"), 2).run());
        assert!(matches!(result, Err(AppError::Filing(FilingError::DirectoryUnreadable { .. }))));
        assert!(!out.path().join("eps.csv").exists());
    }

    #[test]
    fn test_debug_dir_receives_match_views() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_fixtures(input.path());

        let mut config = PipelineConfig::new(input.path());
        config.debug_dir = Some(out.path().join("debug"));
        let pipeline = ExtractionPipeline::new(
            config,
            Arc::new(FilingTextSource::new()),
            Box::new(CsvResultSink::new(out.path().join("eps.csv"), EpsFormat::Accounting)),
        );

        tokio_test::block_on(pipeline.run()).unwrap();
        assert!(out.path().join("debug").join("a.html.matches.html").exists());
        assert!(out.path().join("debug").join("c.html.matches.html").exists());
    }
}
