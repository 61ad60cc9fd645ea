//! Change differencing - one end-to-end patch attempt per file change
//!
//! The differencer orchestrates a single attempt for a set of changed files:
//! read the new text, classify the change, compile a delta against the
//! current baseline, and advance the baseline once diagnostics are clean.
//! Attempts are strictly sequential; the baseline and project snapshot are
//! mutable state owned exclusively by this component.

pub mod fs;

use crate::baseline::BaselineManager;
use crate::core::config::ProducerConfig;
use crate::core::error::Result;
use crate::project::{DeltaCompiler, DocumentId, EditClassifier, ProjectHost, ProjectId};
use crate::system::metrics::Metrics;
use crate::types::{Classification, Diagnostic, DocumentSnapshot, PatchOutcome, TextDiffStats};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces one patch per batch of changed files, sequentially.
pub struct ChangeDiffer<P, C, D> {
    project_host: Arc<P>,
    classifier: Arc<C>,
    compiler: Arc<D>,
    baselines: BaselineManager,
    project_root: PathBuf,
    project: Option<ProjectId>,
    config: ProducerConfig,
}

impl<P, C, D> ChangeDiffer<P, C, D>
where
    P: ProjectHost,
    C: EditClassifier,
    D: DeltaCompiler,
{
    /// Create a differencer for the project rooted at `project_root`.
    pub fn new(
        project_host: Arc<P>,
        classifier: Arc<C>,
        compiler: Arc<D>,
        project_root: impl Into<PathBuf>,
        config: ProducerConfig,
    ) -> Self {
        Self {
            project_host,
            classifier,
            compiler,
            baselines: BaselineManager::new(),
            project_root: project_root.into(),
            project: None,
            config,
        }
    }

    /// Run one patch attempt for a batch of changed files.
    ///
    /// Multiple simultaneously changed files form a single attempt: edits
    /// from all documents are concatenated into one delta-compile call, and a
    /// rude edit in any one document aborts the entire batch.
    pub async fn try_produce_patch(&mut self, changed: &[PathBuf]) -> Result<PatchOutcome> {
        let tracked: Vec<&Path> = changed
            .iter()
            .map(|path| path.as_path())
            .filter(|path| self.is_source_file(path))
            .collect();

        if tracked.is_empty() {
            debug!("no tracked source files in change set");
            return Ok(PatchOutcome::NoChange);
        }

        let project = self.ensure_project()?;

        // Read every changed document up front; a file that stays locked
        // through the retry budget fails the whole attempt.
        let delay = Duration::from_millis(self.config.read_retry_delay_ms);
        let mut changed_docs: Vec<(DocumentId, DocumentSnapshot, DocumentSnapshot)> = Vec::new();
        for path in tracked {
            let new_text =
                fs::read_file_text_with_retry(path, self.config.read_retry_attempts, delay).await?;

            let Some(document) = self.project_host.document_for_path(project, path)? else {
                debug!(path = %path.display(), "file not tracked by project, skipping");
                continue;
            };

            let old = DocumentSnapshot::new(path, self.project_host.text_of(document)?);
            let new = DocumentSnapshot::new(path, new_text);

            // Diagnostic only; correctness never depends on these numbers.
            let stats = TextDiffStats::between(&old, &new);
            debug!(
                path = %path.display(),
                added = stats.lines_added,
                removed = stats.lines_removed,
                "document changed"
            );

            changed_docs.push((document, old, new));
        }

        if changed_docs.is_empty() {
            return Ok(PatchOutcome::NoChange);
        }

        // A missing module image aborts this attempt but not the session.
        let module_path = self.project_host.module_path(project)?;
        let baseline = match self.baselines.ensure_baseline(&module_path) {
            Ok(baseline) => baseline.clone(),
            Err(e) => {
                warn!(error = %e, "baseline unavailable, aborting attempt");
                return Ok(PatchOutcome::CompileFailed(vec![Diagnostic::error(
                    e.to_string(),
                )]));
            }
        };

        // Classify every document; one rude edit aborts the whole batch.
        let mut edits = Vec::new();
        for (_, old, new) in &changed_docs {
            match self.classifier.classify(old, new) {
                Classification::Rude(rude) => {
                    Metrics::global().producer.rude_edits.inc();
                    info!(rude = %rude, "rude edit, target process needs a restart");
                    return Ok(PatchOutcome::RudeEdit(rude));
                }
                Classification::Edits(mut document_edits) => edits.append(&mut document_edits),
            }
        }

        // Push the new texts into the project model so the compilation below
        // sees them and the next attempt diffs against them.
        for (document, _, new) in &changed_docs {
            self.project_host.with_text(*document, &new.text)?;
        }

        if edits.is_empty() {
            Metrics::global().producer.no_changes.inc();
            debug!("change classified to zero edits");
            return Ok(PatchOutcome::NoChange);
        }

        let compilation = self.project_host.compile(project)?;
        let emission = self.compiler.emit_delta(&baseline, &edits, compilation)?;

        if !emission.diagnostics.is_empty() {
            Metrics::global().producer.compile_failures.inc();
            for diagnostic in &emission.diagnostics {
                warn!(diagnostic = %diagnostic, "delta compile rejected");
            }
            return Ok(PatchOutcome::CompileFailed(emission.diagnostics));
        }

        // The patch is decided; commit the baseline before transport.
        self.baselines.advance(emission.next_baseline);
        Metrics::global().producer.patches_produced.inc();
        info!(
            module = %emission.delta.module_name,
            digest = %emission.delta.digest(),
            edits = edits.len(),
            generation = self.baselines.generation(),
            "produced delta"
        );
        Ok(PatchOutcome::Produced(emission.delta))
    }

    /// Reinitialize the session: dispose the baseline and the project handle
    /// so the next attempt re-snapshots both from disk.
    pub fn reset(&mut self) {
        Metrics::global().producer.session_resets.inc();
        self.baselines.reset();
        self.project = None;
        info!("producer session reset");
    }

    /// Baseline state, exposed for logging and tests
    pub fn baselines(&self) -> &BaselineManager {
        &self.baselines
    }

    fn ensure_project(&mut self) -> Result<ProjectId> {
        if let Some(project) = self.project {
            return Ok(project);
        }
        let project = self.project_host.open_project(&self.project_root)?;
        debug!(project = %project, root = %self.project_root.display(), "opened project");
        self.project = Some(project);
        Ok(project)
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .source_extensions
                    .iter()
                    .any(|tracked| tracked == ext)
            })
            .unwrap_or(false)
    }
}
