//! Collaborator interfaces for the producer side
//!
//! Project loading, edit classification and delta compilation are owned by
//! external collaborators. This module defines the narrow seams the patch
//! pipeline calls them through; the handles are opaque and only meaningful to
//! the collaborator that issued them.

use crate::baseline::ModuleBaseline;
use crate::core::error::Result;
use crate::types::{Classification, Diagnostic, DocumentSnapshot, Edit, ModuleDelta};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque handle to an open project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectId(pub u64);

/// Opaque handle to one document inside a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u64);

/// Opaque handle to a full project compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompilationId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project-{}", self.0)
    }
}

/// Project/workspace collaborator.
///
/// Owns the project model: which files belong to the program, their current
/// text, and full-project compilation.
pub trait ProjectHost: Send + Sync {
    /// Open the project rooted at `root`
    fn open_project(&self, root: &Path) -> Result<ProjectId>;

    /// All documents belonging to the project
    fn documents(&self, project: ProjectId) -> Result<Vec<DocumentId>>;

    /// Look up the document for a source path, if the project tracks it
    fn document_for_path(&self, project: ProjectId, path: &Path) -> Result<Option<DocumentId>>;

    /// Current text of a document as the project model knows it
    fn text_of(&self, document: DocumentId) -> Result<String>;

    /// Replace a document's text, returning the handle of the updated document
    fn with_text(&self, document: DocumentId, text: &str) -> Result<DocumentId>;

    /// Recompute the full project compilation with the current document texts
    fn compile(&self, project: ProjectId) -> Result<CompilationId>;

    /// Path of the compiled module artifact this project produces
    fn module_path(&self, project: ProjectId) -> Result<PathBuf>;
}

/// Edit classifier collaborator.
///
/// Turns an old/new document pair into an ordered sequence of edits, or a
/// rude-edit signal when the change cannot be applied as a live patch.
pub trait EditClassifier: Send + Sync {
    /// Classify the change between two snapshots of one document
    fn classify(&self, old: &DocumentSnapshot, new: &DocumentSnapshot) -> Classification;
}

/// Everything a successful delta compile hands back in one piece.
#[derive(Debug, Clone)]
pub struct DeltaEmission {
    /// The binary delta, ready for transport
    pub delta: ModuleDelta,

    /// The baseline the next patch attempt computes against
    pub next_baseline: ModuleBaseline,

    /// Diagnostics explaining why the delta must not be used; empty on success
    pub diagnostics: Vec<Diagnostic>,
}

/// Delta compiler collaborator.
///
/// Turns a baseline plus a set of edits into a binary delta, or diagnostics
/// explaining why it could not.
pub trait DeltaCompiler: Send + Sync {
    /// Emit a delta for `edits` against `baseline`, using `compilation` for
    /// symbol resolution
    fn emit_delta(
        &self,
        baseline: &ModuleBaseline,
        edits: &[Edit],
        compilation: CompilationId,
    ) -> Result<DeltaEmission>;
}
