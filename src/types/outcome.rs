//! Patch attempt outcomes and compiler diagnostics

use crate::types::delta::ModuleDelta;
use crate::types::edit::RudeEdit;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Severity of a compiler diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// The delta compiler could not produce a delta
    Error,

    /// Advisory only; still gates delta emission
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One diagnostic explaining why a delta could not be emitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity of the diagnostic
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source file the diagnostic points at, when known
    pub path: Option<PathBuf>,

    /// 1-based line number, when known
    pub line: Option<u32>,
}

impl Diagnostic {
    /// Create an error diagnostic with only a message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            path: None,
            line: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.path, self.line) {
            (Some(path), Some(line)) => {
                write!(f, "{}: {} ({}:{})", self.severity, self.message, path.display(), line)
            }
            (Some(path), None) => {
                write!(f, "{}: {} ({})", self.severity, self.message, path.display())
            }
            _ => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Result of one end-to-end patch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The change classified to zero edits; nothing to do
    NoChange,

    /// A delta was produced and the baseline advanced
    Produced(ModuleDelta),

    /// An unsafe edit was detected; the target process needs a restart
    RudeEdit(RudeEdit),

    /// The delta compiler reported diagnostics; no delta, no baseline change
    CompileFailed(Vec<Diagnostic>),
}

impl PatchOutcome {
    /// True when the attempt produced a delta
    pub fn is_produced(&self) -> bool {
        matches!(self, PatchOutcome::Produced(_))
    }

    /// True when the attempt requires a full restart of the target process
    pub fn requires_restart(&self) -> bool {
        matches!(self, PatchOutcome::RudeEdit(_))
    }

    /// One-line summary for log output
    pub fn summary(&self) -> String {
        match self {
            PatchOutcome::NoChange => "no change".to_string(),
            PatchOutcome::Produced(delta) => format!(
                "produced delta {} for {} ({} bytes)",
                delta.digest(),
                delta.module_name,
                delta.total_len()
            ),
            PatchOutcome::RudeEdit(rude) => format!("rude edit: {}", rude),
            PatchOutcome::CompileFailed(diagnostics) => {
                format!("compile failed with {} diagnostic(s)", diagnostics.len())
            }
        }
    }
}
