//! Type definitions for the patch pipeline

pub mod delta;
pub mod document;
pub mod edit;
pub mod outcome;

// Re-export commonly used items
pub use delta::{EmissionHandle, ModuleDelta};
pub use document::{DocumentSnapshot, TextDiffStats};
pub use edit::{Classification, Edit, EditKind, RudeEdit, RudeEditReason};
pub use outcome::{Diagnostic, PatchOutcome, Severity};
