//! Symbolic edits produced by the edit classifier
//!
//! The classifier is an external collaborator; this crate only consumes its
//! output: an ordered list of acceptable edits, or a rude-edit signal meaning
//! the change cannot be applied as a live patch.

use std::fmt;
use std::path::PathBuf;

/// Kinds of change the live-patch mechanism can apply safely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Body of an existing function changed, signature intact
    MethodBodyUpdate,

    /// Body of a closure or lambda changed
    LambdaBodyUpdate,

    /// Initializer expression of an existing field changed
    FieldInitializerUpdate,
}

/// A symbolic description of one changed program element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// What kind of change this is
    pub kind: EditKind,

    /// Fully qualified name of the changed element
    pub symbol: String,
}

impl Edit {
    /// Create an edit
    pub fn new(kind: EditKind, symbol: impl Into<String>) -> Self {
        Self {
            kind,
            symbol: symbol.into(),
        }
    }
}

/// Why a change cannot be applied as a live patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RudeEditReason {
    /// The shape of a type changed (fields, layout, inheritance)
    TypeShapeChanged,

    /// A function or method signature changed
    SignatureChanged,

    /// A new top-level symbol was added
    SymbolAdded,

    /// An existing top-level symbol was removed
    SymbolRemoved,
}

impl fmt::Display for RudeEditReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RudeEditReason::TypeShapeChanged => "type shape changed",
            RudeEditReason::SignatureChanged => "signature changed",
            RudeEditReason::SymbolAdded => "symbol added",
            RudeEditReason::SymbolRemoved => "symbol removed",
        };
        f.write_str(text)
    }
}

/// A change the live-patch mechanism cannot apply safely.
///
/// Surfacing one of these means the running process needs a full restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RudeEdit {
    /// Document containing the unsafe change
    pub document: PathBuf,

    /// Why the change is unsafe
    pub reason: RudeEditReason,
}

impl fmt::Display for RudeEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.reason, self.document.display())
    }
}

/// Result of classifying one old/new document pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Ordered list of acceptable edits (possibly empty)
    Edits(Vec<Edit>),

    /// The change is unsafe to patch; the whole attempt must abort
    Rude(RudeEdit),
}
