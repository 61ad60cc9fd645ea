//! Module baseline ownership and lifecycle
//!
//! The baseline is the last code state of one compiled module known to both
//! producer and consumer. It is an owned resource with an explicit lifecycle:
//! created lazily on the first patch attempt, replaced atomically after each
//! successful delta compile, disposed and recreated when the session
//! reinitializes. Exactly one live baseline exists per manager.

use crate::core::error::BaselineError;
use crate::types::EmissionHandle;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The last known-good compiled state of one module.
#[derive(Debug, Clone)]
pub struct ModuleBaseline {
    module_path: PathBuf,
    module_name: String,
    origin: Bytes,
    content_hash: [u8; 32],
    generation: u64,
    emission: EmissionHandle,
}

impl ModuleBaseline {
    /// Construct the initial baseline from the on-disk module image.
    pub fn from_image(module_path: impl Into<PathBuf>, origin: Bytes) -> Self {
        let module_path = module_path.into();
        let module_name = module_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_hash = *blake3::hash(&origin).as_bytes();

        Self {
            module_path,
            module_name,
            origin,
            content_hash,
            generation: 0,
            emission: EmissionHandle::initial(),
        }
    }

    /// The baseline that follows this one after a successful delta compile.
    ///
    /// The origin snapshot is carried forward unchanged; only the emission
    /// handle and the generation move.
    pub fn next(&self, emission: EmissionHandle) -> Self {
        Self {
            module_path: self.module_path.clone(),
            module_name: self.module_name.clone(),
            origin: self.origin.clone(),
            content_hash: self.content_hash,
            generation: self.generation + 1,
            emission,
        }
    }

    /// Path of the on-disk module image this baseline was snapshotted from
    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    /// File name of the target module
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Bytes read from the on-disk artifact at session start
    pub fn origin(&self) -> &Bytes {
        &self.origin
    }

    /// blake3 digest of the origin snapshot
    pub fn content_hash(&self) -> &[u8; 32] {
        &self.content_hash
    }

    /// How many deltas have been compiled against this module this session
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Latest emission handle, threaded back into the next delta compile
    pub fn emission(&self) -> EmissionHandle {
        self.emission
    }
}

/// Owns the module's baseline snapshot for one producer session.
#[derive(Debug, Default)]
pub struct BaselineManager {
    current: Option<ModuleBaseline>,
}

impl BaselineManager {
    /// Create a manager with no baseline; one is created lazily on the first
    /// patch attempt.
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Read the on-disk module image once and construct the initial baseline.
    ///
    /// Idempotent: if a baseline already exists it is returned unchanged and
    /// the disk is not touched. An unreadable image is fatal for the current
    /// attempt but not for the session.
    pub fn ensure_baseline(&mut self, module_path: &Path) -> Result<&ModuleBaseline, BaselineError> {
        if let Some(existing) = self.current.take() {
            return Ok(self.current.insert(existing));
        }

        let image = std::fs::read(module_path).map_err(|source| BaselineError::Unavailable {
            path: module_path.to_path_buf(),
            source,
        })?;

        if image.is_empty() {
            return Err(BaselineError::WrongFormat {
                path: module_path.to_path_buf(),
            });
        }

        let baseline = ModuleBaseline::from_image(module_path, Bytes::from(image));
        info!(
            module = %baseline.module_name(),
            bytes = baseline.origin().len(),
            "snapshotted initial baseline"
        );
        Ok(self.current.insert(baseline))
    }

    /// Replace the current baseline with the one returned by a successful
    /// delta compile.
    ///
    /// Callers invoke this only after the delta has been fully computed and
    /// its diagnostics checked clean - never speculatively.
    pub fn advance(&mut self, next: ModuleBaseline) {
        debug!(
            module = %next.module_name(),
            generation = next.generation(),
            "baseline advanced"
        );
        self.current = Some(next);
    }

    /// Dispose the held baseline so the next attempt re-snapshots from disk.
    ///
    /// Invoked when the producer session restarts, e.g. a new watch iteration
    /// begins.
    pub fn reset(&mut self) {
        if let Some(baseline) = self.current.take() {
            debug!(
                module = %baseline.module_name(),
                generation = baseline.generation(),
                "baseline disposed"
            );
        }
    }

    /// The live baseline, if one exists
    pub fn current(&self) -> Option<&ModuleBaseline> {
        self.current.as_ref()
    }

    /// Generation of the live baseline, or 0 when none exists
    pub fn generation(&self) -> u64 {
        self.current.as_ref().map(|b| b.generation()).unwrap_or(0)
    }
}
