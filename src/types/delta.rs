//! Binary module deltas
//!
//! A delta is the immutable product of one successful patch attempt: three
//! opaque byte buffers plus the name of the module they transform. Ownership
//! moves from the delta compiler to the transport to the wire; nothing
//! mutates a delta after it is produced.

use bytes::Bytes;

/// Opaque token the delta compiler threads from one emission to the next.
///
/// The producer never inspects it; it only hands the latest one back to the
/// compiler so the next delta can be computed against the right state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissionHandle(pub u64);

impl EmissionHandle {
    /// Handle for a baseline that has had no delta emitted against it yet
    pub fn initial() -> Self {
        Self(0)
    }
}

/// A binary patch transforming one module from its baseline state to a new
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDelta {
    /// File name of the target module (matches the on-disk artifact name)
    pub module_name: String,

    /// Metadata bytes
    pub meta: Bytes,

    /// Instruction bytes
    pub il: Bytes,

    /// Debug-info bytes
    pub pdb: Bytes,
}

impl ModuleDelta {
    /// Create a delta from its three buffers
    pub fn new(
        module_name: impl Into<String>,
        meta: impl Into<Bytes>,
        il: impl Into<Bytes>,
        pdb: impl Into<Bytes>,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            meta: meta.into(),
            il: il.into(),
            pdb: pdb.into(),
        }
    }

    /// Combined payload size in bytes across all three buffers
    pub fn total_len(&self) -> usize {
        self.meta.len() + self.il.len() + self.pdb.len()
    }

    /// Short hex digest of the delta contents, for log lines
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.meta);
        hasher.update(&self.il);
        hasher.update(&self.pdb);
        let hash = hasher.finalize();
        hex::encode(&hash.as_bytes()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_total_len() {
        let delta = ModuleDelta::new("app.bin", vec![1, 2], vec![3, 4, 5], vec![6]);
        assert_eq!(delta.total_len(), 6);
    }

    #[test]
    fn test_delta_digest_is_stable_and_content_sensitive() {
        let a = ModuleDelta::new("app.bin", vec![1], vec![2], vec![3]);
        let b = ModuleDelta::new("app.bin", vec![1], vec![2], vec![3]);
        let c = ModuleDelta::new("app.bin", vec![1], vec![2], vec![4]);

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 16);
    }
}
