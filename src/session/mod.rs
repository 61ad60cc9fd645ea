//! Producer session - one edit/patch loop against one target process
//!
//! The session owns the only mutable producer state (differencer plus
//! sender) and enforces the lifecycle around it: attempts run single-flight,
//! a produced delta goes straight onto the wire, and a reset at an iteration
//! boundary disposes the baseline so the next attempt re-snapshots from
//! disk.

use crate::core::error::Result;
use crate::differ::ChangeDiffer;
use crate::project::{DeltaCompiler, EditClassifier, ProjectHost};
use crate::transport::{PatchChannel, PatchSender};
use crate::types::PatchOutcome;
use tracing::info;
use uuid::Uuid;

/// One producer patch session.
pub struct PatchSession<P, C, D, Ch> {
    id: Uuid,
    differ: ChangeDiffer<P, C, D>,
    sender: PatchSender<Ch>,
}

impl<P, C, D, Ch> PatchSession<P, C, D, Ch>
where
    P: ProjectHost,
    C: EditClassifier,
    D: DeltaCompiler,
    Ch: PatchChannel,
{
    /// Create a session over an already-open channel.
    pub fn new(differ: ChangeDiffer<P, C, D>, sender: PatchSender<Ch>) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, "patch session started");
        Self { id, differ, sender }
    }

    /// Handle one batch of changed files end to end: produce a patch and, if
    /// one came out, push it to the target process.
    ///
    /// The baseline is committed once diagnostics are clean, before the send
    /// is attempted: the patch is considered decided at that point. A send
    /// failure therefore surfaces as an error without rolling anything back;
    /// the session is reconciled by a reset.
    pub async fn handle_file_change(
        &mut self,
        changed: &[std::path::PathBuf],
    ) -> Result<PatchOutcome> {
        let outcome = self.differ.try_produce_patch(changed).await?;

        if let PatchOutcome::Produced(delta) = &outcome {
            self.sender.send(delta).await?;
        }

        info!(session = %self.id, outcome = %outcome.summary(), "patch attempt finished");
        Ok(outcome)
    }

    /// Reinitialize the session at an iteration boundary.
    pub fn reset(&mut self) {
        self.differ.reset();
    }

    /// Session identifier, for log correlation
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Producer-side baseline state, exposed for drivers and tests
    pub fn differ(&self) -> &ChangeDiffer<P, C, D> {
        &self.differ
    }
}
