//! Patch applier - the consumer's receive loop inside the target process
//!
//! The receiver owns one background task reading the shared channel. It
//! filters patch messages out of whatever else travels on the channel,
//! resolves the target module per message, and invokes the host runtime's
//! apply capability. Every failure is contained: a bad patch leaves the
//! process running on its previous code, never crashes it.
//!
//! Lifecycle is an explicit state machine: `Connecting` until the channel
//! endpoint answers, `Open` while the loop runs, `Closed` after the peer
//! goes away. No reconnection is attempted.

pub mod runtime;

use crate::core::config::ChannelConfig;
use crate::core::error::{ApplyError, TransportError};
use crate::system::metrics::Metrics;
use crate::transport::wire;
use crate::types::ModuleDelta;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

pub use runtime::{
    ApplyCapability, HostRuntime, LoadedModule, ModuleHandle, ModuleRegistry, SharedModuleRegistry,
};

/// Lifecycle state of the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Waiting for the channel endpoint to answer
    Connecting,

    /// Receive loop is running
    Open,

    /// Connection ended or never came up; the component is inert
    Closed,
}

/// What the receiver did with one inbound frame
#[derive(Debug, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Frame was not a patch for us; loop continues silently
    Ignored(IgnoreReason),

    /// Patch applied to the named module
    Applied {
        /// File name of the patched module
        module: String,
    },

    /// Patch could not be applied; loop continues, process keeps old code
    Failed(ApplyError),
}

/// Why an inbound frame was ignored
#[derive(Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Frame exceeds the configured bound
    Oversized,

    /// Payload did not deserialize; unrelated traffic on the shared channel
    Malformed,

    /// Well-formed message with a non-patch discriminator
    ForeignTag,
}

/// Source of inbound frames, one at a time.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame; `None` once the connection has closed
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, TransportError>>;
}

/// Frame source over a connected websocket.
pub struct WebSocketFrameSource {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketFrameSource {
    /// Wrap a connected socket
    pub fn new(socket: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl FrameSource for WebSocketFrameSource {
    async fn next_frame(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
        loop {
            match self.socket.next().await? {
                // Text frames may be unrelated traffic; the decode stage
                // decides what to do with them.
                Ok(Message::Binary(frame)) => return Some(Ok(frame)),
                Ok(Message::Text(text)) => return Some(Ok(text.into_bytes())),
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(TransportError::Connection(e.to_string()))),
            }
        }
    }
}

/// Observer handle for a spawned receiver.
#[derive(Clone)]
pub struct ReceiverHandle {
    state: Arc<RwLock<ReceiverState>>,
}

impl ReceiverHandle {
    /// Current lifecycle state
    pub fn state(&self) -> ReceiverState {
        *self.state.read()
    }
}

/// Receives patch messages and applies them to the running process.
pub struct PatchReceiver {
    capability: Option<Arc<dyn ApplyCapability>>,
    registry: Arc<dyn ModuleRegistry>,
    max_frame_bytes: usize,
    state: Arc<RwLock<ReceiverState>>,
}

impl PatchReceiver {
    /// Create a receiver, querying the hot-swap capability exactly once.
    pub fn new(host: &dyn HostRuntime, max_frame_bytes: usize) -> Self {
        let capability = host.hot_swap_capability();
        if capability.is_none() {
            warn!("host runtime launched without hot-swap support; patches will be rejected");
        }

        Self {
            capability,
            registry: host.module_registry(),
            max_frame_bytes,
            state: Arc::new(RwLock::new(ReceiverState::Connecting)),
        }
    }

    /// Connect to the configured endpoint and run the receive loop in a
    /// background task.
    ///
    /// The task never touches the host application's own threads. If the
    /// endpoint does not answer, the component stays inert and the host
    /// process continues running normally.
    pub fn spawn(config: ChannelConfig, host: Arc<dyn HostRuntime>) -> ReceiverHandle {
        let receiver = PatchReceiver::new(host.as_ref(), config.max_frame_bytes);
        let handle = receiver.handle();

        tokio::spawn(async move {
            let timeout = Duration::from_millis(config.connect_timeout_ms);
            match tokio::time::timeout(
                timeout,
                tokio_tungstenite::connect_async(&config.endpoint),
            )
            .await
            {
                Ok(Ok((socket, _))) => {
                    let mut source = WebSocketFrameSource::new(socket);
                    receiver.run(&mut source).await;
                }
                Ok(Err(e)) => {
                    warn!(endpoint = %config.endpoint, error = %e, "channel connect failed; receiver inert");
                    receiver.set_state(ReceiverState::Closed);
                }
                Err(_) => {
                    warn!(endpoint = %config.endpoint, "channel connect timed out; receiver inert");
                    receiver.set_state(ReceiverState::Closed);
                }
            }
        });

        handle
    }

    /// Observer handle sharing this receiver's state
    pub fn handle(&self) -> ReceiverHandle {
        ReceiverHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ReceiverState {
        *self.state.read()
    }

    /// Run the receive loop until the connection closes.
    ///
    /// Exactly one message is processed at a time: patch ordering matters
    /// and the apply capability is not documented as safe for concurrent
    /// invocation.
    pub async fn run<S: FrameSource>(&self, source: &mut S) {
        self.set_state(ReceiverState::Open);
        info!("patch receiver open");

        while let Some(next) = source.next_frame().await {
            match next {
                Ok(frame) => {
                    Metrics::global().applier.frames_received.inc();
                    self.handle_frame(&frame);
                }
                Err(e) => {
                    warn!(error = %e, "channel error; closing receiver");
                    break;
                }
            }
        }

        self.set_state(ReceiverState::Closed);
        info!("patch receiver closed");
    }

    /// Process one inbound frame.
    ///
    /// Every disposition leaves the loop healthy: unrelated traffic is
    /// ignored, a failed apply is logged and contained.
    pub fn handle_frame(&self, frame: &[u8]) -> FrameDisposition {
        if frame.len() > self.max_frame_bytes {
            warn!(
                bytes = frame.len(),
                max = self.max_frame_bytes,
                "dropping oversized frame"
            );
            Metrics::global().applier.frames_ignored.inc();
            return FrameDisposition::Ignored(IgnoreReason::Oversized);
        }

        let message = match wire::decode(frame) {
            Ok(message) => message,
            Err(_) => {
                trace!(bytes = frame.len(), "ignoring undecodable frame");
                Metrics::global().applier.frames_ignored.inc();
                return FrameDisposition::Ignored(IgnoreReason::Malformed);
            }
        };

        if !message.is_patch() {
            trace!(tag = %message.message_type, "ignoring non-patch message");
            Metrics::global().applier.frames_ignored.inc();
            return FrameDisposition::Ignored(IgnoreReason::ForeignTag);
        }

        let delta = message.into_delta();
        match self.apply(&delta) {
            Ok(module) => {
                Metrics::global().applier.applies_succeeded.inc();
                info!(module = %module, digest = %delta.digest(), "patch applied");
                FrameDisposition::Applied { module }
            }
            Err(e) => {
                Metrics::global().applier.applies_failed.inc();
                warn!(
                    module = %delta.module_name,
                    error = %e,
                    "patch apply failed; process continues on previous code"
                );
                FrameDisposition::Failed(e)
            }
        }
    }

    fn apply(&self, delta: &ModuleDelta) -> Result<String, ApplyError> {
        let capability = self
            .capability
            .as_ref()
            .ok_or(ApplyError::UnsupportedCapability)?;

        // Resolve per message; the set of loaded modules can change between
        // messages, so targets are never cached.
        let target = self
            .registry
            .loaded_modules()
            .into_iter()
            .filter(|module| !module.dynamic)
            .find(|module| module.name == delta.module_name)
            .ok_or_else(|| ApplyError::ModuleNotFound {
                name: delta.module_name.clone(),
            })?;

        debug!(module = %target.name, "invoking apply capability");

        // Once invoked, apply runs to completion or fails; a panic inside
        // the host runtime must not take the receive loop down with it.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            capability.apply_update(&target, &delta.meta, &delta.il, &delta.pdb)
        }));

        match result {
            Ok(Ok(())) => Ok(target.name),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ApplyError::Runtime("apply capability panicked".to_string())),
        }
    }

    fn set_state(&self, state: ReceiverState) {
        *self.state.write() = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Capability that records applies, or fails/panics on demand
    struct RecordingCapability {
        applies: Mutex<Vec<(String, Vec<u8>, Vec<u8>, Vec<u8>)>>,
        behavior: CapabilityBehavior,
    }

    #[derive(Clone, Copy)]
    enum CapabilityBehavior {
        Succeed,
        Reject,
        Panic,
    }

    impl RecordingCapability {
        fn new(behavior: CapabilityBehavior) -> Arc<Self> {
            Arc::new(Self {
                applies: Mutex::new(Vec::new()),
                behavior,
            })
        }

        fn apply_count(&self) -> usize {
            self.applies.lock().len()
        }
    }

    impl ApplyCapability for RecordingCapability {
        fn apply_update(
            &self,
            module: &LoadedModule,
            meta: &[u8],
            il: &[u8],
            pdb: &[u8],
        ) -> Result<(), ApplyError> {
            match self.behavior {
                CapabilityBehavior::Panic => panic!("runtime fault"),
                CapabilityBehavior::Reject => {
                    Err(ApplyError::Runtime("incompatible delta".to_string()))
                }
                CapabilityBehavior::Succeed => {
                    self.applies.lock().push((
                        module.name.clone(),
                        meta.to_vec(),
                        il.to_vec(),
                        pdb.to_vec(),
                    ));
                    Ok(())
                }
            }
        }
    }

    /// Host runtime over a shared registry and an optional capability
    struct FakeRuntime {
        capability: Option<Arc<RecordingCapability>>,
        registry: Arc<SharedModuleRegistry>,
    }

    impl FakeRuntime {
        fn with_capability(behavior: CapabilityBehavior) -> Self {
            let registry = Arc::new(SharedModuleRegistry::new());
            registry.publish(LoadedModule::new("app.bin", ModuleHandle(1)));
            Self {
                capability: Some(RecordingCapability::new(behavior)),
                registry,
            }
        }

        fn without_capability() -> Self {
            let registry = Arc::new(SharedModuleRegistry::new());
            registry.publish(LoadedModule::new("app.bin", ModuleHandle(1)));
            Self {
                capability: None,
                registry,
            }
        }
    }

    impl HostRuntime for FakeRuntime {
        fn hot_swap_capability(&self) -> Option<Arc<dyn ApplyCapability>> {
            self.capability
                .as_ref()
                .map(|capability| Arc::clone(capability) as Arc<dyn ApplyCapability>)
        }

        fn module_registry(&self) -> Arc<dyn ModuleRegistry> {
            Arc::clone(&self.registry) as Arc<dyn ModuleRegistry>
        }
    }

    /// Frame source over an in-memory queue
    struct QueueFrameSource {
        frames: tokio::sync::mpsc::Receiver<Vec<u8>>,
    }

    #[async_trait]
    impl FrameSource for QueueFrameSource {
        async fn next_frame(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
            self.frames.recv().await.map(Ok)
        }
    }

    fn patch_frame(module: &str) -> Vec<u8> {
        let delta = ModuleDelta::new(module, vec![1, 2], vec![3, 4], vec![5, 6]);
        wire::encode(&delta).unwrap()
    }

    #[test]
    fn test_malformed_frame_is_ignored_without_touching_capability() {
        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Succeed);
        let capability = Arc::clone(runtime.capability.as_ref().unwrap());
        let receiver = PatchReceiver::new(&runtime, 1024);

        let disposition = receiver.handle_frame(b"unrelated traffic");

        assert_eq!(
            disposition,
            FrameDisposition::Ignored(IgnoreReason::Malformed)
        );
        assert_eq!(capability.apply_count(), 0);
    }

    #[test]
    fn test_foreign_tag_is_ignored_without_touching_capability() {
        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Succeed);
        let capability = Arc::clone(runtime.capability.as_ref().unwrap());
        let receiver = PatchReceiver::new(&runtime, 1024);

        let mut message = wire::PatchMessage::from_delta(&ModuleDelta::new(
            "app.bin",
            vec![1],
            vec![2],
            vec![3],
        ));
        message.message_type = "Heartbeat".to_string();
        let frame = rmp_serde::to_vec_named(&message).unwrap();

        let disposition = receiver.handle_frame(&frame);

        assert_eq!(
            disposition,
            FrameDisposition::Ignored(IgnoreReason::ForeignTag)
        );
        assert_eq!(capability.apply_count(), 0);
    }

    #[test]
    fn test_oversized_frame_is_ignored() {
        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Succeed);
        let receiver = PatchReceiver::new(&runtime, 16);

        let disposition = receiver.handle_frame(&patch_frame("app.bin"));

        assert_eq!(
            disposition,
            FrameDisposition::Ignored(IgnoreReason::Oversized)
        );
    }

    #[test]
    fn test_missing_capability_fails_only_that_message() {
        let runtime = FakeRuntime::without_capability();
        let receiver = PatchReceiver::new(&runtime, 1024);

        let first = receiver.handle_frame(&patch_frame("app.bin"));
        let second = receiver.handle_frame(&patch_frame("app.bin"));

        assert_eq!(
            first,
            FrameDisposition::Failed(ApplyError::UnsupportedCapability)
        );
        // Deterministic: every attempt fails the same way, the loop goes on.
        assert_eq!(
            second,
            FrameDisposition::Failed(ApplyError::UnsupportedCapability)
        );
    }

    #[test]
    fn test_unknown_module_is_an_apply_failure() {
        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Succeed);
        let receiver = PatchReceiver::new(&runtime, 1024);

        let disposition = receiver.handle_frame(&patch_frame("missing.bin"));

        match disposition {
            FrameDisposition::Failed(ApplyError::ModuleNotFound { name }) => {
                assert_eq!(name, "missing.bin");
            }
            other => panic!("expected ModuleNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_dynamic_modules_are_not_patch_targets() {
        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Succeed);
        runtime.registry.publish(LoadedModule {
            name: "generated.bin".to_string(),
            handle: ModuleHandle(9),
            dynamic: true,
        });
        let receiver = PatchReceiver::new(&runtime, 1024);

        let disposition = receiver.handle_frame(&patch_frame("generated.bin"));

        assert!(matches!(
            disposition,
            FrameDisposition::Failed(ApplyError::ModuleNotFound { .. })
        ));
    }

    #[test]
    fn test_patch_applies_with_all_three_buffers() {
        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Succeed);
        let capability = Arc::clone(runtime.capability.as_ref().unwrap());
        let receiver = PatchReceiver::new(&runtime, 1024);

        let disposition = receiver.handle_frame(&patch_frame("app.bin"));

        assert_eq!(
            disposition,
            FrameDisposition::Applied {
                module: "app.bin".to_string()
            }
        );
        let applies = capability.applies.lock();
        assert_eq!(applies.len(), 1);
        let (module, meta, il, pdb) = &applies[0];
        assert_eq!(module, "app.bin");
        assert_eq!(meta, &vec![1, 2]);
        assert_eq!(il, &vec![3, 4]);
        assert_eq!(pdb, &vec![5, 6]);
    }

    #[test]
    fn test_capability_panic_is_contained() {
        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Panic);
        let receiver = PatchReceiver::new(&runtime, 1024);

        let disposition = receiver.handle_frame(&patch_frame("app.bin"));

        assert!(matches!(
            disposition,
            FrameDisposition::Failed(ApplyError::Runtime(_))
        ));
        // The receiver is still usable afterwards.
        assert!(matches!(
            receiver.handle_frame(&patch_frame("app.bin")),
            FrameDisposition::Failed(ApplyError::Runtime(_))
        ));
    }

    #[test]
    fn test_rejected_patch_leaves_loop_healthy() {
        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Reject);
        let receiver = PatchReceiver::new(&runtime, 1024);

        assert!(matches!(
            receiver.handle_frame(&patch_frame("app.bin")),
            FrameDisposition::Failed(ApplyError::Runtime(_))
        ));
    }

    #[tokio::test]
    async fn test_run_processes_stream_and_closes_on_disconnect() {
        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Succeed);
        let capability = Arc::clone(runtime.capability.as_ref().unwrap());
        let receiver = PatchReceiver::new(&runtime, 1024);
        assert_eq!(receiver.state(), ReceiverState::Connecting);

        let (frames_tx, frames_rx) = tokio::sync::mpsc::channel(8);
        let mut source = QueueFrameSource { frames: frames_rx };

        frames_tx.send(b"noise".to_vec()).await.unwrap();
        frames_tx.send(patch_frame("app.bin")).await.unwrap();
        drop(frames_tx);

        receiver.run(&mut source).await;

        assert_eq!(receiver.state(), ReceiverState::Closed);
        assert_eq!(capability.apply_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_error_closes_the_loop() {
        struct FailingSource {
            yielded: bool,
        }

        #[async_trait]
        impl FrameSource for FailingSource {
            async fn next_frame(&mut self) -> Option<Result<Vec<u8>, TransportError>> {
                if self.yielded {
                    None
                } else {
                    self.yielded = true;
                    Some(Err(TransportError::Connection("reset by peer".to_string())))
                }
            }
        }

        let runtime = FakeRuntime::with_capability(CapabilityBehavior::Succeed);
        let receiver = PatchReceiver::new(&runtime, 1024);
        let mut source = FailingSource { yielded: false };

        receiver.run(&mut source).await;

        assert_eq!(receiver.state(), ReceiverState::Closed);
    }
}
