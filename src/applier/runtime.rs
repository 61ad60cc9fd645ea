//! Host runtime interfaces for the consumer side
//!
//! The apply capability and the set of loaded modules belong to the host
//! runtime. Hot-swap support is optional there: the capability query runs
//! once at startup and every call site branches on presence instead of
//! risking a null invocation.

use crate::core::error::ApplyError;
use dashmap::DashMap;
use std::sync::Arc;

/// Opaque handle to a loaded module inside the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

/// One module currently loaded in the target process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    /// File name of the module
    pub name: String,

    /// Host runtime handle for the module
    pub handle: ModuleHandle,

    /// Dynamic modules cannot be patched and are skipped during resolution
    pub dynamic: bool,
}

impl LoadedModule {
    /// Describe a statically loaded module
    pub fn new(name: impl Into<String>, handle: ModuleHandle) -> Self {
        Self {
            name: name.into(),
            handle,
            dynamic: false,
        }
    }
}

/// The host runtime's in-memory code replacement entry point.
///
/// Only present when the host runtime was launched with hot-swap support
/// enabled. Once invoked it runs to completion or fails; there is no
/// cancellation and no undo.
pub trait ApplyCapability: Send + Sync {
    /// Apply one delta to a loaded module
    fn apply_update(
        &self,
        module: &LoadedModule,
        meta: &[u8],
        il: &[u8],
        pdb: &[u8],
    ) -> Result<(), ApplyError>;
}

/// View of the modules currently loaded in the target process.
///
/// The set can change between messages, so patch targets are resolved
/// per-message and never cached.
pub trait ModuleRegistry: Send + Sync {
    /// Snapshot of currently loaded modules
    fn loaded_modules(&self) -> Vec<LoadedModule>;
}

/// The host runtime as the consumer sees it.
pub trait HostRuntime: Send + Sync {
    /// Query the hot-swap entry point; `None` when the runtime was launched
    /// without hot-swap support
    fn hot_swap_capability(&self) -> Option<Arc<dyn ApplyCapability>>;

    /// The live module registry
    fn module_registry(&self) -> Arc<dyn ModuleRegistry>;
}

/// Concurrent module registry for hosts that publish load/unload events.
#[derive(Default)]
pub struct SharedModuleRegistry {
    modules: DashMap<String, LoadedModule>,
}

impl SharedModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a module as loaded
    pub fn publish(&self, module: LoadedModule) {
        self.modules.insert(module.name.clone(), module);
    }

    /// Record a module as unloaded
    pub fn retire(&self, name: &str) {
        self.modules.remove(name);
    }
}

impl ModuleRegistry for SharedModuleRegistry {
    fn loaded_modules(&self) -> Vec<LoadedModule> {
        self.modules.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_registry_publish_and_retire() {
        let registry = SharedModuleRegistry::new();
        registry.publish(LoadedModule::new("app.bin", ModuleHandle(1)));
        registry.publish(LoadedModule::new("plugin.bin", ModuleHandle(2)));

        assert_eq!(registry.loaded_modules().len(), 2);

        registry.retire("plugin.bin");
        let modules = registry.loaded_modules();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "app.bin");
    }
}
