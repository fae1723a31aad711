//! Weak correlation registries for tracked modules and instances
//!
//! Two pieces of bookkeeping make symbolication possible without the caller
//! doing anything:
//!
//! - [`BinaryRegistry`]: which raw bytes a module was compiled from. The engine
//!   needs the original binary to read its debug sections.
//! - [`InstanceRegistry`]: which module produced a running instance. Stack
//!   frames are attributed to instances, but engines are cached per module.
//!
//! Neither registry owns its keys. The ids are plain integers, and the handle
//! wrappers ([`TrackedModule`](crate::loader::TrackedModule),
//! [`TrackedInstance`](crate::loader::TrackedInstance)) call `remove` from
//! their `Drop` impls, so an association never outlives the handle it
//! describes. The binary bytes are held in an `Arc<[u8]>` shared with nothing
//! else, which means dropping the module releases the bytes too.
//!
//! `lookup` on an unknown id returns `None`; that is the normal answer for
//! anything created outside the tracked loader paths, never an error.

use log::warn;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{InstanceId, ModuleId};

/// Associates a tracked module with the raw bytes it was compiled from
#[derive(Debug, Default)]
pub struct BinaryRegistry {
    entries: HashMap<ModuleId, Arc<[u8]>>,
}

impl BinaryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the source bytes for a module.
    ///
    /// A module's binary never changes once recorded; a second record for the
    /// same id is ignored.
    pub fn record(&mut self, module: ModuleId, binary: Arc<[u8]>) {
        if self.entries.contains_key(&module) {
            warn!("binary for {module} already recorded, ignoring re-registration");
            return;
        }
        self.entries.insert(module, binary);
    }

    #[must_use]
    pub fn lookup(&self, module: ModuleId) -> Option<Arc<[u8]>> {
        self.entries.get(&module).cloned()
    }

    /// Lifecycle hook: called when the module handle is dropped.
    pub fn remove(&mut self, module: ModuleId) {
        self.entries.remove(&module);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Associates a tracked instance with the module that produced it
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    entries: HashMap<InstanceId, ModuleId>,
}

impl InstanceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the producing module for an instance.
    ///
    /// An instance's module never changes once recorded.
    pub fn record(&mut self, instance: InstanceId, module: ModuleId) {
        if self.entries.contains_key(&instance) {
            warn!("module for {instance} already recorded, ignoring re-registration");
            return;
        }
        self.entries.insert(instance, module);
    }

    #[must_use]
    pub fn lookup(&self, instance: InstanceId) -> Option<ModuleId> {
        self.entries.get(&instance).copied()
    }

    /// Lifecycle hook: called when the instance handle is dropped.
    pub fn remove(&mut self, instance: InstanceId) {
        self.entries.remove(&instance);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
