//! Process-wide bookkeeping of live native contexts and sharing groups

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::context::surface::{SurfaceContext, SurfaceHandle};
use crate::context::{
    thread_slot, ContextError, ContextId, ContextResult, ContextSettings, SharingGroupId,
};
use crate::driver::{ContextDriver, RawContext};

/// Deletion of a GPU object postponed until a sharing-group member is current
pub(crate) enum DeferredDelete {
    Buffer(u64),
    ArrayObject(u64),
}

impl DeferredDelete {
    pub(crate) fn apply(&self, driver: &dyn ContextDriver) {
        match self {
            DeferredDelete::Buffer(id) => driver.destroy_buffer(*id),
            DeferredDelete::ArrayObject(id) => driver.destroy_array_object(*id),
        }
    }
}

struct RegistryState {
    contexts: HashMap<ContextId, Arc<NativeContext>>,
    deferred: HashMap<SharingGroupId, Vec<DeferredDelete>>,
    next_context: u64,
}

/// State shared between the registry, its contexts, and resources
pub(crate) struct RegistryShared {
    pub(crate) driver: Arc<dyn ContextDriver>,
    pub(crate) default_group: SharingGroupId,
    state: Mutex<RegistryState>,
}

impl RegistryShared {
    pub(crate) fn defer_delete(&self, group: SharingGroupId, delete: DeferredDelete) {
        let mut state = self.state.lock();
        // With no live member the native object died with its contexts;
        // queueing would hand a stale id to a later context generation.
        if !state.contexts.values().any(|context| context.group == group) {
            log::warn!("dropping deferred GPU object delete for {group}: no live context");
            return;
        }
        state.deferred.entry(group).or_default().push(delete);
    }

    fn take_deferred(&self, group: SharingGroupId) -> Vec<DeferredDelete> {
        self.state.lock().deferred.remove(&group).unwrap_or_default()
    }

    /// Destroy deferred objects of `group`. A member context must be
    /// current on the calling thread; the lock is not held across the
    /// driver calls.
    pub(crate) fn flush_deferred(&self, group: SharingGroupId) {
        let pending = self.take_deferred(group);
        for delete in &pending {
            delete.apply(self.driver.as_ref());
        }
    }
}

/// Opaque handle to a graphics-driver context.
///
/// Created through [`ContextRegistry`]; activated per thread through
/// [`thread_slot`]. At most one context is current on a thread at any time,
/// and a context is never current on two threads at once (enforced at
/// activation time via the owner-thread tag).
pub struct NativeContext {
    pub(crate) id: ContextId,
    pub(crate) group: SharingGroupId,
    pub(crate) raw: RawContext,
    settings: ContextSettings,
    pub(crate) shared: Arc<RegistryShared>,
    /// Thread this context is current on, if any
    pub(crate) owner: Mutex<Option<ThreadId>>,
    alive: AtomicBool,
}

impl NativeContext {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn sharing_group(&self) -> SharingGroupId {
        self.group
    }

    /// Settings actually granted by the driver (may be weaker than requested)
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// Whether this context is current on the calling thread
    pub fn is_current(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn registry_shared(&self) -> &Arc<RegistryShared> {
        &self.shared
    }

    /// Release the native context.
    ///
    /// Errors with [`ContextError::ContextBusy`] while the context is
    /// current on another thread. If it is current on the calling thread it
    /// is deactivated first. Deferred deletions of the sharing group are
    /// flushed when this is the last member. Idempotent.
    pub(crate) fn destroy(self: &Arc<Self>) -> ContextResult<()> {
        {
            let owner = self.owner.lock();
            if let Some(owning_thread) = *owner {
                if owning_thread != thread::current().id() {
                    log::error!(
                        "attempted to destroy context {} while it is current on another thread",
                        self.id
                    );
                    return Err(ContextError::ContextBusy(self.id));
                }
            }
        }
        if self.is_current() {
            thread_slot::activate(self, false)?;
        }
        if !self.alive.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let last_member = {
            let mut state = self.shared.state.lock();
            state.contexts.remove(&self.id);
            !state.contexts.values().any(|context| context.group == self.group)
        };

        let driver = self.shared.driver.as_ref();
        if last_member {
            let pending = self.shared.take_deferred(self.group);
            if !pending.is_empty() {
                // Briefly make this context current so the group's deferred
                // objects are released before the last member disappears.
                let previous = thread_slot::current();
                driver.make_current(self.raw, true);
                for delete in &pending {
                    delete.apply(driver);
                }
                driver.make_current(self.raw, false);
                if let Some(previous) = previous {
                    driver.make_current(previous.raw, true);
                }
            }
        }
        driver.destroy_context(self.raw);
        Ok(())
    }
}

/// Creates, tracks, and destroys native contexts.
///
/// Cheap to clone; all clones share the same process-wide state. Registry
/// mutations are serialized by a single mutex that is never held across
/// native driver calls.
#[derive(Clone)]
pub struct ContextRegistry {
    shared: Arc<RegistryShared>,
}

impl ContextRegistry {
    pub fn new(driver: Arc<dyn ContextDriver>) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                driver,
                default_group: SharingGroupId(1),
                state: Mutex::new(RegistryState {
                    contexts: HashMap::new(),
                    deferred: HashMap::new(),
                    next_context: 1,
                }),
            }),
        }
    }

    pub fn driver(&self) -> &Arc<dyn ContextDriver> {
        &self.shared.driver
    }

    pub(crate) fn shared(&self) -> &Arc<RegistryShared> {
        &self.shared
    }

    /// Group new contexts join so their GPU objects are mutually visible
    pub fn default_group(&self) -> SharingGroupId {
        self.shared.default_group
    }

    pub fn context_count(&self) -> usize {
        self.shared.state.lock().contexts.len()
    }

    /// Create a context for a drawing surface.
    ///
    /// Unsupported settings degrade stepwise (antialiasing, stencil, depth,
    /// API version) until the driver accepts; the call only fails when no
    /// configuration at all can be produced.
    pub fn create_surface_context(
        &self,
        settings: &ContextSettings,
        surface: &SurfaceHandle,
    ) -> ContextResult<SurfaceContext> {
        let size = match surface {
            SurfaceHandle::Offscreen { width, height } => Some((*width, *height)),
            SurfaceHandle::Window(_) => None,
        };
        let context = self.create_context(settings, surface)?;
        Ok(SurfaceContext::new(context, size))
    }

    /// Create an off-screen context for background resource uploads.
    ///
    /// Joins the default sharing group, so resources realized here are
    /// visible to every on-screen context.
    pub fn create_shared_context(
        &self,
        settings: &ContextSettings,
        width: u32,
        height: u32,
    ) -> ContextResult<SurfaceContext> {
        self.create_surface_context(settings, &SurfaceHandle::Offscreen { width, height })
    }

    /// Release a context.
    ///
    /// Errors with [`ContextError::ContextBusy`] while the context is
    /// current on another thread; never silently ignores that case.
    pub fn destroy_context(&self, context: &Arc<NativeContext>) -> ContextResult<()> {
        context.destroy()
    }

    fn create_context(
        &self,
        settings: &ContextSettings,
        surface: &SurfaceHandle,
    ) -> ContextResult<Arc<NativeContext>> {
        // Share GPU objects with any existing member of the default group.
        let share_with = {
            let state = self.shared.state.lock();
            state.contexts.values().next().map(|context| context.raw)
        };

        let mut attempt = *settings;
        let (raw, granted) = loop {
            if let Some(created) = self.shared.driver.create_context(&attempt, surface, share_with)
            {
                break created;
            }
            match attempt.degrade() {
                Some(next) => {
                    log::warn!(
                        "context settings {:?} unsupported, retrying with {:?}",
                        attempt,
                        next
                    );
                    attempt = next;
                }
                None => {
                    return Err(ContextError::ContextCreation(format!(
                        "no supported configuration reachable from {settings:?}"
                    )))
                }
            }
        };
        if granted != *settings {
            log::warn!(
                "created context with downgraded settings: requested {:?}, granted {:?}",
                settings,
                granted
            );
        }

        let mut state = self.shared.state.lock();
        let id = ContextId(state.next_context);
        state.next_context += 1;
        let context = Arc::new(NativeContext {
            id,
            group: self.shared.default_group,
            raw,
            settings: granted,
            shared: Arc::clone(&self.shared),
            owner: Mutex::new(None),
            alive: AtomicBool::new(true),
        });
        state.contexts.insert(id, Arc::clone(&context));
        Ok(context)
    }
}
