//! Cache of hardware vertex-array bindings keyed by (render target, shader)
//!
//! Rebuilding a vertex-attribute binding on every draw call is expensive;
//! rebinding a cached one is cheap. Entries stay valid only as long as both
//! the render target and the shader they were built against exist, so
//! destruction paths must purge synchronously before an identity could ever
//! be reused — a stale entry looked up under a recycled id would bind the
//! wrong resources.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::context::registry::{DeferredDelete, RegistryShared};
use crate::context::{thread_slot, ContextRegistry, ContextResult, SharingGroupId};
use crate::resource::VertexBuffer;

// Cache identities start at 1; 0 is reserved for "none". They are issued by
// process-wide monotonic counters and never recycled, so a purged identity
// can never collide with a live one.
static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SHADER_ID: AtomicU64 = AtomicU64::new(1);

/// Cache identity of a render target, unique for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    pub fn allocate() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Cache identity of a shader, unique for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(u64);

impl ShaderId {
    pub fn allocate() -> Self {
        Self(NEXT_SHADER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-(render target, shader) cache of native array objects.
///
/// Entries are assumed to be touched from the thread owning the relevant
/// context; concurrent drawing to one target must be serialized by the
/// caller.
pub struct VertexArrayCache {
    shared: Arc<RegistryShared>,
    group: SharingGroupId,
    entries: HashMap<(TargetId, ShaderId), u64>,
}

impl VertexArrayCache {
    pub fn new(registry: &ContextRegistry) -> Self {
        Self {
            shared: Arc::clone(registry.shared()),
            group: registry.default_group(),
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Array object for `(target, shader)`, rebuilt when absent or when the
    /// buffer's host data changed since the binding was built.
    ///
    /// Requires a context from the buffer's sharing group to be current.
    pub fn lookup_or_build(
        &mut self,
        buffer: &mut VertexBuffer,
        target: TargetId,
        shader: ShaderId,
    ) -> ContextResult<u64> {
        let needs_rebuild = buffer.is_dirty() || !buffer.is_realized();
        let buffer_id = buffer.ensure_realized()?;

        let key = (target, shader);
        if !needs_rebuild {
            if let Some(&cached) = self.entries.get(&key) {
                return Ok(cached);
            }
        }
        if let Some(stale) = self.entries.remove(&key) {
            self.destroy_array_object(stale);
        }
        let array_object = self
            .shared
            .driver
            .create_array_object(buffer_id, buffer.layout());
        self.entries.insert(key, array_object);
        Ok(array_object)
    }

    /// Purge every entry built against `target`.
    ///
    /// Called from render-target destruction, unconditionally and
    /// synchronously, before the target's identity goes away.
    pub fn invalidate_for_target(&mut self, target: TargetId) {
        self.purge(|key| key.0 == target);
    }

    /// Purge every entry built against `shader`; the shader-destruction
    /// counterpart of [`VertexArrayCache::invalidate_for_target`]
    pub fn invalidate_for_shader(&mut self, shader: ShaderId) {
        self.purge(|key| key.1 == shader);
    }

    /// Drop all entries, destroying their native array objects
    pub fn clear(&mut self) {
        self.purge(|_| true);
    }

    fn purge(&mut self, matches: impl Fn(&(TargetId, ShaderId)) -> bool) {
        let mut removed = Vec::new();
        self.entries.retain(|key, array_object| {
            if matches(key) {
                removed.push(*array_object);
                false
            } else {
                true
            }
        });
        for array_object in removed {
            self.destroy_array_object(array_object);
        }
    }

    fn destroy_array_object(&self, array_object: u64) {
        let group_current = thread_slot::current().as_ref().is_some_and(|context| {
            context.sharing_group() == self.group
                && Arc::ptr_eq(context.registry_shared(), &self.shared)
        });
        if group_current {
            self.shared.driver.destroy_array_object(array_object);
        } else {
            self.shared
                .defer_delete(self.group, DeferredDelete::ArrayObject(array_object));
        }
    }
}

impl Drop for VertexArrayCache {
    fn drop(&mut self) {
        self.clear();
    }
}
