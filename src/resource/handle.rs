//! Base lifecycle contract for GPU-resident objects

use std::sync::Arc;

use crate::context::registry::{DeferredDelete, NativeContext, RegistryShared};
use crate::context::{thread_slot, ContextError, ContextRegistry, ContextResult, SharingGroupId};
use crate::driver::ContextDriver;

/// Lifecycle state every GPU-resident object is built on.
///
/// Tracks the native object id (0 until realized, matching the drivers'
/// "zero is no object" convention), the sharing group the object was
/// created against, and whether host-side data changed since the last
/// upload. Cloning yields an unrealized handle: a native id is never shared
/// by copy, only through group-level sharing.
pub struct ResourceState {
    shared: Arc<RegistryShared>,
    group: SharingGroupId,
    native_id: u64,
    dirty: bool,
}

impl ResourceState {
    /// State for a resource created against the registry's default group
    pub fn new(registry: &ContextRegistry) -> Self {
        Self {
            shared: Arc::clone(registry.shared()),
            group: registry.default_group(),
            native_id: 0,
            dirty: true,
        }
    }

    pub fn sharing_group(&self) -> SharingGroupId {
        self.group
    }

    /// Native object id, 0 while unrealized
    pub fn native_id(&self) -> u64 {
        self.native_id
    }

    pub fn is_realized(&self) -> bool {
        self.native_id != 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Host data changed; the native object survives and the next
    /// realization re-uploads instead of re-allocating
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn set_native_id(&mut self, id: u64) {
        self.native_id = id;
        self.dirty = false;
    }

    pub(crate) fn driver(&self) -> &dyn ContextDriver {
        self.shared.driver.as_ref()
    }

    /// The context from this resource's sharing group current on the
    /// calling thread, or [`ContextError::NoActiveContext`]
    pub(crate) fn require_current(&self) -> ContextResult<Arc<NativeContext>> {
        match thread_slot::current() {
            Some(context)
                if context.sharing_group() == self.group
                    && Arc::ptr_eq(context.registry_shared(), &self.shared) =>
            {
                Ok(context)
            }
            _ => Err(ContextError::NoActiveContext(self.group)),
        }
    }

    pub(crate) fn group_is_current(&self) -> bool {
        self.require_current().is_ok()
    }

    /// Destroy the native object now if a group member is current on this
    /// thread, otherwise defer destruction to the next activation of one.
    /// Idempotent: the id is cleared before the driver call.
    pub(crate) fn release(&mut self, make_delete: fn(u64) -> DeferredDelete) {
        if self.native_id == 0 {
            return;
        }
        let delete = make_delete(std::mem::take(&mut self.native_id));
        if self.group_is_current() {
            delete.apply(self.shared.driver.as_ref());
        } else {
            self.shared.defer_delete(self.group, delete);
        }
    }
}

impl Clone for ResourceState {
    fn clone(&self) -> Self {
        // Duplicating a GPU handle is never safe: copies start unrealized.
        Self {
            shared: Arc::clone(&self.shared),
            group: self.group,
            native_id: 0,
            dirty: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSettings;
    use crate::driver::HeadlessDriver;

    fn setup() -> (Arc<HeadlessDriver>, ContextRegistry) {
        let driver = Arc::new(HeadlessDriver::new());
        let registry = ContextRegistry::new(driver.clone() as Arc<dyn ContextDriver>);
        (driver, registry)
    }

    #[test]
    fn require_current_needs_a_group_member() {
        let (_, registry) = setup();
        let state = ResourceState::new(&registry);
        assert!(matches!(
            state.require_current(),
            Err(ContextError::NoActiveContext(_))
        ));

        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();
        assert!(state.require_current().is_ok());
        surface.set_active(false).unwrap();
    }

    #[test]
    fn a_context_of_another_registry_does_not_count() {
        let (_, registry_a) = setup();
        let (_, registry_b) = setup();
        let state = ResourceState::new(&registry_a);

        let surface = registry_b
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();
        assert!(matches!(
            state.require_current(),
            Err(ContextError::NoActiveContext(_))
        ));
        surface.set_active(false).unwrap();
    }

    #[test]
    fn clone_starts_unrealized() {
        let (_, registry) = setup();
        let mut state = ResourceState::new(&registry);
        state.set_native_id(17);
        assert!(state.is_realized());
        assert!(!state.is_dirty());

        let copy = state.clone();
        assert!(!copy.is_realized());
        assert!(copy.is_dirty());
        assert_eq!(copy.sharing_group(), state.sharing_group());

        // Avoid deferring a delete for the fake id.
        state.native_id = 0;
    }
}
