//! Per-thread tracking of the currently active context
//!
//! Currency is inherently per thread, so the slot lives in thread-local
//! storage and reads are lock-free. The slot deactivates a still-current
//! context at thread exit so the native driver does not leak state bound to
//! the dying thread.

use std::cell::RefCell;
use std::sync::Arc;
use std::thread;

use crate::context::registry::NativeContext;
use crate::context::{ContextError, ContextResult};

struct SlotGuard(Option<Arc<NativeContext>>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(context) = self.0.take() {
            *context.owner.lock() = None;
            context.shared.driver.make_current(context.raw, false);
        }
    }
}

thread_local! {
    static CURRENT: RefCell<SlotGuard> = const { RefCell::new(SlotGuard(None)) };
}

/// Context currently active on the calling thread, if any
pub fn current() -> Option<Arc<NativeContext>> {
    CURRENT.with(|slot| slot.borrow().0.clone())
}

/// Make `context` current (or no longer current) on the calling thread.
///
/// Activating deactivates whatever was current on this thread first.
/// Returns `Ok(false)` when the driver refuses the activation and
/// [`ContextError::ContextBusy`] when the context is still current on
/// another thread. Deactivating a context that is not current on this
/// thread is a no-op.
pub fn activate(context: &Arc<NativeContext>, active: bool) -> ContextResult<bool> {
    if active {
        activate_on_this_thread(context)
    } else {
        deactivate_on_this_thread(context);
        Ok(true)
    }
}

fn activate_on_this_thread(context: &Arc<NativeContext>) -> ContextResult<bool> {
    let this_thread = thread::current().id();
    {
        let owner = context.owner.lock();
        if let Some(owning_thread) = *owner {
            if owning_thread != this_thread {
                log::error!(
                    "context {} activated while current on another thread",
                    context.id
                );
                return Err(ContextError::ContextBusy(context.id));
            }
        }
    }

    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(previous) = &slot.0 {
            if Arc::ptr_eq(previous, context) {
                context.shared.flush_deferred(context.group);
                return Ok(true);
            }
        }
        if let Some(previous) = slot.0.take() {
            *previous.owner.lock() = None;
            previous.shared.driver.make_current(previous.raw, false);
        }
        if !context.shared.driver.make_current(context.raw, true) {
            return Ok(false);
        }
        *context.owner.lock() = Some(this_thread);
        slot.0 = Some(Arc::clone(context));
        // Now that a group member is current, release anything that was
        // dropped while no member was.
        context.shared.flush_deferred(context.group);
        Ok(true)
    })
}

fn deactivate_on_this_thread(context: &Arc<NativeContext>) {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        let is_current = slot
            .0
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, context));
        if is_current {
            slot.0 = None;
            *context.owner.lock() = None;
            context.shared.driver.make_current(context.raw, false);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextRegistry, ContextSettings};
    use crate::driver::{ContextDriver, HeadlessDriver};

    fn setup() -> (Arc<HeadlessDriver>, ContextRegistry) {
        let driver = Arc::new(HeadlessDriver::new());
        let registry = ContextRegistry::new(driver.clone() as Arc<dyn ContextDriver>);
        (driver, registry)
    }

    #[test]
    fn activation_switches_the_slot() {
        let (_, registry) = setup();
        let a = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        let b = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();

        assert!(activate(a.context(), true).unwrap());
        assert!(a.context().is_current());

        assert!(activate(b.context(), true).unwrap());
        let current = current().unwrap();
        assert_eq!(current.id(), b.context().id());
        assert!(!a.context().is_current());

        assert!(activate(b.context(), false).unwrap());
        assert!(super::current().is_none());
    }

    #[test]
    fn deactivating_a_non_current_context_is_a_no_op() {
        let (_, registry) = setup();
        let a = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        let b = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        activate(a.context(), true).unwrap();
        activate(b.context(), false).unwrap();
        assert!(a.context().is_current());
    }

    #[test]
    fn driver_refusal_reports_false() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        driver.deny_activation(true);
        assert!(!activate(surface.context(), true).unwrap());
        assert!(current().is_none());
        driver.deny_activation(false);
        assert!(activate(surface.context(), true).unwrap());
        activate(surface.context(), false).unwrap();
    }

    #[test]
    fn activation_from_second_thread_is_rejected_while_current() {
        let (_, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        let context = Arc::clone(surface.context());
        activate(&context, true).unwrap();

        let result = {
            let context = Arc::clone(&context);
            std::thread::spawn(move || activate(&context, true))
                .join()
                .unwrap()
        };
        assert!(matches!(result, Err(ContextError::ContextBusy(_))));

        activate(&context, false).unwrap();
    }

    #[test]
    fn thread_exit_releases_a_still_current_context() {
        let (_, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        let context = Arc::clone(surface.context());

        {
            let context = Arc::clone(&context);
            std::thread::spawn(move || {
                activate(&context, true).unwrap();
                // Exit without deactivating; the slot must clean up.
            })
            .join()
            .unwrap();
        }

        assert!(!context.is_current());
        // A lingering owner tag would make this fail with ContextBusy.
        assert!(activate(&context, true).unwrap());
        activate(&context, false).unwrap();
    }

    #[test]
    fn context_created_on_one_thread_activates_on_another() {
        let (_, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        let context = Arc::clone(surface.context());

        let ok = {
            let context = Arc::clone(&context);
            std::thread::spawn(move || {
                let ok = activate(&context, true).unwrap();
                activate(&context, false).unwrap();
                ok
            })
            .join()
            .unwrap()
        };
        assert!(ok);
        assert!(!context.is_current());
    }
}
