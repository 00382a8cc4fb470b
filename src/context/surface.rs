//! Contexts bound to drawing surfaces

use std::sync::Arc;

use raw_window_handle::RawWindowHandle;

use crate::context::registry::NativeContext;
use crate::context::{thread_slot, ContextError, ContextResult, ContextSettings};

/// Native drawable a context is created against.
///
/// Window creation itself (event loops, platform boilerplate) is the
/// caller's business; this crate only consumes the resulting handle.
#[derive(Debug, Clone, Copy)]
pub enum SurfaceHandle {
    /// An on-screen window surface
    Window(RawWindowHandle),
    /// An off-screen surface, e.g. for background resource uploads
    Offscreen { width: u32, height: u32 },
}

/// A context bound to a drawing surface.
///
/// Dropping the surface destroys its context. A drop while the context is
/// still current on another thread is a caller error; it is logged and the
/// native context leaks rather than corrupting another thread's state.
pub struct SurfaceContext {
    context: Arc<NativeContext>,
    size: Option<(u32, u32)>,
}

impl SurfaceContext {
    pub(crate) fn new(context: Arc<NativeContext>, size: Option<(u32, u32)>) -> Self {
        Self { context, size }
    }

    pub fn context(&self) -> &Arc<NativeContext> {
        &self.context
    }

    /// Settings actually granted by the driver
    pub fn settings(&self) -> &ContextSettings {
        self.context.settings()
    }

    /// Off-screen surface dimensions; `None` for window surfaces, whose
    /// size is tracked by the window
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    /// Make this surface's context current (or not) on the calling thread.
    ///
    /// Returns `Ok(false)` when the driver refuses the activation.
    pub fn set_active(&self, active: bool) -> ContextResult<bool> {
        thread_slot::activate(&self.context, active)
    }

    /// Like [`SurfaceContext::set_active`], but treats a driver refusal as
    /// [`ContextError::ContextActivationFailed`]
    pub fn activate(&self) -> ContextResult<()> {
        if self.set_active(true)? {
            Ok(())
        } else {
            Err(ContextError::ContextActivationFailed(self.context.id()))
        }
    }
}

impl Drop for SurfaceContext {
    fn drop(&mut self) {
        if let Err(err) = self.context.destroy() {
            log::error!("failed to destroy surface context: {err}");
        }
    }
}
