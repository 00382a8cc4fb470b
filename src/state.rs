//! Save/restore of pipeline-global state around raw driver calls
//!
//! The wrapped graphics API keeps its state implicit and global, so
//! application code issuing raw calls between structured draw calls would
//! otherwise corrupt whatever the structured API relies on. A
//! [`RenderStateStack`] brackets such escape hatches: push before the raw
//! calls, pop afterward.

use std::sync::Arc;

use glam::Mat4;

use crate::context::registry::RegistryShared;
use crate::context::{thread_slot, ContextError, ContextRegistry, ContextResult};

/// Which matrix stack subsequent matrix calls address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixMode {
    #[default]
    ModelView,
    Projection,
    Texture,
}

/// Snapshot of the pipeline-global state subset the structured API depends on
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub matrix_mode: MatrixMode,
    pub modelview: Mat4,
    pub projection: Mat4,
    pub depth_test: bool,
    pub blend: bool,
    pub lighting: bool,
    pub texture_2d: bool,
    pub cull_face: bool,
    /// Currently bound texture object (0 = none)
    pub bound_texture: u64,
    /// Currently bound array buffer (0 = none)
    pub bound_array_buffer: u64,
    /// x, y, width, height
    pub viewport: [i32; 4],
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            matrix_mode: MatrixMode::ModelView,
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            depth_test: false,
            blend: false,
            lighting: false,
            texture_2d: false,
            cull_face: false,
            bound_texture: 0,
            bound_array_buffer: 0,
            viewport: [0, 0, 0, 0],
        }
    }
}

/// LIFO save/restore of pipeline state.
///
/// Push and pop must nest; a pop without a matching push is reported as
/// [`ContextError::UnbalancedStateStack`]. The stack is reentrant across
/// render targets sharing one context and nests arbitrarily deep.
pub struct RenderStateStack {
    shared: Arc<RegistryShared>,
    frames: Vec<PipelineState>,
}

impl RenderStateStack {
    pub fn new(registry: &ContextRegistry) -> Self {
        Self {
            shared: Arc::clone(registry.shared()),
            frames: Vec::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Capture the current pipeline state into a new frame.
    ///
    /// Requires a context of this registry to be current.
    pub fn push(&mut self) -> ContextResult<()> {
        self.require_current()?;
        let frame = self.shared.driver.capture_pipeline_state();
        self.frames.push(frame);
        Ok(())
    }

    /// Restore and discard the top frame
    pub fn pop(&mut self) -> ContextResult<()> {
        self.require_current()?;
        let frame = self
            .frames
            .pop()
            .ok_or(ContextError::UnbalancedStateStack)?;
        self.shared.driver.restore_pipeline_state(&frame);
        Ok(())
    }

    /// Restore the baseline state structured drawing assumes, without
    /// touching the stack. Useful after arbitrary raw calls. The viewport
    /// belongs to the render target and is left as it is.
    pub fn reset(&self) -> ContextResult<()> {
        self.require_current()?;
        let viewport = self.shared.driver.capture_pipeline_state().viewport;
        self.shared.driver.restore_pipeline_state(&PipelineState {
            viewport,
            ..PipelineState::default()
        });
        Ok(())
    }

    fn require_current(&self) -> ContextResult<()> {
        let current = thread_slot::current();
        let ours = current
            .as_ref()
            .is_some_and(|context| Arc::ptr_eq(context.registry_shared(), &self.shared));
        if ours {
            Ok(())
        } else {
            Err(ContextError::NoActiveContext(self.shared.default_group))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSettings;
    use crate::driver::{ContextDriver, HeadlessDriver};

    fn setup() -> (Arc<HeadlessDriver>, ContextRegistry) {
        let driver = Arc::new(HeadlessDriver::new());
        let registry = ContextRegistry::new(driver.clone() as Arc<dyn ContextDriver>);
        (driver, registry)
    }

    #[test]
    fn pop_restores_state_captured_by_push() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        driver.set_depth_test(true);
        driver.bind_texture(42);
        let before = driver.pipeline_state();

        let mut stack = RenderStateStack::new(&registry);
        stack.push().unwrap();

        // Raw calls that would otherwise corrupt the pipeline.
        driver.set_depth_test(false);
        driver.set_blend(true);
        driver.bind_texture(7);
        driver.set_modelview(Mat4::from_scale(glam::Vec3::splat(2.0)));
        assert_ne!(driver.pipeline_state(), before);

        stack.pop().unwrap();
        assert_eq!(driver.pipeline_state(), before);

        surface.set_active(false).unwrap();
    }

    #[test]
    fn frames_nest_lifo() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        let mut stack = RenderStateStack::new(&registry);
        let mut observed = Vec::new();
        for bound in [1u64, 2, 3] {
            driver.bind_texture(bound);
            observed.push(driver.pipeline_state());
            stack.push().unwrap();
        }
        assert_eq!(stack.depth(), 3);
        for expected in observed.iter().rev() {
            driver.bind_texture(99);
            stack.pop().unwrap();
            assert_eq!(driver.pipeline_state(), *expected);
        }
        assert_eq!(stack.depth(), 0);

        surface.set_active(false).unwrap();
    }

    #[test]
    fn pop_without_push_is_an_error() {
        let (_, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        let mut stack = RenderStateStack::new(&registry);
        assert!(matches!(
            stack.pop(),
            Err(ContextError::UnbalancedStateStack)
        ));

        surface.set_active(false).unwrap();
    }

    #[test]
    fn reset_restores_the_baseline_but_keeps_the_viewport() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        driver.set_viewport([0, 0, 640, 480]);
        driver.set_depth_test(true);
        driver.set_blend(true);
        driver.bind_texture(42);
        driver.set_modelview(Mat4::from_scale(glam::Vec3::splat(3.0)));

        let stack = RenderStateStack::new(&registry);
        stack.reset().unwrap();
        assert_eq!(
            driver.pipeline_state(),
            PipelineState {
                viewport: [0, 0, 640, 480],
                ..PipelineState::default()
            }
        );

        surface.set_active(false).unwrap();
    }

    #[test]
    fn reset_requires_a_current_context() {
        let (_, registry) = setup();
        let stack = RenderStateStack::new(&registry);
        assert!(matches!(
            stack.reset(),
            Err(ContextError::NoActiveContext(_))
        ));
    }

    #[test]
    fn push_requires_a_current_context() {
        let (_, registry) = setup();
        let mut stack = RenderStateStack::new(&registry);
        assert!(matches!(
            stack.push(),
            Err(ContextError::NoActiveContext(_))
        ));
    }
}
