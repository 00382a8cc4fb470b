//! Vertex buffers with lazy GPU realization

use crate::context::registry::DeferredDelete;
use crate::context::{ContextRegistry, ContextResult};
use crate::resource::ResourceState;
use crate::types::{Vertex, VertexLayout};

/// A set of vertices backed by a GPU buffer object.
///
/// The native buffer is created lazily on first use inside a valid context
/// and re-uploaded (not re-allocated) after host-side mutation. Clones copy
/// the host data only; the clone realizes its own native buffer on first
/// use.
pub struct VertexBuffer {
    vertices: Vec<Vertex>,
    layout: VertexLayout,
    state: ResourceState,
}

impl VertexBuffer {
    pub fn new(registry: &ContextRegistry, vertices: Vec<Vertex>) -> Self {
        Self {
            vertices,
            layout: Vertex::layout(),
            state: ResourceState::new(registry),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Read-write access to the vertices; marks the buffer dirty
    pub fn vertices_mut(&mut self) -> &mut Vec<Vertex> {
        self.state.mark_dirty();
        &mut self.vertices
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Host data changed through other means; force a re-upload
    pub fn mark_dirty(&mut self) {
        self.state.mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    pub fn is_realized(&self) -> bool {
        self.state.is_realized()
    }

    /// Native buffer id, 0 while unrealized
    pub fn native_id(&self) -> u64 {
        self.state.native_id()
    }

    /// Create the native buffer and upload host data if needed.
    ///
    /// Requires a context from this buffer's sharing group to be current on
    /// the calling thread. Idempotent until the next mutation: a realized,
    /// clean buffer performs no driver calls.
    pub fn ensure_realized(&mut self) -> ContextResult<u64> {
        self.state.require_current()?;
        if !self.state.is_realized() {
            let id = self
                .state
                .driver()
                .create_buffer(bytemuck::cast_slice(&self.vertices));
            self.state.set_native_id(id);
        } else if self.state.is_dirty() {
            self.state
                .driver()
                .upload_buffer(self.state.native_id(), bytemuck::cast_slice(&self.vertices));
            self.state.clear_dirty();
        }
        Ok(self.state.native_id())
    }
}

impl Clone for VertexBuffer {
    fn clone(&self) -> Self {
        Self {
            vertices: self.vertices.clone(),
            layout: self.layout.clone(),
            state: self.state.clone(),
        }
    }
}

impl Drop for VertexBuffer {
    fn drop(&mut self) {
        self.state.release(DeferredDelete::Buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextError, ContextSettings};
    use crate::driver::{ContextDriver, HeadlessDriver};
    use glam::Vec3;
    use std::sync::Arc;

    fn setup() -> (Arc<HeadlessDriver>, ContextRegistry) {
        let driver = Arc::new(HeadlessDriver::new());
        let registry = ContextRegistry::new(driver.clone() as Arc<dyn ContextDriver>);
        (driver, registry)
    }

    fn triangle(registry: &ContextRegistry) -> VertexBuffer {
        VertexBuffer::new(
            registry,
            vec![
                Vertex::new(Vec3::ZERO),
                Vertex::new(Vec3::X),
                Vertex::new(Vec3::Y),
            ],
        )
    }

    #[test]
    fn realization_requires_a_current_context() {
        let (_, registry) = setup();
        let mut buffer = triangle(&registry);
        assert!(matches!(
            buffer.ensure_realized(),
            Err(ContextError::NoActiveContext(_))
        ));
        assert!(!buffer.is_realized());
    }

    #[test]
    fn realization_is_idempotent() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        let mut buffer = triangle(&registry);
        let id = buffer.ensure_realized().unwrap();
        assert_eq!(buffer.ensure_realized().unwrap(), id);
        assert_eq!(driver.buffer_upload_count(id), 1);

        surface.set_active(false).unwrap();
    }

    #[test]
    fn mutation_triggers_exactly_one_reupload() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        let mut buffer = triangle(&registry);
        let id = buffer.ensure_realized().unwrap();

        buffer.vertices_mut().push(Vertex::new(Vec3::ONE));
        assert!(buffer.is_dirty());
        assert_eq!(buffer.ensure_realized().unwrap(), id, "no re-allocation");
        assert_eq!(buffer.ensure_realized().unwrap(), id);
        assert_eq!(driver.buffer_upload_count(id), 2);

        surface.set_active(false).unwrap();
    }

    #[test]
    fn clone_copies_host_data_only() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        let mut buffer = triangle(&registry);
        let id = buffer.ensure_realized().unwrap();

        let mut copy = buffer.clone();
        assert!(!copy.is_realized());
        assert_eq!(copy.vertices(), buffer.vertices());
        let copy_id = copy.ensure_realized().unwrap();
        assert_ne!(copy_id, id);
        assert_eq!(driver.buffer_upload_count(id), 1);

        surface.set_active(false).unwrap();
    }

    #[test]
    fn drop_with_current_context_destroys_immediately() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        let mut buffer = triangle(&registry);
        let id = buffer.ensure_realized().unwrap();
        assert!(driver.buffer_alive(id));
        drop(buffer);
        assert!(!driver.buffer_alive(id));

        surface.set_active(false).unwrap();
    }

    #[test]
    fn drop_without_context_defers_until_next_activation() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        let mut buffer = triangle(&registry);
        let id = buffer.ensure_realized().unwrap();
        surface.set_active(false).unwrap();

        drop(buffer);
        // No context current: destruction must be deferred, not skipped.
        assert!(driver.buffer_alive(id));

        surface.activate().unwrap();
        assert!(!driver.buffer_alive(id));
        surface.set_active(false).unwrap();
    }

    #[test]
    fn drop_after_the_group_is_gone_queues_nothing_for_later_contexts() {
        let (driver, registry) = setup();
        let surface = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        surface.activate().unwrap();

        let mut buffer = triangle(&registry);
        let id = buffer.ensure_realized().unwrap();
        surface.set_active(false).unwrap();
        drop(surface);
        assert_eq!(driver.live_context_count(), 0);

        // The native object died with its contexts; the drop must not
        // enqueue a delete a later context generation would apply.
        drop(buffer);

        let replacement = registry
            .create_shared_context(&ContextSettings::default(), 16, 16)
            .unwrap();
        replacement.activate().unwrap();
        assert!(driver.buffer_alive(id), "no stale delete applied");
        replacement.set_active(false).unwrap();
    }
}
