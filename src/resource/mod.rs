//! GPU-resident resources: lifecycle contract, vertex buffers, binding
//! caches, and hardware slot pools

pub mod handle;
pub mod light;
pub mod pool;
pub mod vao_cache;
pub mod vertex_buffer;

pub use handle::ResourceState;
pub use light::{Light, LightBank};
pub use pool::SlotPool;
pub use vao_cache::{ShaderId, TargetId, VertexArrayCache};
pub use vertex_buffer::VertexBuffer;
