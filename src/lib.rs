//! Rendering-context and GPU-resource lifecycle layer
//!
//! Sits directly on top of an implicit-state, OpenGL-style graphics API and
//! lets an application drive one or more on-screen or off-screen surfaces
//! from its own threads without corrupting the single piece of hardware
//! state they all compete for: the current context.
//!
//! # What it provides
//! - Context creation with stepwise settings degradation and sharing groups
//!   ([`ContextRegistry`])
//! - Per-thread context activation with a single-current-context invariant
//!   ([`context::thread_slot`])
//! - Lazy, sharing-group-aware GPU resource lifecycle with deferred
//!   destruction ([`VertexBuffer`], [`resource::ResourceState`])
//! - A (render target, shader)-keyed cache of hardware vertex-array
//!   bindings ([`VertexArrayCache`])
//! - A hardware-capped slot pool and fixed-function lights that degrade to
//!   no-ops on exhaustion ([`SlotPool`], [`Light`])
//! - Save/restore of pipeline-global state around raw driver calls
//!   ([`RenderStateStack`])
//!
//! The native driver is abstracted behind [`ContextDriver`];
//! [`HeadlessDriver`] is a software implementation for headless work and
//! tests. Windowing stays outside this crate: surfaces arrive as
//! [`raw_window_handle::RawWindowHandle`]s.

pub mod context;
pub mod driver;
pub mod resource;
pub mod state;
pub mod types;

pub use context::{
    thread_slot, ContextError, ContextId, ContextRegistry, ContextResult, ContextSettings,
    NativeContext, SharingGroupId, SurfaceContext, SurfaceHandle,
};
pub use driver::{ContextDriver, HeadlessDriver, LightParams, RawContext};
pub use resource::{
    Light, LightBank, ResourceState, ShaderId, SlotPool, TargetId, VertexArrayCache, VertexBuffer,
};
pub use state::{MatrixMode, PipelineState, RenderStateStack};
pub use types::{Vertex, VertexAttribute, VertexFormat, VertexLayout};
