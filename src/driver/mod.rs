//! Native driver abstraction
//!
//! [`ContextDriver`] is the seam between this crate and the platform's
//! graphics driver. Everything above it (registry, resources, caches, the
//! state stack) is portable; a driver implementation translates these calls
//! into the native API. [`headless::HeadlessDriver`] is a software
//! implementation used for off-GPU work and for tests.

pub mod headless;

use glam::{Vec3, Vec4};

use crate::context::{ContextSettings, SurfaceHandle};
use crate::state::PipelineState;
use crate::types::VertexLayout;

pub use headless::HeadlessDriver;

/// Opaque handle to a driver-level context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawContext(pub u64);

/// Fixed-function light source parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    /// Directional lights have no position; `position` holds the direction
    pub directional: bool,
    pub position: Vec3,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    /// Constant, linear, and quadratic attenuation factors
    pub attenuation: Vec3,
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            directional: false,
            position: Vec3::ZERO,
            ambient: Vec4::new(0.0, 0.0, 0.0, 1.0),
            diffuse: Vec4::ONE,
            specular: Vec4::ONE,
            attenuation: Vec3::new(1.0, 0.0, 0.0),
        }
    }
}

/// Interface a native graphics driver must implement.
///
/// Object ids handed out by a driver are plain `u64`s where 0 means "no
/// object". Calls that touch GPU objects assume the caller has made a
/// context of the right sharing group current; enforcing that contract is
/// the job of the layers above, not of driver implementations.
pub trait ContextDriver: Send + Sync {
    /// Create a native context for a drawing surface.
    ///
    /// Returns the raw handle and the granted settings, or `None` when the
    /// platform cannot produce a context with the requested settings. The
    /// caller retries with degraded settings before giving up.
    fn create_context(
        &self,
        settings: &ContextSettings,
        surface: &SurfaceHandle,
        share_with: Option<RawContext>,
    ) -> Option<(RawContext, ContextSettings)>;

    /// Release a native context
    fn destroy_context(&self, context: RawContext);

    /// Make a context current (or no longer current) on the calling thread.
    ///
    /// Returns `false` when the driver refuses the activation.
    fn make_current(&self, context: RawContext, active: bool) -> bool;

    // Buffer objects

    /// Create a buffer object and upload the initial data
    fn create_buffer(&self, data: &[u8]) -> u64;

    /// Re-upload host data into an existing buffer object
    fn upload_buffer(&self, buffer: u64, data: &[u8]);

    /// Destroy a buffer object
    fn destroy_buffer(&self, buffer: u64);

    // Vertex array objects

    /// Build a hardware vertex-attribute binding for a buffer
    fn create_array_object(&self, buffer: u64, layout: &VertexLayout) -> u64;

    /// Destroy a vertex-attribute binding
    fn destroy_array_object(&self, array_object: u64);

    // Fixed-function lighting

    /// Hardware-reported maximum number of light slots
    fn max_light_slots(&self) -> usize;

    /// Enable or disable one light slot
    fn set_light_enabled(&self, slot: usize, enabled: bool);

    /// Upload the parameters of one light slot
    fn update_light(&self, slot: usize, params: &LightParams);

    /// Toggle fixed-function lighting globally
    fn set_lighting_enabled(&self, enabled: bool);

    // Pipeline state save/restore

    /// Snapshot the pipeline-global state subset the structured API uses
    fn capture_pipeline_state(&self) -> PipelineState;

    /// Restore a previously captured snapshot
    fn restore_pipeline_state(&self, state: &PipelineState);
}
