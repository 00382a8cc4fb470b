//! Software driver with no GPU behind it
//!
//! Implements [`ContextDriver`] purely with host-side bookkeeping. Used for
//! headless resource work and as the driver the test suite runs against;
//! the inspection methods expose what a real driver would keep hidden.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use glam::Mat4;
use parking_lot::Mutex;

use crate::context::{ContextSettings, SurfaceHandle};
use crate::driver::{ContextDriver, LightParams, RawContext};
use crate::state::PipelineState;
use crate::types::VertexLayout;

struct BufferRecord {
    size: usize,
    uploads: u32,
}

struct HeadlessState {
    next_context: u64,
    next_object: u64,
    contexts: HashSet<u64>,
    buffers: HashMap<u64, BufferRecord>,
    /// array object id -> buffer it was built against
    array_objects: HashMap<u64, u64>,
    lights: Vec<(bool, LightParams)>,
    pipeline: PipelineState,
}

/// Driver limits and behavior toggles are fixed at construction except for
/// the deny flags, which tests flip at runtime.
pub struct HeadlessDriver {
    max_depth_bits: u32,
    max_antialiasing: u32,
    deny_context_creation: AtomicBool,
    deny_activation: AtomicBool,
    state: Mutex<HeadlessState>,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::with_limits(32, 16, 8)
    }

    /// Driver with explicit capability limits
    pub fn with_limits(max_depth_bits: u32, max_antialiasing: u32, max_lights: usize) -> Self {
        Self {
            max_depth_bits,
            max_antialiasing,
            deny_context_creation: AtomicBool::new(false),
            deny_activation: AtomicBool::new(false),
            state: Mutex::new(HeadlessState {
                next_context: 1,
                next_object: 1,
                contexts: HashSet::new(),
                buffers: HashMap::new(),
                array_objects: HashMap::new(),
                lights: vec![(false, LightParams::default()); max_lights],
                pipeline: PipelineState::default(),
            }),
        }
    }

    /// Refuse all subsequent context creation
    pub fn deny_context_creation(&self, deny: bool) {
        self.deny_context_creation.store(deny, Ordering::Relaxed);
    }

    /// Refuse all subsequent activations
    pub fn deny_activation(&self, deny: bool) {
        self.deny_activation.store(deny, Ordering::Relaxed);
    }

    // Inspection

    pub fn live_context_count(&self) -> usize {
        self.state.lock().contexts.len()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_array_object_count(&self) -> usize {
        self.state.lock().array_objects.len()
    }

    pub fn buffer_alive(&self, buffer: u64) -> bool {
        self.state.lock().buffers.contains_key(&buffer)
    }

    pub fn array_object_alive(&self, array_object: u64) -> bool {
        self.state.lock().array_objects.contains_key(&array_object)
    }

    /// Uploads a buffer has received, creation included; 0 once destroyed
    pub fn buffer_upload_count(&self, buffer: u64) -> u32 {
        self.state
            .lock()
            .buffers
            .get(&buffer)
            .map_or(0, |record| record.uploads)
    }

    pub fn buffer_size(&self, buffer: u64) -> usize {
        self.state
            .lock()
            .buffers
            .get(&buffer)
            .map_or(0, |record| record.size)
    }

    pub fn light_enabled(&self, slot: usize) -> bool {
        self.state
            .lock()
            .lights
            .get(slot)
            .is_some_and(|(enabled, _)| *enabled)
    }

    pub fn light_params(&self, slot: usize) -> Option<LightParams> {
        self.state.lock().lights.get(slot).map(|(_, params)| *params)
    }

    pub fn lighting_enabled(&self) -> bool {
        self.state.lock().pipeline.lighting
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.state.lock().pipeline.clone()
    }

    // Raw-call stand-ins: what application escape-hatch code would do
    // directly against the native API.

    pub fn set_depth_test(&self, enabled: bool) {
        self.state.lock().pipeline.depth_test = enabled;
    }

    pub fn set_blend(&self, enabled: bool) {
        self.state.lock().pipeline.blend = enabled;
    }

    pub fn set_modelview(&self, matrix: Mat4) {
        self.state.lock().pipeline.modelview = matrix;
    }

    pub fn bind_texture(&self, texture: u64) {
        self.state.lock().pipeline.bound_texture = texture;
    }

    pub fn set_viewport(&self, viewport: [i32; 4]) {
        self.state.lock().pipeline.viewport = viewport;
    }
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextDriver for HeadlessDriver {
    fn create_context(
        &self,
        settings: &ContextSettings,
        _surface: &SurfaceHandle,
        _share_with: Option<RawContext>,
    ) -> Option<(RawContext, ContextSettings)> {
        if self.deny_context_creation.load(Ordering::Relaxed) {
            return None;
        }
        if settings.depth_bits > self.max_depth_bits
            || settings.antialiasing_level > self.max_antialiasing
        {
            return None;
        }
        let mut state = self.state.lock();
        let id = state.next_context;
        state.next_context += 1;
        state.contexts.insert(id);
        Some((RawContext(id), *settings))
    }

    fn destroy_context(&self, context: RawContext) {
        self.state.lock().contexts.remove(&context.0);
    }

    fn make_current(&self, context: RawContext, _active: bool) -> bool {
        if self.deny_activation.load(Ordering::Relaxed) {
            return false;
        }
        self.state.lock().contexts.contains(&context.0)
    }

    fn create_buffer(&self, data: &[u8]) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_object;
        state.next_object += 1;
        state.buffers.insert(
            id,
            BufferRecord {
                size: data.len(),
                uploads: 1,
            },
        );
        state.pipeline.bound_array_buffer = id;
        id
    }

    fn upload_buffer(&self, buffer: u64, data: &[u8]) {
        if let Some(record) = self.state.lock().buffers.get_mut(&buffer) {
            record.size = data.len();
            record.uploads += 1;
        }
    }

    fn destroy_buffer(&self, buffer: u64) {
        self.state.lock().buffers.remove(&buffer);
    }

    fn create_array_object(&self, buffer: u64, _layout: &VertexLayout) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_object;
        state.next_object += 1;
        state.array_objects.insert(id, buffer);
        id
    }

    fn destroy_array_object(&self, array_object: u64) {
        self.state.lock().array_objects.remove(&array_object);
    }

    fn max_light_slots(&self) -> usize {
        self.state.lock().lights.len()
    }

    fn set_light_enabled(&self, slot: usize, enabled: bool) {
        if let Some(light) = self.state.lock().lights.get_mut(slot) {
            light.0 = enabled;
        }
    }

    fn update_light(&self, slot: usize, params: &LightParams) {
        if let Some(light) = self.state.lock().lights.get_mut(slot) {
            light.1 = *params;
        }
    }

    fn set_lighting_enabled(&self, enabled: bool) {
        self.state.lock().pipeline.lighting = enabled;
    }

    fn capture_pipeline_state(&self) -> PipelineState {
        self.state.lock().pipeline.clone()
    }

    fn restore_pipeline_state(&self, state: &PipelineState) {
        self.state.lock().pipeline = state.clone();
    }
}
