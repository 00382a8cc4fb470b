//! Context lifecycle: creation, sharing groups, per-thread activation
//!
//! A [`ContextRegistry`] owns every live native context and the sharing
//! groups they belong to. Activation is per thread through [`thread_slot`];
//! at most one context is current on a given thread at any time.

pub mod registry;
pub mod surface;
pub mod thread_slot;

use std::fmt;
use thiserror::Error;

pub use registry::{ContextRegistry, NativeContext};
pub use surface::{SurfaceContext, SurfaceHandle};

/// Unique identifier of a native context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub(crate) u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a set of contexts that can see each other's GPU objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SharingGroupId(pub(crate) u64);

impl fmt::Display for SharingGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group {}", self.0)
    }
}

/// Context error type
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("failed to create a graphics context: {0}")]
    ContextCreation(String),
    #[error("no context from {0} is current on this thread")]
    NoActiveContext(SharingGroupId),
    #[error("driver refused to make context {0} current")]
    ContextActivationFailed(ContextId),
    #[error("context {0} is current on another thread")]
    ContextBusy(ContextId),
    #[error("render state stack pop without a matching push")]
    UnbalancedStateStack,
}

pub type ContextResult<T> = Result<T, ContextError>;

/// Requested configuration of a context's framebuffer and API version.
///
/// Creation degrades the requested settings step by step when the driver
/// cannot satisfy them, so the granted settings may differ from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSettings {
    /// Bits of the depth buffer
    pub depth_bits: u32,
    /// Bits of the stencil buffer
    pub stencil_bits: u32,
    /// Multisampling level (0 disables antialiasing)
    pub antialiasing_level: u32,
    /// Major API version to request
    pub major_version: u32,
    /// Minor API version to request
    pub minor_version: u32,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            depth_bits: 24,
            stencil_bits: 8,
            antialiasing_level: 0,
            major_version: 2,
            minor_version: 1,
        }
    }
}

impl ContextSettings {
    /// Next weaker configuration to try when the driver rejects this one.
    ///
    /// Degradation order: antialiasing, then stencil, then depth, then API
    /// version. Returns `None` once there is nothing left to give up.
    pub(crate) fn degrade(&self) -> Option<Self> {
        let mut next = *self;
        if next.antialiasing_level > 0 {
            next.antialiasing_level /= 2;
            return Some(next);
        }
        if next.stencil_bits > 0 {
            next.stencil_bits = 0;
            return Some(next);
        }
        if next.depth_bits > 24 {
            next.depth_bits = 24;
            return Some(next);
        }
        if next.depth_bits > 16 {
            next.depth_bits = 16;
            return Some(next);
        }
        if next.depth_bits > 0 {
            next.depth_bits = 0;
            return Some(next);
        }
        if next.major_version > 2 || (next.major_version == 2 && next.minor_version > 1) {
            next.major_version = 2;
            next.minor_version = 1;
            return Some(next);
        }
        None
    }
}
