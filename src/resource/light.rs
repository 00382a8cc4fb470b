//! Fixed-function light sources backed by a hardware slot pool
//!
//! The driver reserves a small fixed number of light slots (commonly 8).
//! Lights compete for them through a [`LightBank`]; one that loses stays
//! valid but inert, which keeps pool exhaustion an expected condition
//! instead of a failure.

use std::sync::Arc;

use glam::{Vec3, Vec4};

use crate::context::ContextRegistry;
use crate::driver::{ContextDriver, LightParams};
use crate::resource::SlotPool;

struct LightBankInner {
    driver: Arc<dyn ContextDriver>,
    pool: SlotPool,
}

/// Shared pool of hardware light slots, sized by the driver-reported
/// maximum. Cheap to clone.
#[derive(Clone)]
pub struct LightBank {
    inner: Arc<LightBankInner>,
}

impl LightBank {
    pub fn new(registry: &ContextRegistry) -> Self {
        let driver = Arc::clone(registry.driver());
        let pool = SlotPool::new(driver.max_light_slots());
        Self {
            inner: Arc::new(LightBankInner { driver, pool }),
        }
    }

    /// Hardware-reported maximum number of simultaneous lights
    pub fn maximum_slots(&self) -> usize {
        self.inner.pool.capacity()
    }

    pub fn slots_in_use(&self) -> usize {
        self.inner.pool.in_use()
    }

    /// Toggle fixed-function lighting globally
    pub fn set_lighting_enabled(&self, enabled: bool) {
        self.inner.driver.set_lighting_enabled(enabled);
    }
}

/// One light source occupying a hardware slot.
///
/// Construction tries to acquire a slot; on pool exhaustion the light is
/// created in a degraded no-op state ([`Light::is_active`] reports `false`)
/// and every operation on it does nothing. The slot is returned when the
/// light is dropped.
pub struct Light {
    bank: LightBank,
    slot: Option<usize>,
    params: LightParams,
    enabled: bool,
}

impl Light {
    pub fn new(bank: &LightBank) -> Self {
        let slot = bank.inner.pool.acquire();
        if slot.is_none() {
            log::warn!(
                "light slot pool exhausted ({} slots); light will be inactive",
                bank.inner.pool.capacity()
            );
        }
        Self {
            bank: bank.clone(),
            slot,
            params: LightParams::default(),
            enabled: false,
        }
    }

    /// Whether this light holds a hardware slot
    pub fn is_active(&self) -> bool {
        self.slot.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn params(&self) -> &LightParams {
        &self.params
    }

    pub fn is_directional(&self) -> bool {
        self.params.directional
    }

    pub fn set_directional(&mut self, directional: bool) {
        self.params.directional = directional;
        self.sync();
    }

    pub fn position(&self) -> Vec3 {
        self.params.position
    }

    /// Set the position (or, for a directional light, the direction)
    pub fn set_position(&mut self, position: Vec3) {
        self.params.position = position;
        self.sync();
    }

    /// Offset the current position
    pub fn move_by(&mut self, offset: Vec3) {
        self.params.position += offset;
        self.sync();
    }

    pub fn set_ambient_color(&mut self, color: Vec4) {
        self.params.ambient = color;
        self.sync();
    }

    pub fn set_diffuse_color(&mut self, color: Vec4) {
        self.params.diffuse = color;
        self.sync();
    }

    pub fn set_specular_color(&mut self, color: Vec4) {
        self.params.specular = color;
        self.sync();
    }

    /// Constant, linear, and quadratic attenuation factors
    pub fn set_attenuation(&mut self, constant: f32, linear: f32, quadratic: f32) {
        self.params.attenuation = Vec3::new(constant, linear, quadratic);
        self.sync();
    }

    /// Factor this light into subsequent draws. No-op without a slot.
    pub fn enable(&mut self) {
        let Some(slot) = self.slot else {
            return;
        };
        self.bank.inner.driver.update_light(slot, &self.params);
        self.bank.inner.driver.set_light_enabled(slot, true);
        self.enabled = true;
    }

    /// Stop factoring this light into subsequent draws
    pub fn disable(&mut self) {
        if let Some(slot) = self.slot {
            self.bank.inner.driver.set_light_enabled(slot, false);
        }
        self.enabled = false;
    }

    fn sync(&self) {
        if let Some(slot) = self.slot {
            self.bank.inner.driver.update_light(slot, &self.params);
        }
    }
}

impl Clone for Light {
    /// Copies the light's parameters; the clone competes for its own slot
    fn clone(&self) -> Self {
        let mut light = Light::new(&self.bank);
        light.params = self.params;
        light.sync();
        light
    }
}

impl Drop for Light {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.bank.inner.driver.set_light_enabled(slot, false);
            self.bank.inner.pool.release(slot);
        }
    }
}
