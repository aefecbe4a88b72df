// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Device limits and optional features, queried once per context.

use crate::imp::NativeGl;

/// Optional features reported by the device layer.
///
/// These come from adapter information rather than from GL queries, so the caller
/// supplies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceFeatures {
    /// Wireframe fill mode can be selected.
    pub fill_mode_selection: bool,
    /// Separable program pipeline objects are available.
    pub separable_programs: bool,
    pub depth_clamp: bool,
}

/// Numeric limits read from the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_combined_texture_units: u32,
    pub max_draw_buffers: u32,
    pub max_uniform_buffer_bindings: u32,
    /// Zero on devices without shader images.
    pub max_image_units: u32,
    /// Zero on devices without storage buffers.
    pub max_storage_buffer_bindings: u32,
}

/// Immutable snapshot of what the current device can do.
///
/// All range checks in the binding cache are made against these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    limits: Limits,
    features: DeviceFeatures,
}

/// A limit came back as zero, which leaves nothing to bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("device reported zero {limit}")]
pub struct CapabilityError {
    pub limit: &'static str,
}

impl Capabilities {
    /// Queries limits from the current context and combines them with `features`.
    pub fn query<G: NativeGl + ?Sized>(
        gl: &mut G,
        features: DeviceFeatures,
    ) -> Result<Self, crate::bindings::StateError> {
        let limits = gl.query_limits()?;
        let caps = Self::new(limits, features)?;
        logwise::info_sync!(
            "Capabilities: {units} texture units, {draw} draw buffers, {ubo} uniform buffer bindings, {images} image units, {ssbo} storage buffer bindings",
            units = limits.max_combined_texture_units,
            draw = limits.max_draw_buffers,
            ubo = limits.max_uniform_buffer_bindings,
            images = limits.max_image_units,
            ssbo = limits.max_storage_buffer_bindings
        );
        Ok(caps)
    }

    /// Builds a snapshot from known values.  Texture unit, draw buffer and uniform buffer
    /// limits must be nonzero; image and storage limits may be zero.
    pub fn new(limits: Limits, features: DeviceFeatures) -> Result<Self, CapabilityError> {
        if limits.max_combined_texture_units == 0 {
            return Err(CapabilityError {
                limit: "combined texture units",
            });
        }
        if limits.max_draw_buffers == 0 {
            return Err(CapabilityError {
                limit: "draw buffers",
            });
        }
        if limits.max_uniform_buffer_bindings == 0 {
            return Err(CapabilityError {
                limit: "uniform buffer bindings",
            });
        }
        Ok(Capabilities { limits, features })
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn features(&self) -> DeviceFeatures {
        self.features
    }

    pub fn max_combined_texture_units(&self) -> u32 {
        self.limits.max_combined_texture_units
    }

    pub fn max_draw_buffers(&self) -> u32 {
        self.limits.max_draw_buffers
    }

    pub fn max_uniform_buffer_bindings(&self) -> u32 {
        self.limits.max_uniform_buffer_bindings
    }

    pub fn max_image_units(&self) -> u32 {
        self.limits.max_image_units
    }

    pub fn max_storage_buffer_bindings(&self) -> u32 {
        self.limits.max_storage_buffer_bindings
    }

    pub fn is_fill_mode_selection_supported(&self) -> bool {
        self.features.fill_mode_selection
    }

    pub fn is_program_pipeline_supported(&self) -> bool {
        self.features.separable_programs
    }

    pub fn is_depth_clamp_supported(&self) -> bool {
        self.features.depth_clamp
    }
}
