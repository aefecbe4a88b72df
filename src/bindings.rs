// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The binding cache.

[`ContextState`] mirrors everything bound to one native context and forwards a request
to the driver only when it would change something.  Submodules hold the value types the
cache compares.
*/

pub mod barrier;
pub mod blend;
mod context_state;
pub mod raster;
pub mod slots;

pub use context_state::ContextState;

use crate::caps::CapabilityError;
use crate::imp;

/// Which slot table a [`StateError::SlotOutOfRange`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    TextureUnit,
    Sampler,
    ImageUnit,
    UniformBuffer,
    StorageBuffer,
    RenderTarget,
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SlotKind::TextureUnit => "texture unit",
            SlotKind::Sampler => "sampler unit",
            SlotKind::ImageUnit => "image unit",
            SlotKind::UniformBuffer => "uniform buffer binding",
            SlotKind::StorageBuffer => "shader storage buffer binding",
            SlotKind::RenderTarget => "render target",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Native(#[from] imp::Error),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    /// The caller asked for a slot the device does not have.  Nothing was issued.
    #[error("{kind} {slot} is out of range (limit {limit})")]
    SlotOutOfRange {
        kind: SlotKind,
        slot: i64,
        limit: u32,
    },
    #[error("{operation} is not supported by this device")]
    Unsupported { operation: &'static str },
    /// No native context is current, so there is nothing to bind to.
    #[error("no native context is current")]
    NoCurrentContext,
}
