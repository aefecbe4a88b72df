// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Blend descriptions and the color write mask table.

use bitflags::bitflags;

/// Number of render targets a blend description covers.
pub const MAX_RENDER_TARGETS: usize = 8;

bitflags! {
    /// Channels written to a render target.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ColorMask: u8 {
        const RED   = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE  = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL   = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
    DestColor,
    InvDestColor,
    SrcAlphaSat,
    BlendFactor,
    InvBlendFactor,
    Src1Color,
    InvSrc1Color,
    Src1Alpha,
    InvSrc1Alpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOperation {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

/// Blending for one render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetBlendDesc {
    pub blend_enable: bool,
    pub src_blend: BlendFactor,
    pub dest_blend: BlendFactor,
    pub blend_op: BlendOperation,
    pub src_blend_alpha: BlendFactor,
    pub dest_blend_alpha: BlendFactor,
    pub blend_op_alpha: BlendOperation,
    pub write_mask: ColorMask,
}

impl Default for RenderTargetBlendDesc {
    fn default() -> Self {
        RenderTargetBlendDesc {
            blend_enable: false,
            src_blend: BlendFactor::One,
            dest_blend: BlendFactor::Zero,
            blend_op: BlendOperation::Add,
            src_blend_alpha: BlendFactor::One,
            dest_blend_alpha: BlendFactor::Zero,
            blend_op_alpha: BlendOperation::Add,
            write_mask: ColorMask::ALL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlendStateDesc {
    pub alpha_to_coverage: bool,
    /// When false only target 0 is consulted for blending.
    pub independent_blend: bool,
    pub render_targets: [RenderTargetBlendDesc; MAX_RENDER_TARGETS],
}

/**
Color write masks as last set on the context.

GL has one call that sets every draw buffer and one that sets a single buffer.  The table
starts in the cheap non-indexed mode.  The first per-buffer call promotes it to indexed
mode, and it stays there until [`ColorWriteMasks::reset`].  Slots hold `None` until
something is written; a `None` slot reads back as [`ColorMask::ALL`].
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorWriteMasks {
    masks: [Option<ColorMask>; MAX_RENDER_TARGETS],
    indexed: bool,
}

impl ColorWriteMasks {
    pub fn mask(&self, rt: usize) -> ColorMask {
        self.masks[rt].unwrap_or(ColorMask::ALL)
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub(crate) fn raw(&self, rt: usize) -> Option<ColorMask> {
        self.masks[rt]
    }

    /// Whether a non-indexed call with `mask` would change nothing.
    pub(crate) fn uniform_matches(&self, mask: ColorMask) -> bool {
        !self.indexed && self.masks[0] == Some(mask)
    }

    pub(crate) fn record_uniform(&mut self, mask: ColorMask) {
        self.masks = [Some(mask); MAX_RENDER_TARGETS];
    }

    pub(crate) fn record_indexed(&mut self, rt: usize, mask: ColorMask) {
        self.masks[rt] = Some(mask);
        self.indexed = true;
    }

    pub(crate) fn reset(&mut self) {
        *self = ColorWriteMasks::default();
    }
}
