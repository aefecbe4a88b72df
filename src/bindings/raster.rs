// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Immediate-mode depth, stencil and rasterizer state.
//!
//! GL exposes these as toggles on the context rather than as objects, so the cache
//! keeps a flattened copy of each field.  Nothing is assumed about a fresh context:
//! every field starts unknown.

/// Comparison used by depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementSaturate,
    DecrementSaturate,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Polygon face addressed by two-sided stencil calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Front,
    Back,
}

impl Face {
    pub(crate) fn index(self) -> usize {
        match self {
            Face::Front => 0,
            Face::Back => 1,
        }
    }
}

/// Stencil test function for one face, compared as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFunc {
    pub func: CompareFunction,
    pub reference: i32,
    pub mask: u32,
}

/// Stencil operations for one face, compared as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilOps {
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

/// Depth and stencil state last set on the context.
///
/// `None` means the value is unknown and the next request must reach the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthStencilMirror {
    pub depth_test: Option<bool>,
    pub depth_writes: Option<bool>,
    pub depth_func: Option<CompareFunction>,
    pub stencil_test: Option<bool>,
    pub stencil_write_mask: Option<u8>,
    /// Indexed by face, front first.
    pub stencil_funcs: [Option<StencilFunc>; 2],
    pub stencil_ops: [Option<StencilOps>; 2],
}

/// Depth bias pair as passed to the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBias {
    pub constant: f32,
    pub slope_scaled: f32,
}

impl DepthBias {
    pub(crate) fn is_zero(self) -> bool {
        self.constant == 0.0 && self.slope_scaled == 0.0
    }
}

/// Rasterizer state last set on the context.  `None` is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RasterizerMirror {
    pub fill_mode: Option<FillMode>,
    pub cull_mode: Option<CullMode>,
    pub front_counter_clockwise: Option<bool>,
    pub depth_bias: Option<DepthBias>,
    pub depth_clamp: Option<bool>,
    pub scissor_test: Option<bool>,
}
