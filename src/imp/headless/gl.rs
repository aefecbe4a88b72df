// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

use crate::bindings::barrier::MemoryBarrier;
use crate::bindings::blend::{BlendFactor, BlendOperation, ColorMask};
use crate::bindings::raster::{CompareFunction, Face, FillMode, StencilOp};
use crate::bindings::slots::{ImageAccess, ImageFormat, TextureTarget};
use crate::caps::Limits;
use crate::imp::{
    BlitFilter, BlitMask, BlitRect, BufferTarget, Error, FramebufferTarget, IndexedBufferTarget,
    NativeGl, Toggle,
};
use crate::object::NativeHandle;

/// One call received by [`HeadlessGl`].  Handles are raw names, `None` for zero.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    UseProgram(Option<u32>),
    BindProgramPipeline(Option<u32>),
    BindVertexArray(Option<u32>),
    BindFramebuffer(FramebufferTarget, Option<u32>),
    ActiveTexture(u32),
    BindTexture(TextureTarget, Option<u32>),
    BindSampler(u32, Option<u32>),
    BindImageTexture {
        unit: u32,
        texture: Option<u32>,
        level: i32,
        layered: bool,
        layer: i32,
        access: ImageAccess,
        format: ImageFormat,
    },
    BindBufferRange {
        target: IndexedBufferTarget,
        index: u32,
        buffer: Option<u32>,
        offset: i64,
        size: i64,
    },
    BindBuffer(BufferTarget, Option<u32>),
    MemoryBarrier(MemoryBarrier),
    SetEnabled(Toggle, bool),
    SetBlendEnabledIndexed(u32, bool),
    DepthMask(bool),
    DepthFunc(CompareFunction),
    StencilMask(u32),
    StencilFuncSeparate(Face, CompareFunction, i32, u32),
    StencilOpSeparate(Face, StencilOp, StencilOp, StencilOp),
    PolygonMode(FillMode),
    CullFace(Face),
    FrontFace(bool),
    PolygonOffset(f32, f32),
    ColorMask(ColorMask),
    ColorMaskIndexed(u32, ColorMask),
    BlendFuncSeparate(Option<u32>, [BlendFactor; 4]),
    BlendEquationSeparate(Option<u32>, BlendOperation, BlendOperation),
    BlendColor([f32; 4]),
    PatchVertices(u32),
    BlitFramebuffer(BlitRect, BlitRect, BlitMask, BlitFilter),
}

/// `GL_INVALID_OPERATION`, the error injected by [`HeadlessGl::fail_next`] by default.
const INVALID_OPERATION: u32 = 0x0502;

/// Recording GL backend.
#[derive(Debug, Clone)]
pub struct HeadlessGl {
    limits: Limits,
    calls: Vec<GlCall>,
    fail_next: Option<u32>,
}

impl Default for HeadlessGl {
    fn default() -> Self {
        HeadlessGl::with_limits(Limits {
            max_combined_texture_units: 32,
            max_draw_buffers: 8,
            max_uniform_buffer_bindings: 24,
            max_image_units: 8,
            max_storage_buffer_bindings: 8,
        })
    }
}

impl HeadlessGl {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend reporting `limits` from [`NativeGl::query_limits`].
    pub fn with_limits(limits: Limits) -> Self {
        HeadlessGl {
            limits,
            calls: Vec::new(),
            fail_next: None,
        }
    }

    /// Every call received since the last [`HeadlessGl::clear_calls`].
    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&GlCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Makes the next state-changing call fail with `GL_INVALID_OPERATION`.
    /// The failed call is not recorded.
    pub fn fail_next(&mut self) {
        self.fail_next = Some(INVALID_OPERATION);
    }

    fn record(&mut self, call: &'static str, entry: GlCall) -> Result<(), Error> {
        if let Some(code) = self.fail_next.take() {
            return Err(Error::Gl { call, code });
        }
        self.calls.push(entry);
        Ok(())
    }
}

fn raw(handle: Option<NativeHandle>) -> Option<u32> {
    handle.map(NativeHandle::get)
}

impl NativeGl for HeadlessGl {
    fn query_limits(&mut self) -> Result<Limits, Error> {
        Ok(self.limits)
    }

    fn use_program(&mut self, program: Option<NativeHandle>) -> Result<(), Error> {
        self.record("glUseProgram", GlCall::UseProgram(raw(program)))
    }

    fn bind_program_pipeline(&mut self, pipeline: Option<NativeHandle>) -> Result<(), Error> {
        self.record(
            "glBindProgramPipeline",
            GlCall::BindProgramPipeline(raw(pipeline)),
        )
    }

    fn bind_vertex_array(&mut self, vao: Option<NativeHandle>) -> Result<(), Error> {
        self.record("glBindVertexArray", GlCall::BindVertexArray(raw(vao)))
    }

    fn bind_framebuffer(
        &mut self,
        target: FramebufferTarget,
        framebuffer: Option<NativeHandle>,
    ) -> Result<(), Error> {
        self.record(
            "glBindFramebuffer",
            GlCall::BindFramebuffer(target, raw(framebuffer)),
        )
    }

    fn active_texture(&mut self, unit: u32) -> Result<(), Error> {
        self.record("glActiveTexture", GlCall::ActiveTexture(unit))
    }

    fn bind_texture(
        &mut self,
        target: TextureTarget,
        texture: Option<NativeHandle>,
    ) -> Result<(), Error> {
        self.record("glBindTexture", GlCall::BindTexture(target, raw(texture)))
    }

    fn bind_sampler(&mut self, unit: u32, sampler: Option<NativeHandle>) -> Result<(), Error> {
        self.record("glBindSampler", GlCall::BindSampler(unit, raw(sampler)))
    }

    fn bind_image_texture(
        &mut self,
        unit: u32,
        texture: Option<NativeHandle>,
        level: i32,
        layered: bool,
        layer: i32,
        access: ImageAccess,
        format: ImageFormat,
    ) -> Result<(), Error> {
        self.record(
            "glBindImageTexture",
            GlCall::BindImageTexture {
                unit,
                texture: raw(texture),
                level,
                layered,
                layer,
                access,
                format,
            },
        )
    }

    fn bind_buffer_range(
        &mut self,
        target: IndexedBufferTarget,
        index: u32,
        buffer: Option<NativeHandle>,
        offset: i64,
        size: i64,
    ) -> Result<(), Error> {
        self.record(
            "glBindBufferRange",
            GlCall::BindBufferRange {
                target,
                index,
                buffer: raw(buffer),
                offset,
                size,
            },
        )
    }

    fn bind_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<NativeHandle>,
    ) -> Result<(), Error> {
        self.record("glBindBuffer", GlCall::BindBuffer(target, raw(buffer)))
    }

    fn memory_barrier(&mut self, barriers: MemoryBarrier) -> Result<(), Error> {
        self.record("glMemoryBarrier", GlCall::MemoryBarrier(barriers))
    }

    fn set_enabled(&mut self, toggle: Toggle, enabled: bool) -> Result<(), Error> {
        let call = if enabled { "glEnable" } else { "glDisable" };
        self.record(call, GlCall::SetEnabled(toggle, enabled))
    }

    fn set_blend_enabled_indexed(&mut self, buffer: u32, enabled: bool) -> Result<(), Error> {
        let call = if enabled { "glEnablei" } else { "glDisablei" };
        self.record(call, GlCall::SetBlendEnabledIndexed(buffer, enabled))
    }

    fn depth_mask(&mut self, write: bool) -> Result<(), Error> {
        self.record("glDepthMask", GlCall::DepthMask(write))
    }

    fn depth_func(&mut self, func: CompareFunction) -> Result<(), Error> {
        self.record("glDepthFunc", GlCall::DepthFunc(func))
    }

    fn stencil_mask(&mut self, mask: u32) -> Result<(), Error> {
        self.record("glStencilMask", GlCall::StencilMask(mask))
    }

    fn stencil_func_separate(
        &mut self,
        face: Face,
        func: CompareFunction,
        reference: i32,
        mask: u32,
    ) -> Result<(), Error> {
        self.record(
            "glStencilFuncSeparate",
            GlCall::StencilFuncSeparate(face, func, reference, mask),
        )
    }

    fn stencil_op_separate(
        &mut self,
        face: Face,
        fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    ) -> Result<(), Error> {
        self.record(
            "glStencilOpSeparate",
            GlCall::StencilOpSeparate(face, fail, depth_fail, pass),
        )
    }

    fn polygon_mode(&mut self, mode: FillMode) -> Result<(), Error> {
        self.record("glPolygonMode", GlCall::PolygonMode(mode))
    }

    fn cull_face(&mut self, face: Face) -> Result<(), Error> {
        self.record("glCullFace", GlCall::CullFace(face))
    }

    fn front_face(&mut self, counter_clockwise: bool) -> Result<(), Error> {
        self.record("glFrontFace", GlCall::FrontFace(counter_clockwise))
    }

    fn polygon_offset(&mut self, slope_scaled: f32, constant: f32) -> Result<(), Error> {
        self.record(
            "glPolygonOffset",
            GlCall::PolygonOffset(slope_scaled, constant),
        )
    }

    fn color_mask(&mut self, mask: ColorMask) -> Result<(), Error> {
        self.record("glColorMask", GlCall::ColorMask(mask))
    }

    fn color_mask_indexed(&mut self, buffer: u32, mask: ColorMask) -> Result<(), Error> {
        self.record("glColorMaski", GlCall::ColorMaskIndexed(buffer, mask))
    }

    fn blend_func_separate(
        &mut self,
        buffer: Option<u32>,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Result<(), Error> {
        self.record(
            "glBlendFuncSeparate",
            GlCall::BlendFuncSeparate(buffer, [src_rgb, dst_rgb, src_alpha, dst_alpha]),
        )
    }

    fn blend_equation_separate(
        &mut self,
        buffer: Option<u32>,
        rgb: BlendOperation,
        alpha: BlendOperation,
    ) -> Result<(), Error> {
        self.record(
            "glBlendEquationSeparate",
            GlCall::BlendEquationSeparate(buffer, rgb, alpha),
        )
    }

    fn blend_color(&mut self, rgba: [f32; 4]) -> Result<(), Error> {
        self.record("glBlendColor", GlCall::BlendColor(rgba))
    }

    fn patch_vertices(&mut self, count: u32) -> Result<(), Error> {
        self.record("glPatchParameteri", GlCall::PatchVertices(count))
    }

    fn blit_framebuffer(
        &mut self,
        src: BlitRect,
        dst: BlitRect,
        mask: BlitMask,
        filter: BlitFilter,
    ) -> Result<(), Error> {
        self.record(
            "glBlitFramebuffer",
            GlCall::BlitFramebuffer(src, dst, mask, filter),
        )
    }
}
