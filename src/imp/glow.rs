// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
GL backend on top of the `glow` crate.

Errors are only checked in debug builds: `glGetError` forces a round trip to the driver,
so release builds report every call as successful.
*/

use glow::HasContext;

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

/// GL through a loaded `glow::Context`.  The context must be current on this thread for
/// every call.
pub struct GlowBackend {
    gl: glow::Context,
}

impl std::fmt::Debug for GlowBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowBackend").finish_non_exhaustive()
    }
}

impl GlowBackend {
    pub fn new(gl: glow::Context) -> Self {
        GlowBackend { gl }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    pub fn into_gl(self) -> glow::Context {
        self.gl
    }

    fn check(&self, call: &'static str) -> Result<(), Error> {
        if cfg!(debug_assertions) {
            // SAFETY: the context is current per the type's contract.
            let code = unsafe { self.gl.get_error() };
            if code != glow::NO_ERROR {
                return Err(Error::Gl { call, code });
            }
        }
        Ok(())
    }

    fn get(&self, parameter: u32, call: &'static str) -> Result<u32, Error> {
        // SAFETY: the context is current per the type's contract.
        let value = unsafe { self.gl.get_parameter_i32(parameter) };
        self.check(call)?;
        Ok(value.max(0) as u32)
    }

    /// Like `get`, for limits that ES 3.0 does not define.  An unknown enum reads as zero.
    fn get_or_zero(&self, parameter: u32) -> u32 {
        // SAFETY: the context is current per the type's contract.
        unsafe {
            let value = self.gl.get_parameter_i32(parameter);
            if self.gl.get_error() != glow::NO_ERROR {
                return 0;
            }
            value.max(0) as u32
        }
    }
}

/// `glBindBufferRange` takes 32-bit offsets through glow.  Ranges that do not fit are
/// rejected instead of being truncated.
fn buffer_range(offset: i64, size: i64) -> Result<(i32, i32), Error> {
    let invalid = Error::Gl {
        call: "glBindBufferRange",
        code: glow::INVALID_VALUE,
    };
    let offset = i32::try_from(offset).map_err(|_| invalid)?;
    let size = i32::try_from(size).map_err(|_| invalid)?;
    Ok((offset, size))
}

fn toggle(toggle: Toggle) -> u32 {
    match toggle {
        Toggle::DepthTest => glow::DEPTH_TEST,
        Toggle::StencilTest => glow::STENCIL_TEST,
        Toggle::CullFace => glow::CULL_FACE,
        Toggle::PolygonOffsetFill => glow::POLYGON_OFFSET_FILL,
        Toggle::DepthClamp => glow::DEPTH_CLAMP,
        Toggle::ScissorTest => glow::SCISSOR_TEST,
        Toggle::Blend => glow::BLEND,
        Toggle::SampleAlphaToCoverage => glow::SAMPLE_ALPHA_TO_COVERAGE,
        Toggle::PrimitiveRestartFixedIndex => glow::PRIMITIVE_RESTART_FIXED_INDEX,
    }
}

fn texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::Texture2DArray => glow::TEXTURE_2D_ARRAY,
        TextureTarget::Texture2DMultisample => glow::TEXTURE_2D_MULTISAMPLE,
        TextureTarget::Texture2DMultisampleArray => glow::TEXTURE_2D_MULTISAMPLE_ARRAY,
        TextureTarget::Texture3D => glow::TEXTURE_3D,
        TextureTarget::CubeMap => glow::TEXTURE_CUBE_MAP,
        TextureTarget::CubeMapArray => glow::TEXTURE_CUBE_MAP_ARRAY,
        TextureTarget::Buffer => glow::TEXTURE_BUFFER,
        // GL_TEXTURE_EXTERNAL_OES
        TextureTarget::External => 0x8D65,
    }
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
        BufferTarget::CopyRead => glow::COPY_READ_BUFFER,
        BufferTarget::CopyWrite => glow::COPY_WRITE_BUFFER,
        BufferTarget::PixelPack => glow::PIXEL_PACK_BUFFER,
        BufferTarget::PixelUnpack => glow::PIXEL_UNPACK_BUFFER,
        BufferTarget::DrawIndirect => glow::DRAW_INDIRECT_BUFFER,
        BufferTarget::DispatchIndirect => glow::DISPATCH_INDIRECT_BUFFER,
        BufferTarget::Uniform => glow::UNIFORM_BUFFER,
        BufferTarget::ShaderStorage => glow::SHADER_STORAGE_BUFFER,
        BufferTarget::Texture => glow::TEXTURE_BUFFER,
    }
}

fn compare_function(func: CompareFunction) -> u32 {
    match func {
        CompareFunction::Never => glow::NEVER,
        CompareFunction::Less => glow::LESS,
        CompareFunction::Equal => glow::EQUAL,
        CompareFunction::LessEqual => glow::LEQUAL,
        CompareFunction::Greater => glow::GREATER,
        CompareFunction::NotEqual => glow::NOTEQUAL,
        CompareFunction::GreaterEqual => glow::GEQUAL,
        CompareFunction::Always => glow::ALWAYS,
    }
}

fn stencil_op(op: StencilOp) -> u32 {
    match op {
        StencilOp::Keep => glow::KEEP,
        StencilOp::Zero => glow::ZERO,
        StencilOp::Replace => glow::REPLACE,
        StencilOp::IncrementSaturate => glow::INCR,
        StencilOp::DecrementSaturate => glow::DECR,
        StencilOp::Invert => glow::INVERT,
        StencilOp::IncrementWrap => glow::INCR_WRAP,
        StencilOp::DecrementWrap => glow::DECR_WRAP,
    }
}

fn face(face: Face) -> u32 {
    match face {
        Face::Front => glow::FRONT,
        Face::Back => glow::BACK,
    }
}

fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::InvSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::InvSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DestAlpha => glow::DST_ALPHA,
        BlendFactor::InvDestAlpha => glow::ONE_MINUS_DST_ALPHA,
        BlendFactor::DestColor => glow::DST_COLOR,
        BlendFactor::InvDestColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlphaSat => glow::SRC_ALPHA_SATURATE,
        BlendFactor::BlendFactor => glow::CONSTANT_COLOR,
        BlendFactor::InvBlendFactor => glow::ONE_MINUS_CONSTANT_COLOR,
        BlendFactor::Src1Color => glow::SRC1_COLOR,
        BlendFactor::InvSrc1Color => glow::ONE_MINUS_SRC1_COLOR,
        BlendFactor::Src1Alpha => glow::SRC1_ALPHA,
        BlendFactor::InvSrc1Alpha => glow::ONE_MINUS_SRC1_ALPHA,
    }
}

fn blend_operation(op: BlendOperation) -> u32 {
    match op {
        BlendOperation::Add => glow::FUNC_ADD,
        BlendOperation::Subtract => glow::FUNC_SUBTRACT,
        BlendOperation::RevSubtract => glow::FUNC_REVERSE_SUBTRACT,
        BlendOperation::Min => glow::MIN,
        BlendOperation::Max => glow::MAX,
    }
}

fn image_access(access: ImageAccess) -> u32 {
    match access {
        ImageAccess::ReadOnly => glow::READ_ONLY,
        ImageAccess::WriteOnly => glow::WRITE_ONLY,
        ImageAccess::ReadWrite => glow::READ_WRITE,
    }
}

fn channels(mask: ColorMask) -> (bool, bool, bool, bool) {
    (
        mask.contains(ColorMask::RED),
        mask.contains(ColorMask::GREEN),
        mask.contains(ColorMask::BLUE),
        mask.contains(ColorMask::ALPHA),
    )
}

// SAFETY for every block below: the context is current per the type's contract, and
// every handle passed was created on it by the resource layer.
impl NativeGl for GlowBackend {
    fn query_limits(&mut self) -> Result<Limits, Error> {
        Ok(Limits {
            max_combined_texture_units: self.get(
                glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS,
                "glGetIntegerv(GL_MAX_COMBINED_TEXTURE_IMAGE_UNITS)",
            )?,
            max_draw_buffers: self.get(glow::MAX_DRAW_BUFFERS, "glGetIntegerv(GL_MAX_DRAW_BUFFERS)")?,
            max_uniform_buffer_bindings: self.get(
                glow::MAX_UNIFORM_BUFFER_BINDINGS,
                "glGetIntegerv(GL_MAX_UNIFORM_BUFFER_BINDINGS)",
            )?,
            max_image_units: self.get_or_zero(glow::MAX_IMAGE_UNITS),
            max_storage_buffer_bindings: self.get_or_zero(glow::MAX_SHADER_STORAGE_BUFFER_BINDINGS),
        })
    }

    fn use_program(&mut self, program: Option<NativeHandle>) -> Result<(), Error> {
        unsafe {
            self.gl
                .use_program(program.map(|h| glow::NativeProgram(h.non_zero())))
        };
        self.check("glUseProgram")
    }

    fn bind_program_pipeline(&mut self, pipeline: Option<NativeHandle>) -> Result<(), Error> {
        unsafe {
            self.gl
                .bind_program_pipeline(pipeline.map(|h| glow::NativeProgramPipeline(h.non_zero())))
        };
        self.check("glBindProgramPipeline")
    }

    fn bind_vertex_array(&mut self, vao: Option<NativeHandle>) -> Result<(), Error> {
        unsafe {
            self.gl
                .bind_vertex_array(vao.map(|h| glow::NativeVertexArray(h.non_zero())))
        };
        self.check("glBindVertexArray")
    }

    fn bind_framebuffer(
        &mut self,
        target: FramebufferTarget,
        framebuffer: Option<NativeHandle>,
    ) -> Result<(), Error> {
        let target = match target {
            FramebufferTarget::Draw => glow::DRAW_FRAMEBUFFER,
            FramebufferTarget::Read => glow::READ_FRAMEBUFFER,
        };
        unsafe {
            self.gl.bind_framebuffer(
                target,
                framebuffer.map(|h| glow::NativeFramebuffer(h.non_zero())),
            )
        };
        self.check("glBindFramebuffer")
    }

    fn active_texture(&mut self, unit: u32) -> Result<(), Error> {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
        self.check("glActiveTexture")
    }

    fn bind_texture(
        &mut self,
        target: TextureTarget,
        texture: Option<NativeHandle>,
    ) -> Result<(), Error> {
        unsafe {
            self.gl.bind_texture(
                texture_target(target),
                texture.map(|h| glow::NativeTexture(h.non_zero())),
            )
        };
        self.check("glBindTexture")
    }

    fn bind_sampler(&mut self, unit: u32, sampler: Option<NativeHandle>) -> Result<(), Error> {
        unsafe {
            self.gl
                .bind_sampler(unit, sampler.map(|h| glow::NativeSampler(h.non_zero())))
        };
        self.check("glBindSampler")
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
        unsafe {
            self.gl.bind_image_texture(
                unit,
                texture.map(|h| glow::NativeTexture(h.non_zero())),
                level,
                layered,
                layer,
                image_access(access),
                format.0,
            )
        };
        self.check("glBindImageTexture")
    }

    fn bind_buffer_range(
        &mut self,
        target: IndexedBufferTarget,
        index: u32,
        buffer: Option<NativeHandle>,
        offset: i64,
        size: i64,
    ) -> Result<(), Error> {
        let target = match target {
            IndexedBufferTarget::Uniform => glow::UNIFORM_BUFFER,
            IndexedBufferTarget::ShaderStorage => glow::SHADER_STORAGE_BUFFER,
        };
        let (offset, size) = buffer_range(offset, size)?;
        unsafe {
            self.gl.bind_buffer_range(
                target,
                index,
                buffer.map(|h| glow::NativeBuffer(h.non_zero())),
                offset,
                size,
            )
        };
        self.check("glBindBufferRange")
    }

    fn bind_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<NativeHandle>,
    ) -> Result<(), Error> {
        unsafe {
            self.gl.bind_buffer(
                buffer_target(target),
                buffer.map(|h| glow::NativeBuffer(h.non_zero())),
            )
        };
        self.check("glBindBuffer")
    }

    fn memory_barrier(&mut self, barriers: MemoryBarrier) -> Result<(), Error> {
        unsafe { self.gl.memory_barrier(barriers.bits()) };
        self.check("glMemoryBarrier")
    }

    fn set_enabled(&mut self, t: Toggle, enabled: bool) -> Result<(), Error> {
        if enabled {
            unsafe { self.gl.enable(toggle(t)) };
            self.check("glEnable")
        } else {
            unsafe { self.gl.disable(toggle(t)) };
            self.check("glDisable")
        }
    }

    fn set_blend_enabled_indexed(&mut self, buffer: u32, enabled: bool) -> Result<(), Error> {
        if enabled {
            unsafe { self.gl.enable_draw_buffer(glow::BLEND, buffer) };
            self.check("glEnablei")
        } else {
            unsafe { self.gl.disable_draw_buffer(glow::BLEND, buffer) };
            self.check("glDisablei")
        }
    }

    fn depth_mask(&mut self, write: bool) -> Result<(), Error> {
        unsafe { self.gl.depth_mask(write) };
        self.check("glDepthMask")
    }

    fn depth_func(&mut self, func: CompareFunction) -> Result<(), Error> {
        unsafe { self.gl.depth_func(compare_function(func)) };
        self.check("glDepthFunc")
    }

    fn stencil_mask(&mut self, mask: u32) -> Result<(), Error> {
        unsafe { self.gl.stencil_mask(mask) };
        self.check("glStencilMask")
    }

    fn stencil_func_separate(
        &mut self,
        f: Face,
        func: CompareFunction,
        reference: i32,
        mask: u32,
    ) -> Result<(), Error> {
        unsafe {
            self.gl
                .stencil_func_separate(face(f), compare_function(func), reference, mask)
        };
        self.check("glStencilFuncSeparate")
    }

    fn stencil_op_separate(
        &mut self,
        f: Face,
        fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    ) -> Result<(), Error> {
        unsafe {
            self.gl.stencil_op_separate(
                face(f),
                stencil_op(fail),
                stencil_op(depth_fail),
                stencil_op(pass),
            )
        };
        self.check("glStencilOpSeparate")
    }

    fn polygon_mode(&mut self, mode: FillMode) -> Result<(), Error> {
        let mode = match mode {
            FillMode::Solid => glow::FILL,
            FillMode::Wireframe => glow::LINE,
        };
        unsafe { self.gl.polygon_mode(glow::FRONT_AND_BACK, mode) };
        self.check("glPolygonMode")
    }

    fn cull_face(&mut self, f: Face) -> Result<(), Error> {
        unsafe { self.gl.cull_face(face(f)) };
        self.check("glCullFace")
    }

    fn front_face(&mut self, counter_clockwise: bool) -> Result<(), Error> {
        let mode = if counter_clockwise { glow::CCW } else { glow::CW };
        unsafe { self.gl.front_face(mode) };
        self.check("glFrontFace")
    }

    fn polygon_offset(&mut self, slope_scaled: f32, constant: f32) -> Result<(), Error> {
        unsafe { self.gl.polygon_offset(slope_scaled, constant) };
        self.check("glPolygonOffset")
    }

    fn color_mask(&mut self, mask: ColorMask) -> Result<(), Error> {
        let (r, g, b, a) = channels(mask);
        unsafe { self.gl.color_mask(r, g, b, a) };
        self.check("glColorMask")
    }

    fn color_mask_indexed(&mut self, buffer: u32, mask: ColorMask) -> Result<(), Error> {
        let (r, g, b, a) = channels(mask);
        unsafe { self.gl.color_mask_draw_buffer(buffer, r, g, b, a) };
        self.check("glColorMaski")
    }

    fn blend_func_separate(
        &mut self,
        buffer: Option<u32>,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Result<(), Error> {
        let (sr, dr, sa, da) = (
            blend_factor(src_rgb),
            blend_factor(dst_rgb),
            blend_factor(src_alpha),
            blend_factor(dst_alpha),
        );
        match buffer {
            Some(i) => unsafe { self.gl.blend_func_separate_draw_buffer(i, sr, dr, sa, da) },
            None => unsafe { self.gl.blend_func_separate(sr, dr, sa, da) },
        }
        self.check("glBlendFuncSeparate")
    }

    fn blend_equation_separate(
        &mut self,
        buffer: Option<u32>,
        rgb: BlendOperation,
        alpha: BlendOperation,
    ) -> Result<(), Error> {
        let (rgb, alpha) = (blend_operation(rgb), blend_operation(alpha));
        match buffer {
            Some(i) => unsafe { self.gl.blend_equation_separate_draw_buffer(i, rgb, alpha) },
            None => unsafe { self.gl.blend_equation_separate(rgb, alpha) },
        }
        self.check("glBlendEquationSeparate")
    }

    fn blend_color(&mut self, rgba: [f32; 4]) -> Result<(), Error> {
        unsafe { self.gl.blend_color(rgba[0], rgba[1], rgba[2], rgba[3]) };
        self.check("glBlendColor")
    }

    fn patch_vertices(&mut self, count: u32) -> Result<(), Error> {
        unsafe {
            self.gl
                .patch_parameter_i32(glow::PATCH_VERTICES, count as i32)
        };
        self.check("glPatchParameteri")
    }

    fn blit_framebuffer(
        &mut self,
        src: BlitRect,
        dst: BlitRect,
        mask: BlitMask,
        filter: BlitFilter,
    ) -> Result<(), Error> {
        let mut bits = 0;
        if mask.color {
            bits |= glow::COLOR_BUFFER_BIT;
        }
        if mask.depth {
            bits |= glow::DEPTH_BUFFER_BIT;
        }
        if mask.stencil {
            bits |= glow::STENCIL_BUFFER_BIT;
        }
        let filter = match filter {
            BlitFilter::Nearest => glow::NEAREST,
            BlitFilter::Linear => glow::LINEAR,
        };
        unsafe {
            self.gl.blit_framebuffer(
                src.x0, src.y0, src.x1, src.y1, dst.x0, dst.y0, dst.x1, dst.y1, bits, filter,
            )
        };
        self.check("glBlitFramebuffer")
    }
}
