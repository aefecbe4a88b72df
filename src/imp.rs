// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The native seam.

Everything above this module talks to the driver through [`NativeGl`] and [`NativeEgl`].
Implementations only translate; they keep no state of their own beyond what the API
requires, and report failures as [`Error`] rather than logging them.

[`headless`] is always built.  The `backend_glow` feature adds a GL implementation on
top of the `glow` crate.
*/

mod error;

pub mod headless;

#[cfg(feature = "backend_glow")]
pub mod glow;

pub use error::{EglError, Error};

use std::num::NonZeroUsize;

use raw_window_handle::RawWindowHandle;

use crate::bindings::barrier::MemoryBarrier;
use crate::bindings::blend::{BlendFactor, BlendOperation, ColorMask};
use crate::bindings::raster::{CompareFunction, Face, FillMode, StencilOp};
use crate::bindings::slots::{ImageAccess, ImageFormat, TextureTarget};
use crate::caps::Limits;
use crate::object::NativeHandle;

/// Capabilities switched with `glEnable`/`glDisable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    DepthTest,
    StencilTest,
    CullFace,
    PolygonOffsetFill,
    DepthClamp,
    ScissorTest,
    Blend,
    SampleAlphaToCoverage,
    PrimitiveRestartFixedIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    Draw,
    Read,
}

/// Non-indexed buffer bind points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    CopyRead,
    CopyWrite,
    PixelPack,
    PixelUnpack,
    DrawIndirect,
    DispatchIndirect,
    Uniform,
    ShaderStorage,
    Texture,
}

impl BufferTarget {
    /// Binding to this target changes the currently bound vertex array.
    pub fn affects_vertex_array(self) -> bool {
        matches!(self, BufferTarget::Array | BufferTarget::ElementArray)
    }
}

/// Bind points that take an index and a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexedBufferTarget {
    Uniform,
    ShaderStorage,
}

/// Corners of a blit region, as `glBlitFramebuffer` takes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlitRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

/// Buffers copied by a blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlitMask {
    pub color: bool,
    pub depth: bool,
    pub stencil: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitFilter {
    Nearest,
    Linear,
}

/**
GL calls the binding cache issues.

Every call either succeeds or reports the error the driver raised.  The cache only
updates its mirror after `Ok`.
*/
pub trait NativeGl {
    fn query_limits(&mut self) -> Result<Limits, Error>;

    fn use_program(&mut self, program: Option<NativeHandle>) -> Result<(), Error>;
    fn bind_program_pipeline(&mut self, pipeline: Option<NativeHandle>) -> Result<(), Error>;
    fn bind_vertex_array(&mut self, vao: Option<NativeHandle>) -> Result<(), Error>;
    fn bind_framebuffer(
        &mut self,
        target: FramebufferTarget,
        framebuffer: Option<NativeHandle>,
    ) -> Result<(), Error>;

    /// `unit` is zero based; implementations add the `TEXTURE0` base.
    fn active_texture(&mut self, unit: u32) -> Result<(), Error>;
    fn bind_texture(
        &mut self,
        target: TextureTarget,
        texture: Option<NativeHandle>,
    ) -> Result<(), Error>;
    fn bind_sampler(&mut self, unit: u32, sampler: Option<NativeHandle>) -> Result<(), Error>;
    #[allow(clippy::too_many_arguments)]
    fn bind_image_texture(
        &mut self,
        unit: u32,
        texture: Option<NativeHandle>,
        level: i32,
        layered: bool,
        layer: i32,
        access: ImageAccess,
        format: ImageFormat,
    ) -> Result<(), Error>;
    fn bind_buffer_range(
        &mut self,
        target: IndexedBufferTarget,
        index: u32,
        buffer: Option<NativeHandle>,
        offset: i64,
        size: i64,
    ) -> Result<(), Error>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<NativeHandle>)
    -> Result<(), Error>;
    fn memory_barrier(&mut self, barriers: MemoryBarrier) -> Result<(), Error>;

    fn set_enabled(&mut self, toggle: Toggle, enabled: bool) -> Result<(), Error>;
    /// Per draw buffer blend enable.
    fn set_blend_enabled_indexed(&mut self, buffer: u32, enabled: bool) -> Result<(), Error>;

    fn depth_mask(&mut self, write: bool) -> Result<(), Error>;
    fn depth_func(&mut self, func: CompareFunction) -> Result<(), Error>;
    fn stencil_mask(&mut self, mask: u32) -> Result<(), Error>;
    fn stencil_func_separate(
        &mut self,
        face: Face,
        func: CompareFunction,
        reference: i32,
        mask: u32,
    ) -> Result<(), Error>;
    fn stencil_op_separate(
        &mut self,
        face: Face,
        fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    ) -> Result<(), Error>;
    /// Applies to both faces.
    fn polygon_mode(&mut self, mode: FillMode) -> Result<(), Error>;
    fn cull_face(&mut self, face: Face) -> Result<(), Error>;
    fn front_face(&mut self, counter_clockwise: bool) -> Result<(), Error>;
    fn polygon_offset(&mut self, slope_scaled: f32, constant: f32) -> Result<(), Error>;

    fn color_mask(&mut self, mask: ColorMask) -> Result<(), Error>;
    fn color_mask_indexed(&mut self, buffer: u32, mask: ColorMask) -> Result<(), Error>;
    /// `buffer` of `None` sets every draw buffer.
    fn blend_func_separate(
        &mut self,
        buffer: Option<u32>,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Result<(), Error>;
    fn blend_equation_separate(
        &mut self,
        buffer: Option<u32>,
        rgb: BlendOperation,
        alpha: BlendOperation,
    ) -> Result<(), Error>;
    fn blend_color(&mut self, rgba: [f32; 4]) -> Result<(), Error>;

    fn patch_vertices(&mut self, count: u32) -> Result<(), Error>;
    fn blit_framebuffer(
        &mut self,
        src: BlitRect,
        dst: BlitRect,
        mask: BlitMask,
        filter: BlitFilter,
    ) -> Result<(), Error>;
}

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonZeroUsize);

        impl $name {
            pub const fn new(raw: NonZeroUsize) -> Self {
                $name(raw)
            }

            pub const fn get(self) -> NonZeroUsize {
                self.0
            }
        }
    };
}

opaque_handle!(
    /// An `EGLDisplay`.
    DisplayHandle
);
opaque_handle!(
    /// An `EGLConfig`.
    ConfigHandle
);
opaque_handle!(
    /// An `EGLSurface`.
    SurfaceHandle
);
opaque_handle!(
    /// An `EGLContext`.  Also used to tell whether the cache's context is still current.
    ContextHandle
);

/// Client API version of a context, or of the display implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        ApiVersion { major, minor }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Framebuffer configuration to ask `eglChooseConfig` for.  Color channels are RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigRequest {
    pub color_bits: u8,
    pub depth_bits: u8,
}

/// Config attributes read back after choosing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigAttrib {
    NativeVisualId,
    MinSwapInterval,
    MaxSwapInterval,
}

/**
EGL calls the lifecycle manager issues.

Supplied by the platform layer.  Calls that can fail return the EGL error; queries that
only report current thread state return `Option`.
*/
pub trait NativeEgl {
    /// The default display, or `None` when the platform has none.
    fn get_display(&mut self) -> Option<DisplayHandle>;
    /// Initializes `display` and returns the EGL version it implements.
    fn initialize(&mut self, display: DisplayHandle) -> Result<ApiVersion, Error>;
    /// First matching config, or `None` when nothing matches.
    fn choose_config(
        &mut self,
        display: DisplayHandle,
        request: ConfigRequest,
    ) -> Result<Option<ConfigHandle>, Error>;
    fn config_attrib(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        attrib: ConfigAttrib,
    ) -> Result<i32, Error>;
    fn create_window_surface(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        window: RawWindowHandle,
    ) -> Result<SurfaceHandle, Error>;
    /// Reconfigures the window's buffers to `format`, the config's native visual id.
    fn set_window_buffers_geometry(
        &mut self,
        _window: RawWindowHandle,
        _format: i32,
    ) -> Result<(), Error> {
        Ok(())
    }
    fn create_context(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        version: ApiVersion,
    ) -> Result<ContextHandle, Error>;
    /// Binds `context` with `surface` for both draw and read.  `None` for `surface`
    /// keeps the context current without a surface.
    fn make_current(
        &mut self,
        display: DisplayHandle,
        surface: Option<SurfaceHandle>,
        context: Option<ContextHandle>,
    ) -> Result<(), Error>;
    fn current_surface(&mut self) -> Option<SurfaceHandle>;
    fn current_context(&mut self) -> Option<ContextHandle>;
    /// Client version of the current context.
    fn current_context_version(&mut self) -> Result<ApiVersion, Error>;
    fn query_surface_size(
        &mut self,
        display: DisplayHandle,
        surface: SurfaceHandle,
    ) -> Result<(u32, u32), Error>;
    fn swap_interval(&mut self, display: DisplayHandle, interval: i32) -> Result<(), Error>;
    fn swap_buffers(&mut self, display: DisplayHandle, surface: SurfaceHandle)
    -> Result<(), Error>;
    fn destroy_surface(
        &mut self,
        display: DisplayHandle,
        surface: SurfaceHandle,
    ) -> Result<(), Error>;
    fn destroy_context(
        &mut self,
        display: DisplayHandle,
        context: ContextHandle,
    ) -> Result<(), Error>;
    fn terminate(&mut self, display: DisplayHandle) -> Result<(), Error>;
    /// Hook for platforms that surface fatal initialization failures to the user.
    fn report_fatal(&mut self, _error: &crate::context::ContextError) {}
}
