// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

use crate::bindings::barrier::{self, MemoryBarrier, PendingBarriers};
use crate::bindings::blend::{BlendStateDesc, ColorMask, ColorWriteMasks, MAX_RENDER_TARGETS};
use crate::bindings::raster::{
    CompareFunction, CullMode, DepthBias, DepthStencilMirror, Face, FillMode, RasterizerMirror,
    StencilFunc, StencilOp, StencilOps,
};
use crate::bindings::slots::{
    BoundBufferRange, BoundImage, BoundTexture, ImageAccess, ImageFormat, SlotTable,
    TextureTarget,
};
use crate::bindings::{SlotKind, StateError};
use crate::caps::{Capabilities, DeviceFeatures};
use crate::imp::{
    BlitFilter, BlitMask, BlitRect, BufferTarget, ContextHandle, FramebufferTarget,
    IndexedBufferTarget, NativeGl, Toggle,
};
use crate::object::{GpuObject, UniqueId, handle_of, id_of};

/// Texture slot entry.  `target` is `None` until something is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TextureEntry {
    id: UniqueId,
    target: Option<TextureTarget>,
}

impl TextureEntry {
    const EMPTY: TextureEntry = TextureEntry {
        id: UniqueId::NULL,
        target: None,
    };

    fn matches(&self, bound: BoundTexture) -> bool {
        self.id == bound.id && self.target == Some(bound.target)
    }
}

/// Whether binding `requested` needs a native call.  `None` in the cache means unknown.
fn identity_changed(cached: Option<UniqueId>, requested: UniqueId) -> bool {
    cached != Some(requested)
}

/// Rejects `slot` before any call when the device has `limit` slots of `kind`.
fn check_slot(kind: SlotKind, slot: u32, limit: u32) -> Result<(), StateError> {
    if slot < limit {
        return Ok(());
    }
    logwise::error_sync!(
        "{kind} {slot} is out of range (limit {limit})",
        kind = logwise::privacy::LogIt(&kind),
        slot = slot,
        limit = limit
    );
    Err(StateError::SlotOutOfRange {
        kind,
        slot: i64::from(slot),
        limit,
    })
}

/**
Mirror of the bindings on one native context.

Every setter compares the request with the mirror and calls into `G` only when they
differ.  The mirror is written after the native call returns `Ok`, so a failed call
leaves the entry as it was and the next request tries again.

The cache never owns the objects it binds.  It reads [`GpuObject::unique_id`] for
comparisons and [`GpuObject::native_handle`] for the call, and remembers only the id.
*/
#[derive(Debug)]
pub struct ContextState<G: NativeGl> {
    gl: G,
    caps: Capabilities,
    native_context: Option<ContextHandle>,

    pending_barriers: MemoryBarrier,

    program: Option<UniqueId>,
    pipeline: Option<UniqueId>,
    vertex_array: Option<UniqueId>,
    framebuffer: Option<UniqueId>,

    active_texture: Option<u32>,
    textures: SlotTable<TextureEntry>,
    samplers: SlotTable<Option<UniqueId>>,
    images: SlotTable<Option<BoundImage>>,
    uniform_buffers: SlotTable<BoundBufferRange>,
    storage_blocks: SlotTable<BoundBufferRange>,

    depth_stencil: DepthStencilMirror,
    rasterizer: RasterizerMirror,
    color_masks: ColorWriteMasks,
    patch_vertices: Option<u32>,
}

impl<G: NativeGl> ContextState<G> {
    /// Builds the cache for the context currently bound on this thread.
    ///
    /// Queries the device limits through `gl`, then resets the context to the
    /// baseline described on [`ContextState::invalidate`].
    pub fn new(
        mut gl: G,
        features: DeviceFeatures,
        native_context: Option<ContextHandle>,
    ) -> Result<Self, StateError> {
        let caps = Capabilities::query(&mut gl, features)?;
        let units = caps.max_combined_texture_units() as usize;
        let ubos = caps.max_uniform_buffer_bindings() as usize;
        let image_units = caps.max_image_units() as usize;
        let ssbos = caps.max_storage_buffer_bindings() as usize;
        let mut state = ContextState {
            gl,
            caps,
            native_context,
            pending_barriers: MemoryBarrier::empty(),
            program: None,
            pipeline: None,
            vertex_array: None,
            framebuffer: None,
            active_texture: None,
            textures: SlotTable::new(TextureEntry::EMPTY, units),
            samplers: SlotTable::new(None, units),
            images: SlotTable::new(None, image_units),
            uniform_buffers: SlotTable::new(BoundBufferRange::default(), ubos),
            storage_blocks: SlotTable::new(BoundBufferRange::default(), ssbos),
            depth_stencil: DepthStencilMirror::default(),
            rasterizer: RasterizerMirror::default(),
            color_masks: ColorWriteMasks::default(),
            patch_vertices: None,
        };
        state.invalidate()?;
        Ok(state)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// The native context this mirror was last synchronized against.
    pub fn current_native_context(&self) -> Option<ContextHandle> {
        self.native_context
    }

    pub(crate) fn set_native_context(&mut self, context: Option<ContextHandle>) {
        self.native_context = context;
    }

    pub fn native(&self) -> &G {
        &self.gl
    }

    /// Direct access to the backend.  Calls made through it bypass the mirror.
    pub fn native_mut(&mut self) -> &mut G {
        &mut self.gl
    }

    /**
    Forgets everything the mirror knows and puts the context in a known baseline.

    Outstanding memory barriers are executed first.  Android drivers raise an error for
    that flush, so there the mask is kept and the barriers run when next needed.  Then
    program 0, pipeline 0 (where pipelines exist), vertex array 0 and framebuffer 0 are
    bound.  Every other entry becomes unknown or empty, so the next request of any value
    reaches the driver.
    */
    pub fn invalidate(&mut self) -> Result<(), StateError> {
        logwise::trace_sync!("ContextState::invalidate");
        self.program = None;
        // Without pipeline objects nothing can ever be bound there.
        self.pipeline = if self.caps.is_program_pipeline_supported() {
            None
        } else {
            Some(UniqueId::NULL)
        };
        self.vertex_array = None;
        self.framebuffer = None;
        self.active_texture = None;
        self.textures.clear();
        self.samplers.clear();
        self.images.clear();
        self.uniform_buffers.clear();
        self.storage_blocks.clear();
        self.depth_stencil = DepthStencilMirror::default();
        self.rasterizer = RasterizerMirror::default();
        self.color_masks.reset();
        self.patch_vertices = None;

        #[cfg(not(target_os = "android"))]
        if !self.pending_barriers.is_empty() {
            self.ensure_memory_barrier(self.pending_barriers, None)?;
            self.pending_barriers = MemoryBarrier::empty();
        }

        self.gl.use_program(None)?;
        if self.caps.is_program_pipeline_supported() {
            self.gl.bind_program_pipeline(None)?;
        }
        self.gl.bind_vertex_array(None)?;
        self.gl.bind_framebuffer(FramebufferTarget::Draw, None)?;
        self.gl.bind_framebuffer(FramebufferTarget::Read, None)?;
        Ok(())
    }

    pub fn set_program(&mut self, program: Option<&dyn GpuObject>) -> Result<(), StateError> {
        let id = id_of(program);
        if identity_changed(self.program, id) {
            self.gl.use_program(handle_of(program))?;
            self.program = Some(id);
        }
        Ok(())
    }

    /// Binds a separable program pipeline.
    ///
    /// Fails with [`StateError::Unsupported`] when the device has no pipeline objects
    /// and the request would change the binding.
    pub fn set_pipeline(&mut self, pipeline: Option<&dyn GpuObject>) -> Result<(), StateError> {
        let id = id_of(pipeline);
        if identity_changed(self.pipeline, id) {
            if !self.caps.is_program_pipeline_supported() {
                logwise::error_sync!("Program pipelines are not supported on this device");
                return Err(StateError::Unsupported {
                    operation: "set_pipeline",
                });
            }
            self.gl.bind_program_pipeline(handle_of(pipeline))?;
            self.pipeline = Some(id);
        }
        Ok(())
    }

    pub fn bind_vertex_array(&mut self, vao: Option<&dyn GpuObject>) -> Result<(), StateError> {
        let id = id_of(vao);
        if identity_changed(self.vertex_array, id) {
            self.gl.bind_vertex_array(handle_of(vao))?;
            self.vertex_array = Some(id);
        }
        Ok(())
    }

    /// Binds `framebuffer` as both the draw and the read framebuffer.
    pub fn bind_framebuffer(
        &mut self,
        framebuffer: Option<&dyn GpuObject>,
    ) -> Result<(), StateError> {
        let id = id_of(framebuffer);
        if identity_changed(self.framebuffer, id) {
            let handle = handle_of(framebuffer);
            self.gl.bind_framebuffer(FramebufferTarget::Draw, handle)?;
            // Draw is already rebound; forget the entry until read succeeds too.
            self.framebuffer = None;
            self.gl.bind_framebuffer(FramebufferTarget::Read, handle)?;
            self.framebuffer = Some(id);
        }
        Ok(())
    }

    fn resolve_texture_unit(&self, unit: i32) -> Result<u32, StateError> {
        let limit = self.caps.max_combined_texture_units();
        let resolved = if unit < 0 {
            i64::from(unit) + i64::from(limit)
        } else {
            i64::from(unit)
        };
        if resolved < 0 || resolved >= i64::from(limit) {
            logwise::error_sync!(
                "Texture unit {unit} is out of range (limit {limit})",
                unit = unit,
                limit = limit
            );
            return Err(StateError::SlotOutOfRange {
                kind: SlotKind::TextureUnit,
                slot: i64::from(unit),
                limit,
            });
        }
        Ok(resolved as u32)
    }

    /// Selects the active texture unit.  Negative values count back from the unit limit,
    /// so `-1` is the last unit.
    pub fn set_active_texture(&mut self, unit: i32) -> Result<(), StateError> {
        let unit = self.resolve_texture_unit(unit)?;
        self.activate(unit)
    }

    fn activate(&mut self, unit: u32) -> Result<(), StateError> {
        if self.active_texture != Some(unit) {
            self.gl.active_texture(unit)?;
            self.active_texture = Some(unit);
        }
        Ok(())
    }

    /**
    Binds `texture` to `target` on `unit`, making `unit` active.

    When the unit still holds a texture on a different target, that target is cleared
    first.  Some drivers misbehave when one unit has live textures on several targets.
    */
    pub fn bind_texture(
        &mut self,
        unit: i32,
        target: TextureTarget,
        texture: Option<&dyn GpuObject>,
    ) -> Result<(), StateError> {
        let unit = self.resolve_texture_unit(unit)?;
        self.activate(unit)?;

        let requested = BoundTexture {
            id: id_of(texture),
            target,
        };
        let slot = unit as usize;
        let current = *self.textures.get(slot);
        if current.matches(requested) {
            return Ok(());
        }
        if let Some(old_target) = current.target {
            if old_target != target && !current.id.is_null() {
                self.gl.bind_texture(old_target, None)?;
                *self.textures.slot_mut(slot) = TextureEntry {
                    id: UniqueId::NULL,
                    target: Some(old_target),
                };
            }
        }
        self.gl.bind_texture(target, handle_of(texture))?;
        *self.textures.slot_mut(slot) = TextureEntry {
            id: requested.id,
            target: Some(target),
        };
        Ok(())
    }

    /// Sampler units start unknown, so the first request for a unit always reaches the
    /// driver.
    pub fn bind_sampler(
        &mut self,
        unit: u32,
        sampler: Option<&dyn GpuObject>,
    ) -> Result<(), StateError> {
        check_slot(SlotKind::Sampler, unit, self.caps.max_combined_texture_units())?;
        let id = id_of(sampler);
        let slot = unit as usize;
        if identity_changed(*self.samplers.get(slot), id) {
            self.gl.bind_sampler(unit, handle_of(sampler))?;
            *self.samplers.slot_mut(slot) = Some(id);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn bind_image_texture(
        &mut self,
        unit: u32,
        texture: &dyn GpuObject,
        level: i32,
        layered: bool,
        layer: i32,
        access: ImageAccess,
        format: ImageFormat,
    ) -> Result<(), StateError> {
        let image = BoundImage {
            id: texture.unique_id(),
            handle: Some(texture.native_handle()),
            level,
            layered,
            layer,
            access,
            format,
        };
        self.bind_image(unit, image)
    }

    /// Binds a texel buffer view to an image unit.  Buffers have one level and no
    /// layers.
    pub fn bind_image_buffer(
        &mut self,
        unit: u32,
        buffer_view: &dyn GpuObject,
        access: ImageAccess,
        format: ImageFormat,
    ) -> Result<(), StateError> {
        let image = BoundImage {
            id: buffer_view.unique_id(),
            handle: Some(buffer_view.native_handle()),
            level: 0,
            layered: false,
            layer: 0,
            access,
            format,
        };
        self.bind_image(unit, image)
    }

    fn bind_image(&mut self, unit: u32, image: BoundImage) -> Result<(), StateError> {
        check_slot(SlotKind::ImageUnit, unit, self.caps.max_image_units())?;
        let slot = unit as usize;
        if *self.images.get(slot) == Some(image) {
            return Ok(());
        }
        self.gl.bind_image_texture(
            unit,
            image.handle,
            image.level,
            image.layered,
            image.layer,
            image.access,
            image.format,
        )?;
        *self.images.slot_mut(slot) = Some(image);
        Ok(())
    }

    /// What `unit` holds, or an empty unit with a usable format when nothing was bound.
    pub fn bound_image(&self, unit: u32) -> BoundImage {
        self.images.get(unit as usize).unwrap_or_default()
    }

    pub fn bind_uniform_buffer(
        &mut self,
        slot: u32,
        buffer: Option<&dyn GpuObject>,
        offset: i64,
        size: i64,
    ) -> Result<(), StateError> {
        check_slot(SlotKind::UniformBuffer, slot, self.caps.max_uniform_buffer_bindings())?;
        Self::bind_range(
            &mut self.gl,
            &mut self.uniform_buffers,
            IndexedBufferTarget::Uniform,
            slot,
            buffer,
            offset,
            size,
        )
    }

    pub fn bind_storage_block(
        &mut self,
        slot: u32,
        buffer: Option<&dyn GpuObject>,
        offset: i64,
        size: i64,
    ) -> Result<(), StateError> {
        check_slot(SlotKind::StorageBuffer, slot, self.caps.max_storage_buffer_bindings())?;
        Self::bind_range(
            &mut self.gl,
            &mut self.storage_blocks,
            IndexedBufferTarget::ShaderStorage,
            slot,
            buffer,
            offset,
            size,
        )
    }

    fn bind_range(
        gl: &mut G,
        table: &mut SlotTable<BoundBufferRange>,
        target: IndexedBufferTarget,
        slot: u32,
        buffer: Option<&dyn GpuObject>,
        offset: i64,
        size: i64,
    ) -> Result<(), StateError> {
        let requested = BoundBufferRange {
            id: id_of(buffer),
            offset,
            size,
        };
        if *table.get(slot as usize) == requested {
            return Ok(());
        }
        gl.bind_buffer_range(target, slot, handle_of(buffer), offset, size)?;
        *table.slot_mut(slot as usize) = requested;
        Ok(())
    }

    /**
    Binds `buffer` to a non-indexed target.  Never cached.

    Array and element array bindings are captured by whatever vertex array is bound.
    With `reset_vao` set, the null vertex array is bound first so the bind does not
    modify it.
    */
    pub fn bind_buffer(
        &mut self,
        target: BufferTarget,
        buffer: Option<&dyn GpuObject>,
        reset_vao: bool,
    ) -> Result<(), StateError> {
        if reset_vao && target.affects_vertex_array() {
            self.bind_vertex_array(None)?;
        }
        self.gl.bind_buffer(target, handle_of(buffer))?;
        Ok(())
    }

    /// Barriers the context owes but has not executed.
    pub fn pending_memory_barriers(&self) -> MemoryBarrier {
        self.pending_barriers
    }

    /// Records that `barriers` are owed after a write.
    pub fn set_pending_memory_barriers(&mut self, barriers: MemoryBarrier) {
        self.pending_barriers |= barriers;
    }

    /**
    Executes the barriers in `required` that are still owed.

    With a resource, only the bits the resource itself owes are considered, and the
    resource's mask is afterwards narrowed to what the context still owes.  See
    [`crate::bindings::barrier`] for the one case where a resource keeps a bit that was
    already satisfied.
    */
    pub fn ensure_memory_barrier(
        &mut self,
        required: MemoryBarrier,
        resource: Option<&mut PendingBarriers>,
    ) -> Result<(), StateError> {
        let reconciled = barrier::reconcile(required, self.pending_barriers, resource.as_deref());
        if !reconciled.issue.is_empty() {
            self.gl.memory_barrier(reconciled.issue)?;
            self.pending_barriers = reconciled.context_after;
        }
        barrier::finish(self.pending_barriers, resource);
        Ok(())
    }

    fn toggle(
        gl: &mut G,
        cached: &mut Option<bool>,
        toggle: Toggle,
        enable: bool,
    ) -> Result<(), StateError> {
        if *cached != Some(enable) {
            gl.set_enabled(toggle, enable)?;
            *cached = Some(enable);
        }
        Ok(())
    }

    pub fn enable_depth_test(&mut self, enable: bool) -> Result<(), StateError> {
        Self::toggle(
            &mut self.gl,
            &mut self.depth_stencil.depth_test,
            Toggle::DepthTest,
            enable,
        )
    }

    pub fn enable_depth_writes(&mut self, enable: bool) -> Result<(), StateError> {
        if self.depth_stencil.depth_writes != Some(enable) {
            self.gl.depth_mask(enable)?;
            self.depth_stencil.depth_writes = Some(enable);
        }
        Ok(())
    }

    pub fn set_depth_func(&mut self, func: CompareFunction) -> Result<(), StateError> {
        if self.depth_stencil.depth_func != Some(func) {
            self.gl.depth_func(func)?;
            self.depth_stencil.depth_func = Some(func);
        }
        Ok(())
    }

    pub fn enable_stencil_test(&mut self, enable: bool) -> Result<(), StateError> {
        Self::toggle(
            &mut self.gl,
            &mut self.depth_stencil.stencil_test,
            Toggle::StencilTest,
            enable,
        )
    }

    pub fn set_stencil_write_mask(&mut self, mask: u8) -> Result<(), StateError> {
        if self.depth_stencil.stencil_write_mask != Some(mask) {
            self.gl.stencil_mask(u32::from(mask))?;
            self.depth_stencil.stencil_write_mask = Some(mask);
        }
        Ok(())
    }

    pub fn set_stencil_func(
        &mut self,
        face: Face,
        func: CompareFunction,
        reference: i32,
        mask: u32,
    ) -> Result<(), StateError> {
        let requested = StencilFunc {
            func,
            reference,
            mask,
        };
        let entry = &mut self.depth_stencil.stencil_funcs[face.index()];
        if *entry != Some(requested) {
            self.gl.stencil_func_separate(face, func, reference, mask)?;
            *entry = Some(requested);
        }
        Ok(())
    }

    /// Sets the stencil reference, keeping the face's function and read mask.  Always
    /// reaches the driver, since dynamic references change every draw.
    pub fn set_stencil_ref(&mut self, face: Face, reference: i32) -> Result<(), StateError> {
        let entry = &mut self.depth_stencil.stencil_funcs[face.index()];
        let (func, mask) = match *entry {
            Some(known) => (known.func, known.mask),
            None => (CompareFunction::Always, u32::MAX),
        };
        self.gl.stencil_func_separate(face, func, reference, mask)?;
        if let Some(known) = entry.as_mut() {
            known.reference = reference;
        }
        Ok(())
    }

    pub fn set_stencil_op(
        &mut self,
        face: Face,
        fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    ) -> Result<(), StateError> {
        let requested = StencilOps {
            fail,
            depth_fail,
            pass,
        };
        let entry = &mut self.depth_stencil.stencil_ops[face.index()];
        if *entry != Some(requested) {
            self.gl.stencil_op_separate(face, fail, depth_fail, pass)?;
            *entry = Some(requested);
        }
        Ok(())
    }

    /// Wireframe needs device support; without it the request is dropped with a warning.
    pub fn set_fill_mode(&mut self, mode: FillMode) -> Result<(), StateError> {
        if !self.caps.is_fill_mode_selection_supported() {
            if mode == FillMode::Wireframe {
                logwise::warn_sync!("Wireframe fill mode is not supported on this device");
            }
            return Ok(());
        }
        if self.rasterizer.fill_mode != Some(mode) {
            self.gl.polygon_mode(mode)?;
            self.rasterizer.fill_mode = Some(mode);
        }
        Ok(())
    }

    pub fn set_cull_mode(&mut self, mode: CullMode) -> Result<(), StateError> {
        if self.rasterizer.cull_mode == Some(mode) {
            return Ok(());
        }
        match mode {
            CullMode::None => self.gl.set_enabled(Toggle::CullFace, false)?,
            CullMode::Front | CullMode::Back => {
                self.gl.set_enabled(Toggle::CullFace, true)?;
                // Culling is on but the face is not known yet.
                self.rasterizer.cull_mode = None;
                let face = if mode == CullMode::Back {
                    Face::Back
                } else {
                    Face::Front
                };
                self.gl.cull_face(face)?;
            }
        }
        self.rasterizer.cull_mode = Some(mode);
        Ok(())
    }

    pub fn set_front_face(&mut self, counter_clockwise: bool) -> Result<(), StateError> {
        if self.rasterizer.front_counter_clockwise != Some(counter_clockwise) {
            self.gl.front_face(counter_clockwise)?;
            self.rasterizer.front_counter_clockwise = Some(counter_clockwise);
        }
        Ok(())
    }

    /// Sets polygon offset.  Offset fill is enabled whenever either component is nonzero.
    pub fn set_depth_bias(&mut self, constant: f32, slope_scaled: f32) -> Result<(), StateError> {
        let requested = DepthBias {
            constant,
            slope_scaled,
        };
        if self.rasterizer.depth_bias == Some(requested) {
            return Ok(());
        }
        self.rasterizer.depth_bias = None;
        self.gl.set_enabled(Toggle::PolygonOffsetFill, !requested.is_zero())?;
        self.gl.polygon_offset(slope_scaled, constant)?;
        self.rasterizer.depth_bias = Some(requested);
        Ok(())
    }

    /// Depth clamp needs device support.  Without it, enabling warns and the request is
    /// still remembered so repeats stay quiet.
    pub fn set_depth_clamp(&mut self, enable: bool) -> Result<(), StateError> {
        if self.rasterizer.depth_clamp == Some(enable) {
            return Ok(());
        }
        if self.caps.is_depth_clamp_supported() {
            self.gl.set_enabled(Toggle::DepthClamp, enable)?;
        } else if enable {
            logwise::warn_sync!(
                "Depth clamp is not supported by this device; check the depth_clamp device feature"
            );
        }
        self.rasterizer.depth_clamp = Some(enable);
        Ok(())
    }

    pub fn enable_scissor_test(&mut self, enable: bool) -> Result<(), StateError> {
        Self::toggle(
            &mut self.gl,
            &mut self.rasterizer.scissor_test,
            Toggle::ScissorTest,
            enable,
        )
    }

    pub fn depth_stencil_state(&self) -> &DepthStencilMirror {
        &self.depth_stencil
    }

    pub fn rasterizer_state(&self) -> &RasterizerMirror {
        &self.rasterizer
    }

    /// Sets the constant blend color.  Not cached.
    pub fn set_blend_factors(&mut self, factors: [f32; 4]) -> Result<(), StateError> {
        self.gl.blend_color(factors)?;
        Ok(())
    }

    /// Draw buffers that can actually be addressed: the smaller of the table size and
    /// the device limit.
    fn addressable_targets(&self) -> u32 {
        (MAX_RENDER_TARGETS as u32).min(self.caps.max_draw_buffers())
    }

    /**
    Applies a blend description to the targets in `render_target_mask`.

    Mask bits for targets past the table or past the device's draw buffer count are
    reported and dropped.  Write masks go through the color mask table, so uniform masks
    use the single non-indexed call.  A `sample_mask` other than all ones is reported;
    GL has no equivalent here.
    */
    pub fn set_blend_state(
        &mut self,
        desc: &BlendStateDesc,
        render_target_mask: u32,
        sample_mask: u32,
    ) -> Result<(), StateError> {
        if sample_mask != u32::MAX {
            logwise::error_sync!(
                "Sample mask {mask} is not implemented for this backend",
                mask = sample_mask
            );
        }

        let mut rt_mask = render_target_mask;
        let table_bits = (1u32 << MAX_RENDER_TARGETS) - 1;
        if rt_mask & !table_bits != 0 {
            logwise::error_sync!(
                "Render target mask {mask} has bits for render targets that do not exist",
                mask = render_target_mask
            );
            rt_mask &= table_bits;
        }
        let draw_buffers = self.caps.max_draw_buffers();
        let device_bits = if draw_buffers >= 32 {
            u32::MAX
        } else {
            (1u32 << draw_buffers) - 1
        };
        if rt_mask & !device_bits != 0 {
            logwise::error_sync!(
                "Render target mask {mask} uses buffer {rt} but this device supports only {limit} draw buffers",
                mask = rt_mask,
                rt = (rt_mask & !device_bits).trailing_zeros(),
                limit = draw_buffers
            );
            rt_mask &= device_bits;
        }

        let mut enable_blend = desc.render_targets[0].blend_enable;
        let mut uniform_mask: Option<ColorMask> = None;
        let mut divergent = false;
        for rt in set_bits(rt_mask) {
            let target = &desc.render_targets[rt as usize];
            match uniform_mask {
                None => uniform_mask = Some(target.write_mask),
                Some(mask) if mask != target.write_mask => divergent = true,
                Some(_) => {}
            }
            if desc.independent_blend && target.blend_enable {
                enable_blend = true;
            }
        }

        if divergent {
            for rt in set_bits(rt_mask) {
                let mask = desc.render_targets[rt as usize].write_mask;
                self.set_color_write_mask_indexed(rt, mask)?;
            }
        } else if let Some(mask) = uniform_mask {
            self.set_color_write_mask(mask)?;
        }

        if !enable_blend {
            self.gl.set_enabled(Toggle::Blend, false)?;
            return Ok(());
        }

        self.gl.set_enabled(Toggle::Blend, true)?;
        self.gl.set_enabled(Toggle::SampleAlphaToCoverage, desc.alpha_to_coverage)?;
        if desc.independent_blend {
            for (i, target) in desc.render_targets.iter().enumerate() {
                let i = i as u32;
                if i >= draw_buffers {
                    if target.blend_enable {
                        logwise::error_sync!(
                            "Blend is enabled for render target {rt} but this device supports only {limit} draw buffers",
                            rt = i,
                            limit = draw_buffers
                        );
                    }
                    continue;
                }
                if target.blend_enable {
                    self.gl.set_blend_enabled_indexed(i, true)?;
                    self.gl.blend_func_separate(
                        Some(i),
                        target.src_blend,
                        target.dest_blend,
                        target.src_blend_alpha,
                        target.dest_blend_alpha,
                    )?;
                    self.gl.blend_equation_separate(
                        Some(i),
                        target.blend_op,
                        target.blend_op_alpha,
                    )?;
                } else {
                    self.gl.set_blend_enabled_indexed(i, false)?;
                }
            }
        } else {
            let rt0 = &desc.render_targets[0];
            self.gl.blend_func_separate(
                None,
                rt0.src_blend,
                rt0.dest_blend,
                rt0.src_blend_alpha,
                rt0.dest_blend_alpha,
            )?;
            self.gl.blend_equation_separate(None, rt0.blend_op, rt0.blend_op_alpha)?;
        }
        Ok(())
    }

    /**
    Sets one write mask for every draw buffer.

    Uses the non-indexed call unless the table has been promoted to indexed mode, in
    which case each addressable buffer is set through the indexed path so the table
    stays accurate.
    */
    pub fn set_color_write_mask(&mut self, mask: ColorMask) -> Result<(), StateError> {
        if self.color_masks.is_indexed() {
            for rt in 0..self.addressable_targets() {
                self.set_color_write_mask_indexed(rt, mask)?;
            }
            return Ok(());
        }
        if self.color_masks.uniform_matches(mask) {
            return Ok(());
        }
        self.gl.color_mask(mask)?;
        self.color_masks.record_uniform(mask);
        Ok(())
    }

    /// Sets the write mask of draw buffer `rt`.  Promotes the table to indexed mode.
    pub fn set_color_write_mask_indexed(
        &mut self,
        rt: u32,
        mask: ColorMask,
    ) -> Result<(), StateError> {
        let limit = self.addressable_targets();
        if rt >= limit {
            logwise::error_sync!(
                "Render target {rt} is out of range (limit {limit})",
                rt = rt,
                limit = limit
            );
            return Err(StateError::SlotOutOfRange {
                kind: SlotKind::RenderTarget,
                slot: i64::from(rt),
                limit,
            });
        }
        if self.color_masks.raw(rt as usize) == Some(mask) {
            return Ok(());
        }
        self.gl.color_mask_indexed(rt, mask)?;
        self.color_masks.record_indexed(rt as usize, mask);
        Ok(())
    }

    /// The write mask of `rt` and whether the table is in indexed mode.  Unknown masks
    /// read as all channels.
    pub fn color_write_mask(&self, rt: u32) -> Result<(ColorMask, bool), StateError> {
        if rt as usize >= MAX_RENDER_TARGETS {
            return Err(StateError::SlotOutOfRange {
                kind: SlotKind::RenderTarget,
                slot: i64::from(rt),
                limit: MAX_RENDER_TARGETS as u32,
            });
        }
        Ok((
            self.color_masks.mask(rt as usize),
            self.color_masks.is_indexed(),
        ))
    }

    pub fn set_num_patch_vertices(&mut self, count: u32) -> Result<(), StateError> {
        if self.patch_vertices != Some(count) {
            self.gl.patch_vertices(count)?;
            self.patch_vertices = Some(count);
        }
        Ok(())
    }

    /// Blits between the bound read and draw framebuffers with scissoring off.  A
    /// scissor test that was known to be on is turned back on afterwards.
    pub fn blit_framebuffer_no_scissor(
        &mut self,
        src: BlitRect,
        dst: BlitRect,
        mask: BlitMask,
        filter: BlitFilter,
    ) -> Result<(), StateError> {
        let restore = self.rasterizer.scissor_test == Some(true);
        self.enable_scissor_test(false)?;
        self.gl.blit_framebuffer(src, dst, mask, filter)?;
        if restore {
            self.enable_scissor_test(true)?;
        }
        Ok(())
    }
}

/// Indices of the set bits in `mask`, lowest first.
fn set_bits(mask: u32) -> impl Iterator<Item = u32> {
    (0..32).filter(move |bit| mask & (1 << bit) != 0)
}
