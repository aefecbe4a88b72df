// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Binding cache behavior against the recording backend.

use std::cell::Cell;

use gles_context::bindings::barrier::{MemoryBarrier, PendingBarriers};
use gles_context::bindings::blend::{
    BlendFactor, BlendOperation, BlendStateDesc, ColorMask, RenderTargetBlendDesc,
};
use gles_context::bindings::slots::{ImageAccess, ImageFormat, TextureTarget};
use gles_context::bindings::{ContextState, SlotKind, StateError};
use gles_context::caps::{DeviceFeatures, Limits};
use gles_context::imp::headless::{GlCall, HeadlessGl};
use gles_context::imp::{BlitFilter, BlitMask, BlitRect, BufferTarget, IndexedBufferTarget, Toggle};
use gles_context::object::{GpuObject, LazyUniqueId, NativeHandle, UniqueId};

/// Test object that counts how often its id is read.
struct Resource {
    id: UniqueId,
    handle: NativeHandle,
    id_reads: Cell<u32>,
}

impl Resource {
    fn new(id: u64, handle: u32) -> Self {
        Resource {
            id: UniqueId::from_raw(id),
            handle: NativeHandle::new(handle).unwrap(),
            id_reads: Cell::new(0),
        }
    }
}

impl GpuObject for Resource {
    fn unique_id(&self) -> UniqueId {
        self.id_reads.set(self.id_reads.get() + 1);
        self.id
    }
    fn native_handle(&self) -> NativeHandle {
        self.handle
    }
}

/// A resource layer object that draws its id lazily.
struct LazyResource {
    id: LazyUniqueId,
    handle: NativeHandle,
}

impl GpuObject for LazyResource {
    fn unique_id(&self) -> UniqueId {
        self.id.get()
    }
    fn native_handle(&self) -> NativeHandle {
        self.handle
    }
}

fn state_with(gl: HeadlessGl, features: DeviceFeatures) -> ContextState<HeadlessGl> {
    let mut state = ContextState::new(gl, features, None).unwrap();
    state.native_mut().clear_calls();
    state
}

fn state() -> ContextState<HeadlessGl> {
    state_with(HeadlessGl::new(), DeviceFeatures::default())
}

#[test]
fn rebinding_the_same_objects_issues_nothing() {
    let mut state = state();
    let program = Resource::new(1, 10);
    let vao = Resource::new(2, 11);
    let fbo = Resource::new(3, 12);
    let texture = Resource::new(4, 13);

    for _ in 0..3 {
        state.set_program(Some(&program)).unwrap();
        state.bind_vertex_array(Some(&vao)).unwrap();
        state.bind_framebuffer(Some(&fbo)).unwrap();
        state
            .bind_texture(2, TextureTarget::Texture2D, Some(&texture))
            .unwrap();
    }

    assert_eq!(
        state.native().calls(),
        &[
            GlCall::UseProgram(Some(10)),
            GlCall::BindVertexArray(Some(11)),
            GlCall::BindFramebuffer(gles_context::imp::FramebufferTarget::Draw, Some(12)),
            GlCall::BindFramebuffer(gles_context::imp::FramebufferTarget::Read, Some(12)),
            GlCall::ActiveTexture(2),
            GlCall::BindTexture(TextureTarget::Texture2D, Some(13)),
        ]
    );
}

#[test]
fn reused_handle_is_still_a_different_object() {
    let mut state = state();
    let first = Resource::new(7, 3);
    // Same GL name after the first object was deleted.
    let second = Resource::new(9, 3);

    state.set_program(Some(&first)).unwrap();
    state.set_program(Some(&second)).unwrap();
    state
        .bind_texture(0, TextureTarget::Texture2D, Some(&first))
        .unwrap();
    state
        .bind_texture(0, TextureTarget::Texture2D, Some(&second))
        .unwrap();

    assert_eq!(state.native().count(|c| matches!(c, GlCall::UseProgram(_))), 2);
    assert_eq!(
        state
            .native()
            .count(|c| matches!(c, GlCall::BindTexture(_, Some(3)))),
        2
    );
}

#[test]
fn unbinding_does_not_read_any_id() {
    let mut state = state();
    let sampler = Resource::new(21, 4);
    state.bind_sampler(3, Some(&sampler)).unwrap();
    assert_eq!(sampler.id_reads.get(), 1);

    state.bind_sampler(3, None).unwrap();
    state.bind_sampler(3, None).unwrap();
    assert_eq!(sampler.id_reads.get(), 1);
    assert_eq!(
        state.native().calls(),
        &[GlCall::BindSampler(3, Some(4)), GlCall::BindSampler(3, None)]
    );
}

#[test]
fn lazy_ids_are_only_issued_on_bind() {
    let mut state = state();
    let buffer = LazyResource {
        id: LazyUniqueId::new(),
        handle: NativeHandle::new(30).unwrap(),
    };
    state.bind_uniform_buffer(0, None, 0, 0).unwrap();
    assert!(!buffer.id.is_issued());

    state.bind_uniform_buffer(0, Some(&buffer), 0, 256).unwrap();
    assert!(buffer.id.is_issued());
    state.bind_uniform_buffer(0, Some(&buffer), 0, 256).unwrap();
    assert_eq!(
        state.native().calls(),
        &[GlCall::BindBufferRange {
            target: IndexedBufferTarget::Uniform,
            index: 0,
            buffer: Some(30),
            offset: 0,
            size: 256,
        }]
    );
}

#[test]
fn buffer_ranges_compare_offset_and_size() {
    let mut state = state();
    let buffer = Resource::new(40, 8);
    state.bind_storage_block(7, Some(&buffer), 0, 64).unwrap();
    state.bind_storage_block(7, Some(&buffer), 64, 64).unwrap();
    state.bind_storage_block(7, Some(&buffer), 64, 64).unwrap();
    assert_eq!(
        state
            .native()
            .count(|c| matches!(c, GlCall::BindBufferRange { index: 7, .. })),
        2
    );
}

#[test]
fn out_of_range_slots_are_rejected_without_calls() {
    let mut state = state();
    let buffer = Resource::new(50, 9);
    let texture = Resource::new(51, 10);

    let err = state.bind_uniform_buffer(24, Some(&buffer), 0, 16).unwrap_err();
    assert!(matches!(
        err,
        StateError::SlotOutOfRange {
            kind: SlotKind::UniformBuffer,
            slot: 24,
            limit: 24
        }
    ));
    let err = state
        .bind_texture(32, TextureTarget::Texture2D, Some(&texture))
        .unwrap_err();
    assert!(matches!(
        err,
        StateError::SlotOutOfRange {
            kind: SlotKind::TextureUnit,
            ..
        }
    ));
    assert!(matches!(
        state.set_active_texture(-33),
        Err(StateError::SlotOutOfRange { .. })
    ));
    assert!(state.native().calls().is_empty());
}

#[test]
fn huge_unit_indices_fail_instead_of_growing_the_cache() {
    let mut state = state();
    let sampler = Resource::new(52, 11);
    let texture = Resource::new(53, 12);
    let buffer = Resource::new(54, 13);

    assert!(matches!(
        state.bind_sampler(u32::MAX - 1, Some(&sampler)),
        Err(StateError::SlotOutOfRange {
            kind: SlotKind::Sampler,
            limit: 32,
            ..
        })
    ));
    assert!(matches!(
        state.bind_sampler(32, None),
        Err(StateError::SlotOutOfRange {
            kind: SlotKind::Sampler,
            slot: 32,
            limit: 32
        })
    ));
    assert!(matches!(
        state.bind_image_texture(
            8,
            &texture,
            0,
            false,
            0,
            ImageAccess::ReadOnly,
            ImageFormat::RGBA8,
        ),
        Err(StateError::SlotOutOfRange {
            kind: SlotKind::ImageUnit,
            slot: 8,
            limit: 8
        })
    ));
    assert!(matches!(
        state.bind_image_buffer(u32::MAX, &texture, ImageAccess::ReadOnly, ImageFormat::R32F),
        Err(StateError::SlotOutOfRange {
            kind: SlotKind::ImageUnit,
            ..
        })
    ));
    assert!(matches!(
        state.bind_storage_block(u32::MAX - 1, Some(&buffer), 0, 16),
        Err(StateError::SlotOutOfRange {
            kind: SlotKind::StorageBuffer,
            limit: 8,
            ..
        })
    ));
    assert!(state.native().calls().is_empty());
    // Nothing was recorded either.
    assert_eq!(state.bound_image(8).handle, None);

    state.bind_sampler(31, Some(&sampler)).unwrap();
    state.bind_storage_block(7, Some(&buffer), 0, 16).unwrap();
    assert_eq!(state.native().calls().len(), 2);
}

#[test]
fn devices_without_images_reject_every_image_unit() {
    let gl = HeadlessGl::with_limits(Limits {
        max_combined_texture_units: 16,
        max_draw_buffers: 4,
        max_uniform_buffer_bindings: 12,
        max_image_units: 0,
        max_storage_buffer_bindings: 0,
    });
    let mut state = state_with(gl, DeviceFeatures::default());
    let texture = Resource::new(55, 14);
    assert!(matches!(
        state.bind_image_texture(
            0,
            &texture,
            0,
            false,
            0,
            ImageAccess::ReadOnly,
            ImageFormat::RGBA8,
        ),
        Err(StateError::SlotOutOfRange {
            kind: SlotKind::ImageUnit,
            slot: 0,
            limit: 0
        })
    ));
    assert!(state.native().calls().is_empty());
}

#[test]
fn negative_units_count_back_from_the_limit() {
    let mut state = state();
    state.set_active_texture(-1).unwrap();
    state.set_active_texture(31).unwrap();
    assert_eq!(state.native().calls(), &[GlCall::ActiveTexture(31)]);
}

#[test]
fn switching_targets_on_a_unit_clears_the_old_target() {
    let mut state = state();
    let flat = Resource::new(60, 1);
    let cube = Resource::new(61, 2);
    state
        .bind_texture(0, TextureTarget::Texture2D, Some(&flat))
        .unwrap();
    state
        .bind_texture(0, TextureTarget::CubeMap, Some(&cube))
        .unwrap();
    assert_eq!(
        state.native().calls(),
        &[
            GlCall::ActiveTexture(0),
            GlCall::BindTexture(TextureTarget::Texture2D, Some(1)),
            GlCall::BindTexture(TextureTarget::Texture2D, None),
            GlCall::BindTexture(TextureTarget::CubeMap, Some(2)),
        ]
    );
}

#[test]
fn image_units_report_their_binding() {
    let mut state = state();
    assert_eq!(state.bound_image(2).format, ImageFormat::RGBA32F);
    assert_eq!(state.bound_image(2).handle, None);

    let texture = Resource::new(70, 5);
    state
        .bind_image_texture(
            2,
            &texture,
            1,
            true,
            0,
            ImageAccess::WriteOnly,
            ImageFormat::RGBA8,
        )
        .unwrap();
    state
        .bind_image_texture(
            2,
            &texture,
            1,
            true,
            0,
            ImageAccess::WriteOnly,
            ImageFormat::RGBA8,
        )
        .unwrap();
    let bound = state.bound_image(2);
    assert_eq!(bound.id, UniqueId::from_raw(70));
    assert_eq!(bound.level, 1);
    assert_eq!(bound.access, ImageAccess::WriteOnly);
    assert_eq!(
        state
            .native()
            .count(|c| matches!(c, GlCall::BindImageTexture { .. })),
        1
    );

    let view = Resource::new(71, 6);
    state
        .bind_image_buffer(2, &view, ImageAccess::ReadOnly, ImageFormat::R32F)
        .unwrap();
    assert_eq!(state.bound_image(2).handle, NativeHandle::new(6));
    assert_eq!(state.bound_image(2).level, 0);
}

#[test]
fn element_array_bind_can_protect_the_vertex_array() {
    let mut state = state();
    let vao = Resource::new(80, 1);
    let ibo = Resource::new(81, 2);
    state.bind_vertex_array(Some(&vao)).unwrap();
    state
        .bind_buffer(BufferTarget::ElementArray, Some(&ibo), true)
        .unwrap();
    state
        .bind_buffer(BufferTarget::CopyRead, Some(&ibo), true)
        .unwrap();
    assert_eq!(
        state.native().calls(),
        &[
            GlCall::BindVertexArray(Some(1)),
            GlCall::BindVertexArray(None),
            GlCall::BindBuffer(BufferTarget::ElementArray, Some(2)),
            GlCall::BindBuffer(BufferTarget::CopyRead, Some(2)),
        ]
    );
}

#[test]
fn owed_barriers_run_once() {
    let mut state = state();
    state.set_pending_memory_barriers(MemoryBarrier::SHADER_STORAGE | MemoryBarrier::UNIFORM);

    let mut resource = PendingBarriers::new(MemoryBarrier::SHADER_STORAGE);
    state
        .ensure_memory_barrier(MemoryBarrier::ALL, Some(&mut resource))
        .unwrap();
    state
        .ensure_memory_barrier(MemoryBarrier::ALL, Some(&mut resource))
        .unwrap();
    assert!(resource.get().is_empty());
    assert_eq!(state.pending_memory_barriers(), MemoryBarrier::UNIFORM);

    state
        .ensure_memory_barrier(MemoryBarrier::UNIFORM, None)
        .unwrap();
    state
        .ensure_memory_barrier(MemoryBarrier::UNIFORM, None)
        .unwrap();
    assert_eq!(
        state.native().calls(),
        &[
            GlCall::MemoryBarrier(MemoryBarrier::SHADER_STORAGE),
            GlCall::MemoryBarrier(MemoryBarrier::UNIFORM),
        ]
    );
    assert!(state.pending_memory_barriers().is_empty());
}

#[cfg(not(target_os = "android"))]
#[test]
fn invalidate_flushes_owed_barriers() {
    let mut state = state();
    state.set_pending_memory_barriers(MemoryBarrier::TEXTURE_FETCH);
    state.invalidate().unwrap();
    assert_eq!(
        state.native().calls()[0],
        GlCall::MemoryBarrier(MemoryBarrier::TEXTURE_FETCH)
    );
    assert!(state.pending_memory_barriers().is_empty());
}

#[test]
fn invalidate_forgets_every_binding() {
    let mut state = state();
    let program = Resource::new(90, 1);
    state.set_program(Some(&program)).unwrap();
    state.enable_depth_test(true).unwrap();
    state.set_num_patch_vertices(3).unwrap();
    state.invalidate().unwrap();
    state.native_mut().clear_calls();

    state.set_program(Some(&program)).unwrap();
    state.enable_depth_test(true).unwrap();
    state.set_num_patch_vertices(3).unwrap();
    assert_eq!(
        state.native().calls(),
        &[
            GlCall::UseProgram(Some(1)),
            GlCall::SetEnabled(Toggle::DepthTest, true),
            GlCall::PatchVertices(3),
        ]
    );
}

#[test]
fn pipelines_need_device_support() {
    let mut state = state();
    let pipeline = Resource::new(95, 1);
    state.set_pipeline(None).unwrap();
    assert!(matches!(
        state.set_pipeline(Some(&pipeline)),
        Err(StateError::Unsupported { .. })
    ));
    assert!(state.native().calls().is_empty());

    let features = DeviceFeatures {
        separable_programs: true,
        ..DeviceFeatures::default()
    };
    let mut state = state_with(HeadlessGl::new(), features);
    state.set_pipeline(Some(&pipeline)).unwrap();
    state.set_pipeline(Some(&pipeline)).unwrap();
    assert_eq!(state.native().calls(), &[GlCall::BindProgramPipeline(Some(1))]);
}

fn uniform_desc(mask: ColorMask) -> BlendStateDesc {
    let mut desc = BlendStateDesc::default();
    for rt in desc.render_targets.iter_mut() {
        rt.write_mask = mask;
    }
    desc
}

#[test]
fn color_masks_stay_indexed_until_invalidated() {
    let mut state = state();
    state
        .set_blend_state(&uniform_desc(ColorMask::ALL), 0b1111, u32::MAX)
        .unwrap();
    assert_eq!(
        state
            .native()
            .count(|c| matches!(c, GlCall::ColorMask(ColorMask::ALL))),
        1
    );
    assert_eq!(state.color_write_mask(2).unwrap(), (ColorMask::ALL, false));

    let mut divergent = uniform_desc(ColorMask::ALL);
    divergent.render_targets[1].write_mask = ColorMask::RED;
    state.native_mut().clear_calls();
    state.set_blend_state(&divergent, 0b1111, u32::MAX).unwrap();
    assert_eq!(
        state
            .native()
            .count(|c| matches!(c, GlCall::ColorMaskIndexed(..))),
        1
    );
    assert_eq!(state.color_write_mask(1).unwrap(), (ColorMask::RED, true));

    // A uniform mask now goes through the indexed path for every draw buffer.
    state.native_mut().clear_calls();
    state.set_color_write_mask(ColorMask::GREEN).unwrap();
    assert_eq!(
        state
            .native()
            .count(|c| matches!(c, GlCall::ColorMaskIndexed(_, ColorMask::GREEN))),
        8
    );
    assert_eq!(state.native().count(|c| matches!(c, GlCall::ColorMask(_))), 0);
    assert!(state.color_write_mask(0).unwrap().1);

    state.invalidate().unwrap();
    assert_eq!(state.color_write_mask(0).unwrap(), (ColorMask::ALL, false));
    state.native_mut().clear_calls();
    state.set_color_write_mask(ColorMask::GREEN).unwrap();
    assert_eq!(
        state.native().calls(),
        &[GlCall::ColorMask(ColorMask::GREEN)]
    );
}

#[test]
fn indexed_masks_respect_the_draw_buffer_limit() {
    let gl = HeadlessGl::with_limits(Limits {
        max_combined_texture_units: 16,
        max_draw_buffers: 4,
        max_uniform_buffer_bindings: 12,
        max_image_units: 4,
        max_storage_buffer_bindings: 4,
    });
    let mut state = state_with(gl, DeviceFeatures::default());
    assert!(matches!(
        state.set_color_write_mask_indexed(4, ColorMask::RED),
        Err(StateError::SlotOutOfRange {
            kind: SlotKind::RenderTarget,
            slot: 4,
            limit: 4
        })
    ));
    // Out-of-range bits are dropped, the rest still applies.
    let mut desc = uniform_desc(ColorMask::BLUE);
    desc.render_targets[0].write_mask = ColorMask::RED;
    state.set_blend_state(&desc, 0xFF, u32::MAX).unwrap();
    assert_eq!(
        state
            .native()
            .count(|c| matches!(c, GlCall::ColorMaskIndexed(..))),
        4
    );
    assert!(state.color_write_mask(7).is_ok());
    assert!(state.color_write_mask(8).is_err());
}

#[test]
fn independent_blend_sets_each_draw_buffer() {
    let mut state = state();
    let mut desc = BlendStateDesc {
        alpha_to_coverage: true,
        independent_blend: true,
        ..BlendStateDesc::default()
    };
    desc.render_targets[1] = RenderTargetBlendDesc {
        blend_enable: true,
        src_blend: BlendFactor::SrcAlpha,
        dest_blend: BlendFactor::InvSrcAlpha,
        blend_op: BlendOperation::Add,
        src_blend_alpha: BlendFactor::One,
        dest_blend_alpha: BlendFactor::Zero,
        blend_op_alpha: BlendOperation::Max,
        write_mask: ColorMask::ALL,
    };
    state.set_blend_state(&desc, 0b11, u32::MAX).unwrap();

    let calls = state.native().calls();
    assert!(calls.contains(&GlCall::SetEnabled(Toggle::Blend, true)));
    assert!(calls.contains(&GlCall::SetEnabled(Toggle::SampleAlphaToCoverage, true)));
    assert!(calls.contains(&GlCall::SetBlendEnabledIndexed(1, true)));
    assert!(calls.contains(&GlCall::BlendFuncSeparate(
        Some(1),
        [
            BlendFactor::SrcAlpha,
            BlendFactor::InvSrcAlpha,
            BlendFactor::One,
            BlendFactor::Zero
        ]
    )));
    assert!(calls.contains(&GlCall::BlendEquationSeparate(
        Some(1),
        BlendOperation::Add,
        BlendOperation::Max
    )));
    assert_eq!(
        state
            .native()
            .count(|c| matches!(c, GlCall::SetBlendEnabledIndexed(_, false))),
        7
    );
}

#[test]
fn shared_blend_uses_target_zero() {
    let mut state = state();
    let mut desc = BlendStateDesc::default();
    desc.render_targets[0].blend_enable = true;
    desc.render_targets[0].blend_op = BlendOperation::Subtract;
    // Ignored without independent blend.
    desc.render_targets[1].blend_op = BlendOperation::Min;
    state.set_blend_state(&desc, 0b1, u32::MAX).unwrap();
    let calls = state.native().calls();
    assert!(calls.contains(&GlCall::BlendEquationSeparate(
        None,
        BlendOperation::Subtract,
        BlendOperation::Add
    )));
    assert_eq!(
        state
            .native()
            .count(|c| matches!(c, GlCall::BlendFuncSeparate(Some(_), _))),
        0
    );

    state.native_mut().clear_calls();
    state
        .set_blend_state(&BlendStateDesc::default(), 0b1, u32::MAX)
        .unwrap();
    assert!(
        state
            .native()
            .calls()
            .contains(&GlCall::SetEnabled(Toggle::Blend, false))
    );
}

#[test]
fn blit_restores_a_known_scissor() {
    let mut state = state();
    let rect = BlitRect {
        x0: 0,
        y0: 0,
        x1: 64,
        y1: 64,
    };
    let mask = BlitMask {
        color: true,
        ..BlitMask::default()
    };
    state.enable_scissor_test(true).unwrap();
    state.native_mut().clear_calls();
    state
        .blit_framebuffer_no_scissor(rect, rect, mask, BlitFilter::Nearest)
        .unwrap();
    assert_eq!(
        state.native().calls(),
        &[
            GlCall::SetEnabled(Toggle::ScissorTest, false),
            GlCall::BlitFramebuffer(rect, rect, mask, BlitFilter::Nearest),
            GlCall::SetEnabled(Toggle::ScissorTest, true),
        ]
    );

    // Scissor was off: it stays off and is not toggled again.
    state.enable_scissor_test(false).unwrap();
    state.native_mut().clear_calls();
    state
        .blit_framebuffer_no_scissor(rect, rect, mask, BlitFilter::Linear)
        .unwrap();
    assert_eq!(
        state.native().calls(),
        &[GlCall::BlitFramebuffer(rect, rect, mask, BlitFilter::Linear)]
    );
}

#[test]
fn patch_vertex_count_is_cached() {
    let mut state = state();
    state.set_num_patch_vertices(4).unwrap();
    state.set_num_patch_vertices(4).unwrap();
    state.set_num_patch_vertices(3).unwrap();
    assert_eq!(
        state.native().calls(),
        &[GlCall::PatchVertices(4), GlCall::PatchVertices(3)]
    );
}

#[test]
fn blend_color_is_never_cached() {
    let mut state = state();
    state.set_blend_factors([0.5; 4]).unwrap();
    state.set_blend_factors([0.5; 4]).unwrap();
    assert_eq!(state.native().count(|c| matches!(c, GlCall::BlendColor(_))), 2);
}
