// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Context lifecycle against the simulated EGL platform.

use std::ptr::NonNull;

use gles_context::context::{
    ContextConfig, ContextError, GlContext, LifecycleState, PlatformEvent, PresentOutcome,
    ResumeOutcome,
};
use gles_context::imp::headless::{EglCall, HeadlessEgl};
use gles_context::imp::{ApiVersion, EglError};
use raw_window_handle::{AndroidNdkWindowHandle, RawWindowHandle};

fn window() -> Option<RawWindowHandle> {
    let ptr = NonNull::<std::ffi::c_void>::dangling();
    Some(RawWindowHandle::AndroidNdk(AndroidNdkWindowHandle::new(ptr)))
}

fn active(egl: HeadlessEgl) -> GlContext<HeadlessEgl> {
    let mut ctx = GlContext::new(egl, ContextConfig::default());
    ctx.initialize(window()).unwrap();
    ctx.native_mut().clear_calls();
    ctx
}

#[test]
fn initialization_creates_everything() {
    let mut ctx = GlContext::new(
        HeadlessEgl::new().with_surface_size(800, 600),
        ContextConfig::default(),
    );
    assert!(!ctx.is_initialized());
    ctx.initialize(window()).unwrap();
    assert!(ctx.is_initialized());
    assert_eq!(ctx.state(), LifecycleState::Active);
    assert_eq!(ctx.api_version(), Some(ApiVersion::new(3, 2)));
    assert_eq!(ctx.egl_version(), Some(ApiVersion::new(1, 5)));
    assert_eq!(ctx.surface_size(), Some((800, 600)));
    assert_eq!(ctx.swap_interval_range(), (0, 4));
    assert!(ctx.current_native_context().is_some());
    assert_eq!(ctx.native().live_surfaces(), 1);
    assert_eq!(ctx.native().live_contexts(), 1);
    assert_eq!(
        ctx.native()
            .count(|c| matches!(c, EglCall::SetWindowBuffersGeometry(1))),
        1
    );

    // A second initialize is a no-op.
    ctx.native_mut().clear_calls();
    ctx.initialize(window()).unwrap();
    assert!(ctx.native().calls().is_empty());
}

#[test]
fn missing_display_is_reported() {
    let mut ctx = GlContext::new(
        HeadlessEgl::new().without_display(),
        ContextConfig::default(),
    );
    assert_eq!(ctx.initialize(window()), Err(ContextError::NoDisplay));
    assert_eq!(ctx.state(), LifecycleState::Uninitialized);
    assert_eq!(ctx.native().fatal_reports().len(), 1);
}

#[test]
fn no_supported_version_releases_the_surface() {
    let egl = HeadlessEgl::new().with_max_context_version(ApiVersion::new(2, 0));
    let mut ctx = GlContext::new(egl, ContextConfig::default());
    assert_eq!(
        ctx.initialize(window()),
        Err(ContextError::NoSupportedVersion)
    );
    assert_eq!(ctx.native().live_surfaces(), 0);
    assert_eq!(ctx.state(), LifecycleState::Uninitialized);
}

#[test]
fn attaches_to_an_external_context() {
    let mut ctx = GlContext::new(
        HeadlessEgl::new().with_external_current(),
        ContextConfig::default(),
    );
    let external = ctx.current_native_context();
    ctx.initialize(None).unwrap();

    assert_eq!(ctx.state(), LifecycleState::Active);
    assert_eq!(ctx.api_version(), Some(ApiVersion::new(3, 0)));
    assert_eq!(ctx.swap_interval_range(), (0, 1));
    assert_eq!(ctx.current_native_context(), external);
    let native = ctx.native();
    assert_eq!(
        native.count(|c| matches!(c, EglCall::CreateWindowSurface(_) | EglCall::CreateContext(_))),
        0
    );

    assert_eq!(ctx.swap_buffers(1).unwrap(), PresentOutcome::Presented);
    ctx.terminate();
    assert_eq!(
        ctx.native()
            .count(|c| matches!(c, EglCall::DestroySurface(_) | EglCall::DestroyContext(_))),
        0
    );
}

#[test]
fn swap_interval_is_clamped() {
    let mut ctx = active(HeadlessEgl::new().with_swap_interval_range(1, 2));
    ctx.swap_buffers(0).unwrap();
    ctx.swap_buffers(5).unwrap();
    ctx.swap_buffers(2).unwrap();
    let intervals: Vec<i32> = ctx
        .native()
        .calls()
        .iter()
        .filter_map(|c| match c {
            EglCall::SwapInterval(i) => Some(*i),
            _ => None,
        })
        .collect();
    assert_eq!(intervals, vec![1, 2, 2]);
}

#[test]
fn suspend_twice_is_a_no_op() {
    let mut ctx = active(HeadlessEgl::new());
    ctx.suspend().unwrap();
    assert_eq!(ctx.state(), LifecycleState::Suspended);
    assert_eq!(ctx.native().live_surfaces(), 0);
    assert_eq!(ctx.native().live_contexts(), 1);

    let epoch = ctx.epoch();
    ctx.native_mut().clear_calls();
    ctx.suspend().unwrap();
    assert_eq!(ctx.epoch(), epoch);
    assert!(ctx.native().calls().is_empty());
}

#[test]
fn presenting_while_suspended_skips_the_frame() {
    let mut ctx = active(HeadlessEgl::new());
    ctx.suspend().unwrap();
    assert_eq!(ctx.swap_buffers(1).unwrap(), PresentOutcome::Skipped);
    assert_eq!(
        ctx.native()
            .count(|c| matches!(c, EglCall::SwapBuffers(_))),
        0
    );
}

#[test]
fn resume_keeps_the_context() {
    let mut ctx = active(HeadlessEgl::new());
    let before = ctx.current_native_context();
    ctx.suspend().unwrap();
    assert_eq!(ctx.resume(window()).unwrap(), ResumeOutcome::SurfaceCreated);
    assert_eq!(ctx.state(), LifecycleState::Active);
    assert_eq!(ctx.current_native_context(), before);
    assert_eq!(ctx.native().live_surfaces(), 1);
    assert_eq!(ctx.swap_buffers(1).unwrap(), PresentOutcome::Presented);

    assert_eq!(ctx.resume(window()).unwrap(), ResumeOutcome::AlreadyActive);
}

fn window_at(address: usize) -> Option<RawWindowHandle> {
    let ptr = NonNull::new(address as *mut std::ffi::c_void).unwrap();
    Some(RawWindowHandle::AndroidNdk(AndroidNdkWindowHandle::new(ptr)))
}

#[test]
fn resume_with_a_new_window_replaces_the_surface() {
    let mut ctx = GlContext::new(HeadlessEgl::new(), ContextConfig::default());
    ctx.initialize(window_at(0x1000)).unwrap();
    ctx.native_mut().clear_calls();
    let context = ctx.current_native_context();
    let epoch = ctx.epoch();
    let generation = ctx.context_generation();

    assert_eq!(
        ctx.resume(window_at(0x2000)).unwrap(),
        ResumeOutcome::SurfaceCreated
    );
    let egl = ctx.native();
    assert_eq!(egl.count(|c| matches!(c, EglCall::DestroySurface(_))), 1);
    assert_eq!(egl.count(|c| matches!(c, EglCall::CreateWindowSurface(_))), 1);
    assert_eq!(egl.count(|c| matches!(c, EglCall::DestroyContext(_))), 0);
    assert_eq!(egl.live_surfaces(), 1);
    assert_eq!(ctx.current_native_context(), context);
    assert_eq!(ctx.state(), LifecycleState::Active);
    assert_eq!(ctx.epoch(), epoch);
    assert_eq!(ctx.context_generation(), generation);
    assert_eq!(ctx.swap_buffers(1).unwrap(), PresentOutcome::Presented);

    ctx.native_mut().clear_calls();
    assert_eq!(
        ctx.resume(window_at(0x2000)).unwrap(),
        ResumeOutcome::AlreadyActive
    );
    assert_eq!(ctx.resume(None).unwrap(), ResumeOutcome::AlreadyActive);
    assert!(ctx.native().calls().is_empty());
}

#[test]
fn suspend_keeps_the_context_generation() {
    let mut ctx = active(HeadlessEgl::new());
    let generation = ctx.context_generation();
    ctx.suspend().unwrap();
    ctx.resume(window()).unwrap();
    assert_eq!(ctx.context_generation(), generation);

    ctx.native_mut().queue_swap_error(EglError::ContextLost);
    assert_eq!(
        ctx.swap_buffers(1).unwrap(),
        PresentOutcome::ContextRecreated
    );
    assert!(ctx.context_generation() > generation);
}

#[test]
fn context_lost_during_resume_is_replaced() {
    let mut ctx = active(HeadlessEgl::new());
    let before = ctx.current_native_context().unwrap();
    ctx.suspend().unwrap();
    let epoch = ctx.epoch();

    ctx.native_mut()
        .queue_make_current_error(EglError::ContextLost);
    let outcome = ctx.resume(window()).unwrap();
    assert_eq!(outcome, ResumeOutcome::ContextRecreated);
    assert!(outcome.context_changed());

    let after = ctx.current_native_context().unwrap();
    assert_ne!(after, before);
    assert!(!ctx.native().is_context_live(before));
    assert!(ctx.epoch() > epoch);
    assert_eq!(ctx.state(), LifecycleState::Active);
}

#[test]
fn other_resume_failures_recreate_everything() {
    let mut ctx = active(HeadlessEgl::new());
    ctx.suspend().unwrap();
    ctx.native_mut().queue_make_current_error(EglError::BadAlloc);
    assert_eq!(ctx.resume(window()).unwrap(), ResumeOutcome::Recreated);
    assert_eq!(ctx.native().live_surfaces(), 1);
    assert_eq!(ctx.native().live_contexts(), 1);
    assert_eq!(ctx.state(), LifecycleState::Active);
}

#[test]
fn resume_before_initialize_initializes() {
    let mut ctx = GlContext::new(HeadlessEgl::new(), ContextConfig::default());
    assert_eq!(ctx.resume(window()).unwrap(), ResumeOutcome::Initialized);
    assert_eq!(ctx.state(), LifecycleState::Active);
}

#[test]
fn lost_surface_is_recreated_on_present() {
    let mut ctx = active(HeadlessEgl::new());
    let context = ctx.current_native_context();
    ctx.native_mut().queue_swap_error(EglError::BadSurface);
    assert_eq!(
        ctx.swap_buffers(1).unwrap(),
        PresentOutcome::SurfaceRecreated
    );
    assert_eq!(ctx.current_native_context(), context);
    assert_eq!(
        ctx.native()
            .count(|c| matches!(c, EglCall::DestroySurface(_))),
        1
    );
    assert_eq!(
        ctx.native()
            .count(|c| matches!(c, EglCall::CreateWindowSurface(_))),
        1
    );
    assert_eq!(ctx.swap_buffers(1).unwrap(), PresentOutcome::Presented);
}

#[test]
fn lost_context_is_recreated_on_present() {
    let mut ctx = active(HeadlessEgl::new());
    let before = ctx.current_native_context().unwrap();
    let epoch = ctx.epoch();
    ctx.native_mut().queue_swap_error(EglError::ContextLost);

    let outcome = ctx.swap_buffers(1).unwrap();
    assert_eq!(outcome, PresentOutcome::ContextRecreated);
    assert!(outcome.context_changed());
    assert_ne!(ctx.current_native_context(), Some(before));
    assert!(ctx.epoch() > epoch);
    // The surface still answered queries, so it was kept.
    assert_eq!(
        ctx.native()
            .count(|c| matches!(c, EglCall::CreateWindowSurface(_))),
        0
    );
    assert_eq!(ctx.swap_buffers(1).unwrap(), PresentOutcome::Presented);
}

#[test]
fn driver_reset_is_treated_as_context_loss() {
    let mut ctx = active(HeadlessEgl::new());
    ctx.native_mut().lose_current_context();
    assert_eq!(
        ctx.swap_buffers(1).unwrap(),
        PresentOutcome::ContextRecreated
    );
    assert_eq!(ctx.native().live_contexts(), 1);
}

#[test]
fn failed_recovery_terminates() {
    let mut ctx = active(HeadlessEgl::new());
    ctx.native_mut().queue_swap_error(EglError::BadSurface);
    ctx.native_mut().queue_surface_error(EglError::BadNativeWindow);

    let err = ctx.swap_buffers(1).unwrap_err();
    assert!(matches!(err, ContextError::RecoveryFailed(_)));
    assert!(err.is_fatal());
    assert_eq!(ctx.state(), LifecycleState::Terminated);
    assert_eq!(ctx.native().live_contexts(), 0);
    assert_eq!(ctx.native().fatal_reports().len(), 1);
    assert_eq!(ctx.swap_buffers(1), Err(ContextError::Terminated));
}

#[test]
fn other_present_errors_are_returned() {
    let mut ctx = active(HeadlessEgl::new());
    ctx.native_mut().queue_swap_error(EglError::BadAlloc);
    let err = ctx.swap_buffers(1).unwrap_err();
    assert_eq!(err, ContextError::Native(EglError::BadAlloc.into()));
    assert!(!err.is_fatal());
    assert_eq!(ctx.state(), LifecycleState::Active);
}

#[test]
fn present_before_initialize_fails() {
    let mut ctx = GlContext::new(HeadlessEgl::new(), ContextConfig::default());
    assert_eq!(ctx.swap_buffers(1), Err(ContextError::NotInitialized));
}

#[test]
fn platform_events_drive_the_lifecycle() {
    let mut ctx = active(HeadlessEgl::new());
    ctx.handle_event(PlatformEvent::Suspend).unwrap();
    assert_eq!(ctx.state(), LifecycleState::Suspended);
    ctx.handle_event(PlatformEvent::Resume(window())).unwrap();
    assert_eq!(ctx.state(), LifecycleState::Active);

    ctx.native_mut().clear_calls();
    ctx.handle_event(PlatformEvent::SurfaceLost).unwrap();
    assert_eq!(
        ctx.native()
            .count(|c| matches!(c, EglCall::CreateWindowSurface(_))),
        1
    );
    assert_eq!(ctx.swap_buffers(1).unwrap(), PresentOutcome::Presented);
}

#[test]
fn surface_size_follows_the_platform() {
    let mut ctx = active(HeadlessEgl::new().with_surface_size(640, 480));
    assert_eq!(ctx.surface_size(), Some((640, 480)));
    ctx.suspend().unwrap();
    ctx.native_mut().set_surface_size(480, 640);
    ctx.resume(window()).unwrap();
    assert_eq!(ctx.surface_size(), Some((480, 640)));
}

#[test]
fn invalidate_returns_to_uninitialized() {
    let mut ctx = active(HeadlessEgl::new());
    let epoch = ctx.epoch();
    ctx.invalidate();
    assert_eq!(ctx.state(), LifecycleState::Uninitialized);
    assert!(ctx.epoch() > epoch);
    assert_eq!(ctx.current_native_context(), None);
    assert_eq!(ctx.native().live_surfaces(), 0);
    assert_eq!(ctx.native().live_contexts(), 0);

    assert_eq!(ctx.resume(window()).unwrap(), ResumeOutcome::Initialized);
    assert_eq!(ctx.state(), LifecycleState::Active);
}

#[test]
fn terminated_manager_refuses_to_resume() {
    let mut ctx = active(HeadlessEgl::new());
    ctx.terminate();
    ctx.terminate();
    assert_eq!(ctx.state(), LifecycleState::Terminated);
    assert_eq!(
        ctx.native().count(|c| matches!(c, EglCall::Terminate(_))),
        1
    );
    assert_eq!(ctx.resume(window()), Err(ContextError::Terminated));
}
