// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

use raw_window_handle::RawWindowHandle;

use crate::context::{
    ContextConfig, ContextError, LifecycleState, PlatformEvent, PresentOutcome, ResumeOutcome,
};
use crate::imp::{
    ApiVersion, ConfigAttrib, ConfigHandle, ConfigRequest, ContextHandle, DisplayHandle,
    EglError, Error, NativeEgl, SurfaceHandle,
};

/**
Owner of the native display, surface and context.

Handles this type created are destroyed by it.  Handles it merely attached to, a surface
or context another library made current, are used but never destroyed individually.

[`GlContext::epoch`] advances whenever the context is created, replaced, adopted or
released, and when the surface is released on suspend.  Anything caching context state
compares epochs to know when to start over.  [`GlContext::context_generation`] advances
only for the first four, so a replacement context is recognized even when the driver
hands back the handle value of the one it replaced.

Dropping the manager terminates it.
*/
#[derive(Debug)]
pub struct GlContext<E: NativeEgl> {
    egl: E,
    config: ContextConfig,
    state: LifecycleState,
    window: Option<RawWindowHandle>,

    display: Option<DisplayHandle>,
    egl_config: Option<ConfigHandle>,
    /// Owned surface.  `None` while suspended or when presenting to an external one.
    surface: Option<SurfaceHandle>,
    /// Owned context.  `None` when attached to an external one.
    context: Option<ContextHandle>,

    egl_version: Option<ApiVersion>,
    api_version: Option<ApiVersion>,
    swap_interval_range: (i32, i32),
    surface_size: Option<(u32, u32)>,
    epoch: u64,
    context_generation: u64,
}

impl<E: NativeEgl> GlContext<E> {
    /// A manager that has not touched the platform yet.  Call [`GlContext::initialize`].
    pub fn new(egl: E, config: ContextConfig) -> Self {
        let swap_interval_range = config.external_swap_interval_range;
        GlContext {
            egl,
            config,
            state: LifecycleState::Uninitialized,
            window: None,
            display: None,
            egl_config: None,
            surface: None,
            context: None,
            egl_version: None,
            api_version: None,
            swap_interval_range,
            surface_size: None,
            epoch: 0,
            context_generation: 0,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Advances each time a context is created, adopted, lost or released.
    pub fn context_generation(&self) -> u64 {
        self.context_generation
    }

    /// Version of the context in use.
    pub fn api_version(&self) -> Option<ApiVersion> {
        self.api_version
    }

    /// Version of the EGL implementation.
    pub fn egl_version(&self) -> Option<ApiVersion> {
        self.egl_version
    }

    /// Swap intervals the surface's config accepts, inclusive.
    pub fn swap_interval_range(&self) -> (i32, i32) {
        self.swap_interval_range
    }

    /// Size of the surface as last queried.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface_size
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(
            self.state,
            LifecycleState::Uninitialized | LifecycleState::Terminated
        )
    }

    /// The context current on this thread, whoever owns it.
    pub fn current_native_context(&mut self) -> Option<ContextHandle> {
        self.egl.current_context()
    }

    pub fn native(&self) -> &E {
        &self.egl
    }

    /// Direct access to the platform.  Calls made through it are not tracked.
    pub fn native_mut(&mut self) -> &mut E {
        &mut self.egl
    }

    fn set_state(&mut self, state: LifecycleState) {
        if self.state != state {
            logwise::trace_sync!(
                "GlContext {from} -> {to}",
                from = logwise::privacy::LogIt(&self.state),
                to = logwise::privacy::LogIt(&state)
            );
            self.state = state;
        }
    }

    fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    fn context_changed(&mut self) {
        self.context_generation += 1;
        self.bump_epoch();
    }

    /**
    Acquires the display, a surface and a context, and makes them current.

    A surface or context that is already current on this thread is adopted instead of
    created.  Otherwise a window surface is created from `window` with the first config
    that matches, and a context is created with the first version the platform accepts.

    Returns immediately when already initialized.  On failure everything acquired so far
    is released, the failure is reported to the platform and the manager is back in
    [`LifecycleState::Uninitialized`].
    */
    pub fn initialize(&mut self, window: Option<RawWindowHandle>) -> Result<(), ContextError> {
        match self.state {
            LifecycleState::Terminated => return Err(ContextError::Terminated),
            LifecycleState::Uninitialized => {}
            _ => return Ok(()),
        }
        match self.try_initialize(window) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.release_all();
                self.set_state(LifecycleState::Uninitialized);
                self.fail(e)
            }
        }
    }

    fn try_initialize(&mut self, window: Option<RawWindowHandle>) -> Result<(), ContextError> {
        self.window = window;
        let display = self.egl.get_display().ok_or(ContextError::NoDisplay)?;
        self.display = Some(display);
        let egl_version = self
            .egl
            .initialize(display)
            .map_err(ContextError::DisplayInit)?;
        self.egl_version = Some(egl_version);
        logwise::info_sync!(
            "Initialized EGL {major}.{minor}",
            major = egl_version.major,
            minor = egl_version.minor
        );
        self.set_state(LifecycleState::DisplayAcquired);

        if self.egl.current_surface().is_some() {
            self.attach_surface()?;
        } else {
            self.create_surface()?;
        }

        if self.egl.current_context().is_some() {
            self.attach_context()?;
        } else {
            self.create_context()?;
        }
        Ok(())
    }

    /// Logs and reports a fatal error, then returns it.
    fn fail<T>(&mut self, error: ContextError) -> Result<T, ContextError> {
        logwise::error_sync!(
            "GL context failure: {error}",
            error = logwise::privacy::LogIt(&error)
        );
        self.egl.report_fatal(&error);
        Err(error)
    }

    fn display(&self) -> Result<DisplayHandle, ContextError> {
        self.display.ok_or(ContextError::NotInitialized)
    }

    fn choose_config(&mut self) -> Result<ConfigHandle, ContextError> {
        if let Some(config) = self.egl_config {
            return Ok(config);
        }
        let display = self.display()?;
        let color_bits = self.config.color_bits;
        for &depth_bits in &self.config.depth_bits {
            let request = ConfigRequest {
                color_bits,
                depth_bits,
            };
            if let Some(config) = self.egl.choose_config(display, request)? {
                logwise::info_sync!(
                    "Chosen EGL config: {color} bit color, {depth} bit depth",
                    color = color_bits,
                    depth = depth_bits
                );
                self.egl_config = Some(config);
                return Ok(config);
            }
            logwise::info_sync!(
                "No EGL config with {depth} bit depth",
                depth = depth_bits
            );
        }
        Err(ContextError::NoCompatibleConfig { color_bits })
    }

    fn create_surface(&mut self) -> Result<(), ContextError> {
        let window = self.window.ok_or(ContextError::NoWindow)?;
        let config = self.choose_config()?;
        let display = self.display()?;
        let surface = self
            .egl
            .create_window_surface(display, config, window)
            .map_err(ContextError::SurfaceCreation)?;
        self.surface = Some(surface);
        self.set_state(LifecycleState::SurfaceReady);
        self.update_surface_size();

        let format = self
            .egl
            .config_attrib(display, config, ConfigAttrib::NativeVisualId)?;
        self.egl.set_window_buffers_geometry(window, format)?;
        let min = self
            .egl
            .config_attrib(display, config, ConfigAttrib::MinSwapInterval)?;
        let max = self
            .egl
            .config_attrib(display, config, ConfigAttrib::MaxSwapInterval)?;
        self.swap_interval_range = (min, max);
        Ok(())
    }

    fn attach_surface(&mut self) -> Result<(), ContextError> {
        if self.egl.current_surface().is_none() {
            return Err(ContextError::NothingToAttach("surface"));
        }
        self.surface = None;
        self.swap_interval_range = self.config.external_swap_interval_range;
        self.set_state(LifecycleState::SurfaceReady);
        self.update_surface_size();
        Ok(())
    }

    /// The surface to present to: ours, or whatever is current.
    fn presentable_surface(&mut self) -> Option<SurfaceHandle> {
        self.surface.or_else(|| self.egl.current_surface())
    }

    fn update_surface_size(&mut self) {
        let Some(surface) = self.presentable_surface() else {
            logwise::error_sync!("Cannot query surface size: no surface is current");
            return;
        };
        let Some(display) = self.display else {
            return;
        };
        match self.egl.query_surface_size(display, surface) {
            Ok(size) => {
                if self.surface_size != Some(size) {
                    logwise::info_sync!(
                        "Surface size changed to {width}x{height}",
                        width = size.0,
                        height = size.1
                    );
                    self.surface_size = Some(size);
                }
            }
            Err(e) => {
                logwise::warn_sync!(
                    "Failed to query surface size: {err}",
                    err = logwise::privacy::LogIt(&e)
                );
            }
        }
    }

    fn create_context(&mut self) -> Result<(), ContextError> {
        let config = self.choose_config()?;
        let display = self.display()?;
        let mut created = None;
        for &version in &self.config.versions {
            match self.egl.create_context(display, config, version) {
                Ok(context) => {
                    created = Some((context, version));
                    break;
                }
                Err(e) => {
                    logwise::info_sync!(
                        "Failed to create an ES {major}.{minor} context: {err}",
                        major = version.major,
                        minor = version.minor,
                        err = logwise::privacy::LogIt(&e)
                    );
                }
            }
        }
        let (context, version) = created.ok_or(ContextError::NoSupportedVersion)?;
        self.context = Some(context);
        self.api_version = Some(version);
        self.context_changed();
        self.set_state(LifecycleState::ContextReady);

        let surface = self.presentable_surface();
        self.egl
            .make_current(display, surface, Some(context))
            .map_err(ContextError::MakeCurrent)?;
        logwise::info_sync!(
            "Created OpenGL ES {major}.{minor} context",
            major = version.major,
            minor = version.minor
        );
        self.set_state(LifecycleState::Active);
        Ok(())
    }

    fn attach_context(&mut self) -> Result<(), ContextError> {
        if self.egl.current_context().is_none() {
            return Err(ContextError::NothingToAttach("context"));
        }
        let version = self.egl.current_context_version()?;
        self.context = None;
        self.api_version = Some(version);
        self.context_changed();
        logwise::info_sync!(
            "Attached to current OpenGL ES {major}.{minor} context",
            major = version.major,
            minor = version.minor
        );
        self.set_state(LifecycleState::Active);
        Ok(())
    }

    fn destroy_owned_surface(&mut self) {
        if let (Some(surface), Some(display)) = (self.surface.take(), self.display) {
            if let Err(e) = self.egl.destroy_surface(display, surface) {
                logwise::warn_sync!(
                    "Failed to destroy EGL surface: {err}",
                    err = logwise::privacy::LogIt(&e)
                );
            }
        }
    }

    fn destroy_owned_context(&mut self) {
        if let (Some(context), Some(display)) = (self.context.take(), self.display) {
            if let Err(e) = self.egl.destroy_context(display, context) {
                logwise::warn_sync!(
                    "Failed to destroy EGL context: {err}",
                    err = logwise::privacy::LogIt(&e)
                );
            }
        }
    }

    /// Releases every handle, including the display.
    fn release_all(&mut self) {
        let held_context = self.context.is_some() || self.api_version.is_some();
        self.destroy_owned_context();
        self.destroy_owned_surface();
        if let Some(display) = self.display.take() {
            if let Err(e) = self.egl.make_current(display, None, None) {
                logwise::warn_sync!(
                    "Failed to release the current context: {err}",
                    err = logwise::privacy::LogIt(&e)
                );
            }
            if let Err(e) = self.egl.terminate(display) {
                logwise::warn_sync!(
                    "Failed to terminate EGL display: {err}",
                    err = logwise::privacy::LogIt(&e)
                );
            }
        }
        self.egl_config = None;
        self.api_version = None;
        self.surface_size = None;
        if held_context {
            self.context_changed();
        }
    }

    /**
    Presents the current frame.

    `interval` is clamped to what the surface's config accepts.  Without any surface,
    for example after [`GlContext::suspend`], the frame is skipped with a warning.

    A lost surface is recreated and a lost context is replaced, and the returned outcome
    says which happened.  If that recovery fails the manager terminates and returns
    [`ContextError::RecoveryFailed`].  Any other present error is returned as is and
    leaves the manager usable.
    */
    pub fn swap_buffers(&mut self, interval: i32) -> Result<PresentOutcome, ContextError> {
        match self.state {
            LifecycleState::Terminated => return Err(ContextError::Terminated),
            LifecycleState::Uninitialized => return Err(ContextError::NotInitialized),
            _ => {}
        }
        let display = self.display()?;
        let Some(surface) = self.presentable_surface() else {
            logwise::warn_sync!(
                "No EGL surface when swapping buffers, as happens after suspend; skipping the frame"
            );
            return Ok(PresentOutcome::Skipped);
        };

        let (min, max) = self.swap_interval_range;
        let interval = interval.max(min).min(max);
        if let Err(e) = self.egl.swap_interval(display, interval) {
            logwise::warn_sync!(
                "Failed to set swap interval {interval}: {err}",
                interval = interval,
                err = logwise::privacy::LogIt(&e)
            );
        }

        match self.egl.swap_buffers(display, surface) {
            Ok(()) => Ok(PresentOutcome::Presented),
            Err(Error::Egl(EglError::BadSurface)) => {
                logwise::info_sync!("EGL surface has been lost; recreating it");
                match self.recover_surface() {
                    Ok(()) => Ok(PresentOutcome::SurfaceRecreated),
                    Err(e) => self.recovery_failed(e),
                }
            }
            Err(Error::Egl(e)) if e.is_context_loss() => {
                logwise::info_sync!(
                    "EGL context has been lost ({err}); recreating it",
                    err = logwise::privacy::LogIt(&e)
                );
                match self.recover_context() {
                    Ok(()) => Ok(PresentOutcome::ContextRecreated),
                    Err(e) => self.recovery_failed(e),
                }
            }
            Err(e) => {
                logwise::warn_sync!(
                    "Failed to present: {err}",
                    err = logwise::privacy::LogIt(&e)
                );
                Err(ContextError::Native(e))
            }
        }
    }

    fn recovery_failed<T>(&mut self, cause: ContextError) -> Result<T, ContextError> {
        self.terminate();
        self.fail(ContextError::RecoveryFailed(Box::new(cause)))
    }

    /// Replaces our surface in place, or adopts the current one when the surface was
    /// never ours.
    fn recover_surface(&mut self) -> Result<(), ContextError> {
        if self.surface.is_none() {
            return self.attach_surface();
        }
        self.destroy_owned_surface();
        self.create_surface()?;
        let display = self.display()?;
        let context = self.context.or_else(|| self.egl.current_context());
        self.egl
            .make_current(display, self.surface, context)
            .map_err(ContextError::MakeCurrent)?;
        self.set_state(LifecycleState::Active);
        Ok(())
    }

    /**
    Tears down the lost context and brings up a replacement.

    An external context is re-adopted.  Our own is recreated on the old surface if that
    surface still answers queries, otherwise on a new one.
    */
    fn recover_context(&mut self) -> Result<(), ContextError> {
        let display = self.display()?;
        let was_external = self.context.is_none();
        self.destroy_owned_context();
        self.context_changed();
        self.set_state(LifecycleState::Lost);

        if was_external {
            return self.attach_context();
        }

        let reusable = match self.surface {
            Some(surface) => self.egl.query_surface_size(display, surface).is_ok(),
            None => false,
        };
        if !reusable {
            self.destroy_owned_surface();
            self.create_surface()?;
        }
        self.create_context()
    }

    /// Releases the surface and keeps the context current without one.  Does nothing
    /// when there is no surface of ours.
    pub fn suspend(&mut self) -> Result<(), ContextError> {
        let Some(display) = self.display else {
            return Ok(());
        };
        if self.surface.is_none() {
            return Ok(());
        }
        logwise::info_sync!("Suspending GL context; destroying EGL surface");
        self.destroy_owned_surface();
        let context = self.context.or_else(|| self.egl.current_context());
        self.bump_epoch();
        self.set_state(LifecycleState::Suspended);
        self.egl.make_current(display, None, context)?;
        Ok(())
    }

    /**
    Brings the manager back after [`GlContext::suspend`].

    Initializes if that never happened.  Otherwise adopts a current surface if there is
    one, or creates a surface for `window` and makes the existing context current on it.
    When already active, a `window` other than the one presented to replaces the surface.
    If that fails because the context was lost, only the context is replaced; on any
    other failure both are.
    */
    pub fn resume(
        &mut self,
        window: Option<RawWindowHandle>,
    ) -> Result<ResumeOutcome, ContextError> {
        logwise::info_sync!("Resuming GL context");
        let mut replacing_surface = false;
        match self.state {
            LifecycleState::Terminated => return Err(ContextError::Terminated),
            LifecycleState::Uninitialized => {
                self.initialize(window)?;
                return Ok(ResumeOutcome::Initialized);
            }
            LifecycleState::Active if self.surface.is_some() => {
                if window.is_none() || window == self.window {
                    return Ok(ResumeOutcome::AlreadyActive);
                }
                logwise::info_sync!("Native window changed; replacing the EGL surface");
                self.destroy_owned_surface();
                replacing_surface = true;
            }
            _ => {}
        }

        if window.is_some() {
            self.window = window;
        }
        if !replacing_surface && self.surface.is_none() && self.egl.current_surface().is_some() {
            self.attach_surface()?;
            self.set_state(LifecycleState::Active);
            return Ok(ResumeOutcome::Attached);
        }

        let attempt = self.create_surface().and_then(|()| {
            let display = self.display()?;
            let context = self.context.or_else(|| self.egl.current_context());
            self.egl
                .make_current(display, self.surface, context)
                .map_err(ContextError::MakeCurrent)
        });
        let error = match attempt {
            Ok(()) => {
                self.set_state(LifecycleState::Active);
                return Ok(ResumeOutcome::SurfaceCreated);
            }
            Err(e) => e,
        };
        logwise::warn_sync!(
            "Unable to make the context current on resume: {err}",
            err = logwise::privacy::LogIt(&error)
        );

        if error == ContextError::MakeCurrent(Error::Egl(EglError::ContextLost)) {
            logwise::info_sync!("Re-creating EGL context");
            let recreated = self.destroy_and_recreate_context();
            return match recreated {
                Ok(()) => Ok(ResumeOutcome::ContextRecreated),
                Err(e) => self.recovery_failed(e),
            };
        }

        logwise::info_sync!("Re-creating EGL context and surface");
        self.destroy_owned_context();
        self.destroy_owned_surface();
        self.context_changed();
        self.set_state(LifecycleState::Lost);
        let recreated = self.create_surface().and_then(|()| self.create_context());
        match recreated {
            Ok(()) => Ok(ResumeOutcome::Recreated),
            Err(e) => self.recovery_failed(e),
        }
    }

    fn destroy_and_recreate_context(&mut self) -> Result<(), ContextError> {
        self.destroy_owned_context();
        self.context_changed();
        self.set_state(LifecycleState::Lost);
        self.create_context()
    }

    /// Tears everything down and returns to [`LifecycleState::Uninitialized`].  The next
    /// `initialize` or `resume` starts from scratch.
    pub fn invalidate(&mut self) {
        logwise::info_sync!("Invalidating GL context");
        self.release_all();
        self.bump_epoch();
        self.set_state(LifecycleState::Uninitialized);
    }

    /// Releases every handle and enters [`LifecycleState::Terminated`].
    pub fn terminate(&mut self) {
        if self.state == LifecycleState::Terminated {
            return;
        }
        self.release_all();
        self.bump_epoch();
        self.set_state(LifecycleState::Terminated);
    }

    /// Dispatches a platform event.
    pub fn handle_event(&mut self, event: PlatformEvent) -> Result<(), ContextError> {
        match event {
            PlatformEvent::Suspend => self.suspend(),
            PlatformEvent::Resume(window) => self.resume(window).map(|_| ()),
            PlatformEvent::SurfaceLost => {
                if self.state != LifecycleState::Active {
                    return Ok(());
                }
                match self.recover_surface() {
                    Ok(()) => Ok(()),
                    Err(e) => self.recovery_failed(e),
                }
            }
        }
    }
}

impl<E: NativeEgl> Drop for GlContext<E> {
    fn drop(&mut self) {
        self.terminate();
    }
}
