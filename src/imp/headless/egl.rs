// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;

use raw_window_handle::RawWindowHandle;

use crate::context::ContextError;
use crate::imp::{
    ApiVersion, ConfigAttrib, ConfigHandle, ConfigRequest, ContextHandle, DisplayHandle,
    EglError, Error, NativeEgl, SurfaceHandle,
};

/// One call received by [`HeadlessEgl`].  Queries are not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EglCall {
    Initialize(DisplayHandle),
    ChooseConfig(ConfigRequest),
    CreateWindowSurface(SurfaceHandle),
    SetWindowBuffersGeometry(i32),
    CreateContext(ApiVersion),
    MakeCurrent(Option<SurfaceHandle>, Option<ContextHandle>),
    SwapInterval(i32),
    SwapBuffers(SurfaceHandle),
    DestroySurface(SurfaceHandle),
    DestroyContext(ContextHandle),
    Terminate(DisplayHandle),
}

/**
A simulated EGL implementation.

Surfaces and contexts are plain counters.  Tests shape the simulated platform with the
builder methods and inject failures with the `queue_*` methods; each queued error is
returned by the next matching call instead of performing it.
*/
#[derive(Debug)]
pub struct HeadlessEgl {
    next_handle: usize,
    has_display: bool,
    display: Option<DisplayHandle>,
    egl_version: ApiVersion,
    depth_sizes: Vec<u8>,
    configs: HashMap<ConfigHandle, ConfigRequest>,
    visual_id: i32,
    swap_interval_range: (i32, i32),
    max_context_version: ApiVersion,
    surface_size: (u32, u32),
    surfaces: HashSet<SurfaceHandle>,
    contexts: HashMap<ContextHandle, ApiVersion>,
    current_surface: Option<SurfaceHandle>,
    current_context: Option<ContextHandle>,
    swap_errors: VecDeque<EglError>,
    make_current_errors: VecDeque<EglError>,
    surface_errors: VecDeque<EglError>,
    calls: Vec<EglCall>,
    fatal_reports: Vec<String>,
}

impl Default for HeadlessEgl {
    fn default() -> Self {
        HeadlessEgl {
            next_handle: 0,
            has_display: true,
            display: None,
            egl_version: ApiVersion::new(1, 5),
            depth_sizes: vec![24, 16],
            configs: HashMap::new(),
            visual_id: 1,
            swap_interval_range: (0, 4),
            max_context_version: ApiVersion::new(3, 2),
            surface_size: (1920, 1080),
            surfaces: HashSet::new(),
            contexts: HashMap::new(),
            current_surface: None,
            current_context: None,
            swap_errors: VecDeque::new(),
            make_current_errors: VecDeque::new(),
            surface_errors: VecDeque::new(),
            calls: Vec::new(),
            fatal_reports: Vec::new(),
        }
    }
}

impl HeadlessEgl {
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform with no default display.
    pub fn without_display(mut self) -> Self {
        self.has_display = false;
        self
    }

    /// Depth buffer sizes the platform offers configs for.
    pub fn with_depth_sizes(mut self, sizes: &[u8]) -> Self {
        self.depth_sizes = sizes.to_vec();
        self
    }

    /// Highest ES version contexts can be created with.
    pub fn with_max_context_version(mut self, version: ApiVersion) -> Self {
        self.max_context_version = version;
        self
    }

    pub fn with_swap_interval_range(mut self, min: i32, max: i32) -> Self {
        self.swap_interval_range = (min, max);
        self
    }

    pub fn with_surface_size(mut self, width: u32, height: u32) -> Self {
        self.surface_size = (width, height);
        self
    }

    /// Makes a surface and an ES 3.0 context current as if another library owned them.
    pub fn with_external_current(mut self) -> Self {
        let surface = SurfaceHandle::new(self.issue());
        let context = ContextHandle::new(self.issue());
        self.surfaces.insert(surface);
        self.contexts.insert(context, ApiVersion::new(3, 0));
        self.current_surface = Some(surface);
        self.current_context = Some(context);
        self
    }

    /// Changes the size reported for every surface from now on.
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface_size = (width, height);
    }

    /// The next `eglSwapBuffers` fails with `error`.
    pub fn queue_swap_error(&mut self, error: EglError) {
        self.swap_errors.push_back(error);
    }

    /// The next `eglMakeCurrent` fails with `error`.
    pub fn queue_make_current_error(&mut self, error: EglError) {
        self.make_current_errors.push_back(error);
    }

    /// The next `eglCreateWindowSurface` fails with `error`.
    pub fn queue_surface_error(&mut self, error: EglError) {
        self.surface_errors.push_back(error);
    }

    /// Drops the current context as a driver reset would.  Later use reports
    /// `EGL_BAD_CONTEXT`.
    pub fn lose_current_context(&mut self) {
        if let Some(context) = self.current_context.take() {
            self.contexts.remove(&context);
        }
    }

    /// Drops `surface` as a window teardown would.  The context stays current.
    pub fn lose_surface(&mut self, surface: SurfaceHandle) {
        self.surfaces.remove(&surface);
        if self.current_surface == Some(surface) {
            self.current_surface = None;
        }
    }

    pub fn calls(&self) -> &[EglCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&EglCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Messages passed to [`NativeEgl::report_fatal`].
    pub fn fatal_reports(&self) -> &[String] {
        &self.fatal_reports
    }

    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    pub fn live_contexts(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_surface_live(&self, surface: SurfaceHandle) -> bool {
        self.surfaces.contains(&surface)
    }

    pub fn is_context_live(&self, context: ContextHandle) -> bool {
        self.contexts.contains_key(&context)
    }

    fn issue(&mut self) -> NonZeroUsize {
        self.next_handle += 1;
        NonZeroUsize::MIN.saturating_add(self.next_handle)
    }

    fn check_display(&self, display: DisplayHandle) -> Result<(), Error> {
        if self.display == Some(display) {
            Ok(())
        } else {
            Err(EglError::BadDisplay.into())
        }
    }
}

impl NativeEgl for HeadlessEgl {
    fn get_display(&mut self) -> Option<DisplayHandle> {
        if !self.has_display {
            return None;
        }
        if self.display.is_none() {
            self.display = Some(DisplayHandle::new(NonZeroUsize::MIN));
        }
        self.display
    }

    fn initialize(&mut self, display: DisplayHandle) -> Result<ApiVersion, Error> {
        self.check_display(display)?;
        self.calls.push(EglCall::Initialize(display));
        Ok(self.egl_version)
    }

    fn choose_config(
        &mut self,
        display: DisplayHandle,
        request: ConfigRequest,
    ) -> Result<Option<ConfigHandle>, Error> {
        self.check_display(display)?;
        self.calls.push(EglCall::ChooseConfig(request));
        if request.color_bits > 8 || !self.depth_sizes.contains(&request.depth_bits) {
            return Ok(None);
        }
        let config = ConfigHandle::new(self.issue());
        self.configs.insert(config, request);
        Ok(Some(config))
    }

    fn config_attrib(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        attrib: ConfigAttrib,
    ) -> Result<i32, Error> {
        self.check_display(display)?;
        if !self.configs.contains_key(&config) {
            return Err(EglError::BadConfig.into());
        }
        Ok(match attrib {
            ConfigAttrib::NativeVisualId => self.visual_id,
            ConfigAttrib::MinSwapInterval => self.swap_interval_range.0,
            ConfigAttrib::MaxSwapInterval => self.swap_interval_range.1,
        })
    }

    fn create_window_surface(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        _window: RawWindowHandle,
    ) -> Result<SurfaceHandle, Error> {
        self.check_display(display)?;
        if let Some(error) = self.surface_errors.pop_front() {
            return Err(error.into());
        }
        if !self.configs.contains_key(&config) {
            return Err(EglError::BadConfig.into());
        }
        let surface = SurfaceHandle::new(self.issue());
        self.surfaces.insert(surface);
        self.calls.push(EglCall::CreateWindowSurface(surface));
        Ok(surface)
    }

    fn set_window_buffers_geometry(
        &mut self,
        _window: RawWindowHandle,
        format: i32,
    ) -> Result<(), Error> {
        self.calls.push(EglCall::SetWindowBuffersGeometry(format));
        Ok(())
    }

    fn create_context(
        &mut self,
        display: DisplayHandle,
        config: ConfigHandle,
        version: ApiVersion,
    ) -> Result<ContextHandle, Error> {
        self.check_display(display)?;
        if !self.configs.contains_key(&config) {
            return Err(EglError::BadConfig.into());
        }
        if version > self.max_context_version {
            return Err(EglError::BadMatch.into());
        }
        let context = ContextHandle::new(self.issue());
        self.contexts.insert(context, version);
        self.calls.push(EglCall::CreateContext(version));
        Ok(context)
    }

    fn make_current(
        &mut self,
        display: DisplayHandle,
        surface: Option<SurfaceHandle>,
        context: Option<ContextHandle>,
    ) -> Result<(), Error> {
        self.check_display(display)?;
        if let Some(error) = self.make_current_errors.pop_front() {
            return Err(error.into());
        }
        if let Some(surface) = surface {
            if !self.surfaces.contains(&surface) {
                return Err(EglError::BadSurface.into());
            }
        }
        if let Some(context) = context {
            if !self.contexts.contains_key(&context) {
                return Err(EglError::BadContext.into());
            }
        }
        self.calls.push(EglCall::MakeCurrent(surface, context));
        self.current_surface = surface;
        self.current_context = context;
        Ok(())
    }

    fn current_surface(&mut self) -> Option<SurfaceHandle> {
        self.current_surface
    }

    fn current_context(&mut self) -> Option<ContextHandle> {
        self.current_context
    }

    fn current_context_version(&mut self) -> Result<ApiVersion, Error> {
        self.current_context
            .and_then(|c| self.contexts.get(&c).copied())
            .ok_or(Error::Egl(EglError::BadContext))
    }

    fn query_surface_size(
        &mut self,
        display: DisplayHandle,
        surface: SurfaceHandle,
    ) -> Result<(u32, u32), Error> {
        self.check_display(display)?;
        if !self.surfaces.contains(&surface) {
            return Err(EglError::BadSurface.into());
        }
        Ok(self.surface_size)
    }

    fn swap_interval(&mut self, display: DisplayHandle, interval: i32) -> Result<(), Error> {
        self.check_display(display)?;
        self.calls.push(EglCall::SwapInterval(interval));
        Ok(())
    }

    fn swap_buffers(
        &mut self,
        display: DisplayHandle,
        surface: SurfaceHandle,
    ) -> Result<(), Error> {
        self.check_display(display)?;
        if let Some(error) = self.swap_errors.pop_front() {
            return Err(error.into());
        }
        if !self.surfaces.contains(&surface) {
            return Err(EglError::BadSurface.into());
        }
        match self.current_context {
            Some(c) if self.contexts.contains_key(&c) => {}
            _ => return Err(EglError::BadContext.into()),
        }
        self.calls.push(EglCall::SwapBuffers(surface));
        Ok(())
    }

    fn destroy_surface(
        &mut self,
        display: DisplayHandle,
        surface: SurfaceHandle,
    ) -> Result<(), Error> {
        self.check_display(display)?;
        if !self.surfaces.remove(&surface) {
            return Err(EglError::BadSurface.into());
        }
        if self.current_surface == Some(surface) {
            self.current_surface = None;
        }
        self.calls.push(EglCall::DestroySurface(surface));
        Ok(())
    }

    fn destroy_context(
        &mut self,
        display: DisplayHandle,
        context: ContextHandle,
    ) -> Result<(), Error> {
        self.check_display(display)?;
        if self.contexts.remove(&context).is_none() {
            return Err(EglError::BadContext.into());
        }
        if self.current_context == Some(context) {
            self.current_context = None;
        }
        self.calls.push(EglCall::DestroyContext(context));
        Ok(())
    }

    fn terminate(&mut self, display: DisplayHandle) -> Result<(), Error> {
        self.check_display(display)?;
        self.surfaces.clear();
        self.contexts.clear();
        self.configs.clear();
        self.current_surface = None;
        self.current_context = None;
        self.calls.push(EglCall::Terminate(display));
        Ok(())
    }

    fn report_fatal(&mut self, error: &ContextError) {
        self.fatal_reports.push(error.to_string());
    }
}
