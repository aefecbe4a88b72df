// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The device context: one lifecycle manager and the binding cache for its context.

Lifecycle transitions can replace the native context under the cache.  [`DeviceContext`]
keeps the two in step: before handing out the cache it compares the lifecycle epoch and
the context current on this thread with what the cache last saw, and invalidates the
cache if either moved.
*/

use raw_window_handle::RawWindowHandle;

use crate::bindings::{ContextState, StateError};
use crate::caps::DeviceFeatures;
use crate::context::{
    ContextConfig, ContextError, GlContext, PlatformEvent, PresentOutcome, ResumeOutcome,
};
use crate::imp::headless::{HeadlessEgl, HeadlessGl};
use crate::imp::{ContextHandle, NativeEgl, NativeGl, Toggle};

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    State(#[from] StateError),
}

/**
A rendering context and everything bound to it.

Created initialized; dropping it releases the cache first and then terminates the
native context.  There is no global instance: pass the device context to whatever
records commands.
*/
#[derive(Debug)]
pub struct DeviceContext<G: NativeGl, E: NativeEgl> {
    //drop order is significant: the cache goes before the context it mirrors
    state: ContextState<G>,
    synced_epoch: u64,
    synced_generation: u64,
    context: GlContext<E>,
}

fn enable_primitive_restart<G: NativeGl>(state: &mut ContextState<G>) {
    if let Err(e) = state
        .native_mut()
        .set_enabled(Toggle::PrimitiveRestartFixedIndex, true)
    {
        logwise::error_sync!(
            "Failed to enable primitive restart fixed index: {err}",
            err = logwise::privacy::LogIt(&e)
        );
    }
}

impl<G: NativeGl, E: NativeEgl> DeviceContext<G, E> {
    /// Brings up the display, surface and context, then builds the cache against the
    /// context that ends up current.
    pub fn new(
        gl: G,
        egl: E,
        config: ContextConfig,
        features: DeviceFeatures,
        window: Option<RawWindowHandle>,
    ) -> Result<Self, CreateError> {
        let mut context = GlContext::new(egl, config);
        context.initialize(window)?;
        let native = context.current_native_context();
        if native.is_none() {
            return Err(StateError::NoCurrentContext.into());
        }
        let mut state = ContextState::new(gl, features, native)?;
        enable_primitive_restart(&mut state);
        let synced_epoch = context.epoch();
        let synced_generation = context.context_generation();
        Ok(DeviceContext {
            state,
            synced_epoch,
            synced_generation,
            context,
        })
    }

    /// The binding cache, invalidated first if the context changed since last time.
    ///
    /// Fails with [`StateError::NoCurrentContext`] while there is nothing to bind to,
    /// for example after [`DeviceContext::invalidate`].
    pub fn state(&mut self) -> Result<&mut ContextState<G>, StateError> {
        self.sync()?;
        Ok(&mut self.state)
    }

    fn sync(&mut self) -> Result<(), StateError> {
        let current = self
            .context
            .current_native_context()
            .ok_or(StateError::NoCurrentContext)?;
        let epoch = self.context.epoch();
        let previous = self.state.current_native_context();
        if epoch == self.synced_epoch && previous == Some(current) {
            return Ok(());
        }
        logwise::info_sync!(
            "Context changed (epoch {old} -> {new}); invalidating cached bindings",
            old = self.synced_epoch,
            new = epoch
        );
        self.state.invalidate()?;
        self.state.set_native_context(Some(current));
        self.synced_epoch = epoch;
        // A new context can come back with the handle value of the old one.
        let generation = self.context.context_generation();
        if generation != self.synced_generation || previous != Some(current) {
            enable_primitive_restart(&mut self.state);
        }
        self.synced_generation = generation;
        Ok(())
    }

    /// The backend, without synchronizing the cache.
    pub fn gl(&self) -> &G {
        self.state.native()
    }

    pub fn gl_mut(&mut self) -> &mut G {
        self.state.native_mut()
    }

    pub fn context(&self) -> &GlContext<E> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut GlContext<E> {
        &mut self.context
    }

    pub fn current_native_context(&mut self) -> Option<ContextHandle> {
        self.context.current_native_context()
    }

    pub fn swap_buffers(&mut self, interval: i32) -> Result<PresentOutcome, ContextError> {
        self.context.swap_buffers(interval)
    }

    pub fn suspend(&mut self) -> Result<(), ContextError> {
        self.context.suspend()
    }

    pub fn resume(
        &mut self,
        window: Option<RawWindowHandle>,
    ) -> Result<ResumeOutcome, ContextError> {
        self.context.resume(window)
    }

    /// Tears the native context down.  [`DeviceContext::resume`] brings it back.
    pub fn invalidate(&mut self) {
        self.context.invalidate();
    }

    pub fn handle_event(&mut self, event: PlatformEvent) -> Result<(), ContextError> {
        self.context.handle_event(event)
    }
}

impl DeviceContext<HeadlessGl, HeadlessEgl> {
    /// A device on the headless backend, attached to a simulated surface and context.
    pub fn headless() -> Result<Self, CreateError> {
        Self::new(
            HeadlessGl::new(),
            HeadlessEgl::new().with_external_current(),
            ContextConfig::default(),
            DeviceFeatures::default(),
            None,
        )
    }
}
