// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

use raw_window_handle::RawWindowHandle;

/**
Where a [`crate::context::GlContext`] is in its lifecycle.

The normal path runs `Uninitialized → DisplayAcquired → SurfaceReady → ContextReady →
Active`.  `Suspended` keeps the context without a surface.  `Lost` is passed through
while a lost context is being replaced.  `Terminated` holds nothing and is only left
through `invalidate`.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninitialized,
    DisplayAcquired,
    SurfaceReady,
    ContextReady,
    Active,
    Suspended,
    Lost,
    Terminated,
}

/// Platform notifications, delivered between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The app went to the background; the window is going away.
    Suspend,
    /// The app is back, possibly with a new window.
    Resume(Option<RawWindowHandle>),
    /// The platform destroyed the surface under us.
    SurfaceLost,
}

/// What `swap_buffers` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentOutcome {
    Presented,
    /// There was no surface to present to, for example while suspended.
    Skipped,
    /// The surface was lost and has been recreated.  The frame was dropped.
    SurfaceRecreated,
    /// The context was lost and has been replaced.  Cached bindings are stale.
    ContextRecreated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResumeOutcome {
    /// The manager had never been initialized and was initialized now.
    Initialized,
    /// Already active; nothing to do.
    AlreadyActive,
    /// Adopted a surface someone else made current.
    Attached,
    /// A new surface was created for the existing context.
    SurfaceCreated,
    /// The context was lost while resuming and has been replaced.
    ContextRecreated,
    /// Both surface and context had to be replaced.
    Recreated,
}

impl PresentOutcome {
    pub fn context_changed(self) -> bool {
        self == PresentOutcome::ContextRecreated
    }
}

impl ResumeOutcome {
    pub fn context_changed(self) -> bool {
        matches!(
            self,
            ResumeOutcome::Initialized | ResumeOutcome::ContextRecreated | ResumeOutcome::Recreated
        )
    }
}
