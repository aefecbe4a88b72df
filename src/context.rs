// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Display, surface and context lifecycle.

[`GlContext`] owns the native EGL handles and moves them through platform events:
first initialization, suspend and resume, surface loss and context loss, and final
teardown.  It can also adopt a surface or context that another library already made
current on this thread.
*/

mod config;
mod gl_context;
mod lifecycle;

pub use config::ContextConfig;
pub use gl_context::GlContext;
pub use lifecycle::{LifecycleState, PlatformEvent, PresentOutcome, ResumeOutcome};

use crate::imp;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("no EGL display found")]
    NoDisplay,
    #[error("failed to initialize the EGL display: {0}")]
    DisplayInit(#[source] imp::Error),
    /// A surface had to be created but no native window was supplied.
    #[error("a native window is required to create an EGL surface")]
    NoWindow,
    #[error("no EGL config with {color_bits}-bit color and any of the requested depth sizes")]
    NoCompatibleConfig { color_bits: u8 },
    #[error("failed to create an EGL surface: {0}")]
    SurfaceCreation(#[source] imp::Error),
    #[error("no requested context version is supported")]
    NoSupportedVersion,
    #[error("failed to make the context current: {0}")]
    MakeCurrent(#[source] imp::Error),
    /// Attachment was requested but nothing is current on this thread.
    #[error("failed to attach: no current {0}")]
    NothingToAttach(&'static str),
    #[error("recovering the context failed: {0}")]
    RecoveryFailed(#[source] Box<ContextError>),
    #[error("the context has not been initialized")]
    NotInitialized,
    #[error("the context has been terminated")]
    Terminated,
    #[error(transparent)]
    Native(#[from] imp::Error),
}

impl ContextError {
    /// Whether the manager gave up.  After a fatal error every native handle has been
    /// released.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ContextError::Native(_) | ContextError::NotInitialized)
    }
}
