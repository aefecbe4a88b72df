// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/// Failure reported by a native backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A GL call left an error flag set.
    #[error("{call} raised GL error {code:#06x}")]
    Gl { call: &'static str, code: u32 },
    #[error("EGL call failed: {0}")]
    Egl(#[from] EglError),
}

/**
EGL error codes the lifecycle manager distinguishes.

Recovery decisions are made on these, so backends must map `eglGetError` faithfully.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum EglError {
    #[error("EGL_NOT_INITIALIZED")]
    NotInitialized,
    #[error("EGL_BAD_ACCESS")]
    BadAccess,
    #[error("EGL_BAD_ALLOC")]
    BadAlloc,
    #[error("EGL_BAD_ATTRIBUTE")]
    BadAttribute,
    #[error("EGL_BAD_CONFIG")]
    BadConfig,
    #[error("EGL_BAD_CONTEXT")]
    BadContext,
    #[error("EGL_BAD_CURRENT_SURFACE")]
    BadCurrentSurface,
    #[error("EGL_BAD_DISPLAY")]
    BadDisplay,
    #[error("EGL_BAD_MATCH")]
    BadMatch,
    #[error("EGL_BAD_NATIVE_WINDOW")]
    BadNativeWindow,
    #[error("EGL_BAD_PARAMETER")]
    BadParameter,
    #[error("EGL_BAD_SURFACE")]
    BadSurface,
    #[error("EGL_CONTEXT_LOST")]
    ContextLost,
    #[error("EGL error {0:#06x}")]
    Other(i32),
}

impl EglError {
    /// Maps a raw `eglGetError` value.
    pub fn from_code(code: i32) -> Self {
        match code {
            0x3001 => EglError::NotInitialized,
            0x3002 => EglError::BadAccess,
            0x3003 => EglError::BadAlloc,
            0x3004 => EglError::BadAttribute,
            0x3005 => EglError::BadConfig,
            0x3006 => EglError::BadContext,
            0x3007 => EglError::BadCurrentSurface,
            0x3008 => EglError::BadDisplay,
            0x3009 => EglError::BadMatch,
            0x300B => EglError::BadNativeWindow,
            0x300C => EglError::BadParameter,
            0x300D => EglError::BadSurface,
            0x300E => EglError::ContextLost,
            other => EglError::Other(other),
        }
    }

    /// The context is gone and has to be recreated.
    pub fn is_context_loss(self) -> bool {
        matches!(self, EglError::ContextLost | EglError::BadContext)
    }
}
