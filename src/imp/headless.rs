// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A backend that needs no GPU.

[`HeadlessGl`] records every call it receives.  [`HeadlessEgl`] simulates a display
with surfaces and contexts that can be lost on request.  Both are used by the test
suite and work for headless runs where only the bookkeeping matters.
*/

mod egl;
mod gl;

pub use egl::{EglCall, HeadlessEgl};
pub use gl::{GlCall, HeadlessGl};
