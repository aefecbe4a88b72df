// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! gles_context keeps an OpenGL ES context's bindings in a cache and manages the
context itself through platform lifecycle events.

GL drivers do not optimize redundant state changes well, and on mobile platforms the
surface and even the context can disappear between two frames.  This crate takes care
of both:

| Piece                         | Job                                                               |
|-------------------------------|-------------------------------------------------------------------|
| [`bindings::ContextState`]    | Mirrors every binding and only calls into GL when one changes     |
| [`context::GlContext`]        | Owns the EGL display, surface and context through suspend, resume and loss |
| [`device::DeviceContext`]     | Pairs the two, invalidating the cache whenever the context changes |

# Identity

The cache compares objects by [`object::UniqueId`], never by GL name.  GL reuses names
of deleted objects, so two different textures can share a name over time; ids are
never reused.  Resource types implement [`object::GpuObject`] to expose both.

# Backends

The native layer sits behind two traits in [`imp`].  [`imp::headless`] records calls and
simulates EGL and is always available.  With the `backend_glow` feature, `imp::glow`
issues real GL calls through the `glow` crate.  The EGL side is supplied by the
platform.

# Example

```
use gles_context::device::DeviceContext;
use gles_context::bindings::raster::CompareFunction;

let mut device = DeviceContext::headless().unwrap();
let state = device.state().unwrap();
state.enable_depth_test(true).unwrap();
state.set_depth_func(CompareFunction::LessEqual).unwrap();
// Same value again: no GL call.
state.set_depth_func(CompareFunction::LessEqual).unwrap();
```
*/

pub mod bindings;
pub mod caps;
pub mod context;
pub mod device;
pub mod imp;
pub mod object;
