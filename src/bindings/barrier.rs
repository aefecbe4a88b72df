// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Memory barrier bookkeeping.

Writes through images and storage buffers are not visible to later reads until a barrier
runs.  The context keeps a mask of barriers that are owed; every writable resource keeps
its own [`PendingBarriers`] shadow.  A barrier is only issued when a resource that needs
it is used and the context still owes it.

The scheme is slightly imprecise.  When resources A and B both owe the same bit and B is
used first, the barrier runs once and clears the context bit, but A's shadow keeps the
bit.  The next time A is used the context no longer owes it, so nothing is issued and
A's shadow is cleared then.  No barrier is ever missed or run twice.
*/

use bitflags::bitflags;

bitflags! {
    /// Barrier bits, using the native `glMemoryBarrier` values.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct MemoryBarrier: u32 {
        const VERTEX_ATTRIB_ARRAY  = 0x0000_0001;
        const ELEMENT_ARRAY        = 0x0000_0002;
        const UNIFORM              = 0x0000_0004;
        const TEXTURE_FETCH        = 0x0000_0008;
        const SHADER_IMAGE_ACCESS  = 0x0000_0020;
        const COMMAND              = 0x0000_0040;
        const PIXEL_BUFFER         = 0x0000_0080;
        const TEXTURE_UPDATE       = 0x0000_0100;
        const BUFFER_UPDATE        = 0x0000_0200;
        const FRAMEBUFFER          = 0x0000_0400;
        const TRANSFORM_FEEDBACK   = 0x0000_0800;
        const ATOMIC_COUNTER       = 0x0000_1000;
        const SHADER_STORAGE       = 0x0000_2000;
        const CLIENT_MAPPED_BUFFER = 0x0000_4000;
        const QUERY_BUFFER         = 0x0000_8000;
        const ALL = 0xFFFF_FFFF;
    }
}

/// Barriers a resource still needs before its next use.  Owned by the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingBarriers(MemoryBarrier);

impl PendingBarriers {
    pub const fn new(bits: MemoryBarrier) -> Self {
        PendingBarriers(bits)
    }

    pub fn get(&self) -> MemoryBarrier {
        self.0
    }

    /// Marks `bits` as owed after the resource is written.
    pub fn add(&mut self, bits: MemoryBarrier) {
        self.0 |= bits;
    }

    pub(crate) fn reset(&mut self, bits: MemoryBarrier) {
        self.0 = bits;
    }
}

/// Outcome of reconciling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reconciled {
    /// Bits to pass to the native barrier.  Empty when nothing has to run.
    pub issue: MemoryBarrier,
    /// Context mask once the barrier has run.
    pub context_after: MemoryBarrier,
}

/// Works out which barriers a request needs.
///
/// Pure so it can be tested without a context.  The resource shadow is updated by
/// [`finish`] once the native call has gone through.
pub(crate) fn reconcile(
    required: MemoryBarrier,
    context_pending: MemoryBarrier,
    resource: Option<&PendingBarriers>,
) -> Reconciled {
    let mut required = required;
    if let Some(resource) = resource {
        required &= resource.get();
    }
    required &= context_pending;
    Reconciled {
        issue: required,
        context_after: context_pending & !required,
    }
}

/// Rewrites the resource shadow to the bits the context still owes it.
pub(crate) fn finish(context_after: MemoryBarrier, resource: Option<&mut PendingBarriers>) {
    if let Some(resource) = resource {
        let before = resource.get();
        resource.reset(context_after & before);
    }
}
