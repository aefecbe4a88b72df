// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Object identity as seen by the binding cache.
//!
//! GL is free to hand out a released object name to the next object created, so a
//! raw handle cannot tell two objects apart over time.  The cache keys everything off
//! a [`UniqueId`] instead: a value issued from a process-wide counter that only ever
//! increases, so an id is never observed on two different objects.
//!
//! The cache never owns bound objects.  It reads an object's id and native handle
//! through [`GpuObject`] at bind time and keeps nothing else.

use std::num::NonZeroU32;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter shared by every [`LazyUniqueId`].  Zero is reserved for "nothing bound".
static NEXT_UNIQUE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a GPU object for cache comparisons.
///
/// [`UniqueId::NULL`] stands for the absence of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UniqueId(u64);

impl UniqueId {
    /// The id of "no object".
    pub const NULL: UniqueId = UniqueId(0);

    /// Wraps a raw id value.
    ///
    /// Resource layers that keep their own counters use this; everyone else should
    /// prefer [`LazyUniqueId`].
    pub const fn from_raw(raw: u64) -> Self {
        UniqueId(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Issues a fresh id.  Ids are never reused within a process.
    pub fn next() -> Self {
        UniqueId(NEXT_UNIQUE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for UniqueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A native GL object name.  Zero is not a valid name, so "no object" is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(NonZeroU32);

impl NativeHandle {
    /// Returns `None` for the zero name.
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(n) => Some(NativeHandle(n)),
            None => None,
        }
    }

    pub const fn get(self) -> u32 {
        self.0.get()
    }

    pub(crate) const fn non_zero(self) -> NonZeroU32 {
        self.0
    }
}

/// Something that can be bound to a context slot.
///
/// Implemented by the resource layer.  The id must stay stable for the object's
/// lifetime and must not be shared with any other object, even one that later
/// receives the same native handle.
pub trait GpuObject {
    fn unique_id(&self) -> UniqueId;
    fn native_handle(&self) -> NativeHandle;
}

/**
An id that is only issued when somebody asks for it.

Objects that are created but never bound never consume an id.  The first call to
[`LazyUniqueId::get`] draws from the process-wide counter; later calls return the
same value.
*/
#[derive(Debug, Default)]
pub struct LazyUniqueId(OnceLock<UniqueId>);

impl LazyUniqueId {
    pub const fn new() -> Self {
        LazyUniqueId(OnceLock::new())
    }

    pub fn get(&self) -> UniqueId {
        *self.0.get_or_init(UniqueId::next)
    }

    /// Whether an id has been issued yet.
    pub fn is_issued(&self) -> bool {
        self.0.get().is_some()
    }
}

/// Id of an optional object, without touching the object when there is none.
pub(crate) fn id_of<O: GpuObject + ?Sized>(object: Option<&O>) -> UniqueId {
    match object {
        Some(o) => o.unique_id(),
        None => UniqueId::NULL,
    }
}

pub(crate) fn handle_of<O: GpuObject + ?Sized>(object: Option<&O>) -> Option<NativeHandle> {
    object.map(|o| o.native_handle())
}
