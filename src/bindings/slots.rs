// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Sparse binding tables.

Each table is indexed by slot number and grows the first time a slot is touched.  Entries
hold the identity of the bound object plus whatever metadata the native call takes, so a
request can be compared against the entry before anything is issued.
*/

use crate::object::{NativeHandle, UniqueId};

/// Texture bind point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    Texture2DArray,
    Texture2DMultisample,
    Texture2DMultisampleArray,
    Texture3D,
    CubeMap,
    CubeMapArray,
    Buffer,
    External,
}

/// Access a shader has to an image unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Sized internal format passed to image binds, as the GL enum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageFormat(pub u32);

impl ImageFormat {
    pub const RGBA32F: ImageFormat = ImageFormat(0x8814);
    pub const RGBA16F: ImageFormat = ImageFormat(0x881A);
    pub const R32F: ImageFormat = ImageFormat(0x822E);
    pub const RGBA8: ImageFormat = ImageFormat(0x8058);
    pub const R32UI: ImageFormat = ImageFormat(0x8236);
    pub const R32I: ImageFormat = ImageFormat(0x8235);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BoundTexture {
    pub id: UniqueId,
    pub target: TextureTarget,
}

/// What an image unit holds.
///
/// Unlike the other tables this one keeps the native handle, because callers read it
/// back to restore a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundImage {
    pub id: UniqueId,
    pub handle: Option<NativeHandle>,
    pub level: i32,
    pub layered: bool,
    pub layer: i32,
    pub access: ImageAccess,
    pub format: ImageFormat,
}

impl Default for BoundImage {
    /// An empty unit.  The format is still a real one, since some drivers reject
    /// image binds with a null texture and no format.
    fn default() -> Self {
        BoundImage {
            id: UniqueId::NULL,
            handle: None,
            level: 0,
            layered: false,
            layer: 0,
            access: ImageAccess::ReadOnly,
            format: ImageFormat::RGBA32F,
        }
    }
}

/// A buffer range bound to an indexed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct BoundBufferRange {
    pub id: UniqueId,
    pub offset: i64,
    pub size: i64,
}

/// Slot table that grows on demand.
///
/// Slots never touched read back as `fill`.
#[derive(Debug, Clone)]
pub(crate) struct SlotTable<T> {
    entries: Vec<T>,
    fill: T,
}

impl<T: Clone> SlotTable<T> {
    pub fn new(fill: T, capacity: usize) -> Self {
        SlotTable {
            entries: Vec::with_capacity(capacity),
            fill,
        }
    }

    pub fn get(&self, slot: usize) -> &T {
        self.entries.get(slot).unwrap_or(&self.fill)
    }

    /// Mutable access to `slot`, growing the table if needed.  Callers range-check
    /// `slot` against the device limit first.
    pub fn slot_mut(&mut self, slot: usize) -> &mut T {
        if slot >= self.entries.len() {
            self.entries.resize(slot + 1, self.fill.clone());
        }
        &mut self.entries[slot]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
