//! Typed resource handles and the generational table backends store resources in.
//!
//! A handle is `(slot index, generation)`. Releasing a resource bumps the slot's
//! generation, so a handle minted later for the same slot never compares equal to the
//! stale one: a reused identifier cannot alias two live resources.

use std::fmt;
use std::marker::PhantomData;

use super::error::GfxError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Shader,
    Program,
    Texture,
    Framebuffer,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Buffer => "buffer",
            Self::Shader => "shader",
            Self::Program => "program",
            Self::Texture => "texture",
            Self::Framebuffer => "framebuffer",
        };
        f.write_str(s)
    }
}

/// Common surface of the typed handle newtypes.
pub trait Handle: Copy + Eq + fmt::Debug {
    const KIND: ResourceKind;

    fn from_raw(raw: RawHandle) -> Self;
    fn raw(self) -> RawHandle;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RawHandle {
    index: u32,
    generation: u32,
}

impl RawHandle {
    /// Packs the handle into a single integer, for logs and error messages.
    #[inline]
    pub fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub struct $name(RawHandle);

        impl Handle for $name {
            const KIND: ResourceKind = ResourceKind::$kind;

            #[inline]
            fn from_raw(raw: RawHandle) -> Self {
                Self(raw)
            }

            #[inline]
            fn raw(self) -> RawHandle {
                self.0
            }
        }
    };
}

typed_handle!(
    /// Vertex or index buffer.
    BufferId => Buffer
);
typed_handle!(
    /// One compiled shader stage.
    ShaderId => Shader
);
typed_handle!(
    /// Linked vertex + fragment program.
    ProgramId => Program
);
typed_handle!(TextureId => Texture);
typed_handle!(
    /// Offscreen framebuffer. The default (presented) target has no handle; it is
    /// selected with `bind_framebuffer(None)`.
    FramebufferId => Framebuffer
);

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage keyed by typed handles.
pub(crate) struct HandleTable<H, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    _handle: PhantomData<H>,
}

impl<H: Handle, T> Default for HandleTable<H, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            _handle: PhantomData,
        }
    }
}

impl<H: Handle, T> HandleTable<H, T> {
    pub(crate) fn insert(&mut self, value: T) -> H {
        let raw = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                RawHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 1,
                    value: Some(value),
                });
                RawHandle {
                    index,
                    generation: 1,
                }
            }
        };
        H::from_raw(raw)
    }

    pub(crate) fn get(&self, handle: H) -> Result<&T, GfxError> {
        let raw = handle.raw();
        self.slots
            .get(raw.index as usize)
            .filter(|s| s.generation == raw.generation)
            .and_then(|s| s.value.as_ref())
            .ok_or_else(|| GfxError::invalid(H::KIND, raw.to_bits()))
    }

    pub(crate) fn get_mut(&mut self, handle: H) -> Result<&mut T, GfxError> {
        let raw = handle.raw();
        self.slots
            .get_mut(raw.index as usize)
            .filter(|s| s.generation == raw.generation)
            .and_then(|s| s.value.as_mut())
            .ok_or_else(|| GfxError::invalid(H::KIND, raw.to_bits()))
    }

    pub(crate) fn contains(&self, handle: H) -> bool {
        self.get(handle).is_ok()
    }

    /// Removes the resource. A second removal of the same handle fails.
    pub(crate) fn remove(&mut self, handle: H) -> Result<T, GfxError> {
        let raw = handle.raw();
        let slot = self
            .slots
            .get_mut(raw.index as usize)
            .filter(|s| s.generation == raw.generation && s.value.is_some())
            .ok_or_else(|| GfxError::invalid(H::KIND, raw.to_bits()))?;

        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(raw.index);

        value.ok_or_else(|| GfxError::invalid(H::KIND, raw.to_bits()))
    }

    /// Number of live resources.
    pub(crate) fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_handle_is_rejected() {
        let mut table: HandleTable<BufferId, u32> = HandleTable::default();
        let h = table.insert(7);
        assert_eq!(table.remove(h), Ok(7));
        assert!(matches!(
            table.remove(h),
            Err(GfxError::InvalidHandle { kind: ResourceKind::Buffer, .. })
        ));
        assert!(table.get(h).is_err());
    }

    #[test]
    fn reused_slot_does_not_alias_stale_handle() {
        let mut table: HandleTable<TextureId, &str> = HandleTable::default();
        let old = table.insert("old");
        table.remove(old).unwrap();

        let new = table.insert("new");
        assert_ne!(old, new);
        assert!(table.get(old).is_err());
        assert_eq!(table.get(new), Ok(&"new"));
        assert_eq!(table.live(), 1);
    }

    #[test]
    fn bits_pack_generation_and_index() {
        let mut table: HandleTable<ProgramId, ()> = HandleTable::default();
        let a = table.insert(());
        let b = table.insert(());
        assert_eq!(a.raw().to_bits(), 1u64 << 32);
        assert_eq!(b.raw().to_bits(), (1u64 << 32) | 1);
    }
}
