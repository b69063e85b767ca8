//! Owning flat (1D) views.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::element::Variance;
use crate::owner::{MemoryHandle, MemoryManager, Owner};
use crate::{raw, Result, SpanError};

/// Owning, writable view over a contiguous run of `T`.
///
/// A `FlatMemory` is the only writer of its run, so it is not `Clone`.
/// Convert it with [`FlatMemory::into_read_only`] to share it.
pub struct FlatMemory<T> {
    owner: Owner<T>,
    offset: usize,
    len: usize,
}

/// Owning, shareable read-only view over a contiguous run of `T`.
pub struct ReadOnlyFlatMemory<T> {
    owner: Owner<T>,
    offset: usize,
    len: usize,
}

fn check_range(len: usize, start: usize, count: usize) -> Result<()> {
    if start > len {
        return Err(SpanError::OutOfRange {
            what: "start",
            value: start,
            bound: len,
        });
    }
    if count > len - start {
        return Err(SpanError::OutOfRange {
            what: "length",
            value: count,
            bound: len - start,
        });
    }
    Ok(())
}

impl<T> FlatMemory<T> {
    /// Take ownership of `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        let len = data.len();
        Self {
            owner: Owner::from_vec(data, Variance::Exact),
            offset: 0,
            len,
        }
    }

    /// Take over `manager` and view its whole storage.
    ///
    /// The manager is moved in so that no other handle to it can hand out
    /// a second writable view.
    pub fn from_manager<M: MemoryManager<T> + 'static>(manager: M) -> Self {
        let len = manager.len();
        Self {
            owner: Owner::from_manager(Arc::new(manager)),
            offset: 0,
            len,
        }
    }

    /// An empty view with no storage.
    pub fn empty() -> Self {
        Self {
            owner: Owner::Empty,
            offset: 0,
            len: 0,
        }
    }

    pub(crate) fn from_parts(owner: Owner<T>, offset: usize, len: usize) -> Self {
        Self { owner, offset, len }
    }

    pub(crate) fn into_parts(self) -> (Owner<T>, usize, usize) {
        (self.owner, self.offset, self.len)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Narrow in place to `count` elements starting at `start`. On error
    /// `self` is left as it was.
    pub fn slice(&mut self, start: usize, count: usize) -> Result<()> {
        check_range(self.len, start, count)?;
        self.offset += start;
        self.len = count;
        Ok(())
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the run was validated against the owner at construction.
        unsafe { raw::contiguous(raw::add(self.owner.resolve(), self.offset), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and `self` is the run's only writer.
        unsafe { raw::contiguous_mut(raw::add(self.owner.resolve(), self.offset), self.len) }
    }

    /// Pin the storage; released when the handle is dropped.
    pub fn pin(&self) -> MemoryHandle<T> {
        MemoryHandle::new(self.owner.clone(), self.offset)
    }

    pub fn into_read_only(self) -> ReadOnlyFlatMemory<T> {
        ReadOnlyFlatMemory {
            owner: self.owner,
            offset: self.offset,
            len: self.len,
        }
    }
}

impl<T> ReadOnlyFlatMemory<T> {
    /// Take ownership of `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        FlatMemory::from_vec(data).into_read_only()
    }

    /// View the whole storage of a shared manager.
    pub fn from_manager<M: MemoryManager<T> + 'static>(manager: Arc<M>) -> Self {
        let len = manager.len();
        Self {
            owner: Owner::from_manager(manager),
            offset: 0,
            len,
        }
    }

    /// An empty view with no storage.
    pub fn empty() -> Self {
        FlatMemory::empty().into_read_only()
    }

    pub(crate) fn from_parts(owner: Owner<T>, offset: usize, len: usize) -> Self {
        Self { owner, offset, len }
    }

    pub(crate) fn parts(&self) -> (&Owner<T>, usize, usize) {
        (&self.owner, self.offset, self.len)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Narrow to `count` elements starting at `start`.
    pub fn slice(&self, start: usize, count: usize) -> Result<Self> {
        check_range(self.len, start, count)?;
        Ok(Self {
            owner: self.owner.clone(),
            offset: self.offset + start,
            len: count,
        })
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the run was validated against the owner at construction.
        unsafe { raw::contiguous(raw::add(self.owner.resolve(), self.offset), self.len) }
    }

    /// Pin the storage; released when the handle is dropped.
    pub fn pin(&self) -> MemoryHandle<T> {
        MemoryHandle::new(self.owner.clone(), self.offset)
    }
}

impl<T> Clone for ReadOnlyFlatMemory<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            offset: self.offset,
            len: self.len,
        }
    }
}

impl<T> From<Vec<T>> for FlatMemory<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}

impl<T> From<FlatMemory<T>> for ReadOnlyFlatMemory<T> {
    fn from(memory: FlatMemory<T>) -> Self {
        memory.into_read_only()
    }
}

impl<T> PartialEq for ReadOnlyFlatMemory<T> {
    fn eq(&self, other: &Self) -> bool {
        self.owner.identity() == other.owner.identity()
            && self.offset == other.offset
            && self.len == other.len
    }
}

impl<T> Eq for ReadOnlyFlatMemory<T> {}

impl<T> Hash for ReadOnlyFlatMemory<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.identity().hash(state);
        self.offset.hash(state);
        self.len.hash(state);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for FlatMemory<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ReadOnlyFlatMemory<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
