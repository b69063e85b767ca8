//! Retained storage behind owning views.
//!
//! Owning views never cache a pointer: each call asks the [`Owner`] for the
//! current base address, so a manager is free to relocate its memory while
//! nothing is pinned.

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::element::Variance;
use crate::raw;

/// Storage owned outside the view types, exposed as a run of `T`.
///
/// # Safety
///
/// Implementors must guarantee that:
/// - `as_ptr()` points to `len()` initialized elements, valid for as long as
///   the manager is alive.
/// - `len()` never shrinks below a value already reported.
/// - Between `pin(i)` and the matching `unpin()`, the address returned by
///   `pin` stays valid and the storage does not move.
/// - The manager hands out no other access to the elements while views over
///   it are alive; views rely on that to give out `&mut T`.
pub unsafe trait MemoryManager<T>: Send + Sync {
    /// Number of addressable elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current address of element 0.
    fn as_ptr(&self) -> NonNull<T>;

    /// Fix the storage in place and return the address of element `index`.
    fn pin(&self, index: usize) -> NonNull<T> {
        // SAFETY: callers only pin indices inside a validated region.
        unsafe { raw::add(self.as_ptr(), index) }
    }

    /// Release one pin taken with [`MemoryManager::pin`].
    fn unpin(&self) {}
}

/// Boxed slice held as a raw pointer so it can be reached through `&self`.
struct RawBuffer<T> {
    ptr: NonNull<T>,
    len: usize,
    _owns: PhantomData<T>,
}

impl<T> RawBuffer<T> {
    fn from_vec(data: Vec<T>) -> Self {
        let boxed = data.into_boxed_slice();
        let len = boxed.len();
        let ptr = NonNull::from(Box::leak(boxed)).cast::<T>();
        Self {
            ptr,
            len,
            _owns: PhantomData,
        }
    }
}

impl<T> Drop for RawBuffer<T> {
    fn drop(&mut self) {
        let slice = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
        // SAFETY: `ptr`/`len` came from `Box::leak` in `from_vec`.
        drop(unsafe { Box::from_raw(slice) });
    }
}

/// Heap buffer owned by a manager, with a pin counter.
///
/// The buffer is freed when the last `Arc` to it is dropped.
pub struct HeapBuffer<T> {
    buffer: RawBuffer<T>,
    pins: AtomicUsize,
}

impl<T> HeapBuffer<T> {
    /// Take ownership of `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        let buffer = RawBuffer::from_vec(data);
        tracing::debug!(len = buffer.len, "allocated heap buffer");
        Self {
            buffer,
            pins: AtomicUsize::new(0),
        }
    }

    /// `len` default-initialized elements.
    pub fn new(len: usize) -> Self
    where
        T: Default,
    {
        Self::from_vec((0..len).map(|_| T::default()).collect())
    }

    /// Number of outstanding pins.
    pub fn pin_count(&self) -> usize {
        self.pins.load(Ordering::Acquire)
    }
}

impl<T> Drop for HeapBuffer<T> {
    fn drop(&mut self) {
        let pins = self.pin_count();
        if pins != 0 {
            tracing::warn!(pins, "heap buffer dropped while pinned");
        }
        tracing::debug!(len = self.buffer.len, "freeing heap buffer");
    }
}

impl<T> std::fmt::Debug for HeapBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapBuffer")
            .field("len", &self.buffer.len)
            .field("pins", &self.pin_count())
            .finish()
    }
}

// SAFETY: the buffer is uniquely owned; element access is mediated by views
// whose own `Send`/`Sync` bounds follow `T`.
unsafe impl<T: Send> Send for HeapBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for HeapBuffer<T> {}

// SAFETY: the allocation never moves and lives until the buffer is dropped.
unsafe impl<T: Send + Sync> MemoryManager<T> for HeapBuffer<T> {
    fn len(&self) -> usize {
        self.buffer.len
    }

    fn as_ptr(&self) -> NonNull<T> {
        self.buffer.ptr
    }

    fn pin(&self, index: usize) -> NonNull<T> {
        let pins = self.pins.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(index, pins, "pinned heap buffer");
        // SAFETY: index is inside a validated region.
        unsafe { raw::add(self.buffer.ptr, index) }
    }

    fn unpin(&self) {
        match self
            .pins
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pins| pins.checked_sub(1))
        {
            Ok(previous) => tracing::trace!(pins = previous - 1, "unpinned heap buffer"),
            Err(_) => tracing::warn!("unpin on a heap buffer with no pins"),
        }
    }
}

/// A native array or vector moved into shared ownership.
pub(crate) struct ArrayStorage<T> {
    buffer: RawBuffer<T>,
    variance: Variance,
}

// SAFETY: same reasoning as `HeapBuffer`.
unsafe impl<T: Send> Send for ArrayStorage<T> {}
unsafe impl<T: Send + Sync> Sync for ArrayStorage<T> {}

/// Retained handle to the storage of an owning view.
pub(crate) enum Owner<T> {
    Empty,
    Array(Arc<ArrayStorage<T>>),
    Manager(Arc<dyn MemoryManager<T>>),
}

impl<T> Clone for Owner<T> {
    fn clone(&self) -> Self {
        match self {
            Owner::Empty => Owner::Empty,
            Owner::Array(storage) => Owner::Array(Arc::clone(storage)),
            Owner::Manager(manager) => Owner::Manager(Arc::clone(manager)),
        }
    }
}

impl<T> Owner<T> {
    pub(crate) fn from_vec(data: Vec<T>, variance: Variance) -> Self {
        Owner::Array(Arc::new(ArrayStorage {
            buffer: RawBuffer::from_vec(data),
            variance,
        }))
    }

    pub(crate) fn from_manager(manager: Arc<dyn MemoryManager<T>>) -> Self {
        Owner::Manager(manager)
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Owner::Empty => 0,
            Owner::Array(storage) => storage.buffer.len,
            Owner::Manager(manager) => manager.len(),
        }
    }

    pub(crate) fn variance(&self) -> Variance {
        match self {
            Owner::Array(storage) => storage.variance,
            Owner::Empty | Owner::Manager(_) => Variance::Exact,
        }
    }

    /// Current address of element 0.
    pub(crate) fn resolve(&self) -> NonNull<T> {
        match self {
            Owner::Empty => NonNull::dangling(),
            Owner::Array(storage) => storage.buffer.ptr,
            Owner::Manager(manager) => manager.as_ptr(),
        }
    }

    /// Storage identity: equal for handles to the same storage.
    pub(crate) fn identity(&self) -> usize {
        match self {
            Owner::Empty => 0,
            Owner::Array(storage) => Arc::as_ptr(storage) as *const () as usize,
            Owner::Manager(manager) => Arc::as_ptr(manager) as *const () as usize,
        }
    }

    fn pin(&self, index: usize) -> NonNull<T> {
        match self {
            Owner::Empty => NonNull::dangling(),
            // SAFETY: index is inside a validated region.
            Owner::Array(storage) => unsafe { raw::add(storage.buffer.ptr, index) },
            Owner::Manager(manager) => manager.pin(index),
        }
    }

    fn unpin(&self) {
        if let Owner::Manager(manager) = self {
            manager.unpin();
        }
    }
}

/// Pin on owning storage.
///
/// Keeps the storage alive and fixed in place; the pin is released when the
/// handle is dropped, on every exit path.
pub struct MemoryHandle<T> {
    owner: Owner<T>,
    ptr: NonNull<T>,
}

impl<T> MemoryHandle<T> {
    pub(crate) fn new(owner: Owner<T>, index: usize) -> Self {
        let ptr = owner.pin(index);
        Self { owner, ptr }
    }

    /// Address of the first pinned element.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Mutable address of the first pinned element.
    ///
    /// Writing through it is only sound when no borrowed view of the same
    /// region is alive.
    #[inline]
    pub fn as_mut_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> Drop for MemoryHandle<T> {
    fn drop(&mut self) {
        self.owner.unpin();
    }
}

impl<T> std::fmt::Debug for MemoryHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHandle")
            .field("ptr", &self.ptr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_buffer_pin_counting() {
        let buffer = Arc::new(HeapBuffer::from_vec(vec![1, 2, 3, 4]));
        let owner = Owner::from_manager(buffer.clone());
        assert_eq!(owner.len(), 4);
        {
            let handle = MemoryHandle::new(owner.clone(), 2);
            assert_eq!(buffer.pin_count(), 1);
            assert_eq!(unsafe { *handle.as_ptr() }, 3);
            let second = MemoryHandle::new(owner.clone(), 0);
            assert_eq!(buffer.pin_count(), 2);
            drop(second);
            assert_eq!(buffer.pin_count(), 1);
        }
        assert_eq!(buffer.pin_count(), 0);
    }

    #[test]
    fn test_unbalanced_unpin_keeps_count() {
        let buffer = HeapBuffer::from_vec(vec![1u8, 2]);
        buffer.unpin();
        assert_eq!(buffer.pin_count(), 0);
        buffer.pin(1);
        buffer.unpin();
        buffer.unpin();
        assert_eq!(buffer.pin_count(), 0);
    }

    #[test]
    fn test_heap_buffer_default() {
        let buffer: HeapBuffer<u16> = HeapBuffer::new(5);
        assert_eq!(MemoryManager::len(&buffer), 5);
        assert_eq!(unsafe { *buffer.as_ptr().as_ptr().add(4) }, 0);
    }

    #[test]
    fn test_owner_identity() {
        let a = Owner::from_vec(vec![1, 2], Variance::Exact);
        let b = Owner::from_vec(vec![1, 2], Variance::Exact);
        assert_eq!(a.identity(), a.clone().identity());
        assert_ne!(a.identity(), b.identity());
        assert_eq!(Owner::<i32>::Empty.identity(), 0);
    }

    #[test]
    fn test_storage_released_with_last_owner() {
        let marker = Arc::new(());
        let owner = Owner::from_vec(vec![marker.clone(), marker.clone()], Variance::Exact);
        let copy = owner.clone();
        assert_eq!(Arc::strong_count(&marker), 3);
        drop(owner);
        assert_eq!(Arc::strong_count(&marker), 3);
        drop(copy);
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    fn test_pin_on_array_storage_is_plain_address() {
        let owner = Owner::from_vec(vec![10, 20, 30], Variance::Exact);
        let handle = MemoryHandle::new(owner, 1);
        assert_eq!(unsafe { *handle.as_ptr() }, 20);
    }
}
