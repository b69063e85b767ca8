//! Owning 2D views.
//!
//! [`Memory2D`] and [`ReadOnlyMemory2D`] keep their storage alive through a
//! shared [`Owner`] handle plus an element offset. They never cache an
//! address: every access resolves the owner to a pointer that is valid for
//! that call only, and borrowed views are materialized on demand with
//! `span()` / `span_mut()`.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::array::{Array2D, Array3D};
use crate::descriptor::Extent;
use crate::lane::{Lane, LaneMut};
use crate::layout::Layout2D;
use crate::memory::{FlatMemory, ReadOnlyFlatMemory};
use crate::owner::{MemoryHandle, MemoryManager, Owner};
use crate::span2d::{ReadOnlySpan2D, Span2D};
use crate::{raw, Result};

/// Retained storage plus the placement of a rectangle inside it.
struct Region<T> {
    owner: Owner<T>,
    offset: usize,
    extent: Extent,
}

impl<T> Region<T> {
    fn new(owner: Owner<T>, offset: usize, extent: Extent) -> Result<Self> {
        extent.validate(offset, owner.len())?;
        Ok(Self {
            owner,
            offset,
            extent,
        })
    }

    /// Like [`Region::new`], refusing storage that cannot take writes of `T`.
    fn writable(owner: Owner<T>, offset: usize, extent: Extent) -> Result<Self> {
        owner.variance().admit_mutable::<T>()?;
        Self::new(owner, offset, extent)
    }

    fn from_layout(owner: Owner<T>, layout: Layout2D, writable: bool) -> Result<Self> {
        let extent = layout.extent()?;
        if writable {
            Self::writable(owner, layout.offset, extent)
        } else {
            Self::new(owner, layout.offset, extent)
        }
    }

    fn empty() -> Self {
        Self {
            owner: Owner::Empty,
            offset: 0,
            extent: Extent::EMPTY,
        }
    }

    /// Address of element `(0, 0)` for the duration of one call.
    fn origin(&self) -> NonNull<T> {
        let base = self.owner.resolve();
        if self.extent.is_empty() {
            base
        } else {
            // SAFETY: the region was validated against the owner.
            unsafe { raw::add(base, self.offset) }
        }
    }

    fn slice(&self, row: usize, col: usize, height: usize, width: usize) -> Result<Self> {
        let (delta, extent) = self.extent.slice(row, col, height, width)?;
        Ok(Self {
            owner: self.owner.clone(),
            offset: self.offset + delta,
            extent,
        })
    }

    fn same_as(&self, other: &Self) -> bool {
        self.owner.identity() == other.owner.identity()
            && self.offset == other.offset
            && self.extent == other.extent
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        if self.extent.is_empty() {
            0u64.hash(state);
            return;
        }
        self.owner.identity().hash(state);
        self.offset.hash(state);
        self.extent.hash(state);
    }

    fn hash_code(&self) -> u64 {
        if self.extent.is_empty() {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn pin(&self) -> MemoryHandle<T> {
        MemoryHandle::new(self.owner.clone(), self.offset)
    }
}

// ============================================================================
// Memory2D
// ============================================================================

/// Owning, writable 2D view.
///
/// A `Memory2D` is the only writer of its rectangle, so it is not `Clone`.
/// It can be sent to another thread when `T: Send + Sync`, split into
/// disjoint halves that share the storage, or turned into a shareable
/// [`ReadOnlyMemory2D`].
pub struct Memory2D<T> {
    region: Region<T>,
}

impl<T> Memory2D<T> {
    /// Take ownership of `data` as a packed `height x width` rectangle.
    pub fn from_vec(data: Vec<T>, height: usize, width: usize) -> Result<Self> {
        let owner = Owner::from_vec(data, Default::default());
        Region::writable(owner, 0, Extent::packed(height, width)).map(Self::wrap)
    }

    /// Take ownership of `data` and view `height x width` elements from
    /// `offset`, with `pitch` padding elements after each row.
    pub fn from_vec_with_pitch(
        data: Vec<T>,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let extent = Extent::with_pitch(height, width, pitch)?;
        let owner = Owner::from_vec(data, Default::default());
        Region::writable(owner, offset, extent).map(Self::wrap)
    }

    /// Take ownership of a native array.
    ///
    /// # Errors
    /// `TypeMismatch` if the array is covariant.
    pub fn from_array(array: Array2D<T>) -> Result<Self> {
        let (data, layout, variance) = array.into_parts();
        Region::from_layout(Owner::from_vec(data, variance), layout, true).map(Self::wrap)
    }

    /// Take ownership of a native array and view its sub-rectangle at
    /// `(row, col)`.
    pub fn from_array_region(
        array: Array2D<T>,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        let (data, layout, variance) = array.into_parts();
        let layout = layout.region(row, col, height, width)?;
        Region::from_layout(Owner::from_vec(data, variance), layout, true).map(Self::wrap)
    }

    /// Take ownership of a 3D array and view layer `depth`.
    pub fn from_array3d_layer(array: Array3D<T>, depth: usize) -> Result<Self> {
        let (data, layout, variance) = array.into_parts();
        let layout = layout.layer(depth)?;
        Region::from_layout(Owner::from_vec(data, variance), layout, true).map(Self::wrap)
    }

    /// Take over `manager` and view `height x width` elements of its
    /// storage from `offset`, with `pitch` padding elements after each row.
    pub fn from_manager<M: MemoryManager<T> + 'static>(
        manager: M,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let extent = Extent::with_pitch(height, width, pitch)?;
        let owner = Owner::from_manager(Arc::new(manager));
        Region::writable(owner, offset, extent).map(Self::wrap)
    }

    /// Reshape a flat view; `offset` is relative to the start of `memory`.
    pub fn from_flat(
        memory: FlatMemory<T>,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let extent = Extent::with_pitch(height, width, pitch)?;
        let (owner, start, len) = memory.into_parts();
        extent.validate(offset, len)?;
        Ok(Self::wrap(Region {
            owner,
            offset: start + offset,
            extent,
        }))
    }

    /// A 0x0 view with no storage.
    pub fn empty() -> Self {
        Self::wrap(Region::empty())
    }

    fn wrap(region: Region<T>) -> Self {
        Self { region }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.region.extent.height()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.region.extent.width()
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.region.extent.stride()
    }

    #[inline]
    pub fn pitch(&self) -> usize {
        self.region.extent.pitch()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.region.extent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.region.extent.is_empty()
    }

    /// Borrowed read-only view of the rectangle.
    pub fn span(&self) -> ReadOnlySpan2D<'_, T> {
        // SAFETY: the region is live while `self` is borrowed.
        unsafe { ReadOnlySpan2D::from_raw(self.region.origin(), self.region.extent) }
    }

    /// Borrowed writable view of the rectangle.
    pub fn span_mut(&mut self) -> Span2D<'_, T> {
        // SAFETY: the region is live and only written through `self`.
        unsafe { Span2D::from_raw(self.region.origin(), self.region.extent) }
    }

    /// Element at `(row, col)`, or `OutOfRange`.
    pub fn get(&self, row: usize, col: usize) -> Result<&T> {
        self.span().get(row, col)
    }

    /// Mutable element at `(row, col)`, or `OutOfRange`.
    pub fn get_mut(&mut self, row: usize, col: usize) -> Result<&mut T> {
        let index = self.region.extent.index(row, col)?;
        // SAFETY: index addresses an element of the region, borrowed mutably.
        Ok(unsafe { raw::get_mut(self.region.origin(), index) })
    }

    /// Narrow in place to the sub-rectangle at `(row, col)`; the stride is
    /// kept. On error `self` is left as it was.
    pub fn slice(&mut self, row: usize, col: usize, height: usize, width: usize) -> Result<()> {
        self.region = self.region.slice(row, col, height, width)?;
        Ok(())
    }

    /// Split off rows `[row, height)` and return them; `self` keeps rows
    /// `[0, row)`. On error `self` is left as it was.
    pub fn split_at_row(&mut self, row: usize) -> Result<Self> {
        let (height, width) = (self.height(), self.width());
        let top = self.region.slice(0, 0, row, width)?;
        let bottom = self.region.slice(row, 0, height - row, width)?;
        self.region = top;
        Ok(Self::wrap(bottom))
    }

    /// Split off columns `[col, width)` and return them; `self` keeps
    /// columns `[0, col)`. On error `self` is left as it was.
    pub fn split_at_column(&mut self, col: usize) -> Result<Self> {
        let (height, width) = (self.height(), self.width());
        let left = self.region.slice(0, 0, height, col)?;
        let right = self.region.slice(0, col, height, width - col)?;
        self.region = left;
        Ok(Self::wrap(right))
    }

    /// Read-only lane over row `index`.
    pub fn row(&self, index: usize) -> Result<Lane<'_, T>> {
        self.span().row(index)
    }

    /// Read-only lane over column `index`.
    pub fn column(&self, index: usize) -> Result<Lane<'_, T>> {
        self.span().column(index)
    }

    /// Writable lane over row `index`.
    pub fn row_mut(&mut self, index: usize) -> Result<LaneMut<'_, T>> {
        self.span_mut().into_row_mut(index)
    }

    /// Writable lane over column `index`.
    pub fn column_mut(&mut self, index: usize) -> Result<LaneMut<'_, T>> {
        self.span_mut().into_column_mut(index)
    }

    /// Flat view of the same elements, when the rectangle is packed.
    ///
    /// Hands `self` back unchanged otherwise.
    pub fn try_get_flat_memory(self) -> std::result::Result<FlatMemory<T>, Self> {
        if !self.region.extent.is_contiguous() {
            return Err(self);
        }
        let len = self.len();
        let Region { owner, offset, .. } = self.region;
        Ok(FlatMemory::from_parts(owner, offset, len))
    }

    /// Pin the storage; released when the handle is dropped.
    pub fn pin(&self) -> MemoryHandle<T> {
        self.region.pin()
    }

    /// Clone the rectangle into a new packed array.
    pub fn to_array(&self) -> Array2D<T>
    where
        T: Clone,
    {
        self.span().to_array()
    }

    /// Give up write access; the result can be cloned and shared.
    pub fn into_read_only(self) -> ReadOnlyMemory2D<T> {
        ReadOnlyMemory2D {
            region: self.region,
        }
    }

    /// Hash of the view identity; 0 for empty views.
    pub fn hash_code(&self) -> u64 {
        self.region.hash_code()
    }
}

impl<T> Default for Memory2D<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Index<(usize, usize)> for Memory2D<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        match self.get(row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T> IndexMut<(usize, usize)> for Memory2D<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        match self.get_mut(row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T> PartialEq for Memory2D<T> {
    fn eq(&self, other: &Self) -> bool {
        self.region.same_as(&other.region)
    }
}

impl<T> Eq for Memory2D<T> {}

impl<T> Hash for Memory2D<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.region.hash_into(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Memory2D<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.span(), f)
    }
}

// ============================================================================
// ReadOnlyMemory2D
// ============================================================================

/// Owning, shareable read-only 2D view.
pub struct ReadOnlyMemory2D<T> {
    region: Region<T>,
}

impl<T> ReadOnlyMemory2D<T> {
    /// Take ownership of `data` as a packed `height x width` rectangle.
    pub fn from_vec(data: Vec<T>, height: usize, width: usize) -> Result<Self> {
        let owner = Owner::from_vec(data, Default::default());
        Region::new(owner, 0, Extent::packed(height, width)).map(Self::wrap)
    }

    /// Take ownership of `data` and view `height x width` elements from
    /// `offset`, with `pitch` padding elements after each row.
    pub fn from_vec_with_pitch(
        data: Vec<T>,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let extent = Extent::with_pitch(height, width, pitch)?;
        let owner = Owner::from_vec(data, Default::default());
        Region::new(owner, offset, extent).map(Self::wrap)
    }

    /// Take ownership of a native array. Covariant arrays are accepted.
    pub fn from_array(array: Array2D<T>) -> Result<Self> {
        let (data, layout, variance) = array.into_parts();
        Region::from_layout(Owner::from_vec(data, variance), layout, false).map(Self::wrap)
    }

    /// Take ownership of a native array and view its sub-rectangle at
    /// `(row, col)`.
    pub fn from_array_region(
        array: Array2D<T>,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        let (data, layout, variance) = array.into_parts();
        let layout = layout.region(row, col, height, width)?;
        Region::from_layout(Owner::from_vec(data, variance), layout, false).map(Self::wrap)
    }

    /// Take ownership of a 3D array and view layer `depth`.
    pub fn from_array3d_layer(array: Array3D<T>, depth: usize) -> Result<Self> {
        let (data, layout, variance) = array.into_parts();
        let layout = layout.layer(depth)?;
        Region::from_layout(Owner::from_vec(data, variance), layout, false).map(Self::wrap)
    }

    /// View part of a shared manager's storage.
    pub fn from_manager<M: MemoryManager<T> + 'static>(
        manager: Arc<M>,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let extent = Extent::with_pitch(height, width, pitch)?;
        Region::new(Owner::from_manager(manager), offset, extent).map(Self::wrap)
    }

    /// Reshape a flat view; `offset` is relative to the start of `memory`.
    pub fn from_flat(
        memory: &ReadOnlyFlatMemory<T>,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let extent = Extent::with_pitch(height, width, pitch)?;
        let (owner, start, len) = memory.parts();
        extent.validate(offset, len)?;
        Ok(Self::wrap(Region {
            owner: owner.clone(),
            offset: start + offset,
            extent,
        }))
    }

    /// A 0x0 view with no storage.
    pub fn empty() -> Self {
        Self::wrap(Region::empty())
    }

    fn wrap(region: Region<T>) -> Self {
        Self { region }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.region.extent.height()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.region.extent.width()
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.region.extent.stride()
    }

    #[inline]
    pub fn pitch(&self) -> usize {
        self.region.extent.pitch()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.region.extent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.region.extent.is_empty()
    }

    /// Borrowed view of the rectangle.
    pub fn span(&self) -> ReadOnlySpan2D<'_, T> {
        // SAFETY: the region is live while `self` is borrowed and has no
        // writer.
        unsafe { ReadOnlySpan2D::from_raw(self.region.origin(), self.region.extent) }
    }

    /// Element at `(row, col)`, or `OutOfRange`.
    pub fn get(&self, row: usize, col: usize) -> Result<&T> {
        self.span().get(row, col)
    }

    /// Sub-rectangle at `(row, col)` sharing the same storage; the stride is kept.
    pub fn slice(&self, row: usize, col: usize, height: usize, width: usize) -> Result<Self> {
        self.region.slice(row, col, height, width).map(Self::wrap)
    }

    /// Lane over row `index`.
    pub fn row(&self, index: usize) -> Result<Lane<'_, T>> {
        self.span().row(index)
    }

    /// Lane over column `index`.
    pub fn column(&self, index: usize) -> Result<Lane<'_, T>> {
        self.span().column(index)
    }

    /// Flat view of the same elements, when the rectangle is packed.
    pub fn try_get_flat_memory(&self) -> Option<ReadOnlyFlatMemory<T>> {
        if !self.region.extent.is_contiguous() {
            return None;
        }
        Some(ReadOnlyFlatMemory::from_parts(
            self.region.owner.clone(),
            self.region.offset,
            self.len(),
        ))
    }

    /// Pin the storage; released when the handle is dropped.
    pub fn pin(&self) -> MemoryHandle<T> {
        self.region.pin()
    }

    /// Clone the rectangle into a new packed array.
    pub fn to_array(&self) -> Array2D<T>
    where
        T: Clone,
    {
        self.span().to_array()
    }

    /// Hash of the view identity; 0 for empty views.
    pub fn hash_code(&self) -> u64 {
        self.region.hash_code()
    }
}

impl<T> Clone for ReadOnlyMemory2D<T> {
    fn clone(&self) -> Self {
        Self::wrap(Region {
            owner: self.region.owner.clone(),
            offset: self.region.offset,
            extent: self.region.extent,
        })
    }
}

impl<T> Default for ReadOnlyMemory2D<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Memory2D<T>> for ReadOnlyMemory2D<T> {
    fn from(memory: Memory2D<T>) -> Self {
        memory.into_read_only()
    }
}

impl<T> Index<(usize, usize)> for ReadOnlyMemory2D<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        match self.get(row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T> PartialEq for ReadOnlyMemory2D<T> {
    fn eq(&self, other: &Self) -> bool {
        self.region.same_as(&other.region)
    }
}

impl<T> Eq for ReadOnlyMemory2D<T> {}

impl<T> Hash for ReadOnlyMemory2D<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.region.hash_into(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlyMemory2D<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.span(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Upcast;
    use crate::owner::HeapBuffer;
    use crate::SpanError;
    use std::collections::HashSet;

    #[test]
    fn test_from_vec_and_index() {
        let mut memory = Memory2D::from_vec((0..6).collect::<Vec<i32>>(), 2, 3).unwrap();
        assert_eq!(memory[(1, 2)], 5);
        memory[(0, 1)] = 10;
        *memory.get_mut(1, 0).unwrap() = 30;
        assert_eq!(memory.to_array().as_slice(), &[0, 10, 2, 30, 4, 5]);
        assert!(matches!(
            memory.get(2, 0),
            Err(SpanError::OutOfRange { what: "row", .. })
        ));
    }

    #[test]
    fn test_from_vec_size_mismatch() {
        assert!(matches!(
            Memory2D::from_vec(vec![0; 5], 2, 3),
            Err(SpanError::SizeMismatch {
                required: 6,
                available: 5
            })
        ));
        assert!(matches!(
            ReadOnlyMemory2D::from_vec_with_pitch(vec![0; 8], 2, 2, 3, 1),
            Err(SpanError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_slice_region_of_array() {
        let array = Array2D::from_rows(&[[1, 2, 3], [4, 5, 6]]);
        let mut corner = Memory2D::from_array(array).unwrap();
        corner.slice(1, 1, 1, 2).unwrap();
        assert_eq!(corner.stride(), 3);
        assert_eq!(corner.to_array().as_slice(), &[5, 6]);
    }

    #[test]
    fn test_pitched_vec() {
        let data = vec![1, 2, 3, 4, 5, 6];
        let memory = ReadOnlyMemory2D::from_vec_with_pitch(data, 1, 2, 2, 1).unwrap();
        assert_eq!(memory[(0, 0)], 2);
        assert_eq!(memory[(1, 1)], 6);
        assert_eq!(memory.pitch(), 1);
        assert_eq!(memory.column(1).unwrap().to_vec(), vec![3, 6]);
    }

    #[test]
    fn test_split_at_row() {
        let mut top = Memory2D::from_vec(vec![0; 6], 3, 2).unwrap();
        let mut bottom = top.split_at_row(1).unwrap();
        assert_eq!(top.height(), 1);
        assert_eq!(bottom.height(), 2);
        top.span_mut().fill(1);
        bottom.span_mut().fill(2);
        assert_eq!(top.to_array().as_slice(), &[1, 1]);
        assert_eq!(bottom.to_array().as_slice(), &[2, 2, 2, 2]);
    }

    #[test]
    fn test_split_at_column() {
        let mut left = Memory2D::from_vec((0..6).collect::<Vec<i32>>(), 2, 3).unwrap();
        let right = left.split_at_column(1).unwrap();
        left.column_mut(0).unwrap().fill(-1);
        assert_eq!(left.to_array().as_slice(), &[-1, -1]);
        assert_eq!(right.to_array().as_slice(), &[1, 2, 4, 5]);
        assert!(Memory2D::from_vec(vec![0; 4], 2, 2)
            .unwrap()
            .split_at_column(3)
            .is_err());
    }

    #[test]
    fn test_try_get_flat_memory() {
        let mut narrow = Memory2D::from_vec((0..9).collect::<Vec<i32>>(), 3, 3).unwrap();
        narrow.slice(0, 0, 3, 2).unwrap();
        let mut narrow = match narrow.try_get_flat_memory() {
            Ok(_) => panic!("a pitched rectangle is not flat"),
            Err(back) => back,
        };
        assert_eq!(narrow.width(), 2);

        narrow.slice(1, 0, 1, 2).unwrap();
        let mut flat = match narrow.try_get_flat_memory() {
            Ok(flat) => flat,
            Err(_) => panic!("a single row is flat"),
        };
        assert_eq!(flat.as_slice(), &[3, 4]);
        flat.as_mut_slice()[0] = 30;
        assert_eq!(flat.as_slice(), &[30, 4]);
    }

    #[test]
    fn test_read_only_flat_memory() {
        let memory = ReadOnlyMemory2D::from_vec((0..6).collect::<Vec<i32>>(), 2, 3).unwrap();
        let flat = memory.try_get_flat_memory().unwrap();
        assert_eq!(flat.as_slice(), &[0, 1, 2, 3, 4, 5]);
        assert!(memory.slice(0, 1, 2, 2).unwrap().try_get_flat_memory().is_none());
    }

    #[test]
    fn test_from_flat() {
        let mut flat = FlatMemory::from_vec((0..10).collect::<Vec<i32>>());
        flat.slice(2, 8).unwrap();
        let memory = Memory2D::from_flat(flat, 1, 2, 2, 1).unwrap();
        assert_eq!(memory.to_array().as_slice(), &[3, 4, 6, 7]);

        let shared = ReadOnlyFlatMemory::from_vec(vec![1, 2, 3, 4]);
        assert!(ReadOnlyMemory2D::from_flat(&shared, 0, 2, 2, 0).is_ok());
        assert!(ReadOnlyMemory2D::from_flat(&shared, 1, 2, 2, 0).is_err());
    }

    #[test]
    fn test_pin_releases_on_drop() {
        let buffer = Arc::new(HeapBuffer::from_vec((0..8).collect::<Vec<u32>>()));
        let memory = ReadOnlyMemory2D::from_manager(buffer.clone(), 0, 2, 3, 1).unwrap();
        {
            let handle = memory.slice(1, 1, 1, 2).unwrap().pin();
            assert_eq!(buffer.pin_count(), 1);
            assert_eq!(unsafe { *handle.as_ptr() }, 5);
        }
        assert_eq!(buffer.pin_count(), 0);
    }

    #[test]
    fn test_pin_keeps_storage_alive() {
        let handle = {
            let memory = Memory2D::from_vec(vec![String::from("kept")], 1, 1).unwrap();
            memory.pin()
        };
        assert_eq!(unsafe { &*handle.as_ptr() }, "kept");
    }

    #[test]
    fn test_manager_backed_memory() {
        let mut memory = Memory2D::from_manager(HeapBuffer::<i64>::new(12), 1, 2, 3, 2).unwrap();
        memory.span_mut().fill(7);
        assert_eq!(memory.stride(), 5);
        assert_eq!(memory.to_array().as_slice(), &[7; 6]);
        assert!(Memory2D::from_manager(HeapBuffer::<i64>::new(5), 0, 2, 3, 0).is_err());
    }

    #[test]
    fn test_equality_is_identity() {
        let a = ReadOnlyMemory2D::from_vec(vec![1, 2, 3, 4], 2, 2).unwrap();
        let b = a.clone();
        let c = b.clone();
        assert_eq!(a, a);
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_eq!(b, c);
        assert_eq!(a, c);
        assert_eq!(a.hash_code(), c.hash_code());

        let same_values = ReadOnlyMemory2D::from_vec(vec![1, 2, 3, 4], 2, 2).unwrap();
        assert_ne!(a, same_values);
        assert_ne!(a, a.slice(0, 0, 1, 2).unwrap());
        assert_eq!(a.slice(1, 0, 1, 2).unwrap(), a.slice(1, 0, 1, 2).unwrap());

        let set: HashSet<_> = [a.clone(), b, c, same_values].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_rejected_slice_keeps_storage() {
        let token = Arc::new(());
        let cells: Vec<Arc<()>> = (0..4).map(|_| token.clone()).collect();
        let mut memory = Memory2D::from_vec(cells, 2, 2).unwrap();
        assert_eq!(Arc::strong_count(&token), 5);

        assert!(matches!(
            memory.slice(0, 0, 3, 1),
            Err(SpanError::OutOfRange {
                what: "height",
                value: 3,
                bound: 2
            })
        ));
        assert!(memory.split_at_row(5).is_err());
        assert!(memory.split_at_column(3).is_err());
        assert_eq!(Arc::strong_count(&token), 5);
        assert_eq!((memory.height(), memory.width()), (2, 2));

        memory.slice(1, 0, 1, 2).unwrap();
        assert_eq!(memory.len(), 2);
        drop(memory);
        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    fn test_rejected_split_keeps_manager_view() {
        let mut memory = Memory2D::from_manager(HeapBuffer::<i32>::new(6), 0, 2, 3, 0).unwrap();
        memory.span_mut().fill(4);
        assert!(memory.split_at_row(5).is_err());
        assert_eq!(memory.to_array().as_slice(), &[4; 6]);
    }

    #[test]
    fn test_writable_equality_is_identity() {
        let mut top = Memory2D::from_vec(vec![1, 2, 3, 4], 2, 2).unwrap();
        let bottom = top.split_at_row(1).unwrap();
        assert_eq!(top, top);
        assert_ne!(top, bottom);
        assert_ne!(top.hash_code(), bottom.hash_code());

        let a = Memory2D::from_vec(vec![5, 6], 1, 2).unwrap();
        let b = Memory2D::from_vec(vec![5, 6], 1, 2).unwrap();
        assert_ne!(a, b);

        let hash_of = |memory: &Memory2D<i32>| {
            let mut hasher = DefaultHasher::new();
            memory.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash_of(&a), a.hash_code());
        assert_eq!(hash_of(&top), top.hash_code());

        let set: HashSet<&Memory2D<i32>> = [&top, &bottom, &a, &b, &a].into_iter().collect();
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_empty_hashes_to_zero() {
        assert_eq!(ReadOnlyMemory2D::<u8>::empty().hash_code(), 0);
        assert_eq!(Memory2D::<u8>::empty().hash_code(), 0);
        let memory = ReadOnlyMemory2D::from_vec(vec![1, 2, 3, 4], 2, 2).unwrap();
        let empty = memory.slice(1, 1, 0, 1).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.hash_code(), 0);
        assert_ne!(memory.hash_code(), 0);
    }

    #[test]
    fn test_covariant_array() {
        trait Animal {}
        struct Dog;
        impl Animal for Dog {}
        impl Upcast<Arc<dyn Animal>> for Dog {}

        let dog = Arc::new(Dog) as Arc<dyn Animal>;
        let cells = vec![dog.clone(), dog];
        let array = Array2D::covariant::<Dog>(cells, 1, 2).unwrap();
        assert!(matches!(
            Memory2D::from_array(array.clone()),
            Err(SpanError::TypeMismatch { .. })
        ));
        let read_only = ReadOnlyMemory2D::from_array(array).unwrap();
        assert_eq!(read_only.len(), 2);
    }

    #[test]
    fn test_array3d_layer() {
        let array = Array3D::from_fn(3, 2, 2, |d, r, c| d * 10 + r * 2 + c);
        let memory = Memory2D::from_array3d_layer(array.clone(), 2).unwrap();
        assert_eq!(memory.to_array().as_slice(), &[20, 21, 22, 23]);
        assert!(matches!(
            ReadOnlyMemory2D::from_array3d_layer(array, 3),
            Err(SpanError::OutOfRange { what: "depth", .. })
        ));
    }

    #[test]
    fn test_moves_between_threads() {
        let mut memory = Memory2D::from_vec(vec![0u32; 4], 2, 2).unwrap();
        let handle = std::thread::spawn(move || {
            memory.row_mut(1).unwrap().fill(9);
            memory
        });
        let memory = handle.join().unwrap().into_read_only();
        assert_eq!(memory.to_array().as_slice(), &[0, 0, 9, 9]);
    }
}
