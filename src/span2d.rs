//! Borrowed 2D views.
//!
//! [`ReadOnlySpan2D`] and [`Span2D`] address a `height x width` rectangle
//! whose rows are `stride` elements apart, inside memory they borrow. Both
//! are bound to the lifetime of their source and hold a raw pointer, so they
//! are neither `Send` nor `Sync` and cannot be stored past the borrow.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use bytemuck::Pod;

use crate::array::{Array2D, Array3D};
use crate::descriptor::Extent;
use crate::lane::{Elements, ElementsMut, Lane, LaneMut, Rows, RowsMut};
use crate::layout::Layout2D;
use crate::{raw, Result, SpanError};

#[inline]
fn base_of<T>(data: &[T]) -> NonNull<T> {
    NonNull::from(data).cast::<T>()
}

#[inline]
fn base_of_mut<T>(data: &mut [T]) -> NonNull<T> {
    NonNull::from(data).cast::<T>()
}

/// Pointer `index` elements past `ptr`, or `ptr` itself for empty regions.
#[inline]
fn offset_ptr<T>(ptr: NonNull<T>, extent: &Extent, index: usize) -> NonNull<T> {
    if extent.is_empty() {
        ptr
    } else {
        // SAFETY: non-empty regions are in bounds and `index` addresses
        // an element inside them.
        unsafe { raw::add(ptr, index) }
    }
}

fn raw_origin<T>(ptr: *const T, extent: &Extent) -> Result<NonNull<T>> {
    match NonNull::new(ptr as *mut T) {
        Some(ptr) => Ok(ptr),
        None if extent.is_empty() => Ok(NonNull::dangling()),
        None => Err(SpanError::OutOfRange {
            what: "pointer",
            value: 0,
            bound: 0,
        }),
    }
}

fn cast_origin<T, U>(ptr: NonNull<T>, extent: &Extent) -> Result<NonNull<U>> {
    if extent.is_empty() {
        return Ok(NonNull::dangling());
    }
    if !raw::is_aligned_for::<T, U>(ptr) {
        return Err(SpanError::Misaligned {
            align: std::mem::align_of::<U>(),
        });
    }
    Ok(ptr.cast::<U>())
}

fn check_covers(extent: &Extent, dest: &Extent) -> Result<()> {
    if dest.height() < extent.height() {
        return Err(SpanError::SizeMismatch {
            required: extent.height(),
            available: dest.height(),
        });
    }
    if dest.width() < extent.width() {
        return Err(SpanError::SizeMismatch {
            required: extent.width(),
            available: dest.width(),
        });
    }
    Ok(())
}

fn check_flat(extent: &Extent, available: usize) -> Result<()> {
    if available < extent.len() {
        return Err(SpanError::SizeMismatch {
            required: extent.len(),
            available,
        });
    }
    Ok(())
}

// ============================================================================
// Pin handles
// ============================================================================

/// Scoped pin of a [`ReadOnlySpan2D`]; the address is valid until drop.
#[derive(Debug)]
pub struct Pinned<'a, T> {
    ptr: NonNull<T>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Pinned<'a, T> {
    /// Address of element `(0, 0)`.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }
}

/// Scoped pin of a [`Span2D`]; the address is valid until drop.
#[derive(Debug)]
pub struct PinnedMut<'a, T> {
    ptr: NonNull<T>,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> PinnedMut<'a, T> {
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }
}

// ============================================================================
// ReadOnlySpan2D
// ============================================================================

/// Borrowed, read-only 2D view.
pub struct ReadOnlySpan2D<'a, T> {
    ptr: NonNull<T>,
    extent: Extent,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Clone for ReadOnlySpan2D<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for ReadOnlySpan2D<'a, T> {}

impl<'a, T> ReadOnlySpan2D<'a, T> {
    /// View `height x width` elements of `data` starting at `offset`, with
    /// `pitch` padding elements after each row.
    ///
    /// # Errors
    /// `OutOfRange` if `offset > data.len()` or `width + pitch` overflows;
    /// `SizeMismatch` if the region runs past the end of `data`.
    pub fn new(
        data: &'a [T],
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        Self::over(data, offset, Extent::with_pitch(height, width, pitch)?)
    }

    /// Like [`ReadOnlySpan2D::new`], with an explicit row stride.
    ///
    /// # Errors
    /// Additionally `OutOfRange` if `stride < width` and `height > 1`.
    pub fn with_stride(
        data: &'a [T],
        offset: usize,
        height: usize,
        width: usize,
        stride: usize,
    ) -> Result<Self> {
        Self::over(data, offset, Extent::with_stride(height, width, stride)?)
    }

    /// View the start of `data` as a packed `height x width` rectangle.
    pub fn from_slice(data: &'a [T], height: usize, width: usize) -> Result<Self> {
        Self::over(data, 0, Extent::packed(height, width))
    }

    /// View a whole native array. Covariant arrays are accepted.
    pub fn from_array(array: &'a Array2D<T>) -> Self {
        let extent = Extent::packed(array.height(), array.width());
        // SAFETY: the packed layout of an array covers exactly its storage.
        unsafe { Self::from_raw(base_of(array.as_slice()), extent) }
    }

    /// View the sub-rectangle of `array` at `(row, col)`.
    pub fn from_array_region(
        array: &'a Array2D<T>,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        let layout = array.layout().region(row, col, height, width)?;
        Self::from_layout(array.as_slice(), layout)
    }

    /// View layer `depth` of a 3D array.
    ///
    /// # Errors
    /// `OutOfRange` if `depth >= array.depth()`.
    pub fn from_array3d_layer(array: &'a Array3D<T>, depth: usize) -> Result<Self> {
        let layout = array.layout().layer(depth)?;
        Self::from_layout(array.as_slice(), layout)
    }

    /// View memory at `ptr`.
    ///
    /// # Errors
    /// `OutOfRange` if `ptr` is null and the shape is not empty, or if
    /// `width + pitch` overflows.
    ///
    /// # Safety
    /// The `height x width` region with stride `width + pitch` starting at
    /// `ptr` must be readable and not mutated for `'a`.
    pub unsafe fn from_raw_parts(
        ptr: *const T,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let extent = Extent::with_pitch(height, width, pitch)?;
        let ptr = raw_origin(ptr, &extent)?;
        Ok(Self::from_raw(ptr, extent))
    }

    /// A `0 x 0` view.
    pub fn empty() -> Self {
        // SAFETY: nothing is addressed.
        unsafe { Self::from_raw(NonNull::dangling(), Extent::EMPTY) }
    }

    fn over(data: &'a [T], offset: usize, extent: Extent) -> Result<Self> {
        extent.validate(offset, data.len())?;
        let ptr = if extent.is_empty() {
            base_of(data)
        } else {
            // SAFETY: validated above.
            unsafe { raw::add(base_of(data), offset) }
        };
        // SAFETY: the region lies inside `data`.
        Ok(unsafe { Self::from_raw(ptr, extent) })
    }

    fn from_layout(data: &'a [T], layout: Layout2D) -> Result<Self> {
        Self::over(data, layout.offset, layout.extent()?)
    }

    /// # Safety
    /// The region described by `ptr` and `extent` must be readable and not
    /// mutated for `'a`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, extent: Extent) -> Self {
        Self {
            ptr,
            extent,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.extent.height()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.extent.width()
    }

    /// Elements from the start of one row to the start of the next.
    #[inline]
    pub fn stride(&self) -> usize {
        self.extent.stride()
    }

    /// Padding elements after each row.
    #[inline]
    pub fn pitch(&self) -> usize {
        self.extent.pitch()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.extent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extent.is_empty()
    }

    /// Address of element `(0, 0)`.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Element at `(row, col)`, or `OutOfRange`.
    pub fn get(&self, row: usize, col: usize) -> Result<&'a T> {
        let index = self.extent.index(row, col)?;
        // SAFETY: index addresses an element of the region.
        Ok(unsafe { raw::get(self.ptr, index) })
    }

    /// Sub-rectangle at `(row, col)`; the stride is kept.
    ///
    /// # Errors
    /// `OutOfRange` unless the rectangle lies inside this view.
    pub fn slice(&self, row: usize, col: usize, height: usize, width: usize) -> Result<Self> {
        let (delta, extent) = self.extent.slice(row, col, height, width)?;
        let ptr = offset_ptr(self.ptr, &self.extent, delta);
        // SAFETY: the sub-rectangle lies inside this region.
        Ok(unsafe { Self::from_raw(ptr, extent) })
    }

    /// Row `index` as a lane.
    pub fn row(&self, index: usize) -> Result<Lane<'a, T>> {
        let start = self.extent.row_start(index)?;
        let ptr = offset_ptr(self.ptr, &self.extent, start);
        // SAFETY: the row lies inside the region.
        Ok(unsafe { Lane::from_raw(ptr, self.width(), 1) })
    }

    /// Column `index` as a lane.
    pub fn column(&self, index: usize) -> Result<Lane<'a, T>> {
        self.extent.check_column(index)?;
        let ptr = offset_ptr(self.ptr, &self.extent, index);
        // SAFETY: the column lies inside the region.
        Ok(unsafe { Lane::from_raw(ptr, self.height(), self.stride()) })
    }

    /// Row `index` as a slice.
    pub fn row_slice(&self, index: usize) -> Result<&'a [T]> {
        let start = self.extent.row_start(index)?;
        let ptr = offset_ptr(self.ptr, &self.extent, start);
        // SAFETY: the row lies inside the region.
        Ok(unsafe { raw::contiguous(ptr, self.width()) })
    }

    /// The whole view as one slice, when it is packed.
    pub fn try_get_contiguous_span(&self) -> Option<&'a [T]> {
        if !self.extent.is_contiguous() {
            return None;
        }
        // SAFETY: a packed region is one run of `len` elements.
        Some(unsafe { raw::contiguous(self.ptr, self.len()) })
    }

    /// Reinterpret the elements as `U`.
    ///
    /// # Errors
    /// `SizeIncompatible` if a row (or the stride, for more than one row)
    /// is not a whole number of `U`; `Misaligned` if the origin is not
    /// aligned for `U`; `Unsupported` for zero-sized types.
    pub fn cast<U: Pod>(&self) -> Result<ReadOnlySpan2D<'a, U>>
    where
        T: Pod,
    {
        let extent = self.extent.cast::<T, U>()?;
        let ptr = cast_origin::<T, U>(self.ptr, &self.extent)?;
        // SAFETY: same bytes, and every bit pattern is a valid `U`.
        Ok(unsafe { ReadOnlySpan2D::from_raw(ptr, extent) })
    }

    /// Pin the view. Borrowed memory never moves, so this always succeeds.
    pub fn pin(&self) -> Pinned<'a, T> {
        Pinned {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Clone this view into the top-left corner of `dest`.
    ///
    /// # Errors
    /// `SizeMismatch` if `dest` is shorter or narrower.
    pub fn copy_to(&self, dest: &mut Span2D<'_, T>) -> Result<()>
    where
        T: Clone,
    {
        check_covers(&self.extent, &dest.extent)?;
        if self.is_empty() {
            return Ok(());
        }
        // SAFETY: both regions are in bounds, and `dest` is exclusively
        // borrowed so it cannot overlap this view.
        unsafe {
            raw::clone_rect(
                self.ptr,
                self.stride(),
                dest.ptr,
                dest.stride(),
                self.height(),
                self.width(),
            )
        };
        Ok(())
    }

    /// Like [`copy_to`](Self::copy_to), reporting failure as `false`.
    pub fn try_copy_to(&self, dest: &mut Span2D<'_, T>) -> bool
    where
        T: Clone,
    {
        self.copy_to(dest).is_ok()
    }

    /// Clone the elements, row by row, into the front of `dst`.
    pub fn copy_to_slice(&self, dst: &mut [T]) -> Result<()>
    where
        T: Clone,
    {
        check_flat(&self.extent, dst.len())?;
        if self.is_empty() {
            return Ok(());
        }
        // SAFETY: both regions are in bounds and `dst` is exclusively borrowed.
        unsafe {
            raw::clone_rect(
                self.ptr,
                self.stride(),
                base_of_mut(dst),
                self.width(),
                self.height(),
                self.width(),
            )
        };
        Ok(())
    }

    /// Like [`copy_to_slice`](Self::copy_to_slice), reporting failure as `false`.
    pub fn try_copy_to_slice(&self, dst: &mut [T]) -> bool
    where
        T: Clone,
    {
        self.copy_to_slice(dst).is_ok()
    }

    /// Elements in row-major order.
    pub fn iter(&self) -> Elements<'a, T> {
        // SAFETY: the region is readable for 'a.
        unsafe { Elements::from_raw(self.ptr, self.extent) }
    }

    /// Rows as slices.
    pub fn rows(&self) -> Rows<'a, T> {
        // SAFETY: the region is readable for 'a.
        unsafe { Rows::from_raw(self.ptr, self.extent) }
    }

    /// Packed copy of the view.
    pub fn to_array(&self) -> Array2D<T>
    where
        T: Clone,
    {
        tracing::trace!(height = self.height(), width = self.width(), "copying span to array");
        let mut data = Vec::with_capacity(self.len());
        for row in self.rows() {
            data.extend_from_slice(row);
        }
        Array2D::from_packed(data, self.height(), self.width())
    }

    /// Read-only spans do not define equality.
    ///
    /// # Errors
    /// Always `Unsupported`.
    pub fn equals(&self, _other: Option<&Self>) -> Result<bool> {
        Err(SpanError::Unsupported("equality on a read-only span"))
    }

    /// Read-only spans do not define a hash.
    ///
    /// # Errors
    /// Always `Unsupported`.
    pub fn hash_code(&self) -> Result<u64> {
        Err(SpanError::Unsupported("hashing a read-only span"))
    }
}

impl<'a, T> Default for ReadOnlySpan2D<'a, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T> Index<(usize, usize)> for ReadOnlySpan2D<'a, T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        match self.get(row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<'a, T> IntoIterator for ReadOnlySpan2D<'a, T> {
    type Item = &'a T;
    type IntoIter = Elements<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T> From<Span2D<'a, T>> for ReadOnlySpan2D<'a, T> {
    fn from(span: Span2D<'a, T>) -> Self {
        // SAFETY: the exclusive borrow is downgraded to a shared one.
        unsafe { Self::from_raw(span.ptr, span.extent) }
    }
}

impl<'a, T> From<&'a Array2D<T>> for ReadOnlySpan2D<'a, T> {
    fn from(array: &'a Array2D<T>) -> Self {
        Self::from_array(array)
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlySpan2D<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rows()).finish()
    }
}

// ============================================================================
// Span2D
// ============================================================================

/// Borrowed, writable 2D view.
pub struct Span2D<'a, T> {
    ptr: NonNull<T>,
    extent: Extent,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> Span2D<'a, T> {
    /// View `height x width` elements of `data` starting at `offset`, with
    /// `pitch` padding elements after each row.
    ///
    /// # Errors
    /// `OutOfRange` if `offset > data.len()` or `width + pitch` overflows;
    /// `SizeMismatch` if the region runs past the end of `data`.
    pub fn new(
        data: &'a mut [T],
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        Self::over(data, offset, Extent::with_pitch(height, width, pitch)?)
    }

    /// Like [`Span2D::new`], with an explicit row stride.
    pub fn with_stride(
        data: &'a mut [T],
        offset: usize,
        height: usize,
        width: usize,
        stride: usize,
    ) -> Result<Self> {
        Self::over(data, offset, Extent::with_stride(height, width, stride)?)
    }

    /// Packed `height x width` view over the start of `data`.
    pub fn from_slice(data: &'a mut [T], height: usize, width: usize) -> Result<Self> {
        Self::over(data, 0, Extent::packed(height, width))
    }

    /// View a whole native array.
    ///
    /// # Errors
    /// `TypeMismatch` if the array is covariant.
    pub fn from_array(array: &'a mut Array2D<T>) -> Result<Self> {
        array.variance().admit_mutable::<T>()?;
        let layout = array.layout();
        Self::from_layout(array.storage_mut(), layout)
    }

    /// View the sub-rectangle of `array` at `(row, col)`.
    pub fn from_array_region(
        array: &'a mut Array2D<T>,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        array.variance().admit_mutable::<T>()?;
        let layout = array.layout().region(row, col, height, width)?;
        Self::from_layout(array.storage_mut(), layout)
    }

    /// View layer `depth` of a 3D array.
    pub fn from_array3d_layer(array: &'a mut Array3D<T>, depth: usize) -> Result<Self> {
        array.variance().admit_mutable::<T>()?;
        let layout = array.layout().layer(depth)?;
        Self::from_layout(array.storage_mut(), layout)
    }

    /// View memory at `ptr`.
    ///
    /// # Errors
    /// `OutOfRange` if `ptr` is null and the shape is not empty, or if
    /// `width + pitch` overflows.
    ///
    /// # Safety
    /// The `height x width` region with stride `width + pitch` starting at
    /// `ptr` must be writable and not accessed through any other path for
    /// `'a`.
    pub unsafe fn from_raw_parts(
        ptr: *mut T,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let extent = Extent::with_pitch(height, width, pitch)?;
        let ptr = raw_origin(ptr, &extent)?;
        Ok(Self::from_raw(ptr, extent))
    }

    /// A 0x0 view over no memory.
    pub fn empty() -> Self {
        // SAFETY: nothing is addressed.
        unsafe { Self::from_raw(NonNull::dangling(), Extent::EMPTY) }
    }

    fn over(data: &'a mut [T], offset: usize, extent: Extent) -> Result<Self> {
        extent.validate(offset, data.len())?;
        let base = base_of_mut(data);
        let ptr = if extent.is_empty() {
            base
        } else {
            // SAFETY: validated above.
            unsafe { raw::add(base, offset) }
        };
        // SAFETY: the region lies inside `data`, which is exclusively borrowed.
        Ok(unsafe { Self::from_raw(ptr, extent) })
    }

    fn from_layout(data: &'a mut [T], layout: Layout2D) -> Result<Self> {
        Self::over(data, layout.offset, layout.extent()?)
    }

    /// # Safety
    /// The region described by `ptr` and `extent` must be writable and not
    /// accessed through any other path for `'a`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, extent: Extent) -> Self {
        Self {
            ptr,
            extent,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.extent.height()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.extent.width()
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.extent.stride()
    }

    #[inline]
    pub fn pitch(&self) -> usize {
        self.extent.pitch()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.extent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extent.is_empty()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Read-only reborrow.
    #[inline]
    pub fn as_read_only(&self) -> ReadOnlySpan2D<'_, T> {
        // SAFETY: shared for the borrow of `self`.
        unsafe { ReadOnlySpan2D::from_raw(self.ptr, self.extent) }
    }

    /// Writable reborrow for a shorter lifetime.
    #[inline]
    pub fn reborrow(&mut self) -> Span2D<'_, T> {
        // SAFETY: exclusive for the borrow of `self`.
        unsafe { Span2D::from_raw(self.ptr, self.extent) }
    }

    /// Element at `(row, col)`, or `OutOfRange`.
    pub fn get(&self, row: usize, col: usize) -> Result<&T> {
        self.as_read_only().get(row, col)
    }

    /// Mutable element at `(row, col)`, or `OutOfRange`.
    pub fn get_mut(&mut self, row: usize, col: usize) -> Result<&mut T> {
        let index = self.extent.index(row, col)?;
        // SAFETY: index addresses an element of the region, borrowed mutably.
        Ok(unsafe { raw::get_mut(self.ptr, index) })
    }

    /// Writable sub-rectangle at `(row, col)`, borrowed from `self`.
    pub fn slice(
        &mut self,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    ) -> Result<Span2D<'_, T>> {
        self.reborrow().into_slice(row, col, height, width)
    }

    /// Narrow this view to the sub-rectangle at `(row, col)`.
    pub fn into_slice(self, row: usize, col: usize, height: usize, width: usize) -> Result<Self> {
        let (delta, extent) = self.extent.slice(row, col, height, width)?;
        let ptr = offset_ptr(self.ptr, &self.extent, delta);
        // SAFETY: the sub-rectangle lies inside this region.
        Ok(unsafe { Self::from_raw(ptr, extent) })
    }

    /// Read-only lane over row `index`.
    pub fn row(&self, index: usize) -> Result<Lane<'_, T>> {
        self.as_read_only().row(index)
    }

    /// Read-only lane over column `index`.
    pub fn column(&self, index: usize) -> Result<Lane<'_, T>> {
        self.as_read_only().column(index)
    }

    /// Row `index` as a plain slice.
    pub fn row_slice(&self, index: usize) -> Result<&[T]> {
        self.as_read_only().row_slice(index)
    }

    /// Writable lane over row `index`.
    pub fn row_mut(&mut self, index: usize) -> Result<LaneMut<'_, T>> {
        self.reborrow().into_row_mut(index)
    }

    /// Writable lane over column `index`.
    pub fn column_mut(&mut self, index: usize) -> Result<LaneMut<'_, T>> {
        self.reborrow().into_column_mut(index)
    }

    /// Row `index` as a mutable slice.
    pub fn row_slice_mut(&mut self, index: usize) -> Result<&mut [T]> {
        let start = self.extent.row_start(index)?;
        let ptr = offset_ptr(self.ptr, &self.extent, start);
        // SAFETY: the row lies inside the region, borrowed mutably.
        Ok(unsafe { raw::contiguous_mut(ptr, self.width()) })
    }

    /// Consume the view into its row `index`.
    pub fn into_row_mut(self, index: usize) -> Result<LaneMut<'a, T>> {
        let start = self.extent.row_start(index)?;
        let ptr = offset_ptr(self.ptr, &self.extent, start);
        // SAFETY: the row lies inside the region.
        Ok(unsafe { LaneMut::from_raw(ptr, self.width(), 1) })
    }

    /// Consume the view into its column `index`.
    pub fn into_column_mut(self, index: usize) -> Result<LaneMut<'a, T>> {
        self.extent.check_column(index)?;
        let ptr = offset_ptr(self.ptr, &self.extent, index);
        // SAFETY: the column lies inside the region.
        Ok(unsafe { LaneMut::from_raw(ptr, self.height(), self.stride()) })
    }

    /// The rectangle as one slice, when it has no gaps between rows.
    pub fn try_get_contiguous_span(&self) -> Option<&[T]> {
        self.as_read_only().try_get_contiguous_span()
    }

    /// Mutable counterpart of [`try_get_contiguous_span`](Self::try_get_contiguous_span).
    pub fn try_get_contiguous_span_mut(&mut self) -> Option<&mut [T]> {
        if !self.extent.is_contiguous() {
            return None;
        }
        // SAFETY: a packed region is one run of `len` elements.
        Some(unsafe { raw::contiguous_mut(self.ptr, self.len()) })
    }

    /// Reinterpret the elements as `U`, borrowed from `self`.
    ///
    /// # Errors
    /// Same as [`ReadOnlySpan2D::cast`].
    pub fn cast<U: Pod>(&mut self) -> Result<Span2D<'_, U>>
    where
        T: Pod,
    {
        let extent = self.extent.cast::<T, U>()?;
        let ptr = cast_origin::<T, U>(self.ptr, &self.extent)?;
        // SAFETY: same bytes, and every bit pattern is valid for both types.
        Ok(unsafe { Span2D::from_raw(ptr, extent) })
    }

    /// Pin the view for the duration of the borrow.
    pub fn pin(&mut self) -> PinnedMut<'_, T> {
        PinnedMut {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Clone this view into the top-left corner of `dest`.
    pub fn copy_to(&self, dest: &mut Span2D<'_, T>) -> Result<()>
    where
        T: Clone,
    {
        self.as_read_only().copy_to(dest)
    }

    /// Like [`copy_to`](Self::copy_to), reporting failure as `false`.
    pub fn try_copy_to(&self, dest: &mut Span2D<'_, T>) -> bool
    where
        T: Clone,
    {
        self.copy_to(dest).is_ok()
    }

    /// Clone the elements, row by row, into the packed `dst`.
    pub fn copy_to_slice(&self, dst: &mut [T]) -> Result<()>
    where
        T: Clone,
    {
        self.as_read_only().copy_to_slice(dst)
    }

    /// Like [`copy_to_slice`](Self::copy_to_slice), reporting failure as `false`.
    pub fn try_copy_to_slice(&self, dst: &mut [T]) -> bool
    where
        T: Clone,
    {
        self.copy_to_slice(dst).is_ok()
    }

    /// Fill the view, row by row, from the front of a packed slice.
    ///
    /// # Errors
    /// `SizeMismatch` if `src` holds fewer than `len()` elements.
    pub fn copy_from_slice(&mut self, src: &[T]) -> Result<()>
    where
        T: Clone,
    {
        check_flat(&self.extent, src.len())?;
        if self.is_empty() {
            return Ok(());
        }
        // SAFETY: both regions are in bounds; `src` cannot alias a view we
        // hold mutably.
        unsafe {
            raw::clone_rect(
                base_of(src),
                self.width(),
                self.ptr,
                self.stride(),
                self.height(),
                self.width(),
            )
        };
        Ok(())
    }

    /// Set every element to `value`; padding is left alone.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        for row in self.rows_mut() {
            row.fill(value.clone());
        }
    }

    /// Reset every element to `T::default()`.
    pub fn clear(&mut self)
    where
        T: Default,
    {
        for value in self.iter_mut() {
            *value = T::default();
        }
    }

    /// Elements in row-major order.
    pub fn iter(&self) -> Elements<'_, T> {
        self.as_read_only().iter()
    }

    /// Mutable elements in row-major order.
    pub fn iter_mut(&mut self) -> ElementsMut<'_, T> {
        // SAFETY: the region is borrowed mutably.
        unsafe { ElementsMut::from_raw(self.ptr, self.extent) }
    }

    /// Rows as slices.
    pub fn rows(&self) -> Rows<'_, T> {
        self.as_read_only().rows()
    }

    /// Rows as mutable slices.
    pub fn rows_mut(&mut self) -> RowsMut<'_, T> {
        // SAFETY: the region is borrowed mutably.
        unsafe { RowsMut::from_raw(self.ptr, self.extent) }
    }

    /// Clone the rectangle into a new packed array.
    pub fn to_array(&self) -> Array2D<T>
    where
        T: Clone,
    {
        self.as_read_only().to_array()
    }
}

impl<'a, T> Default for Span2D<'a, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T> Index<(usize, usize)> for Span2D<'a, T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        match self.get(row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<'a, T> IndexMut<(usize, usize)> for Span2D<'a, T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        match self.get_mut(row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<'a, T> IntoIterator for Span2D<'a, T> {
    type Item = &'a mut T;
    type IntoIter = ElementsMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        // SAFETY: the view is consumed.
        unsafe { ElementsMut::from_raw(self.ptr, self.extent) }
    }
}

/// Identity: same origin, same shape.
impl<'a, T> PartialEq for Span2D<'a, T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.extent == other.extent
    }
}

impl<'a, T> Eq for Span2D<'a, T> {}

impl<'a, T> Hash for Span2D<'a, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.hash(state);
        self.extent.hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Span2D<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rows()).finish()
    }
}
