//! Zero-copy strided sequences and view iterators.
//!
//! A lane is one row (step 1) or one column (step `stride`) of a 2D view.
//! Lanes borrow from the view they were taken from and never outlive it.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use crate::descriptor::Extent;
use crate::{raw, Result, SpanError};

fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(SpanError::OutOfRange {
            what: "index",
            value: index,
            bound: len,
        });
    }
    Ok(())
}

fn check_fits(required: usize, available: usize) -> Result<()> {
    if required > available {
        return Err(SpanError::SizeMismatch {
            required,
            available,
        });
    }
    Ok(())
}

// ============================================================================
// Lane
// ============================================================================

/// Read-only strided sequence of `len` elements, `step` elements apart.
pub struct Lane<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    step: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Clone for Lane<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for Lane<'a, T> {}

impl<'a, T> Lane<'a, T> {
    /// # Safety
    /// `len` elements `step` apart from `ptr` must be readable for `'a`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, len: usize, step: usize) -> Self {
        Self {
            ptr,
            len,
            step,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements between consecutive items: 1 for rows, the stride for columns.
    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    /// Element `index` of the lane, or `OutOfRange`.
    pub fn get(&self, index: usize) -> Result<&'a T> {
        check_index(index, self.len)?;
        // SAFETY: index < len.
        Ok(unsafe { raw::get(self.ptr, index * self.step) })
    }

    /// The lane as a slice, when its elements are adjacent.
    pub fn as_slice(&self) -> Option<&'a [T]> {
        if self.step == 1 || self.len <= 1 {
            // SAFETY: adjacent elements inside the lane.
            Some(unsafe { raw::contiguous(self.ptr, self.len) })
        } else {
            None
        }
    }

    /// A fresh iterator positioned before the first element.
    pub fn iter(&self) -> LaneIter<'a, T> {
        LaneIter {
            lane: *self,
            position: None,
            exhausted: false,
        }
    }

    /// Clone every element into the front of `dst`.
    ///
    /// # Errors
    /// `SizeMismatch` if `dst` is shorter than the lane.
    pub fn copy_to(&self, dst: &mut [T]) -> Result<()>
    where
        T: Clone,
    {
        check_fits(self.len, dst.len())?;
        let dst_ptr = NonNull::from(dst).cast::<T>();
        // SAFETY: both runs are in bounds; `dst` is exclusively borrowed.
        unsafe { raw::clone_strided(self.ptr, self.step, dst_ptr, 1, self.len) };
        Ok(())
    }

    /// Like [`Lane::copy_to`], reporting failure as `false`.
    pub fn try_copy_to(&self, dst: &mut [T]) -> bool
    where
        T: Clone,
    {
        self.copy_to(dst).is_ok()
    }

    /// Clone every element into the front of another lane.
    pub fn copy_to_lane(&self, dst: &mut LaneMut<'_, T>) -> Result<()>
    where
        T: Clone,
    {
        check_fits(self.len, dst.len)?;
        // SAFETY: both lanes are in bounds; `dst` is exclusively borrowed.
        unsafe { raw::clone_strided(self.ptr, self.step, dst.ptr, dst.step, self.len) };
        Ok(())
    }

    /// Like [`copy_to_lane`](Self::copy_to_lane), reporting failure as `false`.
    pub fn try_copy_to_lane(&self, dst: &mut LaneMut<'_, T>) -> bool
    where
        T: Clone,
    {
        self.copy_to_lane(dst).is_ok()
    }

    /// Clone the lane into a vector.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }
}

impl<'a, T> Index<usize> for Lane<'a, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<'a, T> IntoIterator for Lane<'a, T> {
    type Item = &'a T;
    type IntoIter = LaneIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, 'b, T> IntoIterator for &'b Lane<'a, T> {
    type Item = &'a T;
    type IntoIter = LaneIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for Lane<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// ============================================================================
// LaneIter
// ============================================================================

/// Cursor over a [`Lane`].
///
/// Starts before the first element. [`LaneIter::move_next`] steps forward
/// and returns `false` once the lane is exhausted, and on every call after
/// that. [`LaneIter::current`] reads the element under the cursor.
pub struct LaneIter<'a, T> {
    lane: Lane<'a, T>,
    position: Option<usize>,
    exhausted: bool,
}

impl<'a, T> LaneIter<'a, T> {
    /// Advance to the next element.
    pub fn move_next(&mut self) -> bool {
        if self.exhausted {
            return false;
        }
        let next = self.position.map_or(0, |i| i + 1);
        if next < self.lane.len {
            self.position = Some(next);
            true
        } else {
            self.position = None;
            self.exhausted = true;
            false
        }
    }

    /// Element under the cursor; `None` before the first `move_next` and
    /// after exhaustion.
    pub fn current(&self) -> Option<&'a T> {
        let index = self.position?;
        // SAFETY: positions are always < len.
        Some(unsafe { raw::get(self.lane.ptr, index * self.lane.step) })
    }

    #[inline]
    fn remaining(&self) -> usize {
        if self.exhausted {
            return 0;
        }
        self.lane.len - self.position.map_or(0, |i| i + 1)
    }
}

impl<'a, T> Clone for LaneIter<'a, T> {
    fn clone(&self) -> Self {
        Self {
            lane: self.lane,
            position: self.position,
            exhausted: self.exhausted,
        }
    }
}

impl<'a, T> Iterator for LaneIter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.move_next() {
            self.current()
        } else {
            None
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl<'a, T> ExactSizeIterator for LaneIter<'a, T> {}

impl<'a, T> FusedIterator for LaneIter<'a, T> {}

// ============================================================================
// LaneMut
// ============================================================================

/// Writable strided sequence of `len` elements, `step` elements apart.
pub struct LaneMut<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    step: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> LaneMut<'a, T> {
    /// # Safety
    /// `len` elements `step` apart from `ptr` must be writable and unaliased
    /// for `'a`.
    #[inline]
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, len: usize, step: usize) -> Self {
        Self {
            ptr,
            len,
            step,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    /// Read-only reborrow.
    pub fn as_lane(&self) -> Lane<'_, T> {
        // SAFETY: same elements, shared for the borrow of `self`.
        unsafe { Lane::from_raw(self.ptr, self.len, self.step) }
    }

    /// Element `index` of the lane, or `OutOfRange`.
    pub fn get(&self, index: usize) -> Result<&T> {
        self.as_lane().get(index)
    }

    /// Mutable element `index` of the lane, or `OutOfRange`.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        check_index(index, self.len)?;
        // SAFETY: index < len, and `self` is borrowed mutably.
        Ok(unsafe { raw::get_mut(self.ptr, index * self.step) })
    }

    /// Iterate the lane front to back.
    pub fn iter(&self) -> LaneIter<'_, T> {
        self.as_lane().iter()
    }

    /// Iterate the lane mutably.
    pub fn iter_mut(&mut self) -> LaneIterMut<'_, T> {
        LaneIterMut {
            ptr: self.ptr,
            len: self.len,
            step: self.step,
            index: 0,
            _marker: PhantomData,
        }
    }

    /// Clone `src` into the front of the lane.
    ///
    /// # Errors
    /// `SizeMismatch` if the lane is shorter than `src`.
    pub fn copy_from(&mut self, src: &[T]) -> Result<()>
    where
        T: Clone,
    {
        check_fits(src.len(), self.len)?;
        let src_ptr = NonNull::from(src).cast::<T>();
        // SAFETY: both runs are in bounds; `src` cannot alias a lane we
        // hold mutably.
        unsafe { raw::clone_strided(src_ptr, 1, self.ptr, self.step, src.len()) };
        Ok(())
    }

    /// Like [`copy_from`](Self::copy_from), reporting failure as `false`.
    pub fn try_copy_from(&mut self, src: &[T]) -> bool
    where
        T: Clone,
    {
        self.copy_from(src).is_ok()
    }

    /// Clone the lane into the front of `dst`.
    pub fn copy_to(&self, dst: &mut [T]) -> Result<()>
    where
        T: Clone,
    {
        self.as_lane().copy_to(dst)
    }

    /// Clone the lane into a vector.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_lane().to_vec()
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        for slot in self.iter_mut() {
            slot.clone_from(&value);
        }
    }

    /// Reset every element to `T::default()`.
    pub fn clear(&mut self)
    where
        T: Default,
    {
        for slot in self.iter_mut() {
            *slot = T::default();
        }
    }
}

impl<'a, T> Index<usize> for LaneMut<'a, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<'a, T> IndexMut<usize> for LaneMut<'a, T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<'a, T> IntoIterator for LaneMut<'a, T> {
    type Item = &'a mut T;
    type IntoIter = LaneIterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        LaneIterMut {
            ptr: self.ptr,
            len: self.len,
            step: self.step,
            index: 0,
            _marker: PhantomData,
        }
    }
}

impl<'a, 'b, T> IntoIterator for &'b mut LaneMut<'a, T> {
    type Item = &'b mut T;
    type IntoIter = LaneIterMut<'b, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T: fmt::Debug> fmt::Debug for LaneMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Mutable iterator over a [`LaneMut`].
pub struct LaneIterMut<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    step: usize,
    index: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> Iterator for LaneIterMut<'a, T> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.len {
            return None;
        }
        let offset = self.index * self.step;
        self.index += 1;
        // SAFETY: each index is yielded once, so the references are disjoint.
        Some(unsafe { raw::get_mut(self.ptr, offset) })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a, T> ExactSizeIterator for LaneIterMut<'a, T> {}

impl<'a, T> FusedIterator for LaneIterMut<'a, T> {}

// ============================================================================
// Whole-view iterators
// ============================================================================

/// Row-major iterator over the elements of a 2D view.
pub struct Elements<'a, T> {
    ptr: NonNull<T>,
    extent: Extent,
    row: usize,
    col: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Elements<'a, T> {
    /// # Safety
    /// The region described by `ptr` and `extent` must be readable for `'a`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, extent: Extent) -> Self {
        let row = if extent.is_empty() { extent.height() } else { 0 };
        Self {
            ptr,
            extent,
            row,
            col: 0,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn remaining(&self) -> usize {
        if self.row >= self.extent.height() {
            return 0;
        }
        (self.extent.height() - self.row) * self.extent.width() - self.col
    }
}

impl<'a, T> Iterator for Elements<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.extent.height() {
            return None;
        }
        let index = raw::linear_index(self.row, self.col, self.extent.stride());
        self.col += 1;
        if self.col == self.extent.width() {
            self.col = 0;
            self.row += 1;
        }
        // SAFETY: (row, col) was inside the extent.
        Some(unsafe { raw::get(self.ptr, index) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl<'a, T> ExactSizeIterator for Elements<'a, T> {}

impl<'a, T> FusedIterator for Elements<'a, T> {}

/// Row-major mutable iterator over the elements of a 2D view.
pub struct ElementsMut<'a, T> {
    ptr: NonNull<T>,
    extent: Extent,
    row: usize,
    col: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> ElementsMut<'a, T> {
    /// # Safety
    /// The region described by `ptr` and `extent` must be writable and
    /// unaliased for `'a`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, extent: Extent) -> Self {
        let row = if extent.is_empty() { extent.height() } else { 0 };
        Self {
            ptr,
            extent,
            row,
            col: 0,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for ElementsMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.extent.height() {
            return None;
        }
        let index = raw::linear_index(self.row, self.col, self.extent.stride());
        self.col += 1;
        if self.col == self.extent.width() {
            self.col = 0;
            self.row += 1;
        }
        // SAFETY: every (row, col) is yielded once.
        Some(unsafe { raw::get_mut(self.ptr, index) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.row >= self.extent.height() {
            0
        } else {
            (self.extent.height() - self.row) * self.extent.width() - self.col
        };
        (remaining, Some(remaining))
    }
}

impl<'a, T> ExactSizeIterator for ElementsMut<'a, T> {}

impl<'a, T> FusedIterator for ElementsMut<'a, T> {}

/// Iterator over the rows of a 2D view as slices.
pub struct Rows<'a, T> {
    ptr: NonNull<T>,
    extent: Extent,
    row: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Rows<'a, T> {
    /// # Safety
    /// The region described by `ptr` and `extent` must be readable for `'a`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, extent: Extent) -> Self {
        Self {
            ptr,
            extent,
            row: 0,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Rows<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.extent.height() {
            return None;
        }
        let row = self.row;
        self.row += 1;
        if self.extent.width() == 0 {
            let empty: &'a [T] = &[];
            return Some(empty);
        }
        // SAFETY: row < height.
        Some(unsafe { raw::row(self.ptr, row, self.extent.width(), self.extent.stride()) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.extent.height() - self.row;
        (remaining, Some(remaining))
    }
}

impl<'a, T> ExactSizeIterator for Rows<'a, T> {}

impl<'a, T> FusedIterator for Rows<'a, T> {}

/// Iterator over the rows of a 2D view as mutable slices.
pub struct RowsMut<'a, T> {
    ptr: NonNull<T>,
    extent: Extent,
    row: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> RowsMut<'a, T> {
    /// # Safety
    /// The region described by `ptr` and `extent` must be writable and
    /// unaliased for `'a`.
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>, extent: Extent) -> Self {
        Self {
            ptr,
            extent,
            row: 0,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for RowsMut<'a, T> {
    type Item = &'a mut [T];

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.extent.height() {
            return None;
        }
        let row = self.row;
        self.row += 1;
        if self.extent.width() == 0 {
            let empty: &'a mut [T] = &mut [];
            return Some(empty);
        }
        // SAFETY: rows do not overlap because stride >= width for height > 1.
        Some(unsafe { raw::row_mut(self.ptr, row, self.extent.width(), self.extent.stride()) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.extent.height() - self.row;
        (remaining, Some(remaining))
    }
}

impl<'a, T> ExactSizeIterator for RowsMut<'a, T> {}

impl<'a, T> FusedIterator for RowsMut<'a, T> {}
