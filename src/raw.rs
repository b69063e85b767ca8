//! Raw pointer and offset arithmetic for strided memory.
//!
//! Every element offset computed in this crate goes through this module.
//! Shapes are validated by the caller (see `descriptor`); the functions here
//! only compute, and the `unsafe` ones trust that the region they are given
//! is in bounds.

use std::ptr::NonNull;

/// Linear index of `(row, col)` for rows `stride` elements apart.
#[inline]
pub(crate) fn linear_index(row: usize, col: usize, stride: usize) -> usize {
    row * stride + col
}

/// Number of elements spanned by a `height x width` region whose rows are
/// `stride` elements apart.
///
/// Returns `Some(0)` for empty regions and `None` on overflow.
#[inline]
pub(crate) fn required_len(height: usize, width: usize, stride: usize) -> Option<usize> {
    if height == 0 || width == 0 {
        return Some(0);
    }
    (height - 1).checked_mul(stride)?.checked_add(width)
}

/// Offset of layer `depth` in a packed `height x width` layered buffer.
#[inline]
pub(crate) fn layer_offset(depth: usize, height: usize, width: usize) -> Option<usize> {
    depth.checked_mul(height)?.checked_mul(width)
}

/// Whether `ptr` satisfies the alignment of `U`.
#[inline]
pub(crate) fn is_aligned_for<T, U>(ptr: NonNull<T>) -> bool {
    (ptr.as_ptr() as usize) % std::mem::align_of::<U>() == 0
}

/// Advance `base` by `index` elements.
///
/// # Safety
/// The result must stay within (or one past the end of) the allocation `base`
/// points into.
#[inline]
pub(crate) unsafe fn add<T>(base: NonNull<T>, index: usize) -> NonNull<T> {
    NonNull::new_unchecked(base.as_ptr().add(index))
}

/// # Safety
/// `base + index` must be a live, initialized element valid for `'a`.
#[inline]
pub(crate) unsafe fn get<'a, T>(base: NonNull<T>, index: usize) -> &'a T {
    &*base.as_ptr().add(index)
}

/// # Safety
/// Same as [`get`], and no other reference to the element may exist for `'a`.
#[inline]
pub(crate) unsafe fn get_mut<'a, T>(base: NonNull<T>, index: usize) -> &'a mut T {
    &mut *base.as_ptr().add(index)
}

/// Row `row` of a strided region as a slice.
///
/// # Safety
/// The row must be in bounds and valid for `'a`.
#[inline]
pub(crate) unsafe fn row<'a, T>(
    base: NonNull<T>,
    row: usize,
    width: usize,
    stride: usize,
) -> &'a [T] {
    std::slice::from_raw_parts(base.as_ptr().add(row * stride), width)
}

/// Mutable variant of [`row`].
///
/// # Safety
/// Same as [`row`], and the row must not be aliased for `'a`.
#[inline]
pub(crate) unsafe fn row_mut<'a, T>(
    base: NonNull<T>,
    row: usize,
    width: usize,
    stride: usize,
) -> &'a mut [T] {
    std::slice::from_raw_parts_mut(base.as_ptr().add(row * stride), width)
}

/// `len` packed elements starting at `base`.
///
/// # Safety
/// The run must be in bounds and valid for `'a`.
#[inline]
pub(crate) unsafe fn contiguous<'a, T>(base: NonNull<T>, len: usize) -> &'a [T] {
    std::slice::from_raw_parts(base.as_ptr(), len)
}

/// Mutable variant of [`contiguous`].
///
/// # Safety
/// Same as [`contiguous`], and the run must not be aliased for `'a`.
#[inline]
pub(crate) unsafe fn contiguous_mut<'a, T>(base: NonNull<T>, len: usize) -> &'a mut [T] {
    std::slice::from_raw_parts_mut(base.as_ptr(), len)
}

/// Clone a `height x width` rectangle from `src` into `dst`, row by row.
///
/// # Safety
/// Both rectangles must be in bounds and must not overlap.
pub(crate) unsafe fn clone_rect<T: Clone>(
    src: NonNull<T>,
    src_stride: usize,
    dst: NonNull<T>,
    dst_stride: usize,
    height: usize,
    width: usize,
) {
    if width == 0 {
        return;
    }
    for r in 0..height {
        let from = row(src, r, width, src_stride);
        let to = row_mut(dst, r, width, dst_stride);
        to.clone_from_slice(from);
    }
}

/// Clone `count` elements taken every `src_step` into slots every `dst_step`.
///
/// # Safety
/// Both strided runs must be in bounds and must not overlap.
pub(crate) unsafe fn clone_strided<T: Clone>(
    src: NonNull<T>,
    src_step: usize,
    dst: NonNull<T>,
    dst_step: usize,
    count: usize,
) {
    for i in 0..count {
        let value = get(src, i * src_step);
        get_mut(dst, i * dst_step).clone_from(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base<T>(data: &mut [T]) -> NonNull<T> {
        NonNull::from(data).cast::<T>()
    }

    #[test]
    fn test_linear_index() {
        assert_eq!(linear_index(0, 0, 5), 0);
        assert_eq!(linear_index(2, 3, 5), 13);
        assert_eq!(linear_index(1, 0, 0), 0);
    }

    #[test]
    fn test_required_len() {
        assert_eq!(required_len(2, 3, 3), Some(6));
        assert_eq!(required_len(2, 3, 4), Some(7));
        assert_eq!(required_len(1, 3, 0), Some(3));
        assert_eq!(required_len(0, 3, 100), Some(0));
        assert_eq!(required_len(3, 0, 100), Some(0));
        assert_eq!(required_len(usize::MAX, 1, 2), None);
    }

    #[test]
    fn test_layer_offset() {
        assert_eq!(layer_offset(0, 4, 5), Some(0));
        assert_eq!(layer_offset(2, 4, 5), Some(40));
        assert_eq!(layer_offset(usize::MAX, 2, 1), None);
    }

    #[test]
    fn test_row_and_get() {
        let mut data: Vec<i32> = (0..12).collect();
        let p = base(&mut data);
        unsafe {
            assert_eq!(row(p, 1, 3, 4), &[4, 5, 6]);
            assert_eq!(*get(p, linear_index(2, 1, 4)), 9);
            *get_mut(p, linear_index(0, 2, 4)) = -1;
        }
        assert_eq!(data[2], -1);
    }

    #[test]
    fn test_clone_rect_between_pitches() {
        // 2x3 rectangle at stride 5 copied into a packed 2x3 buffer.
        let mut src: Vec<i32> = (0..10).collect();
        let mut dst = vec![0; 6];
        unsafe { clone_rect(base(&mut src), 5, base(&mut dst), 3, 2, 3) };
        assert_eq!(dst, vec![0, 1, 2, 5, 6, 7]);
    }

    #[test]
    fn test_clone_rect_leaves_padding() {
        let mut src = vec![1, 2, 3, 4];
        let mut dst = vec![0; 6];
        unsafe { clone_rect(base(&mut src), 2, base(&mut dst), 3, 2, 2) };
        assert_eq!(dst, vec![1, 2, 0, 3, 4, 0]);
    }

    #[test]
    fn test_clone_strided_row_into_column() {
        let mut src = vec![1, 2, 3];
        let mut dst = vec![0; 9];
        unsafe { clone_strided(base(&mut src), 1, base(&mut dst), 3, 3) };
        assert_eq!(dst, vec![1, 0, 0, 2, 0, 0, 3, 0, 0]);
    }

    #[test]
    fn test_alignment() {
        let mut data = vec![0u64; 2];
        let p = base(&mut data).cast::<u32>();
        assert!(is_aligned_for::<u32, u64>(p));
        let shifted = unsafe { add(p, 1) };
        assert!(!is_aligned_for::<u32, u64>(shifted));
        assert!(is_aligned_for::<u32, u32>(shifted));
    }
}
