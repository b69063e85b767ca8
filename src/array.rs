//! Native packed 2D and 3D arrays.
//!
//! These are the owned counterparts of the views: a flat `Vec` plus
//! dimensions, laid out row-major (and layer-major for 3D). Their layouts
//! are computed from the dimensions by [`crate::layout`].

use std::ops::{Index, IndexMut};

use num_traits::Zero;

use crate::element::{ElementType, Upcast, Variance};
use crate::layout::{Layout2D, Layout3D};
use crate::span2d::{ReadOnlySpan2D, Span2D};
use crate::{Result, SpanError};

fn checked_area(dims: &[usize], available: usize) -> Result<usize> {
    let len = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(SpanError::SizeMismatch {
            required: usize::MAX,
            available,
        })?;
    if len != available {
        return Err(SpanError::SizeMismatch {
            required: len,
            available,
        });
    }
    Ok(len)
}

// ============================================================================
// Array2D
// ============================================================================

/// Owned, packed `height x width` array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Array2D<T> {
    data: Vec<T>,
    height: usize,
    width: usize,
    variance: Variance,
}

impl<T> Array2D<T> {
    /// Wrap `data` laid out row by row.
    ///
    /// # Errors
    /// `SizeMismatch` if `data.len() != height * width`.
    pub fn from_vec(data: Vec<T>, height: usize, width: usize) -> Result<Self> {
        checked_area(&[height, width], data.len())?;
        Ok(Self {
            data,
            height,
            width,
            variance: Variance::Exact,
        })
    }

    /// Wrap `data` whose every element was created as a `D`.
    ///
    /// Read-only views accept the resulting array; writable views refuse it
    /// with `TypeMismatch`.
    pub fn covariant<D: Upcast<T>>(data: Vec<T>, height: usize, width: usize) -> Result<Self> {
        let mut array = Self::from_vec(data, height, width)?;
        array.variance = Variance::Covariant(ElementType::of::<D>());
        Ok(array)
    }

    /// Build an array by calling `f(row, col)` in row-major order.
    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(height * width);
        for r in 0..height {
            for c in 0..width {
                data.push(f(r, c));
            }
        }
        Self {
            data,
            height,
            width,
            variance: Variance::Exact,
        }
    }

    /// Packed data produced by a view copy; the length is already known to match.
    pub(crate) fn from_packed(data: Vec<T>, height: usize, width: usize) -> Self {
        debug_assert_eq!(data.len(), height * width);
        Self {
            data,
            height,
            width,
            variance: Variance::Exact,
        }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn variance(&self) -> Variance {
        self.variance
    }

    /// Layout of the array inside its storage.
    pub fn layout(&self) -> Layout2D {
        Layout2D::packed(self.height, self.width)
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to the packed data.
    ///
    /// # Errors
    /// `TypeMismatch` for covariant arrays.
    pub fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        self.variance.admit_mutable::<T>()?;
        Ok(&mut self.data)
    }

    /// Storage without the covariance check; callers check it themselves.
    pub(crate) fn storage_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub(crate) fn into_parts(self) -> (Vec<T>, Layout2D, Variance) {
        let layout = self.layout();
        (self.data, layout, self.variance)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Result<&T> {
        let index = self.layout().index_of(row, col)?;
        Ok(&self.data[index])
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Result<&mut T> {
        self.variance.admit_mutable::<T>()?;
        let index = self.layout().index_of(row, col)?;
        Ok(&mut self.data[index])
    }

    /// Borrowed read-only view of the whole array.
    pub fn view(&self) -> ReadOnlySpan2D<'_, T> {
        ReadOnlySpan2D::from_array(self)
    }

    /// Borrowed writable view of the whole array.
    ///
    /// # Errors
    /// `TypeMismatch` for covariant arrays.
    pub fn view_mut(&mut self) -> Result<Span2D<'_, T>> {
        Span2D::from_array(self)
    }
}

impl<T: Clone> Array2D<T> {
    /// Array with every element set to `value`.
    pub fn filled(height: usize, width: usize, value: T) -> Self {
        Self::from_fn(height, width, |_, _| value.clone())
    }

    /// Array from fixed-width rows.
    pub fn from_rows<const W: usize>(rows: &[[T; W]]) -> Self {
        Self::from_fn(rows.len(), W, |r, c| rows[r][c].clone())
    }
}

impl<T: Clone + Zero> Array2D<T> {
    pub fn zeros(height: usize, width: usize) -> Self {
        Self::filled(height, width, T::zero())
    }
}

impl<T> Index<(usize, usize)> for Array2D<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        match self.get(row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T> IndexMut<(usize, usize)> for Array2D<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        match self.get_mut(row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

// ============================================================================
// Array3D
// ============================================================================

/// Owned, packed `depth x height x width` array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Array3D<T> {
    data: Vec<T>,
    depth: usize,
    height: usize,
    width: usize,
    variance: Variance,
}

impl<T> Array3D<T> {
    /// Wrap `data` laid out layer by layer, row by row.
    ///
    /// # Errors
    /// `SizeMismatch` if `data.len() != depth * height * width`.
    pub fn from_vec(data: Vec<T>, depth: usize, height: usize, width: usize) -> Result<Self> {
        checked_area(&[depth, height, width], data.len())?;
        Ok(Self {
            data,
            depth,
            height,
            width,
            variance: Variance::Exact,
        })
    }

    /// Wrap `data` whose every element was created as a `D`.
    pub fn covariant<D: Upcast<T>>(
        data: Vec<T>,
        depth: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        let mut array = Self::from_vec(data, depth, height, width)?;
        array.variance = Variance::Covariant(ElementType::of::<D>());
        Ok(array)
    }

    /// Build an array by calling `f(depth, row, col)` in storage order.
    pub fn from_fn(
        depth: usize,
        height: usize,
        width: usize,
        mut f: impl FnMut(usize, usize, usize) -> T,
    ) -> Self {
        let mut data = Vec::with_capacity(depth * height * width);
        for d in 0..depth {
            for r in 0..height {
                for c in 0..width {
                    data.push(f(d, r, c));
                }
            }
        }
        Self {
            data,
            depth,
            height,
            width,
            variance: Variance::Exact,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn variance(&self) -> Variance {
        self.variance
    }

    pub fn layout(&self) -> Layout3D {
        Layout3D::packed(self.depth, self.height, self.width)
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub(crate) fn storage_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub(crate) fn into_parts(self) -> (Vec<T>, Layout3D, Variance) {
        let layout = self.layout();
        (self.data, layout, self.variance)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, depth: usize, row: usize, col: usize) -> Result<&T> {
        let index = self.layout().index_of(depth, row, col)?;
        Ok(&self.data[index])
    }

    pub fn get_mut(&mut self, depth: usize, row: usize, col: usize) -> Result<&mut T> {
        self.variance.admit_mutable::<T>()?;
        let index = self.layout().index_of(depth, row, col)?;
        Ok(&mut self.data[index])
    }

    /// Read-only view of layer `depth`.
    pub fn layer(&self, depth: usize) -> Result<ReadOnlySpan2D<'_, T>> {
        ReadOnlySpan2D::from_array3d_layer(self, depth)
    }

    /// Writable view of layer `depth`.
    pub fn layer_mut(&mut self, depth: usize) -> Result<Span2D<'_, T>> {
        Span2D::from_array3d_layer(self, depth)
    }
}

impl<T: Clone + Zero> Array3D<T> {
    pub fn zeros(depth: usize, height: usize, width: usize) -> Self {
        Self::from_fn(depth, height, width, |_, _, _| T::zero())
    }
}

impl<T> Index<(usize, usize, usize)> for Array3D<T> {
    type Output = T;

    fn index(&self, (depth, row, col): (usize, usize, usize)) -> &T {
        match self.get(depth, row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Array3D<T> {
    fn index_mut(&mut self, (depth, row, col): (usize, usize, usize)) -> &mut T {
        match self.get_mut(depth, row, col) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    trait Shape {
        fn sides(&self) -> usize;
    }

    struct Square;

    impl Shape for Square {
        fn sides(&self) -> usize {
            4
        }
    }

    impl Upcast<Arc<dyn Shape>> for Square {}

    fn squares(n: usize) -> Vec<Arc<dyn Shape>> {
        (0..n).map(|_| Arc::new(Square) as Arc<dyn Shape>).collect()
    }

    #[test]
    fn test_from_vec() {
        let a = Array2D::from_vec(vec![1, 2, 3, 4, 5, 6], 2, 3).unwrap();
        assert_eq!(a[(0, 0)], 1);
        assert_eq!(a[(1, 2)], 6);
        assert_eq!(a.layout(), Layout2D::packed(2, 3));
        assert!(matches!(
            Array2D::from_vec(vec![1, 2, 3], 2, 2),
            Err(SpanError::SizeMismatch {
                required: 4,
                available: 3
            })
        ));
    }

    #[test]
    fn test_from_rows_and_mutate() {
        let mut a = Array2D::from_rows(&[[1, 2, 3], [4, 5, 6]]);
        a[(1, 0)] = 40;
        *a.get_mut(0, 2).unwrap() = 30;
        assert_eq!(a.as_slice(), &[1, 2, 30, 40, 5, 6]);
        assert!(matches!(a.get(2, 0), Err(SpanError::OutOfRange { .. })));
    }

    #[test]
    fn test_zeros_and_filled() {
        let z: Array2D<f64> = Array2D::zeros(2, 2);
        assert!(z.as_slice().iter().all(|&x| x == 0.0));
        let f = Array2D::filled(1, 3, 'x');
        assert_eq!(f.into_vec(), vec!['x'; 3]);
    }

    #[test]
    fn test_covariant_array_refuses_writes() {
        let mut a = Array2D::covariant::<Square>(squares(4), 2, 2).unwrap();
        assert!(a.variance().is_covariant());
        assert_eq!(a[(1, 1)].sides(), 4);
        assert!(matches!(
            a.as_mut_slice(),
            Err(SpanError::TypeMismatch { .. })
        ));
        assert!(matches!(
            a.get_mut(0, 0),
            Err(SpanError::TypeMismatch { .. })
        ));
        assert!(a.view_mut().is_err());
        assert_eq!(a.view().len(), 4);
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn test_covariant_index_mut_panics() {
        let mut a = Array2D::covariant::<Square>(squares(1), 1, 1).unwrap();
        a[(0, 0)] = Arc::new(Square) as Arc<dyn Shape>;
    }

    #[test]
    fn test_array3d_layers() {
        let a = Array3D::from_fn(3, 2, 2, |d, r, c| d * 100 + r * 10 + c);
        assert_eq!(a[(2, 1, 0)], 210);
        let layer = a.layer(1).unwrap();
        assert_eq!(layer.height(), 2);
        assert_eq!(layer.width(), 2);
        assert_eq!(layer[(1, 1)], 111);
        assert!(a.layer(3).is_err());
    }

    #[test]
    fn test_array3d_layer_mut() {
        let mut a: Array3D<i32> = Array3D::zeros(2, 2, 3);
        a.layer_mut(1).unwrap().fill(9);
        assert_eq!(&a.as_slice()[..6], &[0; 6]);
        assert_eq!(&a.as_slice()[6..], &[9; 6]);
    }

    #[test]
    fn test_array3d_size_mismatch() {
        assert!(Array3D::from_vec(vec![0; 7], 2, 2, 2).is_err());
        assert!(Array3D::from_vec(vec![0; 8], 2, 2, 2).is_ok());
    }
}
