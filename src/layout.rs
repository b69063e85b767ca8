//! Layout helpers for native 2D and 3D arrays.
//!
//! A native array stores its elements packed, row after row (and layer after
//! layer). The layouts below are computed from the reported dimensions once,
//! at construction time, and describe where each element lives relative to
//! the start of the array's storage. Views built over native arrays take
//! their origin, extent and stride from here.

use crate::descriptor::Extent;
use crate::{raw, Result, SpanError};

fn shift(offset: usize, delta: usize) -> Result<usize> {
    offset.checked_add(delta).ok_or(SpanError::SizeMismatch {
        required: usize::MAX,
        available: offset,
    })
}

/// Placement of a 2D region inside flat storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout2D {
    /// Index of element `(0, 0)` in the storage.
    pub offset: usize,
    pub height: usize,
    pub width: usize,
    /// Elements from the start of one row to the start of the next.
    pub stride: usize,
}

impl Layout2D {
    /// Layout of a packed `height x width` array.
    pub fn packed(height: usize, width: usize) -> Self {
        Self {
            offset: 0,
            height,
            width,
            stride: width,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    /// Storage elements needed to hold this region, offset included.
    pub fn required_len(&self) -> Option<usize> {
        raw::required_len(self.height, self.width, self.stride)?.checked_add(self.offset)
    }

    /// Storage index of `(row, col)`.
    pub fn index_of(&self, row: usize, col: usize) -> Result<usize> {
        shift(self.offset, self.extent()?.index(row, col)?)
    }

    /// Layout of the sub-rectangle at `(row, col)`; the stride is kept.
    pub fn region(&self, row: usize, col: usize, height: usize, width: usize) -> Result<Layout2D> {
        let (delta, extent) = self.extent()?.slice(row, col, height, width)?;
        Ok(Layout2D {
            offset: shift(self.offset, delta)?,
            height: extent.height(),
            width: extent.width(),
            stride: extent.stride(),
        })
    }

    pub(crate) fn extent(&self) -> Result<Extent> {
        Extent::with_stride(self.height, self.width, self.stride)
    }
}

/// Placement of a packed 3D array inside flat storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout3D {
    /// Index of element `(0, 0, 0)` in the storage.
    pub offset: usize,
    pub depth: usize,
    pub height: usize,
    pub width: usize,
}

impl Layout3D {
    /// Layout of a packed `depth x height x width` array.
    pub fn packed(depth: usize, height: usize, width: usize) -> Self {
        Self {
            offset: 0,
            depth,
            height,
            width,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.depth * self.height * self.width
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements from the start of one layer to the start of the next.
    #[inline]
    pub fn layer_stride(&self) -> usize {
        self.height * self.width
    }

    /// 2D layout of layer `depth`: origin `offset + depth * height * width`.
    pub fn layer(&self, depth: usize) -> Result<Layout2D> {
        if depth >= self.depth {
            return Err(SpanError::OutOfRange {
                what: "depth",
                value: depth,
                bound: self.depth,
            });
        }
        let start = raw::layer_offset(depth, self.height, self.width).ok_or(
            SpanError::SizeMismatch {
                required: usize::MAX,
                available: self.layer_stride().saturating_mul(self.depth),
            },
        )?;
        Ok(Layout2D {
            offset: shift(self.offset, start)?,
            height: self.height,
            width: self.width,
            stride: self.width,
        })
    }

    /// Storage index of `(depth, row, col)`.
    pub fn index_of(&self, depth: usize, row: usize, col: usize) -> Result<usize> {
        self.layer(depth)?.index_of(row, col)
    }
}
