//! Rectangular view descriptor shared by every view flavor.
//!
//! An [`Extent`] is the `(height, width, stride)` part of a view. The origin
//! is kept by the view itself: a resolved pointer for borrowed views, an
//! `(owner, offset)` pair for owning views. All validation, slicing and
//! cast arithmetic over the shape lives here so the four view types agree.

use crate::{raw, Result, SpanError};

/// Shape of a strided 2D region.
///
/// Invariant: `stride >= width` whenever `height > 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct Extent {
    height: usize,
    width: usize,
    stride: usize,
}

impl Extent {
    pub(crate) const EMPTY: Extent = Extent {
        height: 0,
        width: 0,
        stride: 0,
    };

    /// Packed shape: rows follow each other without padding.
    #[inline]
    pub(crate) fn packed(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            stride: width,
        }
    }

    /// Shape whose rows are separated by `pitch` padding elements.
    pub(crate) fn with_pitch(height: usize, width: usize, pitch: usize) -> Result<Self> {
        let stride = width.checked_add(pitch).ok_or(SpanError::OutOfRange {
            what: "pitch",
            value: pitch,
            bound: usize::MAX - width,
        })?;
        Ok(Self {
            height,
            width,
            stride,
        })
    }

    /// Shape with an explicit row stride.
    pub(crate) fn with_stride(height: usize, width: usize, stride: usize) -> Result<Self> {
        if height > 1 && stride < width {
            return Err(SpanError::OutOfRange {
                what: "stride",
                value: stride,
                bound: width,
            });
        }
        Ok(Self {
            height,
            width,
            stride,
        })
    }

    #[inline]
    pub(crate) fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub(crate) fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub(crate) fn stride(&self) -> usize {
        self.stride
    }

    /// Padding elements between the end of a row and the start of the next.
    #[inline]
    pub(crate) fn pitch(&self) -> usize {
        self.stride.saturating_sub(self.width)
    }

    /// Number of addressed elements.
    ///
    /// Never overflows for a validated extent: the addressed elements are a
    /// subset of the storage.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    /// Whether the addressed elements form one unbroken run.
    #[inline]
    pub(crate) fn is_contiguous(&self) -> bool {
        self.height <= 1 || self.stride == self.width || self.is_empty()
    }

    /// Check that the region starting at `offset` fits in `available` elements.
    pub(crate) fn validate(&self, offset: usize, available: usize) -> Result<()> {
        if offset > available {
            return Err(SpanError::OutOfRange {
                what: "offset",
                value: offset,
                bound: available,
            });
        }
        let required = raw::required_len(self.height, self.width, self.stride)
            .and_then(|len| len.checked_add(offset))
            .ok_or(SpanError::SizeMismatch {
                required: usize::MAX,
                available,
            })?;
        if required > available {
            return Err(SpanError::SizeMismatch {
                required,
                available,
            });
        }
        Ok(())
    }

    /// Linear index of `(row, col)` relative to the origin.
    pub(crate) fn index(&self, row: usize, col: usize) -> Result<usize> {
        self.check_row(row)?;
        self.check_column(col)?;
        Ok(raw::linear_index(row, col, self.stride))
    }

    /// Linear index of the first element of `row`.
    pub(crate) fn row_start(&self, row: usize) -> Result<usize> {
        self.check_row(row)?;
        Ok(raw::linear_index(row, 0, self.stride))
    }

    pub(crate) fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.height {
            return Err(SpanError::OutOfRange {
                what: "row",
                value: row,
                bound: self.height,
            });
        }
        Ok(())
    }

    pub(crate) fn check_column(&self, col: usize) -> Result<()> {
        if col >= self.width {
            return Err(SpanError::OutOfRange {
                what: "column",
                value: col,
                bound: self.width,
            });
        }
        Ok(())
    }

    /// Sub-rectangle at `(row, col)` of size `height x width`.
    ///
    /// Returns the origin delta and the new extent, which keeps this stride.
    /// An empty result keeps the parent origin.
    pub(crate) fn slice(
        &self,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    ) -> Result<(usize, Extent)> {
        if row > self.height {
            return Err(SpanError::OutOfRange {
                what: "row",
                value: row,
                bound: self.height,
            });
        }
        if col > self.width {
            return Err(SpanError::OutOfRange {
                what: "column",
                value: col,
                bound: self.width,
            });
        }
        if height > self.height - row {
            return Err(SpanError::OutOfRange {
                what: "height",
                value: height,
                bound: self.height - row,
            });
        }
        if width > self.width - col {
            return Err(SpanError::OutOfRange {
                what: "width",
                value: width,
                bound: self.width - col,
            });
        }
        let extent = Extent {
            height,
            width,
            stride: self.stride,
        };
        let delta = if extent.is_empty() {
            0
        } else {
            raw::linear_index(row, col, self.stride)
        };
        Ok((delta, extent))
    }

    /// Reinterpret this shape from elements of `T` to elements of `U`.
    pub(crate) fn cast<T, U>(&self) -> Result<Extent> {
        let from = std::mem::size_of::<T>();
        let to = std::mem::size_of::<U>();
        if from == 0 || to == 0 {
            return Err(SpanError::Unsupported("cast between zero-sized element types"));
        }
        let row_bytes = self.width * from;
        if self.is_empty() {
            return Ok(Extent::packed(self.height, row_bytes / to));
        }
        if row_bytes % to != 0 {
            return Err(SpanError::SizeIncompatible {
                bytes: row_bytes,
                element_size: to,
            });
        }
        let width = row_bytes / to;
        if self.height <= 1 {
            return Ok(Extent::packed(self.height, width));
        }
        let stride_bytes = self.stride * from;
        if stride_bytes % to != 0 {
            return Err(SpanError::SizeIncompatible {
                bytes: stride_bytes,
                element_size: to,
            });
        }
        Ok(Extent {
            height: self.height,
            width,
            stride: stride_bytes / to,
        })
    }
}
