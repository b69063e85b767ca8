//! Strided 2D and 3D memory views.
//!
//! This crate lets code address a rectangular region of memory, whether it is
//! backed by a borrowed slice, a raw pointer, an owned native array or a heap
//! buffer owned by a manager, as a bounds-checked, slice-able view without
//! copying. Rows may be padded ("pitched"), so a view can describe a
//! sub-rectangle of a larger buffer and still stay interoperable with flat
//! 1D slices of the same memory.
//!
//! # Core Types
//!
//! - [`Span2D`] / [`ReadOnlySpan2D`]: Borrowed views, bound to the lifetime of
//!   their source and confined to the current thread
//! - [`Memory2D`] / [`ReadOnlyMemory2D`]: Owning views that retain their
//!   storage and can be stored, returned, or sent to another thread
//! - [`Lane`] / [`LaneMut`]: Zero-copy strided sequences over one row or one
//!   column
//! - [`Array2D`] / [`Array3D`]: Packed native arrays with explicit layouts
//! - [`FlatMemory`] / [`ReadOnlyFlatMemory`]: Owning 1D views
//! - [`MemoryManager`] / [`HeapBuffer`]: Externally owned storage with pinning
//!
//! # Example
//!
//! ```rust
//! use strided_span::{ReadOnlySpan2D, Span2D};
//!
//! // A 3x3 rectangle inside a buffer whose rows are 4 elements apart.
//! let mut data: Vec<i32> = (0..12).collect();
//! let mut span = Span2D::new(&mut data, 0, 3, 3, 1).unwrap();
//! assert_eq!(span.stride(), 4);
//! assert_eq!(span[(1, 2)], 6);
//!
//! span.fill(7);
//! assert_eq!(data[3], 3); // padding is untouched
//!
//! let view = ReadOnlySpan2D::new(&data, 0, 3, 3, 1).unwrap();
//! let column: Vec<i32> = view.column(0).unwrap().iter().copied().collect();
//! assert_eq!(column, vec![7, 7, 7]);
//! ```
//!
//! # Owning Example
//!
//! ```rust
//! use strided_span::{Array2D, Memory2D};
//!
//! let array = Array2D::from_rows(&[[1, 2, 3], [4, 5, 6]]);
//! let mut corner = Memory2D::from_array(array).unwrap();
//! corner.slice(1, 1, 1, 2).unwrap();
//! assert_eq!(corner.to_array().as_slice(), &[5, 6]);
//! ```

mod array;
mod descriptor;
mod element;
pub mod lane;
pub mod layout;
mod memory;
mod memory2d;
mod owner;
mod raw;
mod span2d;

// ============================================================================
// Native arrays and layouts
// ============================================================================
pub use array::{Array2D, Array3D};
pub use element::{ElementType, Upcast, Variance};
pub use layout::{Layout2D, Layout3D};

// ============================================================================
// Borrowed views
// ============================================================================
pub use lane::{Elements, ElementsMut, Lane, LaneIter, LaneIterMut, LaneMut, Rows, RowsMut};
pub use span2d::{Pinned, PinnedMut, ReadOnlySpan2D, Span2D};

// ============================================================================
// Owning views and storage
// ============================================================================
pub use memory::{FlatMemory, ReadOnlyFlatMemory};
pub use memory2d::{Memory2D, ReadOnlyMemory2D};
pub use owner::{HeapBuffer, MemoryHandle, MemoryManager};

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur while building or using a view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpanError {
    /// An index, row/column id, offset or rectangle parameter is invalid.
    #[error("{what} {value} out of range (bound {bound})")]
    OutOfRange {
        what: &'static str,
        value: usize,
        bound: usize,
    },

    /// A source or destination is too small for the requested region.
    #[error("size mismatch: {required} elements required, {available} available")]
    SizeMismatch { required: usize, available: usize },

    /// The array's runtime element type cannot back the requested view.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An element cast would split a row at a non-multiple byte boundary.
    #[error("{bytes} bytes cannot be split into {element_size}-byte elements")]
    SizeIncompatible { bytes: usize, element_size: usize },

    /// The view origin is not aligned for the target element type.
    #[error("view origin is not aligned to {align} bytes")]
    Misaligned { align: usize },

    /// The operation is intentionally unavailable on this view flavor.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Result type for view operations.
pub type Result<T> = std::result::Result<T, SpanError>;
