//! Element-type tags and array covariance.
//!
//! A native array normally holds exactly the element type it is declared
//! with. A *covariant* array is declared over a reference-like handle type
//! `T` (say `Arc<dyn Shape>`) but was populated as an array of one concrete
//! type `D` (`Circle`), so every slot is expected to hold a `D`. Reading it
//! as `T` is fine; writing an arbitrary `T` would break that expectation.
//! The capability is proven once, at array construction, through
//! [`Upcast`], and carried as a [`Variance`] tag that view constructors check.

use std::any::{type_name, TypeId};

use crate::{Result, SpanError};

/// Runtime tag naming an element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementType {
    id: TypeId,
    name: &'static str,
}

impl ElementType {
    /// Tag for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Declares that a value of `Self` may be stored in a slot of type `T`.
///
/// Implement this for a concrete type and the reference-like handle that
/// can hold it:
///
/// ```rust
/// use std::sync::Arc;
/// use strided_span::{Array2D, Upcast};
///
/// trait Shape {}
/// struct Circle;
/// impl Shape for Circle {}
/// impl Upcast<Arc<dyn Shape>> for Circle {}
///
/// let cells: Vec<Arc<dyn Shape>> = (0..4).map(|_| Arc::new(Circle) as Arc<dyn Shape>).collect();
/// let array = Array2D::covariant::<Circle>(cells, 2, 2).unwrap();
/// assert!(array.variance().is_covariant());
/// ```
pub trait Upcast<T>: 'static {}

/// How an array's runtime element type relates to its declared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variance {
    /// The array holds exactly its declared element type.
    #[default]
    Exact,
    /// The array was populated as elements of the tagged type.
    Covariant(ElementType),
}

impl Variance {
    #[inline]
    pub fn is_covariant(&self) -> bool {
        matches!(self, Variance::Covariant(_))
    }

    /// Admit a writable view with element type `T`.
    pub(crate) fn admit_mutable<T>(&self) -> Result<()> {
        match self {
            Variance::Exact => Ok(()),
            Variance::Covariant(actual) => Err(SpanError::TypeMismatch {
                expected: type_name::<T>(),
                found: actual.name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_of() {
        assert_eq!(ElementType::of::<i32>(), ElementType::of::<i32>());
        assert_ne!(ElementType::of::<i32>(), ElementType::of::<u32>());
        assert_eq!(ElementType::of::<f64>().name(), "f64");
        assert_eq!(ElementType::of::<str>().id(), TypeId::of::<str>());
    }

    #[test]
    fn test_exact_admits_mutable() {
        assert!(Variance::Exact.admit_mutable::<i32>().is_ok());
        assert!(!Variance::default().is_covariant());
    }

    #[test]
    fn test_covariant_rejects_mutable() {
        let v = Variance::Covariant(ElementType::of::<u8>());
        assert!(v.is_covariant());
        match v.admit_mutable::<Box<dyn std::any::Any>>() {
            Err(SpanError::TypeMismatch { expected, found }) => {
                assert_eq!(found, "u8");
                assert!(expected.contains("Any"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
