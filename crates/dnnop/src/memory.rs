use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dnnop_core::{enforce, Error, Result, Shape, WithDType};

// DnnMemory - Typed buffer bound into kernel resource slots
//
// A DnnMemory is a cheap clonable handle: every clone points at the same
// storage (Arc<RwLock<..>>). Workspace blobs hold one handle, the operator
// fetches another through `input`/`output`, and binding it into a resource
// slot clones the handle again. Writes through any of them are visible to all.
//
// A default-constructed buffer has shape [0] and no elements; kernels
// `reshape` their outputs before binding them.

/// Shape and elements of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryData<T> {
    shape: Shape,
    data: Vec<T>,
}

impl<T> MemoryData<T> {
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Shared, typed buffer handle.
#[derive(Clone)]
pub struct DnnMemory<T: WithDType> {
    inner: Arc<RwLock<MemoryData<T>>>,
}

impl<T: WithDType> fmt::Debug for DnnMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DnnMemory");
        s.field("dtype", &T::DTYPE);
        if let Ok(guard) = self.inner.read() {
            s.field("shape", &guard.shape);
        }
        s.finish()
    }
}

impl<T: WithDType> Default for DnnMemory<T> {
    fn default() -> Self {
        Self::new(Shape::from(0))
    }
}

impl<T: WithDType> DnnMemory<T> {
    /// Zero-filled buffer of the given shape.
    pub fn new(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let data = vec![T::zero(); shape.elem_count()];
        DnnMemory {
            inner: Arc::new(RwLock::new(MemoryData { shape, data })),
        }
    }

    /// Buffer holding `data` with the given shape.
    pub fn from_vec(shape: impl Into<Shape>, data: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        if shape.elem_count() != data.len() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        Ok(DnnMemory {
            inner: Arc::new(RwLock::new(MemoryData { shape, data })),
        })
    }

    /// Acquire a read lock on the buffer.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, MemoryData<T>>> {
        self.inner
            .read()
            .map_err(|_| Error::msg("memory lock poisoned"))
    }

    /// Acquire a write lock on the buffer.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryData<T>>> {
        self.inner
            .write()
            .map_err(|_| Error::msg("memory lock poisoned"))
    }

    pub fn shape(&self) -> Result<Shape> {
        Ok(self.read()?.shape.clone())
    }

    pub fn dims(&self) -> Result<Vec<usize>> {
        Ok(self.read()?.shape.dims().to_vec())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.data.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        Ok(self.read()?.data.clone())
    }

    /// Overwrite the elements with `src`, which must match the buffer size.
    pub fn copy_from(&self, src: &[T]) -> Result<()> {
        let mut guard = self.write()?;
        enforce!(
            guard.data.len() == src.len(),
            "copy of {} elements into a buffer of shape {}",
            src.len(),
            guard.shape
        );
        guard.data.copy_from_slice(src);
        Ok(())
    }

    /// Change the shape. Storage is reallocated (and zeroed) only when the
    /// element count changes; returns whether that happened.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<bool> {
        let shape = shape.into();
        let mut guard = self.write()?;
        let realloc = guard.data.len() != shape.elem_count();
        if realloc {
            guard.data = vec![T::zero(); shape.elem_count()];
        }
        guard.shape = shape;
        Ok(realloc)
    }

    /// Whether both handles point at the same storage.
    pub fn same_storage(&self, other: &DnnMemory<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let m = DnnMemory::<f32>::default();
        assert!(m.is_empty().unwrap());
        assert_eq!(m.dims().unwrap(), vec![0]);
    }

    #[test]
    fn test_from_vec_count_mismatch() {
        let err = DnnMemory::<f64>::from_vec((2, 2), vec![1.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::ElementCountMismatch {
                expected: 4,
                got: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_clones_share_storage() {
        let a = DnnMemory::<f32>::new((2, 3));
        let b = a.clone();
        b.copy_from(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(a.to_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(a.same_storage(&b));
        assert!(!a.same_storage(&DnnMemory::new((2, 3))));
    }

    #[test]
    fn test_copy_from_wrong_len() {
        let a = DnnMemory::<f32>::new(4);
        let err = a.copy_from(&[1.0]).unwrap_err();
        assert!(matches!(err, Error::Enforce(_)));
    }

    #[test]
    fn test_reshape() {
        let a = DnnMemory::<f32>::from_vec(6, vec![1.0; 6]).unwrap();
        assert!(!a.reshape((2, 3)).unwrap());
        assert_eq!(a.to_vec().unwrap(), vec![1.0; 6]);
        assert!(a.reshape((4, 4)).unwrap());
        assert_eq!(a.len().unwrap(), 16);
        assert_eq!(a.to_vec().unwrap(), vec![0.0; 16]);
    }
}
